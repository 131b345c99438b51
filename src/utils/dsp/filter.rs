use std::f32;

use crate::utils::dsp::flush_denormal;

// -------------------------------------------------------------------------------------------------

/// Band-pass coefficients for a state variable filter, designed by Andrew Simper of Cytomic.
/// See <http://cytomic.com/files/dsp/SvfLinearTrapOptimised2.pdf>
///
/// This is a second-order resonant band-pass. Q = 0.707 means no resonant peaking. The filter
/// stays stable when its inputs are retuned at high rates, which makes it a good fit for short
/// grain voices that each get their own randomized frequency and resonance.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BandpassCoefficients {
    a1: f32,
    a2: f32,
    a3: f32,
}

impl BandpassCoefficients {
    /// Coefficients that pass no signal at all. Used for not yet configured filter slots.
    pub const fn silent() -> Self {
        Self {
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
        }
    }

    /// Compute coefficients for the given frequency in Hz and resonance.
    ///
    /// The frequency gets clamped into a valid range below nyquist, so randomized grain
    /// frequencies never can produce an unstable filter setup.
    pub fn new(sample_rate: u32, frequency: f32, q: f32) -> Self {
        debug_assert!(sample_rate > 0, "Invalid filter sample rate");
        debug_assert!(q > 0.0, "Invalid filter q");

        let nyquist = sample_rate as f32 / 2.0;
        let frequency = frequency.clamp(10.0, nyquist * 0.99);
        let q = q.max(0.1);

        let g = f32::tan(f32::consts::PI * frequency / sample_rate as f32);
        let k = 1.0 / q;
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;
        Self { a1, a2, a3 }
    }
}

// -------------------------------------------------------------------------------------------------

/// Single channel state of a band-pass [`BandpassCoefficients`] filter.
///
/// Filter state is defensively kept within safe bounds: denormals are flushed to zero and a
/// NaN or Inf blowup resets the state instead of leaking into the output stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct BandpassFilter {
    ic1eq: f32,
    ic2eq: f32,
}

impl BandpassFilter {
    /// Largest magnitude the integrator state may reach before it gets clamped.
    const STATE_LIMIT: f32 = 1.0e3;

    pub const fn new() -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
        }
    }

    /// Apply the filter on a single sample.
    #[inline]
    pub fn process_sample(&mut self, coefficients: &BandpassCoefficients, input: f32) -> f32 {
        let v0 = input;
        let v3 = v0 - self.ic2eq;
        let v1 = coefficients.a1 * self.ic1eq + coefficients.a2 * v3;
        let v2 = self.ic2eq + coefficients.a2 * self.ic1eq + coefficients.a3 * v3;
        self.ic1eq = flush_denormal((2.0 * v1 - self.ic1eq).clamp(
            -Self::STATE_LIMIT, //
            Self::STATE_LIMIT,
        ));
        self.ic2eq = flush_denormal((2.0 * v2 - self.ic2eq).clamp(
            -Self::STATE_LIMIT, //
            Self::STATE_LIMIT,
        ));
        if !self.ic1eq.is_finite() || !self.ic2eq.is_finite() {
            self.reset();
            return 0.0;
        }
        // band-pass response
        v1
    }

    /// Reset state of the filter.
    /// Used when a pool slot gets recycled for a new grain.
    #[inline]
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_output() {
        let coefficients = BandpassCoefficients::new(48000, 1200.0, 2.0);
        let mut filter = BandpassFilter::new();

        // noise-ish input stays bounded
        let mut value = 0.1234_f32;
        for _ in 0..48000 {
            value = (value * 997.0).fract() * 2.0 - 1.0;
            let output = filter.process_sample(&coefficients, value);
            assert!(output.is_finite());
            assert!(output.abs() < BandpassFilter::STATE_LIMIT);
        }
    }

    #[test]
    fn nan_input_recovery() {
        let coefficients = BandpassCoefficients::new(48000, 800.0, 1.0);
        let mut filter = BandpassFilter::new();

        filter.process_sample(&coefficients, 1.0);
        assert_eq!(filter.process_sample(&coefficients, f32::NAN), 0.0);
        // state got reset: the filter keeps producing finite output afterwards
        for _ in 0..100 {
            assert!(filter.process_sample(&coefficients, 0.5).is_finite());
        }
    }

    #[test]
    fn out_of_range_frequencies_are_clamped() {
        // must not panic or blow up
        let _ = BandpassCoefficients::new(48000, 0.0, 1.0);
        let _ = BandpassCoefficients::new(48000, 1.0e9, 1.0);
        let mut filter = BandpassFilter::new();
        let coefficients = BandpassCoefficients::new(48000, 1.0e9, 1.0);
        for _ in 0..1000 {
            assert!(filter.process_sample(&coefficients, 1.0).is_finite());
        }
    }
}
