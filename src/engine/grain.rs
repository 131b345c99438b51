use std::sync::LazyLock;

use rand::{rngs::SmallRng, Rng};

use crate::{
    engine::{capture::CaptureBuffer, mood::MoodPreset},
    utils::dsp::{
        filter::{BandpassCoefficients, BandpassFilter},
        window::HannWindow,
    },
};

// -------------------------------------------------------------------------------------------------

/// Maximum number of simultaneously playing grains.
pub const MAX_GRAINS: usize = 32;

/// Shortest allowed grain length in frames.
pub const MIN_GRAIN_FRAMES: usize = 100;

/// Longest allowed grain length in frames (1 s at 48 kHz). Always below the capture ring
/// length, so every spawn can reserve room for its full fragment.
pub const MAX_GRAIN_FRAMES: usize = 48_000;

/// Fixed resonance range grains draw their filter Q from.
const FILTER_Q_RANGE: (f32, f32) = (0.707, 4.0);

/// Per-grain volume randomization range.
const VOLUME_RANGE: (f32, f32) = (0.7, 1.0);

/// Playback rate bounds (± two octaves).
const PITCH_RATIO_RANGE: (f32, f32) = (0.25, 4.0);

/// Static, shared lookup table for the grain envelope.
static HANN_WINDOW_LUT: LazyLock<HannWindow<2048>> = LazyLock::new(HannWindow::new);

// -------------------------------------------------------------------------------------------------

/// A single short, independently parameterized playback of captured audio.
///
/// All randomized parameters are sampled once at trigger time and stay fixed for the grain's
/// lifetime. The grain advances by one frame per sample and retires itself when it played
/// through its fragment, or, for reversed grains, the moment its read position would underflow
/// the fragment start.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Grain {
    /// Is this grain currently playing?
    pub(crate) active: bool,
    /// Absolute ring index of the fragment start.
    pub(crate) start_pos: usize,
    /// Frames advanced since the spawn.
    pub(crate) position: usize,
    /// Fragment length in frames.
    pub(crate) length: usize,
    /// Position of the envelope window (advances with `position`).
    pub(crate) envelope_pos: usize,
    /// Playback rate; read positions advance by this per frame.
    pub(crate) pitch_ratio: f32,
    /// Stereo panning position (-1.0..1.0).
    pub(crate) panning: f32,
    /// Play the fragment backwards?
    pub(crate) reverse: bool,
    /// Grain volume (randomized per spawn).
    pub(crate) volume: f32,
    /// Band-pass setup shared by both channel filters.
    pub(crate) filter_coefficients: BandpassCoefficients,
    filter_left: BandpassFilter,
    filter_right: BandpassFilter,
}

impl Grain {
    /// Create a new inactive grain.
    pub const fn new() -> Self {
        Self {
            active: false,
            start_pos: 0,
            position: 0,
            length: 0,
            envelope_pos: 0,
            pitch_ratio: 1.0,
            panning: 0.0,
            reverse: false,
            volume: 1.0,
            filter_coefficients: BandpassCoefficients::silent(),
            filter_left: BandpassFilter::new(),
            filter_right: BandpassFilter::new(),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Activate this grain with the given parameters and a clean envelope and filter state.
    #[allow(clippy::too_many_arguments)]
    fn activate(
        &mut self,
        start_pos: usize,
        length: usize,
        pitch_ratio: f32,
        panning: f32,
        reverse: bool,
        volume: f32,
        filter_coefficients: BandpassCoefficients,
    ) {
        debug_assert!((MIN_GRAIN_FRAMES..=MAX_GRAIN_FRAMES).contains(&length));
        self.active = true;
        self.start_pos = start_pos;
        self.position = 0;
        self.length = length;
        self.envelope_pos = 0;
        self.pitch_ratio = pitch_ratio.clamp(PITCH_RATIO_RANGE.0, PITCH_RATIO_RANGE.1);
        self.panning = panning.clamp(-1.0, 1.0);
        self.reverse = reverse;
        self.volume = volume;
        self.filter_coefficients = filter_coefficients;
        self.filter_left.reset();
        self.filter_right.reset();
    }

    /// Deactivate this grain immediately.
    fn deactivate(&mut self) {
        self.active = false;
    }

    /// Process this grain for one sample and return its panned stereo contribution.
    #[inline]
    fn process(&mut self, capture: &CaptureBuffer, window: &HannWindow<2048>) -> (f32, f32) {
        debug_assert!(self.active, "Should only process active grains");

        // pitch-shifted offset into the fragment
        let scaled_pos = (self.position as f32 * self.pitch_ratio) as usize;
        let read_index = if self.reverse {
            if scaled_pos >= self.length {
                // read position underflowed the fragment start
                self.deactivate();
                return (0.0, 0.0);
            }
            self.start_pos + self.length - 1 - scaled_pos
        } else {
            self.start_pos + scaled_pos
        };

        let (dry_left, dry_right) = capture.frame(read_index);
        let left = self
            .filter_left
            .process_sample(&self.filter_coefficients, dry_left);
        let right = self
            .filter_right
            .process_sample(&self.filter_coefficients, dry_right);

        let envelope =
            window.sample(self.envelope_pos as f32 / self.length as f32) * self.volume;
        let left_gain = (1.0 - self.panning) * 0.5;
        let right_gain = (1.0 + self.panning) * 0.5;

        self.position += 1;
        self.envelope_pos += 1;
        if self.position >= self.length {
            self.deactivate();
        }

        (left * envelope * left_gain, right * envelope * right_gain)
    }
}

// -------------------------------------------------------------------------------------------------

/// Fixed-capacity pool of grain slots plus the trigger scheduler that fills them.
///
/// The pool reuses inactive [`Grain`] instances to avoid allocations during real-time
/// processing. Trigger decisions are rate-limited by a sample counter owned by the pool and
/// probability-gated by the active mood, so the density control shapes both how often a spawn
/// is considered and how likely a considered spawn actually happens.
pub(crate) struct GrainPool<const POOL_SIZE: usize> {
    /// Pool of reusable grain instances.
    grains: [Grain; POOL_SIZE],
    /// Indices of currently active grains.
    active_grain_indices: Vec<usize>,
    /// Samples elapsed since the last spawn decision.
    trigger_counter: u32,
}

impl<const POOL_SIZE: usize> GrainPool<POOL_SIZE> {
    /// Smallest possible trigger interval in samples at full density.
    const MIN_TRIGGER_INTERVAL: f32 = 10.0;
    /// Span added to the trigger interval as density approaches zero.
    const TRIGGER_INTERVAL_SPAN: f32 = 990.0;

    pub fn new() -> Self {
        Self {
            grains: [Grain::new(); POOL_SIZE],
            active_grain_indices: Vec::with_capacity(POOL_SIZE),
            trigger_counter: 0,
        }
    }

    /// Number of currently playing grains.
    #[inline]
    pub fn active_count(&self) -> usize {
        self.active_grain_indices.len()
    }

    /// Advance the trigger scheduler by one sample, spawning a new grain from the given mood's
    /// ranges when the rate limiter and the probability gate both pass.
    #[inline]
    #[allow(clippy::too_many_arguments)]
    pub fn tick_trigger(
        &mut self,
        density: f32,
        grain_size_scale: f32,
        pitch_range_scale: f32,
        mood: &MoodPreset,
        sample_rate: u32,
        capture_len: usize,
        rng: &mut SmallRng,
    ) {
        self.trigger_counter += 1;

        let density = density.clamp(0.0, 1.0);
        let interval =
            Self::MIN_TRIGGER_INTERVAL + (1.0 - density) * Self::TRIGGER_INTERVAL_SPAN;
        if (self.trigger_counter as f32) < interval {
            return;
        }
        self.trigger_counter = 0;

        if rng.random::<f32>() < density * mood.trigger_probability {
            self.spawn_grain(
                grain_size_scale,
                pitch_range_scale,
                mood,
                sample_rate,
                capture_len,
                rng,
            );
        }
    }

    /// Spawn a new grain with parameters sampled from the given mood's ranges.
    /// Claims the first inactive slot, or forcibly reuses slot 0 when the pool is full.
    fn spawn_grain(
        &mut self,
        grain_size_scale: f32,
        pitch_range_scale: f32,
        mood: &MoodPreset,
        sample_rate: u32,
        capture_len: usize,
        rng: &mut SmallRng,
    ) {
        let (min_length_ms, max_length_ms) = mood.length_range_ms;
        let length_ms = rng.random_range(min_length_ms..=max_length_ms) * grain_size_scale;
        let length = ((length_ms * sample_rate as f32 / 1000.0) as usize)
            .clamp(MIN_GRAIN_FRAMES, MAX_GRAIN_FRAMES.min(capture_len - 1));

        // reserve room for the whole fragment behind the start position
        let start_pos = rng.random_range(0..capture_len - length);

        let semitones = rng.random_range(-1.0..=1.0f32) * mood.pitch_range * pitch_range_scale;
        let pitch_ratio =
            2.0f32.powf(semitones / 12.0).clamp(PITCH_RATIO_RANGE.0, PITCH_RATIO_RANGE.1);

        let panning = (rng.random_range(-1.0..=1.0f32) * mood.pan_spread).clamp(-1.0, 1.0);
        let reverse = rng.random_bool(mood.reverse_probability.clamp(0.0, 1.0) as f64);

        let (min_freq, max_freq) = mood.filter_range_hz;
        let filter_freq = rng.random_range(min_freq..=max_freq);
        let filter_q = rng.random_range(FILTER_Q_RANGE.0..=FILTER_Q_RANGE.1);
        let filter_coefficients = BandpassCoefficients::new(sample_rate, filter_freq, filter_q);

        let volume = rng.random_range(VOLUME_RANGE.0..=VOLUME_RANGE.1);

        let index = self
            .grains
            .iter()
            .position(|grain| !grain.is_active())
            .unwrap_or(0);
        self.grains[index].activate(
            start_pos,
            length,
            pitch_ratio,
            panning,
            reverse,
            volume,
            filter_coefficients,
        );

        if let Some(position) = self.active_grain_indices.iter().position(|&v| v == index) {
            // the stolen slot was still listed as active
            self.active_grain_indices.remove(position);
        }
        self.active_grain_indices.push(index);
    }

    /// Advance all active grains by one sample and return their summed stereo output.
    #[inline]
    pub fn process(&mut self, capture: &CaptureBuffer) -> (f32, f32) {
        let window = &*HANN_WINDOW_LUT;

        let mut left = 0.0;
        let mut right = 0.0;
        for &index in &self.active_grain_indices {
            let grain = &mut self.grains[index];
            if grain.is_active() {
                let (grain_left, grain_right) = grain.process(capture, window);
                left += grain_left;
                right += grain_right;
            }
        }

        // drop grains which finished playback from the active list
        self.active_grain_indices
            .retain(|&index| self.grains[index].is_active());

        (left, right)
    }

    /// Deactivate every grain and forget all trigger state.
    pub fn reset(&mut self) {
        self.active_grain_indices.clear();
        for grain in &mut self.grains {
            grain.deactivate();
        }
        self.trigger_counter = 0;
    }

    #[cfg(test)]
    pub(crate) fn grain(&self, index: usize) -> &Grain {
        &self.grains[index]
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::engine::{
        capture::CAPTURE_FRAMES,
        mood::{mood_presets, RandomizationMode},
    };

    const SAMPLE_RATE: u32 = 48_000;

    fn noise_capture(seed: u64) -> CaptureBuffer {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut capture = CaptureBuffer::new();
        for _ in 0..CAPTURE_FRAMES {
            capture.write(rng.random_range(-1.0..=1.0), rng.random_range(-1.0..=1.0));
        }
        capture
    }

    #[test]
    fn pool_never_exceeds_capacity() {
        let capture = noise_capture(1);
        let mut rng = SmallRng::seed_from_u64(2);
        let mut pool = GrainPool::<MAX_GRAINS>::new();
        let mood = mood_presets(RandomizationMode::Industrial)[7];

        for _ in 0..200_000 {
            pool.tick_trigger(1.0, 1.0, 1.0, &mood, SAMPLE_RATE, CAPTURE_FRAMES, &mut rng);
            pool.process(&capture);
            assert!(pool.active_count() <= MAX_GRAINS);
        }
    }

    #[test]
    fn zero_density_never_spawns() {
        let capture = noise_capture(3);
        let mut rng = SmallRng::seed_from_u64(4);
        let mut pool = GrainPool::<MAX_GRAINS>::new();
        let mood = mood_presets(RandomizationMode::Wild)[7];

        for _ in 0..50_000 {
            pool.tick_trigger(0.0, 1.0, 1.0, &mood, SAMPLE_RATE, CAPTURE_FRAMES, &mut rng);
            let (left, right) = pool.process(&capture);
            assert_eq!(pool.active_count(), 0);
            assert_eq!((left, right), (0.0, 0.0));
        }
    }

    #[test]
    fn spawned_grains_satisfy_invariants() {
        let mut rng = SmallRng::seed_from_u64(5);
        for mode in RandomizationMode::iter() {
            let presets = mood_presets(mode);
            let mut pool = GrainPool::<MAX_GRAINS>::new();
            for round in 0..2_000 {
                let mood = &presets[round % 8];
                pool.spawn_grain(4.0, 2.0, mood, SAMPLE_RATE, CAPTURE_FRAMES, &mut rng);

                let index = *pool.active_grain_indices.last().unwrap();
                let grain = pool.grain(index);
                assert!((PITCH_RATIO_RANGE.0..=PITCH_RATIO_RANGE.1)
                    .contains(&grain.pitch_ratio));
                assert!((-1.0..=1.0).contains(&grain.panning));
                assert!((MIN_GRAIN_FRAMES..=MAX_GRAIN_FRAMES).contains(&grain.length));
                assert!(grain.start_pos + grain.length <= CAPTURE_FRAMES);
                assert!((0.0..=1.0).contains(&grain.volume) && grain.volume >= 0.7);
            }
        }
    }

    #[test]
    fn full_pool_steals_slot_zero() {
        let mut rng = SmallRng::seed_from_u64(6);
        let mut pool = GrainPool::<MAX_GRAINS>::new();
        let mood = mood_presets(RandomizationMode::Ambient)[0];

        for _ in 0..MAX_GRAINS {
            pool.spawn_grain(1.0, 1.0, &mood, SAMPLE_RATE, CAPTURE_FRAMES, &mut rng);
        }
        assert_eq!(pool.active_count(), MAX_GRAINS);

        let before = *pool.grain(0);
        pool.spawn_grain(1.0, 1.0, &mood, SAMPLE_RATE, CAPTURE_FRAMES, &mut rng);
        assert_eq!(pool.active_count(), MAX_GRAINS);
        let after = *pool.grain(0);
        // slot 0 got forcibly restarted with a fresh envelope
        assert_eq!(after.position, 0);
        assert!(
            before.start_pos != after.start_pos
                || before.length != after.length
                || before.pitch_ratio != after.pitch_ratio
        );
    }

    #[test]
    fn forward_grain_retires_after_length_samples() {
        let capture = noise_capture(7);
        let mut pool = GrainPool::<MAX_GRAINS>::new();
        pool.grains[3].activate(
            1_000,
            MIN_GRAIN_FRAMES,
            1.0,
            0.0,
            false,
            1.0,
            BandpassCoefficients::new(SAMPLE_RATE, 1000.0, 1.0),
        );
        pool.active_grain_indices.push(3);

        for _ in 0..MIN_GRAIN_FRAMES {
            pool.process(&capture);
        }
        assert_eq!(pool.active_count(), 0);
        assert!(!pool.grain(3).is_active());
    }

    #[test]
    fn reverse_grain_retires_on_underflow() {
        let capture = noise_capture(8);
        let mut pool = GrainPool::<MAX_GRAINS>::new();
        // at 4x playback rate a reversed grain underflows its start after length / 4 samples
        pool.grains[0].activate(
            2_000,
            400,
            4.0,
            0.0,
            true,
            1.0,
            BandpassCoefficients::new(SAMPLE_RATE, 1000.0, 1.0),
        );
        pool.active_grain_indices.push(0);

        for _ in 0..120 {
            pool.process(&capture);
        }
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn reset_clears_all_slots() {
        let mut rng = SmallRng::seed_from_u64(9);
        let mut pool = GrainPool::<MAX_GRAINS>::new();
        let mood = mood_presets(RandomizationMode::Moderate)[4];
        for _ in 0..10 {
            pool.spawn_grain(1.0, 1.0, &mood, SAMPLE_RATE, CAPTURE_FRAMES, &mut rng);
        }
        pool.reset();
        assert_eq!(pool.active_count(), 0);
        assert!(pool.grains.iter().all(|grain| !grain.is_active()));
    }
}
