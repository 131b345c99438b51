use rand::{rngs::SmallRng, Rng};

// -------------------------------------------------------------------------------------------------

/// Number of mood presets the engine drifts between.
pub const MOOD_COUNT: usize = 8;

/// Shortest possible time between two mood mutation checks (50 ms at 48 kHz).
pub const MIN_MUTATION_INTERVAL: u32 = 2400;

/// Span added to [`MIN_MUTATION_INTERVAL`] at the slowest mutation rate (up to ~1 s).
const MUTATION_INTERVAL_SPAN: f32 = 45_600.0;

// -------------------------------------------------------------------------------------------------

/// Selects the character of the generated mood presets.
///
/// Changing the mode regenerates all presets and the transition matrix from scratch. Grains
/// that are already playing keep the parameters they were spawned with.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[repr(u8)]
pub enum RandomizationMode {
    /// Narrow, quiet ranges. Sparse triggering.
    #[default]
    #[strum(serialize = "GENTLE")]
    Gentle,
    /// Balanced all-purpose ranges.
    #[strum(serialize = "MODERATE")]
    Moderate,
    /// Wide pitch and pan excursions, short grains, busy triggering.
    #[strum(serialize = "WILD")]
    Wild,
    /// Very short grains with extreme pitch offsets.
    #[strum(serialize = "GLITCH")]
    Glitch,
    /// Steady pitch, clipped grain lengths for pulse-like textures.
    #[strum(serialize = "RHYTHM")]
    Rhythmic,
    /// Long tonal grains with wide but musical pitch offsets.
    #[strum(serialize = "MELODIC")]
    Melodic,
    /// Very long washed-out grains, sparse triggering.
    #[strum(serialize = "AMBIENT")]
    Ambient,
    /// Aggressive ranges everywhere: harsh filters, fast triggering.
    #[strum(serialize = "INDUSTR")]
    Industrial,
}

// -------------------------------------------------------------------------------------------------

/// Immutable bundle of randomization ranges for newly spawned grains.
///
/// A preset never changes once generated: grains sample their parameters from the active
/// preset at trigger time and keep them for their entire lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoodPreset {
    /// Probability that an elapsed trigger interval actually spawns a grain,
    /// scaled by the density control.
    pub trigger_probability: f32,
    /// Maximum pitch offset in ± semitones.
    pub pitch_range: f32,
    /// Grain length range in milliseconds (min, max).
    pub length_range_ms: (f32, f32),
    /// Maximum stereo offset for grain panning (0 = centered, 1 = full width).
    pub pan_spread: f32,
    /// Band-pass center frequency range in Hz (min, max).
    pub filter_range_hz: (f32, f32),
    /// Probability that a grain plays its fragment backwards.
    pub reverse_probability: f32,
}

impl MoodPreset {
    /// Interpolate between two presets.
    fn lerp(calm: &MoodPreset, restless: &MoodPreset, t: f32) -> MoodPreset {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        MoodPreset {
            trigger_probability: mix(calm.trigger_probability, restless.trigger_probability),
            pitch_range: mix(calm.pitch_range, restless.pitch_range),
            length_range_ms: (
                mix(calm.length_range_ms.0, restless.length_range_ms.0),
                mix(calm.length_range_ms.1, restless.length_range_ms.1),
            ),
            pan_spread: mix(calm.pan_spread, restless.pan_spread),
            filter_range_hz: (
                mix(calm.filter_range_hz.0, restless.filter_range_hz.0),
                mix(calm.filter_range_hz.1, restless.filter_range_hz.1),
            ),
            reverse_probability: mix(calm.reverse_probability, restless.reverse_probability),
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Generate the mood preset table for the given randomization mode.
///
/// This is a pure function: the same mode always produces the same table. Each mode defines a
/// calm and a restless end of its archetype; the eight moods spread linearly across that span,
/// so even a held mode offers a gradient of intensities for the mutation walk to drift over.
pub fn mood_presets(mode: RandomizationMode) -> [MoodPreset; MOOD_COUNT] {
    let (calm, restless) = mode_archetype(mode);
    core::array::from_fn(|index| {
        let t = index as f32 / (MOOD_COUNT - 1) as f32;
        MoodPreset::lerp(&calm, &restless, t)
    })
}

/// The calm and restless archetype endpoints for a randomization mode.
fn mode_archetype(mode: RandomizationMode) -> (MoodPreset, MoodPreset) {
    match mode {
        RandomizationMode::Gentle => (
            MoodPreset {
                trigger_probability: 0.10,
                pitch_range: 1.0,
                length_range_ms: (120.0, 400.0),
                pan_spread: 0.2,
                filter_range_hz: (300.0, 1800.0),
                reverse_probability: 0.05,
            },
            MoodPreset {
                trigger_probability: 0.18,
                pitch_range: 4.0,
                length_range_ms: (80.0, 250.0),
                pan_spread: 0.5,
                filter_range_hz: (400.0, 2600.0),
                reverse_probability: 0.15,
            },
        ),
        RandomizationMode::Moderate => (
            MoodPreset {
                trigger_probability: 0.18,
                pitch_range: 3.0,
                length_range_ms: (60.0, 300.0),
                pan_spread: 0.4,
                filter_range_hz: (250.0, 3500.0),
                reverse_probability: 0.10,
            },
            MoodPreset {
                trigger_probability: 0.30,
                pitch_range: 7.0,
                length_range_ms: (40.0, 220.0),
                pan_spread: 0.7,
                filter_range_hz: (300.0, 5000.0),
                reverse_probability: 0.25,
            },
        ),
        RandomizationMode::Wild => (
            MoodPreset {
                trigger_probability: 0.30,
                pitch_range: 7.0,
                length_range_ms: (20.0, 200.0),
                pan_spread: 0.7,
                filter_range_hz: (150.0, 8000.0),
                reverse_probability: 0.30,
            },
            MoodPreset {
                trigger_probability: 0.55,
                pitch_range: 12.0,
                length_range_ms: (10.0, 120.0),
                pan_spread: 1.0,
                filter_range_hz: (150.0, 8000.0),
                reverse_probability: 0.50,
            },
        ),
        RandomizationMode::Glitch => (
            MoodPreset {
                trigger_probability: 0.40,
                pitch_range: 12.0,
                length_range_ms: (4.0, 60.0),
                pan_spread: 1.0,
                filter_range_hz: (500.0, 12000.0),
                reverse_probability: 0.50,
            },
            MoodPreset {
                trigger_probability: 0.60,
                pitch_range: 24.0,
                length_range_ms: (2.0, 30.0),
                pan_spread: 1.0,
                filter_range_hz: (500.0, 12000.0),
                reverse_probability: 0.50,
            },
        ),
        RandomizationMode::Rhythmic => (
            MoodPreset {
                trigger_probability: 0.25,
                pitch_range: 0.0,
                length_range_ms: (50.0, 100.0),
                pan_spread: 0.3,
                filter_range_hz: (200.0, 4000.0),
                reverse_probability: 0.05,
            },
            MoodPreset {
                trigger_probability: 0.45,
                pitch_range: 2.0,
                length_range_ms: (30.0, 80.0),
                pan_spread: 0.6,
                filter_range_hz: (200.0, 4000.0),
                reverse_probability: 0.05,
            },
        ),
        RandomizationMode::Melodic => (
            MoodPreset {
                trigger_probability: 0.15,
                pitch_range: 4.0,
                length_range_ms: (150.0, 500.0),
                pan_spread: 0.3,
                filter_range_hz: (300.0, 5000.0),
                reverse_probability: 0.10,
            },
            MoodPreset {
                trigger_probability: 0.28,
                pitch_range: 12.0,
                length_range_ms: (100.0, 350.0),
                pan_spread: 0.6,
                filter_range_hz: (300.0, 5000.0),
                reverse_probability: 0.10,
            },
        ),
        RandomizationMode::Ambient => (
            MoodPreset {
                trigger_probability: 0.10,
                pitch_range: 2.0,
                length_range_ms: (300.0, 900.0),
                pan_spread: 0.5,
                filter_range_hz: (100.0, 2000.0),
                reverse_probability: 0.20,
            },
            MoodPreset {
                trigger_probability: 0.20,
                pitch_range: 7.0,
                length_range_ms: (200.0, 700.0),
                pan_spread: 0.9,
                filter_range_hz: (100.0, 2000.0),
                reverse_probability: 0.35,
            },
        ),
        RandomizationMode::Industrial => (
            MoodPreset {
                trigger_probability: 0.35,
                pitch_range: 6.0,
                length_range_ms: (15.0, 150.0),
                pan_spread: 0.8,
                filter_range_hz: (80.0, 10000.0),
                reverse_probability: 0.35,
            },
            MoodPreset {
                trigger_probability: 0.60,
                pitch_range: 18.0,
                length_range_ms: (8.0, 90.0),
                pan_spread: 1.0,
                filter_range_hz: (120.0, 14000.0),
                reverse_probability: 0.50,
            },
        ),
    }
}

// -------------------------------------------------------------------------------------------------

/// Row-stochastic matrix of mood transition weights.
///
/// Each cell is drawn uniformly at random, then every row gets normalized to sum 1, which makes
/// the mood drift a random walk without hand-authored structure.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    rows: [[f32; MOOD_COUNT]; MOOD_COUNT],
}

impl TransitionMatrix {
    /// Build a freshly randomized matrix.
    pub fn generate(rng: &mut SmallRng) -> Self {
        let mut rows = [[0.0; MOOD_COUNT]; MOOD_COUNT];
        for row in rows.iter_mut() {
            let mut sum = 0.0;
            for weight in row.iter_mut() {
                // keep weights strictly positive so normalization never divides by zero
                *weight = rng.random::<f32>().max(f32::EPSILON);
                sum += *weight;
            }
            for weight in row.iter_mut() {
                *weight /= sum;
            }
        }
        Self { rows }
    }

    /// Access the outgoing transition weights of a mood.
    pub fn row(&self, from: usize) -> &[f32; MOOD_COUNT] {
        &self.rows[from]
    }

    /// Walk the cumulative distribution of the given mood's row and return the first mood whose
    /// cumulative probability exceeds the uniform `draw` in `[0, 1)`.
    pub fn next_mood(&self, from: usize, draw: f32) -> usize {
        let mut cumulative = 0.0;
        for (index, weight) in self.rows[from].iter().enumerate() {
            cumulative += weight;
            if draw < cumulative {
                return index;
            }
        }
        // rounding left the cumulative sum slightly below the draw
        MOOD_COUNT - 1
    }
}

// -------------------------------------------------------------------------------------------------

/// Drifts the active mood over time via weighted-random transitions.
///
/// Holds at the current mood until the mutation interval elapses, then walks one step of the
/// transition matrix. When frozen, the check is skipped entirely and the mood holds
/// indefinitely until freeze is cleared again.
#[derive(Debug, Clone)]
pub struct MoodEngine {
    presets: [MoodPreset; MOOD_COUNT],
    transition_matrix: TransitionMatrix,
    current_mood: usize,
    samples_since_mutation: u32,
}

impl MoodEngine {
    pub fn new(mode: RandomizationMode, rng: &mut SmallRng) -> Self {
        Self {
            presets: mood_presets(mode),
            transition_matrix: TransitionMatrix::generate(rng),
            current_mood: 0,
            samples_since_mutation: 0,
        }
    }

    /// Index of the currently active mood.
    pub fn current_mood(&self) -> usize {
        self.current_mood
    }

    /// The preset grains currently get spawned from.
    #[inline]
    pub fn current_preset(&self) -> &MoodPreset {
        &self.presets[self.current_mood]
    }

    /// Access the current transition matrix.
    pub fn transition_matrix(&self) -> &TransitionMatrix {
        &self.transition_matrix
    }

    /// Replace presets and transition matrix for a new randomization mode.
    /// The current mood index is kept; active grains are unaffected.
    pub fn regenerate(&mut self, mode: RandomizationMode, rng: &mut SmallRng) {
        self.presets = mood_presets(mode);
        self.transition_matrix = TransitionMatrix::generate(rng);
        self.samples_since_mutation = 0;
    }

    /// Advance the mutation clock by one sample and apply a weighted-random mood transition
    /// when the interval elapsed. Frozen engines hold their mood.
    #[inline]
    pub fn tick(&mut self, mutation_rate: f32, frozen: bool, rng: &mut SmallRng) {
        if frozen {
            return;
        }
        self.samples_since_mutation += 1;
        if self.samples_since_mutation >= Self::mutation_interval(mutation_rate) {
            self.samples_since_mutation = 0;
            let draw = rng.random::<f32>();
            self.current_mood = self.transition_matrix.next_mood(self.current_mood, draw);
        }
    }

    /// Back to the initial mood, mutation clock restarted.
    pub fn reset(&mut self) {
        self.current_mood = 0;
        self.samples_since_mutation = 0;
    }

    /// Samples between two mutation checks for the given rate (~50 ms at rate 1 up to ~1 s at
    /// rate 0).
    fn mutation_interval(mutation_rate: f32) -> u32 {
        let rate = mutation_rate.clamp(0.0, 1.0);
        MIN_MUTATION_INTERVAL + ((1.0 - rate) * MUTATION_INTERVAL_SPAN) as u32
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::utils::assert_eq_with_epsilon;

    #[test]
    fn matrix_rows_are_stochastic() {
        for seed in 0..16 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let matrix = TransitionMatrix::generate(&mut rng);
            for from in 0..MOOD_COUNT {
                let row_sum: f32 = matrix.row(from).iter().sum();
                assert_eq_with_epsilon!(row_sum, 1.0, 1.0e-5);
                assert!(matrix.row(from).iter().all(|&weight| weight > 0.0));
            }
        }
    }

    #[test]
    fn cumulative_walk_selects_moods() {
        let mut rng = SmallRng::seed_from_u64(1);
        let matrix = TransitionMatrix::generate(&mut rng);
        for from in 0..MOOD_COUNT {
            // all weights are strictly positive, so a zero draw picks the first mood
            assert_eq!(matrix.next_mood(from, 0.0), 0);
            // and a draw at (or above) the total sum falls back to the last mood
            assert_eq!(matrix.next_mood(from, 1.0), MOOD_COUNT - 1);
        }
    }

    #[test]
    fn presets_are_pure_and_plausible() {
        for mode in RandomizationMode::iter() {
            let presets = mood_presets(mode);
            assert_eq!(presets, mood_presets(mode));

            for preset in presets.iter() {
                assert!(preset.trigger_probability > 0.0 && preset.trigger_probability <= 1.0);
                assert!(preset.pitch_range >= 0.0);
                assert!(preset.length_range_ms.0 > 0.0);
                assert!(preset.length_range_ms.0 < preset.length_range_ms.1);
                assert!((0.0..=1.0).contains(&preset.pan_spread));
                assert!(preset.filter_range_hz.0 > 0.0);
                assert!(preset.filter_range_hz.0 < preset.filter_range_hz.1);
                assert!(preset.filter_range_hz.1 < 24000.0);
                assert!((0.0..=1.0).contains(&preset.reverse_probability));
            }
        }
    }

    #[test]
    fn frozen_engine_holds_mood() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut engine = MoodEngine::new(RandomizationMode::Wild, &mut rng);
        let mood = engine.current_mood();
        for _ in 0..200_000 {
            engine.tick(1.0, true, &mut rng);
        }
        assert_eq!(engine.current_mood(), mood);
    }

    #[test]
    fn fastest_rate_mutates_within_min_interval() {
        // at rate 1.0 a transition draw happens after exactly MIN_MUTATION_INTERVAL samples;
        // self-transitions are possible, so check across several seeds
        let mut changed = false;
        for seed in 0..16 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut engine = MoodEngine::new(RandomizationMode::Moderate, &mut rng);
            let mood = engine.current_mood();
            for _ in 0..MIN_MUTATION_INTERVAL {
                engine.tick(1.0, false, &mut rng);
            }
            if engine.current_mood() != mood {
                changed = true;
                break;
            }
        }
        assert!(changed);
    }

    #[test]
    fn slowest_rate_holds_longer() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut engine = MoodEngine::new(RandomizationMode::Moderate, &mut rng);
        let mood = engine.current_mood();
        // no mutation check can happen before the minimum interval of the slowest rate
        for _ in 0..(MIN_MUTATION_INTERVAL + 45_000) {
            engine.tick(0.0, false, &mut rng);
        }
        assert_eq!(engine.current_mood(), mood);
    }

    #[test]
    fn regenerate_swaps_presets() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut engine = MoodEngine::new(RandomizationMode::Gentle, &mut rng);
        let gentle_preset = *engine.current_preset();
        engine.regenerate(RandomizationMode::Industrial, &mut rng);
        assert_ne!(*engine.current_preset(), gentle_preset);
        assert_eq!(
            *engine.current_preset(),
            mood_presets(RandomizationMode::Industrial)[engine.current_mood()]
        );
    }
}
