use rand::{rngs::SmallRng, SeedableRng};

use crate::utils::dsp::hard_limit;

// -------------------------------------------------------------------------------------------------

pub mod capture;
pub mod grain;
pub mod mood;

use capture::CaptureBuffer;
use grain::{GrainPool, MAX_GRAINS};
use mood::{MoodEngine, RandomizationMode};

// -------------------------------------------------------------------------------------------------

/// The only sample rate the engine's interval and range constants are calibrated for.
pub const SAMPLE_RATE: u32 = 48_000;

/// Wet sum normalization weight per active grain.
const GRAIN_NORMALIZATION: f32 = 0.15;

/// Stability margin the normalized wet sum gets limited to before feedback and mixing.
const WET_LIMIT: f32 = 0.8;

// -------------------------------------------------------------------------------------------------

/// User-facing engine controls.
///
/// All values are expected in their parameter ranges; the engine additionally clamps where a
/// runaway value could destabilize the render path.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineControls {
    /// How busy the texture is (0..1). Shapes both the trigger rate limiter and the spawn
    /// probability gate.
    pub density: f32,
    /// Reserved chaos amount (0..1). Declared but not wired into behavior.
    pub chaos: f32,
    /// How fast the mood drifts (0..1). 1.0 checks for a mutation every ~50 ms, 0.0 every ~1 s.
    pub mutation_rate: f32,
    /// Grain length scale factor applied to the mood's length range.
    pub grain_size: f32,
    /// Scale factor applied to the mood's pitch range in semitones.
    pub pitch_range: f32,
    /// Amount of dry input added into the wet path.
    pub feedback: f32,
    /// Dry/wet output mix (0 = dry only, 1 = wet only).
    pub mix: f32,
    /// Halts mood mutation and capture recording; the held material keeps feeding grains.
    pub freeze: bool,
    /// Reserved pattern selector (0..7). Accepted but unused by the algorithm.
    pub pattern: usize,
}

impl Default for EngineControls {
    fn default() -> Self {
        Self {
            density: 0.4,
            chaos: 0.5,
            mutation_rate: 0.5,
            grain_size: 1.0,
            pitch_range: 1.0,
            feedback: 0.0,
            mix: 0.5,
            freeze: false,
            pattern: 0,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// The complete granular texture engine: capture ring, grain pool, mood drift and the
/// mixer/feedback stage, advanced sample by sample.
///
/// All state lives in the engine instance - there are no globals, so multiple independent
/// instances can coexist and tests can drive a seeded engine deterministically. The engine
/// allocates its capture ring once at construction time; [`TextureEngine::process_sample`]
/// never allocates, blocks or panics.
pub struct TextureEngine {
    controls: EngineControls,
    capture: CaptureBuffer,
    grains: GrainPool<MAX_GRAINS>,
    moods: MoodEngine,
    rng: SmallRng,
    base_seed: u64,
    mode: RandomizationMode,
}

impl TextureEngine {
    /// Create a new engine with the given RNG seed and the default randomization mode.
    ///
    /// This performs the engine's only allocations and must not be called from the render
    /// path.
    pub fn new(seed: u64) -> Self {
        let mode = RandomizationMode::default();
        let mut rng = SmallRng::seed_from_u64(seed ^ mode as u64);
        let moods = MoodEngine::new(mode, &mut rng);
        Self {
            controls: EngineControls::default(),
            capture: CaptureBuffer::new(),
            grains: GrainPool::new(),
            moods,
            rng,
            base_seed: seed,
            mode,
        }
    }

    /// Access the engine controls.
    pub fn controls(&self) -> &EngineControls {
        &self.controls
    }
    pub fn controls_mut(&mut self) -> &mut EngineControls {
        &mut self.controls
    }

    /// The active randomization mode.
    pub fn mode(&self) -> RandomizationMode {
        self.mode
    }

    /// Switch the randomization mode: regenerates all mood presets and the transition matrix
    /// and reseeds the RNG. Grains that are already playing keep their sampled parameters.
    pub fn set_mode(&mut self, mode: RandomizationMode) {
        self.mode = mode;
        self.rng = SmallRng::seed_from_u64(self.base_seed ^ mode as u64);
        self.moods.regenerate(mode, &mut self.rng);
    }

    /// Access the mood engine (e.g. to query the current mood).
    pub fn moods(&self) -> &MoodEngine {
        &self.moods
    }

    /// Number of currently playing grains.
    pub fn active_grain_count(&self) -> usize {
        self.grains.active_count()
    }

    /// Deactivate every grain and clear all buffers and counters. Re-seeds nothing.
    pub fn reset(&mut self) {
        self.capture.clear();
        self.grains.reset();
        self.moods.reset();
    }

    /// Render one stereo sample: records the input, advances mood and trigger clocks, renders
    /// all active grains and applies the mixer/feedback stage.
    ///
    /// The output is hard-clipped to `[-1, 1]`.
    #[inline]
    pub fn process_sample(&mut self, dry_left: f32, dry_right: f32) -> (f32, f32) {
        // record live input; a frozen engine holds its captured material instead
        if !self.controls.freeze {
            self.capture.write(dry_left, dry_right);
        }

        // mood drift
        self.moods
            .tick(self.controls.mutation_rate, self.controls.freeze, &mut self.rng);

        // spawn check
        let mood = *self.moods.current_preset();
        self.grains.tick_trigger(
            self.controls.density,
            self.controls.grain_size,
            self.controls.pitch_range,
            &mood,
            SAMPLE_RATE,
            self.capture.len(),
            &mut self.rng,
        );

        // render all active grains
        let active_count = self.grains.active_count();
        let (wet_left, wet_right) = self.grains.process(&self.capture);

        // normalize for grain count and keep a stability margin
        let normalization = 1.0 / (1.0 + active_count as f32 * GRAIN_NORMALIZATION);
        let mut wet_left = hard_limit(wet_left * normalization, WET_LIMIT);
        let mut wet_right = hard_limit(wet_right * normalization, WET_LIMIT);

        // feedback from the dry input keeps a frozen texture self-sustaining
        let feedback = self.controls.feedback;
        wet_left += dry_left * feedback;
        wet_right += dry_right * feedback;

        let mix = self.controls.mix.clamp(0.0, 1.0);
        let out_left = hard_limit(dry_left * (1.0 - mix) + wet_left * mix, 1.0);
        let out_right = hard_limit(dry_right * (1.0 - mix) + wet_right * mix, 1.0);
        (out_left, out_right)
    }
}

// -------------------------------------------------------------------------------------------------
