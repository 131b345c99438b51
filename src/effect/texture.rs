use four_cc::FourCC;
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    effect::{Effect, RenderTime},
    engine::{
        grain::MAX_GRAIN_FRAMES, mood::RandomizationMode, EngineControls, TextureEngine,
        SAMPLE_RATE,
    },
    parameter::{
        BooleanParameter, BooleanParameterValue, EnumParameter, EnumParameterValue,
        FloatParameter, FloatParameterValue, IntegerParameter, IntegerParameterValue,
        ParameterValueUpdate,
    },
    ClonableParameter, Error,
};

// -------------------------------------------------------------------------------------------------

/// A self-evolving granular texture effect.
///
/// Continuously records the incoming stereo signal into a rolling capture ring and replays it
/// as a cloud of short, independently randomized grains. A probabilistic mood drift reshapes
/// the randomization ranges over time, so the texture mutates on its own without any input
/// automation. Freezing holds both the mood and the captured material, which lets the texture
/// sustain itself from the feedback path.
///
/// The effect is hard-wired to a 48 kHz stereo in/out host setup; `initialize` rejects
/// everything else.
pub struct GranularTextureEffect {
    channel_count: usize,
    sample_rate: u32,
    seed: u64,
    engine: Option<TextureEngine>,

    // Parameters
    density: FloatParameterValue,
    chaos: FloatParameterValue,
    mutation_rate: FloatParameterValue,
    grain_size: FloatParameterValue,
    pitch_range: FloatParameterValue,
    feedback: FloatParameterValue,
    mix: FloatParameterValue,
    mode: EnumParameterValue<RandomizationMode>,
    pattern: IntegerParameterValue,
    freeze: BooleanParameterValue,
}

impl GranularTextureEffect {
    pub const EFFECT_NAME: &'static str = "GranularTextureEffect";

    pub const DENSITY_ID: FourCC = FourCC(*b"dens");
    pub const CHAOS_ID: FourCC = FourCC(*b"chao");
    pub const MUTATION_RATE_ID: FourCC = FourCC(*b"mutr");
    pub const GRAIN_SIZE_ID: FourCC = FourCC(*b"gsiz");
    pub const PITCH_RANGE_ID: FourCC = FourCC(*b"ptch");
    pub const FEEDBACK_ID: FourCC = FourCC(*b"fdbk");
    pub const MIX_ID: FourCC = FourCC(*b"mixx");
    pub const MODE_ID: FourCC = FourCC(*b"mode");
    pub const PATTERN_ID: FourCC = FourCC(*b"patt");
    pub const FREEZE_ID: FourCC = FourCC(*b"frze");

    /// All parameter ids in canonical order. Hosts which address parameters with plain
    /// indices 0..=9 map an index to the id at the same position in this list.
    pub const PARAMETER_IDS: [FourCC; 10] = [
        Self::DENSITY_ID,
        Self::CHAOS_ID,
        Self::MUTATION_RATE_ID,
        Self::GRAIN_SIZE_ID,
        Self::PITCH_RANGE_ID,
        Self::FEEDBACK_ID,
        Self::MIX_ID,
        Self::MODE_ID,
        Self::PATTERN_ID,
        Self::FREEZE_ID,
    ];

    /// Creates a new `GranularTextureEffect` with default parameter values and a random seed.
    pub fn new() -> Self {
        Self::with_seed(SmallRng::from_os_rng().random())
    }

    /// Creates a new `GranularTextureEffect` with the given RNG seed, so tests can reproduce
    /// exact grain sequences.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            channel_count: 0,
            sample_rate: 0,
            seed,
            engine: None,
            density: FloatParameterValue::from_description(FloatParameter::new(
                Self::DENSITY_ID,
                "Density",
                0.0..=1.0,
                0.4,
            )),
            // declared but not wired into the DSP
            chaos: FloatParameterValue::from_description(FloatParameter::new(
                Self::CHAOS_ID,
                "Chaos",
                0.0..=1.0,
                0.5,
            )),
            mutation_rate: FloatParameterValue::from_description(FloatParameter::new(
                Self::MUTATION_RATE_ID,
                "Mutation Rate",
                0.0..=1.0,
                0.5,
            )),
            grain_size: FloatParameterValue::from_description(
                FloatParameter::new(
                    Self::GRAIN_SIZE_ID,
                    "Grain Size",
                    0.25..=4.0,
                    1.0, //
                )
                .with_unit("x"),
            ),
            pitch_range: FloatParameterValue::from_description(
                FloatParameter::new(
                    Self::PITCH_RANGE_ID,
                    "Pitch Range",
                    0.0..=2.0,
                    1.0, //
                )
                .with_unit("x"),
            ),
            feedback: FloatParameterValue::from_description(FloatParameter::new(
                Self::FEEDBACK_ID,
                "Feedback",
                0.0..=0.95,
                0.0,
            )),
            mix: FloatParameterValue::from_description(FloatParameter::new(
                Self::MIX_ID,
                "Mix",
                0.0..=1.0,
                0.5,
            )),
            mode: EnumParameterValue::from_description(EnumParameter::new(
                Self::MODE_ID,
                "Mode",
                RandomizationMode::Gentle,
            )),
            pattern: IntegerParameterValue::from_description(
                IntegerParameter::new(
                    Self::PATTERN_ID,
                    "Pattern",
                    0..=7,
                    0, //
                )
                .with_display(
                    |value| format!("PTRN {}", value + 1),
                    |string| {
                        string
                            .trim()
                            .trim_start_matches("PTRN")
                            .trim()
                            .parse::<i32>()
                            .ok()
                            .map(|value| value - 1)
                    },
                ),
            ),
            freeze: BooleanParameterValue::from_description(
                BooleanParameter::new(
                    Self::FREEZE_ID,
                    "Freeze",
                    false, //
                )
                .with_display(
                    |value| if value { "FREEZE" } else { "EVOLVE" }.to_string(),
                    |string| match string.trim().to_ascii_uppercase().as_str() {
                        "FREEZE" => Some(true),
                        "EVOLVE" => Some(false),
                        _ => None,
                    },
                ),
            ),
        }
    }

    /// Get the current value of a parameter, expressed as normalized value in range \[0, 1\].
    pub fn parameter_value(&self, id: FourCC) -> Result<f32, Error> {
        match id {
            Self::DENSITY_ID => Ok(self
                .density
                .description()
                .normalize_value(self.density.value())),
            Self::CHAOS_ID => Ok(self.chaos.description().normalize_value(self.chaos.value())),
            Self::MUTATION_RATE_ID => Ok(self
                .mutation_rate
                .description()
                .normalize_value(self.mutation_rate.value())),
            Self::GRAIN_SIZE_ID => Ok(self
                .grain_size
                .description()
                .normalize_value(self.grain_size.value())),
            Self::PITCH_RANGE_ID => Ok(self
                .pitch_range
                .description()
                .normalize_value(self.pitch_range.value())),
            Self::FEEDBACK_ID => Ok(self
                .feedback
                .description()
                .normalize_value(self.feedback.value())),
            Self::MIX_ID => Ok(self.mix.description().normalize_value(self.mix.value())),
            Self::MODE_ID => Ok(self
                .mode
                .description()
                .normalize_value(&self.mode.value().to_string())),
            Self::PATTERN_ID => Ok(self
                .pattern
                .description()
                .normalize_value(self.pattern.value())),
            Self::FREEZE_ID => Ok(self
                .freeze
                .description()
                .normalize_value(self.freeze.value())),
            _ => Err(Error::ParameterError(format!(
                "Unknown parameter: '{id}' for effect '{}'",
                self.name()
            ))),
        }
    }

    /// Get the current value of a parameter as short display string.
    pub fn parameter_string(&self, id: FourCC) -> Result<String, Error> {
        let normalized = self.parameter_value(id)?;
        let parameter = self
            .parameters()
            .into_iter()
            .find(|parameter| parameter.id() == id)
            .expect("Id got validated with the value lookup");
        Ok(parameter.normalized_value_to_string(normalized, true))
    }

    /// Deactivate all grains and clear the capture ring. Re-seeds nothing.
    pub fn reset(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.reset();
        }
    }

    /// The engine controls matching the current parameter values.
    fn engine_controls(&self) -> EngineControls {
        EngineControls {
            density: self.density.value(),
            chaos: self.chaos.value(),
            mutation_rate: self.mutation_rate.value(),
            grain_size: self.grain_size.value(),
            pitch_range: self.pitch_range.value(),
            feedback: self.feedback.value(),
            mix: self.mix.value(),
            freeze: self.freeze.value(),
            pattern: self.pattern.value() as usize,
        }
    }

    /// Render an interleaved stereo buffer in-place.
    fn render(engine: &mut TextureEngine, output: &mut [f32]) {
        for frame in output.chunks_exact_mut(2) {
            let (left, right) = engine.process_sample(frame[0], frame[1]);
            frame[0] = left;
            frame[1] = right;
        }
    }
}

impl Default for GranularTextureEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for GranularTextureEffect {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&dyn ClonableParameter> {
        vec![
            self.density.description(),
            self.chaos.description(),
            self.mutation_rate.description(),
            self.grain_size.description(),
            self.pitch_range.description(),
            self.feedback.description(),
            self.mix.description(),
            self.mode.description(),
            self.pattern.description(),
            self.freeze.description(),
        ]
    }

    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        _max_frames: usize,
    ) -> Result<(), Error> {
        if sample_rate != SAMPLE_RATE {
            return Err(Error::UnsupportedSampleRate(sample_rate));
        }
        if channel_count != 2 {
            return Err(Error::UnsupportedChannelLayout(channel_count));
        }
        self.sample_rate = sample_rate;
        self.channel_count = channel_count;

        // one-shot allocation of the capture ring and grain pool
        let mut engine = TextureEngine::new(self.seed);
        *engine.controls_mut() = self.engine_controls();
        engine.set_mode(self.mode.value());
        self.engine = Some(engine);

        Ok(())
    }

    fn process_started(&mut self) {
        self.reset();
    }

    fn process(&mut self, output: &mut [f32], _time: &RenderTime) {
        let Some(engine) = self.engine.as_mut() else {
            debug_assert!(false, "Effect is not initialized");
            return;
        };
        #[cfg(feature = "assert-allocs")]
        assert_no_alloc::assert_no_alloc(|| Self::render(engine, output));
        #[cfg(not(feature = "assert-allocs"))]
        Self::render(engine, output);
    }

    fn process_tail(&self) -> Option<usize> {
        if self.freeze.value() || self.feedback.value() > 0.0 {
            // a frozen or feeding-back texture sustains itself indefinitely
            Some(usize::MAX)
        } else {
            Some(MAX_GRAIN_FRAMES)
        }
    }

    fn process_parameter_update(
        &mut self,
        id: FourCC,
        value: &ParameterValueUpdate,
    ) -> Result<(), Error> {
        match id {
            Self::DENSITY_ID => self.density.apply_update(value),
            Self::CHAOS_ID => self.chaos.apply_update(value),
            Self::MUTATION_RATE_ID => self.mutation_rate.apply_update(value),
            Self::GRAIN_SIZE_ID => self.grain_size.apply_update(value),
            Self::PITCH_RANGE_ID => self.pitch_range.apply_update(value),
            Self::FEEDBACK_ID => self.feedback.apply_update(value),
            Self::MIX_ID => self.mix.apply_update(value),
            Self::MODE_ID => self.mode.apply_update(value),
            Self::PATTERN_ID => self.pattern.apply_update(value),
            Self::FREEZE_ID => self.freeze.apply_update(value),
            _ => {
                return Err(Error::ParameterError(format!(
                    "Unknown parameter: '{id}' for effect '{}'",
                    self.name()
                )))
            }
        };

        let mode = self.mode.value();
        let controls = self.engine_controls();
        if let Some(engine) = self.engine.as_mut() {
            *engine.controls_mut() = controls;
            if engine.mode() != mode {
                engine.set_mode(mode);
            }
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK_FRAMES: usize = 512;

    fn initialized_effect(seed: u64) -> GranularTextureEffect {
        let mut effect = GranularTextureEffect::with_seed(seed);
        effect
            .initialize(SAMPLE_RATE, 2, BLOCK_FRAMES)
            .expect("Failed to initialize effect");
        effect
    }

    fn set_raw(effect: &mut GranularTextureEffect, id: FourCC, value: f32) {
        effect
            .process_parameter_update(id, &ParameterValueUpdate::Raw(Box::new(value)))
            .expect("Failed to set parameter");
    }

    #[test]
    fn initialization_contract() {
        let mut effect = GranularTextureEffect::with_seed(1);
        assert!(matches!(
            effect.initialize(44_100, 2, BLOCK_FRAMES),
            Err(Error::UnsupportedSampleRate(44_100))
        ));
        assert!(matches!(
            effect.initialize(SAMPLE_RATE, 1, BLOCK_FRAMES),
            Err(Error::UnsupportedChannelLayout(1))
        ));
        assert!(effect.initialize(SAMPLE_RATE, 2, BLOCK_FRAMES).is_ok());
    }

    #[test]
    fn parameter_set() {
        let effect = GranularTextureEffect::with_seed(2);
        let parameters = effect.parameters();
        assert_eq!(parameters.len(), GranularTextureEffect::PARAMETER_IDS.len());
        for (descriptor, id) in parameters
            .iter()
            .zip(GranularTextureEffect::PARAMETER_IDS)
        {
            assert_eq!(descriptor.id(), id);
        }

        // randomization mode labels
        let mode = parameters[7];
        assert_eq!(mode.normalized_value_to_string(0.0, false), "GENTLE");
        assert_eq!(mode.normalized_value_to_string(1.0, false), "INDUSTR");
        assert_eq!(mode.string_to_normalized_value("WILD"), Some(2.0 / 7.0));

        // pattern labels
        let pattern = parameters[8];
        assert_eq!(pattern.normalized_value_to_string(0.0, false), "PTRN 1");
        assert_eq!(pattern.normalized_value_to_string(1.0, false), "PTRN 8");

        // freeze labels
        let freeze = parameters[9];
        assert_eq!(freeze.normalized_value_to_string(0.0, false), "EVOLVE");
        assert_eq!(freeze.normalized_value_to_string(1.0, false), "FREEZE");
    }

    #[test]
    fn parameter_value_lookup() {
        let mut effect = initialized_effect(12);
        set_raw(&mut effect, GranularTextureEffect::DENSITY_ID, 0.75);
        assert_eq!(
            effect
                .parameter_value(GranularTextureEffect::DENSITY_ID)
                .unwrap(),
            0.75
        );
        assert_eq!(
            effect
                .parameter_string(GranularTextureEffect::DENSITY_ID)
                .unwrap(),
            "0.75"
        );
        assert_eq!(
            effect
                .parameter_string(GranularTextureEffect::MODE_ID)
                .unwrap(),
            "GENTLE"
        );
        assert_eq!(
            effect
                .parameter_string(GranularTextureEffect::FREEZE_ID)
                .unwrap(),
            "EVOLVE"
        );
        assert!(effect.parameter_value(FourCC(*b"wtf?")).is_err());
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let mut effect = initialized_effect(3);
        let result = effect
            .process_parameter_update(FourCC(*b"wtf?"), &ParameterValueUpdate::Normalized(0.5));
        assert!(matches!(result, Err(Error::ParameterError(_))));
    }

    #[test]
    fn output_stays_in_range() {
        let mut effect = initialized_effect(4);
        set_raw(&mut effect, GranularTextureEffect::DENSITY_ID, 1.0);
        set_raw(&mut effect, GranularTextureEffect::FEEDBACK_ID, 0.95);
        set_raw(&mut effect, GranularTextureEffect::MIX_ID, 1.0);
        effect
            .process_parameter_update(
                GranularTextureEffect::MODE_ID,
                &ParameterValueUpdate::Raw(Box::new(RandomizationMode::Industrial)),
            )
            .unwrap();

        let mut rng = SmallRng::seed_from_u64(5);
        let mut buffer = vec![0.0; BLOCK_FRAMES * 2];
        let time = RenderTime::default();
        for _ in 0..200 {
            for sample in buffer.iter_mut() {
                *sample = rng.random_range(-1.0..=1.0);
            }
            effect.process(&mut buffer, &time);
            for sample in buffer.iter() {
                assert!((-1.0..=1.0).contains(sample), "Out of range: {sample}");
            }
        }
    }

    #[test]
    fn zero_density_passes_attenuated_dry_signal() {
        let mut effect = initialized_effect(6);
        set_raw(&mut effect, GranularTextureEffect::DENSITY_ID, 0.0);
        set_raw(&mut effect, GranularTextureEffect::MIX_ID, 0.3);

        let mut rng = SmallRng::seed_from_u64(7);
        let mut buffer = vec![0.0; BLOCK_FRAMES * 2];
        let time = RenderTime::default();
        for _ in 0..100 {
            for sample in buffer.iter_mut() {
                *sample = rng.random_range(-1.0..=1.0);
            }
            let input = buffer.clone();
            effect.process(&mut buffer, &time);
            // the wet path is silent: the output is exactly the attenuated dry signal
            for (output, dry) in buffer.iter().zip(input) {
                assert_eq!(*output, dry * (1.0 - 0.3_f32));
            }
        }
    }

    #[test]
    fn frozen_texture_self_sustains() {
        let mut effect = initialized_effect(8);
        set_raw(&mut effect, GranularTextureEffect::DENSITY_ID, 1.0);
        set_raw(&mut effect, GranularTextureEffect::FEEDBACK_ID, 0.95);
        set_raw(&mut effect, GranularTextureEffect::MIX_ID, 1.0);
        set_raw(&mut effect, GranularTextureEffect::GRAIN_SIZE_ID, 4.0);

        let time = RenderTime::default();

        // capture silence, then a single unit impulse
        let mut buffer = vec![0.0; BLOCK_FRAMES * 2];
        for _ in 0..78 {
            buffer.fill(0.0);
            effect.process(&mut buffer, &time);
        }
        buffer.fill(0.0);
        buffer[0] = 1.0;
        buffer[1] = 1.0;
        effect.process(&mut buffer, &time);

        // hold the captured material and keep feeding silence
        effect
            .process_parameter_update(
                GranularTextureEffect::FREEZE_ID,
                &ParameterValueUpdate::Raw(Box::new(true)),
            )
            .unwrap();

        let mut total_energy = 0.0_f64;
        let mut late_energy = 0.0_f64;
        let frozen_blocks = 10_000 / BLOCK_FRAMES + 1;
        for block in 0..frozen_blocks {
            buffer.fill(0.0);
            effect.process(&mut buffer, &time);
            let block_energy: f64 = buffer.iter().map(|&s| (s as f64) * (s as f64)).sum();
            total_energy += block_energy;
            if block >= frozen_blocks / 2 {
                late_energy += block_energy;
            }
        }
        // the wet path still carries grain playback of the held material
        assert!(total_energy > 0.0);
        assert!(late_energy > 0.0);
    }

    #[test]
    fn process_keeps_running_across_resets() {
        let mut effect = initialized_effect(9);
        set_raw(&mut effect, GranularTextureEffect::DENSITY_ID, 1.0);

        let mut rng = SmallRng::seed_from_u64(10);
        let mut buffer = vec![0.0; BLOCK_FRAMES * 2];
        let time = RenderTime::default();
        for round in 0..20 {
            for sample in buffer.iter_mut() {
                *sample = rng.random_range(-1.0..=1.0);
            }
            effect.process(&mut buffer, &time);
            if round % 5 == 4 {
                effect.process_started();
            }
        }
    }

    #[test]
    fn tail_reflects_sustain_settings() {
        let mut effect = initialized_effect(11);
        assert_eq!(effect.process_tail(), Some(MAX_GRAIN_FRAMES));
        set_raw(&mut effect, GranularTextureEffect::FEEDBACK_ID, 0.5);
        assert_eq!(effect.process_tail(), Some(usize::MAX));
        set_raw(&mut effect, GranularTextureEffect::FEEDBACK_ID, 0.0);
        effect
            .process_parameter_update(
                GranularTextureEffect::FREEZE_ID,
                &ParameterValueUpdate::Normalized(1.0),
            )
            .unwrap();
        assert_eq!(effect.process_tail(), Some(usize::MAX));
    }
}
