use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{MorphError, MorphResult};
use crate::panel::PANEL_COUNT;

pub const DEFAULT_BASE_FREQUENCY: f64 = 440.0;
const CENTS_PER_OCTAVE: f64 = 1200.0;

/// Hue ramp a TET system paints its divisions with.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub hue_start: f32,
    pub hue_span: f32,
    pub saturation: f32,
}

impl ColorScheme {
    /// Hue in degrees for `division` out of `tet_size`.
    pub fn hue_for(&self, division: u64, tet_size: u64) -> f32 {
        let position = division as f32 / tet_size.max(1) as f32;
        (self.hue_start + position * self.hue_span).rem_euclid(360.0)
    }
}

/// Named equal-temperament ladder: `base_divisions * 2^level` steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TetSystem {
    pub name: String,
    pub base_code: String,
    pub base_divisions: u32,
    pub max_levels: u32,
    pub color_scheme: ColorScheme,
}

impl TetSystem {
    pub fn new(
        name: &str,
        base_code: &str,
        base_divisions: u32,
        max_levels: u32,
        color_scheme: ColorScheme,
    ) -> Self {
        let base_divisions = base_divisions.max(1);
        let deepest = deepest_level(base_divisions);
        if max_levels > deepest {
            warn!(system = name, max_levels, deepest, "TET system depth clamped");
        }
        Self {
            name: name.to_string(),
            base_code: base_code.to_string(),
            base_divisions,
            max_levels: max_levels.min(deepest),
            color_scheme,
        }
    }

    /// Steps per octave at `level`. `level` is clamped to `max_levels` and
    /// to the deepest level whose step count still fits in a `u64`.
    pub fn tet_size(&self, level: u32) -> u64 {
        let base_divisions = self.base_divisions.max(1);
        let level = level
            .min(self.max_levels)
            .min(deepest_level(base_divisions));
        (base_divisions as u64) << level
    }
}

fn deepest_level(base_divisions: u32) -> u32 {
    (base_divisions as u64).leading_zeros()
}

/// The registered TET systems, looked up by name.
#[derive(Clone, Debug)]
pub struct TetRegistry {
    systems: Vec<TetSystem>,
}

impl Default for TetRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl TetRegistry {
    /// The four stock systems. Each tops out at 192 steps per octave.
    pub fn standard() -> Self {
        let systems = vec![
            TetSystem::new(
                "6-PANEL",
                "PNL",
                6,
                5,
                ColorScheme {
                    hue_start: 0.0,
                    hue_span: 300.0,
                    saturation: 0.8,
                },
            ),
            TetSystem::new(
                "12-TONE",
                "CHR",
                12,
                4,
                ColorScheme {
                    hue_start: 0.0,
                    hue_span: 330.0,
                    saturation: 0.9,
                },
            ),
            TetSystem::new(
                "24-TET",
                "QTR",
                24,
                3,
                ColorScheme {
                    hue_start: 180.0,
                    hue_span: 345.0,
                    saturation: 0.7,
                },
            ),
            TetSystem::new(
                "HYPERMICRO",
                "HYP",
                48,
                2,
                ColorScheme {
                    hue_start: 270.0,
                    hue_span: 352.5,
                    saturation: 1.0,
                },
            ),
        ];
        Self { systems }
    }

    pub fn get(&self, name: &str) -> MorphResult<&TetSystem> {
        self.systems
            .iter()
            .find(|system| system.name == name)
            .ok_or_else(|| MorphError::UnknownSystem(name.to_string()))
    }

    /// Adds or replaces a system with the same name.
    pub fn register(&mut self, system: TetSystem) {
        match self.systems.iter_mut().find(|s| s.name == system.name) {
            Some(slot) => *slot = system,
            None => self.systems.push(system),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.systems.iter().map(|system| system.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TetSystem> {
        self.systems.iter()
    }
}

/// Frequency derived for one panel at one subdivision level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrequencyData {
    pub frequency: f64,
    pub cents: f64,
    pub tet_division: u64,
    pub tet_size: u64,
    pub harmonic_ratio: f64,
    pub classification_code: String,
    pub discrete_level: u32,
    pub fractional_level: f64,
}

/// A just-intonation interval as a small-integer ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JustInterval {
    pub name: &'static str,
    pub numerator: u32,
    pub denominator: u32,
}

impl JustInterval {
    pub fn ratio(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    pub fn cents(&self) -> f64 {
        CENTS_PER_OCTAVE * self.ratio().log2()
    }
}

const JUST_INTONATION: [JustInterval; 13] = [
    JustInterval {
        name: "unison",
        numerator: 1,
        denominator: 1,
    },
    JustInterval {
        name: "minor second",
        numerator: 16,
        denominator: 15,
    },
    JustInterval {
        name: "major second",
        numerator: 9,
        denominator: 8,
    },
    JustInterval {
        name: "minor third",
        numerator: 6,
        denominator: 5,
    },
    JustInterval {
        name: "major third",
        numerator: 5,
        denominator: 4,
    },
    JustInterval {
        name: "perfect fourth",
        numerator: 4,
        denominator: 3,
    },
    JustInterval {
        name: "tritone",
        numerator: 45,
        denominator: 32,
    },
    JustInterval {
        name: "perfect fifth",
        numerator: 3,
        denominator: 2,
    },
    JustInterval {
        name: "minor sixth",
        numerator: 8,
        denominator: 5,
    },
    JustInterval {
        name: "major sixth",
        numerator: 5,
        denominator: 3,
    },
    JustInterval {
        name: "minor seventh",
        numerator: 9,
        denominator: 5,
    },
    JustInterval {
        name: "major seventh",
        numerator: 15,
        denominator: 8,
    },
    JustInterval {
        name: "octave",
        numerator: 2,
        denominator: 1,
    },
];

/// Equal-temperament math against a retunable base frequency.
///
/// Nothing is cached: every call recomputes from `base_frequency`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MicrotonalFrequencyCalculator {
    base_frequency: f64,
}

impl Default for MicrotonalFrequencyCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_FREQUENCY)
    }
}

impl MicrotonalFrequencyCalculator {
    pub fn new(base_frequency: f64) -> Self {
        let mut calculator = Self {
            base_frequency: DEFAULT_BASE_FREQUENCY,
        };
        calculator.set_base_frequency(base_frequency);
        calculator
    }

    pub fn base_frequency(&self) -> f64 {
        self.base_frequency
    }

    /// Non-positive or non-finite values keep the previous tuning.
    pub fn set_base_frequency(&mut self, base_frequency: f64) {
        if base_frequency.is_finite() && base_frequency > 0.0 {
            self.base_frequency = base_frequency;
        } else {
            warn!(base_frequency, "ignoring invalid base frequency");
        }
    }

    /// Looks the system up by name. An unknown name is a wiring bug and
    /// is returned, not papered over with a default.
    pub fn get_frequency_data(
        &self,
        level: f64,
        registry: &TetRegistry,
        system: &str,
        panel_index: usize,
    ) -> MorphResult<FrequencyData> {
        let system = registry.get(system)?;
        Ok(self.frequency_data(level, system, panel_index))
    }

    pub fn frequency_data(&self, level: f64, system: &TetSystem, panel_index: usize) -> FrequencyData {
        let level = if level.is_finite() { level } else { 0.0 };
        let clamped = level.clamp(0.0, system.max_levels as f64);
        let discrete_level = clamped.floor() as u32;
        let fractional_level = clamped - discrete_level as f64;
        let tet_size = system.tet_size(discrete_level);

        if panel_index >= PANEL_COUNT {
            warn!(panel_index, "panel index clamped");
        }
        let panel_index = panel_index.min(PANEL_COUNT - 1);
        let top = tet_size - 1;
        let tet_division = if panel_index == PANEL_COUNT - 1 {
            top
        } else {
            let step = tet_size as f64 / PANEL_COUNT as f64;
            let raw = (panel_index as f64 * step + fractional_level * step).round();
            (raw.max(0.0) as u64).min(top)
        };

        let frequency = self.frequency_for_division(tet_division, tet_size);
        let harmonic_ratio = frequency / self.base_frequency;
        FrequencyData {
            frequency,
            cents: self.cents_from_frequency(frequency),
            tet_division,
            tet_size,
            harmonic_ratio,
            classification_code: format!(
                "{}{:02}",
                system.base_code,
                discrete_level as usize * 10 + panel_index
            ),
            discrete_level,
            fractional_level,
        }
    }

    /// `base * 2^(division / tet_size)`.
    pub fn frequency_for_division(&self, division: u64, tet_size: u64) -> f64 {
        self.base_frequency * 2f64.powf(division as f64 / tet_size.max(1) as f64)
    }

    pub fn cents_from_frequency(&self, frequency: f64) -> f64 {
        CENTS_PER_OCTAVE * (frequency / self.base_frequency).log2()
    }

    pub fn frequency_from_cents(&self, cents: f64) -> f64 {
        self.base_frequency * 2f64.powf(cents / CENTS_PER_OCTAVE)
    }

    /// `n`-th member of the harmonic series over the base.
    pub fn harmonic_frequency(&self, n: u32) -> f64 {
        self.base_frequency * n as f64
    }

    pub fn just_intonation_ratios() -> &'static [JustInterval] {
        &JUST_INTONATION
    }

    /// Closest just interval to `cents` (folded into one octave) and the
    /// signed deviation from it.
    pub fn nearest_just_interval(cents: f64) -> (JustInterval, f64) {
        let folded = cents.rem_euclid(CENTS_PER_OCTAVE);
        JUST_INTONATION
            .iter()
            .map(|interval| (*interval, folded - interval.cents()))
            .fold((JUST_INTONATION[0], f64::INFINITY), |best, candidate| {
                if candidate.1.abs() < best.1.abs() {
                    candidate
                } else {
                    best
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chromatic() -> TetSystem {
        TetSystem::new(
            "TEST",
            "TST",
            12,
            3,
            ColorScheme {
                hue_start: 0.0,
                hue_span: 360.0,
                saturation: 1.0,
            },
        )
    }

    #[test]
    fn level_zero_panel_zero_is_base() {
        let data = MicrotonalFrequencyCalculator::new(440.0).frequency_data(0.0, &chromatic(), 0);
        assert_eq!(data.tet_size, 12);
        assert_eq!(data.tet_division, 0);
        assert_eq!(data.frequency, 440.0);
        assert_eq!(data.cents, 0.0);
        assert_eq!(data.classification_code, "TST00");
    }

    #[test]
    fn level_one_panel_three_is_tritone() {
        let data = MicrotonalFrequencyCalculator::new(440.0).frequency_data(1.0, &chromatic(), 3);
        assert_eq!(data.tet_size, 24);
        assert_eq!(data.tet_division, 12);
        assert!((data.frequency - 622.253_967_444).abs() < 1e-6);
        assert_eq!(data.classification_code, "TST13");
    }

    #[test]
    fn fractional_level_shifts_division() {
        let data = MicrotonalFrequencyCalculator::new(440.0).frequency_data(0.5, &chromatic(), 1);
        // step 2, 1*2 + 0.5*2 = 3
        assert_eq!(data.tet_division, 3);
        assert_eq!(data.discrete_level, 0);
    }

    #[test]
    fn level_is_clamped_to_system() {
        let data = MicrotonalFrequencyCalculator::new(440.0).frequency_data(17.0, &chromatic(), 0);
        assert_eq!(data.tet_size, 96);
        assert_eq!(data.discrete_level, 3);
        let data = MicrotonalFrequencyCalculator::new(440.0).frequency_data(-2.0, &chromatic(), 0);
        assert_eq!(data.tet_size, 12);
    }

    #[test]
    fn unknown_system_is_an_error() {
        let result = MicrotonalFrequencyCalculator::default().get_frequency_data(
            0.0,
            &TetRegistry::standard(),
            "13-TONE",
            0,
        );
        assert!(matches!(result, Err(MorphError::UnknownSystem(name)) if name == "13-TONE"));
    }

    #[test]
    fn retuning_is_picked_up_immediately() {
        let mut calculator = MicrotonalFrequencyCalculator::new(440.0);
        let system = chromatic();
        let before = calculator.frequency_data(0.0, &system, 0).frequency;
        calculator.set_base_frequency(432.0);
        let after = calculator.frequency_data(0.0, &system, 0).frequency;
        assert_eq!(before, 440.0);
        assert_eq!(after, 432.0);
        calculator.set_base_frequency(-1.0);
        assert_eq!(calculator.base_frequency(), 432.0);
    }

    #[test]
    fn just_table_spans_an_octave() {
        let table = MicrotonalFrequencyCalculator::just_intonation_ratios();
        assert_eq!(table.first().map(JustInterval::ratio), Some(1.0));
        assert_eq!(table.last().map(JustInterval::ratio), Some(2.0));
        assert!(table.windows(2).all(|pair| pair[0].ratio() < pair[1].ratio()));
    }

    #[test]
    fn fifth_is_two_cents_flat_in_twelve_tet() {
        let (interval, deviation) = MicrotonalFrequencyCalculator::nearest_just_interval(700.0);
        assert_eq!(interval.name, "perfect fifth");
        assert!((deviation + 1.955).abs() < 1e-3);
    }

    #[test]
    fn deep_systems_are_capped_to_fit() {
        let system = TetSystem::new("DEEP", "DEP", 12, 64, chromatic().color_scheme);
        assert_eq!(system.max_levels, 60);
        let sizes: Vec<u64> = (0..=64).map(|level| system.tet_size(level)).collect();
        assert!(sizes[..=60].windows(2).all(|pair| pair[0] < pair[1]));
        assert!(sizes[60..].iter().all(|size| *size == 12 << 60));

        let calculator = MicrotonalFrequencyCalculator::new(440.0);
        let top = calculator.frequency_data(64.0, &system, 5);
        assert_eq!(top.discrete_level, 60);
        assert_eq!(top.tet_division, top.tet_size - 1);
        assert!(top.frequency.is_finite() && top.frequency <= 880.0);
    }

    #[test]
    fn hand_built_systems_cannot_overflow() {
        let system = TetSystem {
            base_divisions: 0,
            max_levels: 200,
            ..chromatic()
        };
        assert_eq!(system.tet_size(200), 1 << 63);
        let data = MicrotonalFrequencyCalculator::new(440.0).frequency_data(150.0, &system, 0);
        assert!(data.tet_division < data.tet_size);
    }

    #[test]
    fn hue_walks_the_scheme_span() {
        let scheme = ColorScheme {
            hue_start: 270.0,
            hue_span: 180.0,
            saturation: 1.0,
        };
        assert_eq!(scheme.hue_for(0, 12), 270.0);
        assert_eq!(scheme.hue_for(6, 12), 0.0);
        assert_eq!(scheme.hue_for(3, 0), 90.0);
    }

    #[test]
    fn harmonics_are_integer_multiples() {
        let calculator = MicrotonalFrequencyCalculator::new(110.0);
        assert_eq!(calculator.harmonic_frequency(3), 330.0);
    }
}
