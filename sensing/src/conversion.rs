// Raw ADC code to engineering unit conversion
// Current (shunt + amplifier), bus voltage (resistor divider),
// throttle voltage (direct) and NTC temperature (Beta equation)

use libm::logf;

use crate::calibration::CalibrationSet;
use crate::channel_map::{Phase, SensorChannel};
use crate::config::{ConversionConfig, ADC_FULL_SCALE};
use crate::sample::RawSampleSet;

/// Returned by the temperature conversion when the thermistor equation has no finite result
pub const TEMPERATURE_SENTINEL_C: f32 = -40.0;

/// Reference temperature of the thermistor R25 value [K]
const T25_KELVIN: f32 = 298.15;

const KELVIN_OFFSET: f32 = 273.15;

/// Lowest / highest code fed into the thermistor divider inversion
const TEMP_CODE_MIN: u16 = 1;
const TEMP_CODE_MAX: u16 = ADC_FULL_SCALE - 2;

/// Physical values derived from one raw sample set
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineeringReading {
    /// Phase currents [A] (A, B, C)
    pub current_a: [f32; 3],
    /// DC bus voltage [V]
    pub bus_v: f32,
    /// Throttle voltage [V]
    pub throttle_v: f32,
    /// Power stage temperature [°C]
    pub temperature_c: f32,
}

/// Unit conversion using the boot-time calibration
pub struct UnitConversion {
    config: ConversionConfig,
    calibration: CalibrationSet,
}

impl UnitConversion {
    pub fn new(config: &ConversionConfig, calibration: CalibrationSet) -> Self {
        Self {
            config: *config,
            calibration,
        }
    }

    #[inline(always)]
    fn fraction(raw: u16) -> f32 {
        raw as f32 / ADC_FULL_SCALE as f32
    }

    /// Phase current [A] for a raw code and a null offset
    ///
    /// `(raw - null) / 4096 * Vref / R_shunt / gain`
    pub fn current_a(&self, raw: u16, null_offset: u16) -> f32 {
        let delta = raw as i32 - null_offset as i32;
        let volts = delta as f32 / ADC_FULL_SCALE as f32 * self.calibration.vref;
        volts / (self.config.shunt_ohms * self.config.amp_gain)
    }

    /// Current of one phase using its calibrated null offset
    pub fn phase_current_a(&self, phase: Phase, raw: u16) -> f32 {
        self.current_a(raw, self.calibration.current_null[phase.index()])
    }

    /// DC bus voltage [V]
    pub fn bus_v(&self, raw: u16) -> f32 {
        Self::fraction(raw) * self.calibration.vref * self.config.divider_ratio()
    }

    /// Throttle voltage [V], no divider
    pub fn throttle_v(&self, raw: u16) -> f32 {
        Self::fraction(raw) * self.calibration.vref
    }

    /// Thermistor temperature [°C]
    ///
    /// The divider gives `R = R_fixed / (raw / 4096) - R_fixed`, then
    /// `1/T = 1/298.15 + ln(R / R25) / B`.
    /// Codes are clamped to `[1, 4094]` so `R` stays finite and positive.
    pub fn temperature_c(&self, raw: u16) -> f32 {
        let raw = raw.clamp(TEMP_CODE_MIN, TEMP_CODE_MAX);
        let fixed = self.config.temp_fixed_ohms;
        let resistance = fixed / Self::fraction(raw) - fixed;
        if resistance <= 0.0 || !resistance.is_finite() {
            return TEMPERATURE_SENTINEL_C;
        }

        let inv_t = 1.0 / T25_KELVIN
            + logf(resistance / self.config.thermistor_r25) / self.config.thermistor_beta;
        let celsius = 1.0 / inv_t - KELVIN_OFFSET;
        if celsius.is_finite() {
            celsius
        } else {
            TEMPERATURE_SENTINEL_C
        }
    }

    /// Regenerate every physical value from a sample set
    pub fn reading(&self, sample: &RawSampleSet) -> EngineeringReading {
        EngineeringReading {
            current_a: [
                self.phase_current_a(Phase::A, sample.get(SensorChannel::Ia)),
                self.phase_current_a(Phase::B, sample.get(SensorChannel::Ib)),
                self.phase_current_a(Phase::C, sample.get(SensorChannel::Ic)),
            ],
            bus_v: self.bus_v(sample.get(SensorChannel::Vbus)),
            throttle_v: self.throttle_v(sample.get(SensorChannel::Throttle1)),
            temperature_c: self.temperature_c(sample.get(SensorChannel::Temperature)),
        }
    }

    pub fn vref(&self) -> f32 {
        self.calibration.vref
    }

    pub fn calibration(&self) -> &CalibrationSet {
        &self.calibration
    }

    /// Diagnostic override of one null offset
    pub fn set_current_null(&mut self, phase: Phase, raw_offset: u16) {
        self.calibration.current_null[phase.index()] = raw_offset;
    }

    /// Install a complete calibration result
    pub fn replace_calibration(&mut self, calibration: CalibrationSet) {
        self.calibration = calibration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversion() -> UnitConversion {
        UnitConversion::new(&ConversionConfig::default(), CalibrationSet::nominal())
    }

    #[test]
    fn test_current_zero_at_null() {
        let c = conversion();
        for n in [0u16, 1, 2042, 4095] {
            assert_eq!(c.current_a(n, n), 0.0);
        }
    }

    #[test]
    fn test_current_linear_and_monotonic() {
        let c = conversion();
        let null = 2042;
        let step = c.current_a(null + 1, null);
        assert!(step > 0.0);

        let mut prev = c.current_a(0, null);
        for raw in 1..=4095u16 {
            let i = c.current_a(raw, null);
            assert!(i > prev);
            let expected = (raw as i32 - null as i32) as f32 * step;
            assert!((i - expected).abs() < 1e-3, "raw {} -> {} vs {}", raw, i, expected);
            prev = i;
        }

        // 1コード = 3.3 / 4096 / (0.001 * 20)
        assert!((step - 3.3 / 4096.0 / 0.02).abs() < 1e-5);
        // 負側
        assert!(c.current_a(0, null) < 0.0);
    }

    #[test]
    fn test_phase_current_uses_own_null() {
        let mut c = conversion();
        c.set_current_null(Phase::B, 2100);
        assert_eq!(c.phase_current_a(Phase::B, 2100), 0.0);
        assert!(c.phase_current_a(Phase::A, 2100) > 0.0);
        assert_eq!(c.calibration().current_null, [2048, 2100, 2048]);
    }

    #[test]
    fn test_bus_and_throttle_monotonic() {
        let c = conversion();
        let mut prev_bus = -1.0;
        let mut prev_thr = -1.0;
        for raw in 0..=4095u16 {
            let bus = c.bus_v(raw);
            let thr = c.throttle_v(raw);
            assert!(bus > prev_bus);
            assert!(thr > prev_thr);
            prev_bus = bus;
            prev_thr = thr;
        }
        assert_eq!(c.throttle_v(0), 0.0);
        assert!((c.throttle_v(2048) - 1.65).abs() < 1e-5);
        assert!((c.bus_v(2048) - 1.65 * 71.3 / 3.3).abs() < 1e-3);
    }

    #[test]
    fn test_temperature_at_r25() {
        let c = conversion();
        // 固定抵抗 = R25 のとき中点で25℃
        assert!((c.temperature_c(2048) - 25.0).abs() < 0.01);
    }

    #[test]
    fn test_temperature_increases_with_code() {
        let c = conversion();
        let mut prev = c.temperature_c(1);
        for raw in (64..=4032u16).step_by(64) {
            let t = c.temperature_c(raw);
            assert!(t > prev, "raw {}: {} <= {}", raw, t, prev);
            prev = t;
        }
    }

    #[test]
    fn test_temperature_edge_codes_are_finite() {
        let c = conversion();
        for raw in [0u16, 1, 4094, 4095, 4096, u16::MAX] {
            let t = c.temperature_c(raw);
            assert!(t.is_finite(), "raw {} -> {}", raw, t);
        }
        // 範囲外コードはクランプ後の値と同じ
        assert_eq!(c.temperature_c(0), c.temperature_c(1));
        assert_eq!(c.temperature_c(4095), c.temperature_c(4094));
    }

    #[test]
    fn test_reading_regenerates_all_fields() {
        let c = conversion();
        let s = RawSampleSet::from_codes([2048, 2148, 1948, 1000, 1862, 1862, 2048, 1501]);
        let r = c.reading(&s);
        assert_eq!(r.current_a[0], 0.0);
        assert!(r.current_a[1] > 0.0);
        assert!(r.current_a[2] < 0.0);
        assert!((r.current_a[1] + r.current_a[2]).abs() < 1e-4);
        assert_eq!(r.bus_v, c.bus_v(1000));
        assert_eq!(r.throttle_v, c.throttle_v(1862));
        assert!((r.temperature_c - 25.0).abs() < 0.01);
    }

    #[test]
    fn test_replace_calibration() {
        let mut c = conversion();
        let set = CalibrationSet {
            current_null: [2000, 2001, 2002],
            vref: 3.0,
            vrefint: 1.2,
            vrefint_from_factory: true,
        };
        c.replace_calibration(set);
        assert_eq!(c.vref(), 3.0);
        assert_eq!(c.calibration(), &set);
    }
}
