// Throttle voltage low-pass filter
// Second order IIR (biquad) in transposed direct form II, one call per control tick

use crate::config::BiquadCoefficients;

/// Biquad low-pass filter for the throttle voltage
///
/// State is two delay values. `reset()` must be called before the filter is
/// reused after a fault, otherwise the previous run's history leaks into the output.
pub struct ThrottleFilter {
    coeffs: BiquadCoefficients,
    s1: f32,
    s2: f32,
}

impl ThrottleFilter {
    pub fn new(coeffs: &BiquadCoefficients) -> Self {
        Self {
            coeffs: *coeffs,
            s1: 0.0,
            s2: 0.0,
        }
    }

    /// Filter one sample
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.b0 * x + self.s1;
        self.s1 = c.b1 * x - c.a1 * y + self.s2;
        self.s2 = c.b2 * x - c.a2 * y;
        y
    }

    /// Zero both delay values
    pub fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }

    pub fn state(&self) -> (f32, f32) {
        (self.s1, self.s2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ThrottleFilter {
        ThrottleFilter::new(&BiquadCoefficients::default())
    }

    #[test]
    fn test_step_settles_to_dc_gain() {
        let mut f = filter();
        let mut y = 0.0;
        for _ in 0..3000 {
            y = f.process(1.0);
        }
        let gain = BiquadCoefficients::default().dc_gain();
        assert!((y - gain).abs() < 2e-3, "y {} gain {}", y, gain);
    }

    #[test]
    fn test_step_is_smoothed() {
        let mut f = filter();
        // First output only sees b0
        let first = f.process(1.0);
        assert!(first < 1e-3);

        // 2Hz相当: 100tickではまだ半分未満
        let mut y = first;
        for _ in 1..100 {
            y = f.process(1.0);
        }
        assert!(y > 0.1 && y < 0.6, "y after 100 ticks: {}", y);
    }

    #[test]
    fn test_zero_input_converges_to_zero() {
        let mut f = filter();
        for _ in 0..2000 {
            f.process(1.0);
        }
        let mut y = 1.0;
        for _ in 0..3000 {
            y = f.process(0.0);
        }
        assert!(y.abs() < 1e-4, "y {}", y);
    }

    #[test]
    fn test_history_leaks_without_reset() {
        let mut f = filter();
        for _ in 0..500 {
            f.process(1.5);
        }
        // リセットなし: 前回の履歴が出力に残る
        let leaked = f.process(0.0);
        assert!(leaked > 1.0, "leaked {}", leaked);

        f.reset();
        assert_eq!(f.state(), (0.0, 0.0));
        assert_eq!(f.process(0.0), 0.0);
    }
}
