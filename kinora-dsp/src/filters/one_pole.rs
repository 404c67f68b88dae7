//! Single-pole IIR low-pass filter

use std::f32::consts::PI;

/// One-pole low-pass: `y = x * (1 - a) + y[n-1] * a`
#[derive(Debug, Clone)]
pub struct OnePoleLowPass {
    /// Pole coefficient, `exp(-2π * cutoff / sample_rate)`
    a: f32,
    z: f32,
}

impl OnePoleLowPass {
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        Self {
            a: (-2.0 * PI * cutoff_hz / sample_rate).exp(),
            z: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.z = input * (1.0 - self.a) + self.z * self.a;
        self.z
    }

    /// Pole coefficient
    pub fn coefficient(&self) -> f32 {
        self.a
    }

    pub fn reset(&mut self) {
        self.z = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settles_to_constant_input() {
        let mut lp = OnePoleLowPass::new(1000.0, 48000.0);
        let mut out = 0.0;
        for _ in 0..1000 {
            out = lp.process(1.0);
        }
        assert!((out - 1.0).abs() < 0.01, "settled at {}", out);
    }

    #[test]
    fn test_coefficient() {
        let lp = OnePoleLowPass::new(1000.0, 48000.0);
        let expected = (-2.0 * PI * 1000.0 / 48000.0).exp();
        assert!((lp.coefficient() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_attenuates_nyquist() {
        let mut lp = OnePoleLowPass::new(250.0, 48000.0);
        let mut peak = 0.0f32;
        for i in 0..4800 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            let y = lp.process(x);
            if i > 2400 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak < 0.05, "nyquist leaked through at {}", peak);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut lp = OnePoleLowPass::new(500.0, 44100.0);
        lp.process(1.0);
        lp.reset();
        let first = lp.process(0.0);
        assert_eq!(first, 0.0);
    }
}
