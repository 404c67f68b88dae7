//! Schroeder all-pass filter

/// Schroeder all-pass with a fixed internal feedback.
///
/// Chained in series after a comb bank to diffuse echoes without colouring
/// the spectrum.
#[derive(Debug, Clone)]
pub struct AllPassFilter {
    buffer: Vec<f32>,
    index: usize,
    feedback: f32,
}

impl AllPassFilter {
    /// Create an all-pass of `size` samples (at least 1)
    pub fn new(size: usize, feedback: f32) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
            feedback,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.index];
        let output = -input + buffered;
        self.buffer[self.index] = input + buffered * self.feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impulse_response() {
        let mut ap = AllPassFilter::new(10, 0.5);
        let out: Vec<f32> = (0..31)
            .map(|i| ap.process(if i == 0 { 1.0 } else { 0.0 }))
            .collect();

        assert_eq!(out[0], -1.0);
        assert_eq!(out[10], 1.0);
        assert_eq!(out[20], 0.5);
        assert_eq!(out[30], 0.25);
        assert_eq!(out[5], 0.0);
    }

    #[test]
    fn test_impulse_stays_bounded_and_decays() {
        let mut ap = AllPassFilter::new(23, 0.7);
        let mut late_peak = 0.0f32;
        for i in 0..23 * 80 {
            let y = ap.process(if i == 0 { 1.0 } else { 0.0 });
            assert!(y.abs() <= 1.0, "sample {} = {}", i, y);
            if i > 23 * 70 {
                late_peak = late_peak.max(y.abs());
            }
        }
        assert!(late_peak < 1e-6);
    }

    #[test]
    fn test_reset() {
        let mut ap = AllPassFilter::new(3, 0.5);
        ap.process(1.0);
        ap.reset();
        for _ in 0..6 {
            assert_eq!(ap.process(0.0), 0.0);
        }
    }
}
