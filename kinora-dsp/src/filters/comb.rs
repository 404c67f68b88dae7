//! Feedback comb filter

/// Feedback comb filter with caller-supplied feedback.
///
/// Banks of these in parallel build the dense tail of a reverb.
#[derive(Debug, Clone)]
pub struct CombFilter {
    buffer: Vec<f32>,
    index: usize,
}

impl CombFilter {
    /// Create a comb filter delaying by `size` samples (at least 1)
    pub fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32, feedback: f32) -> f32 {
        let output = self.buffer[self.index];
        self.buffer[self.index] = input + output * feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    /// Delay length in samples
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
