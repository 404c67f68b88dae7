//! Fixed delay tap used for early reflections

/// Fixed-length delay with a fixed output gain
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    index: usize,
    gain: f32,
}

impl DelayLine {
    pub fn new(size: usize, gain: f32) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
            gain,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.index] * self.gain;
        self.buffer[self.index] = input;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}
