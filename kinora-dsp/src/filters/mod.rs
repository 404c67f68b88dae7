//! Single-sample filter primitives used to build the reverb and isolation effects.
//!
//! Each primitive owns a fixed-size state buffer allocated at construction.
//! `process` never allocates and cannot fail; indices wrap by modulo.

mod allpass;
mod comb;
mod delay_line;
mod one_pole;

pub use allpass::AllPassFilter;
pub use comb::CombFilter;
pub use delay_line::DelayLine;
pub use one_pole::OnePoleLowPass;
