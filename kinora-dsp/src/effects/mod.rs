//! Stereo effects that wrap an upstream provider and transform it in place
//!
//! Every effect here is defined only for stereo; a mono upstream is upmixed
//! at construction. Parameters live behind an `Arc` handle so the UI can
//! change them while the render thread reads.

mod isolation;
mod pan;
mod reverb;

pub use isolation::{IsolationParams, IsolationSampleProvider};
pub use pan::{pan_gains, PanParams, StereoPanSampleProvider};
pub use reverb::{ReverbParams, ReverbSampleProvider};
