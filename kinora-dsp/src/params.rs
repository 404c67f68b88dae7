//! Lock-free parameter cells shared between the UI and render threads.

use atomic_float::AtomicF32;
use std::sync::atomic::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Bounds {
    /// Clamped to `[0, 1]` on write
    Unit,
    /// Stored as written; the reader validates or clamps
    Raw,
}

/// Scalar effect parameter, written from any thread and read once per block.
///
/// Relaxed ordering: parameters are independent of each other, and a stale
/// value on the render thread only delays the change by one block.
#[derive(Debug)]
pub(crate) struct Param {
    value: AtomicF32,
    bounds: Bounds,
}

impl Param {
    /// Mix or depth parameter in `[0, 1]`; NaN writes store 0
    pub fn unit(initial: f32) -> Self {
        Self {
            value: AtomicF32::new(initial.clamp(0.0, 1.0)),
            bounds: Bounds::Unit,
        }
    }

    /// Parameter whose range is enforced by the owner
    pub fn raw(initial: f32) -> Self {
        Self {
            value: AtomicF32::new(initial),
            bounds: Bounds::Raw,
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: f32) {
        let value = match self.bounds {
            Bounds::Unit if value.is_nan() => 0.0,
            Bounds::Unit => value.clamp(0.0, 1.0),
            Bounds::Raw => value,
        };
        self.value.store(value, Ordering::Relaxed);
    }
}
