//! Best-effort location lookup
//!
//! The GPS collaborator is external; it either produces a (longitude,
//! latitude) pair or nothing, and never fails back to the caller.

pub trait LocationProvider: Send + Sync {
    fn current(&self) -> Option<(f64, f64)>;
}

/// Default provider when no GPS source is wired in.
pub struct NoLocation;

impl LocationProvider for NoLocation {
    fn current(&self) -> Option<(f64, f64)> {
        None
    }
}
