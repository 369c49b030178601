pub mod backpressure;
pub mod controller;
pub mod router;
pub mod tracker;

pub use controller::{Controller, ControllerConfig, EnqueueOutcome};
pub use tracker::JobProgressTracker;
