//! Shutdown signalling and the duration lifecycle controller.

pub mod actions;
pub mod bus;
pub mod controller;
pub mod shutdown;
pub mod stopwatch;

pub use actions::LifecycleActions;
pub use bus::EventBus;
pub use controller::{ControllerPhase, DurationLifecycleController};
pub use shutdown::ShutdownManager;
pub use stopwatch::IdleStopwatch;
