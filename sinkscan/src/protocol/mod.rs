//! Discovery and send scheduling components
//!
//! - [`collision`]: separation between pending discovery switches
//! - [`rotation`]: active channel and radio ownership
//! - [`estimator`]: cycle length and repeat count estimation
//! - [`transmit`]: send registration into predicted windows

pub mod collision;
pub mod estimator;
pub mod rotation;
pub mod transmit;

pub use collision::{CollisionScheduler, Placement};
pub use estimator::{Estimate, ParameterEstimator};
pub use rotation::{Resume, RotationController, RotationState};
pub use transmit::{cycle_span, TransmissionScheduler, MAX_PENDING_SENDS};
