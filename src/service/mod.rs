//! The external channel service
//!
//! [`ChannelService`] is the seam to the remote protocol library.
//! [`SimulatedService`] implements it in-process.

pub mod error;
pub mod simulated;
pub mod traits;

pub use error::ServiceError;
pub use simulated::{ServiceCall, ServiceOp, SimVariable, SimulatedControl, SimulatedService};
pub use traits::{ChannelService, SubscriptionId};
