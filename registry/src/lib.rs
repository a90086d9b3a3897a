//! Provider catalog and health tracking.
//!
//! The registry holds one [`ProviderDescriptor`] per downstream AI backend
//! and runs the three-state health machine (healthy → degraded → unavailable
//! → healthy) that keeps the router from repeatedly dispatching to a failing
//! provider.

pub mod descriptor;
pub mod error;
pub mod probe;
pub mod registry;

pub use descriptor::{HealthState, ProviderDescriptor};
pub use error::RegistryError;
pub use probe::ProbeDriver;
pub use registry::{ProbeResult, ProviderRegistry};
