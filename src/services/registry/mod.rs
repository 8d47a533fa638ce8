//! Registry service module
//!
//! This module contains the service registry implementation split into logical components:
//! - `types`: Instance records, listings and settings
//! - `store`: The lock-guarded instance store
//! - `sweeper`: Background eviction of instances with stale heartbeats
//! - `service`: Handler state and wire conversions
//! - `grpc_impl`: gRPC trait implementation

pub mod clock;
pub mod error;
pub mod grpc_impl;
pub mod service;
pub mod store;
pub mod sweeper;
pub mod types;

// Re-export public types for easier access
pub use clock::{Clock, ClockError, ManualClock, SystemClock};
pub use error::RegistryError;
pub use service::RegistryHandler;
pub use store::RegistryStore;
pub use sweeper::LivenessSweeper;
pub use types::{
    InstanceId, RegistrySettings, RegistryStatus, ServiceInstance, ServiceListing, SweepReport,
};
