pub mod client;
pub mod registry;

pub use client::{Registration, RegistryClient, RegistryClientConfig, RegistryClientError};
pub use registry::{LivenessSweeper, RegistryError, RegistryHandler, RegistryStore};
