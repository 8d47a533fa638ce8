pub mod config;
pub mod discovery;
pub mod error;
pub mod registration;

pub use config::*;
pub use error::*;
pub use registration::*;
