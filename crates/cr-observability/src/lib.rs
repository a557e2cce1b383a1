//! # cr-observability
//!
//! Logging setup shared by the CMDB reconciler binaries.

pub mod logging;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig, LoggingError};
