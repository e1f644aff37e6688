//! Orderflow service: environment configuration and process lifecycle.
//!
//! The binary in `main.rs` loads [`config::Config`], installs tracing and the
//! metrics recorder, then hands over to [`lifecycle::Application`].

pub mod config;
pub mod lifecycle;

pub use config::{Config, ConfigError};
pub use lifecycle::Application;
