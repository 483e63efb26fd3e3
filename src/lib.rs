//! Evoscope
//!
//! Runs a genetic algorithm and a particle swarm side by side over the same
//! objective, one iteration at a time, with the ability to rewind either
//! search to any iteration already computed and carry on from there.
//!
//! The engines, the expression compiler and the history live in
//! [`evoscope_optimization`]. This crate adds the [`Session`] that drives a
//! GA/PSO pair from JSON commands, and the read-only [`report`] export.
//!
//! ## Example Usage
//!
//! ```rust
//! use evoscope::{Session, SessionConfig};
//!
//! let config = SessionConfig {
//!     function_expr: Some("x1^2 + x2^2".to_string()),
//!     pop_size: 20,
//!     ..SessionConfig::default()
//! };
//! let mut session = Session::new(config).unwrap();
//!
//! session.handle(r#"{"action": "step"}"#);
//! session.handle("step");
//! let response = session.handle(r#"{"action": "seek", "iteration": 1}"#);
//! assert_eq!(response.ag.iteration, 1);
//! assert_eq!(response.ag.max_iteration, 2);
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod report;
pub mod session;

pub use error::{SessionError, SessionResult};
pub use report::{analyze, Analysis, ReportData, Winner};
pub use session::{Command, Session, SessionConfig, SessionResponse};

pub use evoscope_optimization as optimization;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.1.0");
    }
}
