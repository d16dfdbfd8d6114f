//! ---
//! cpe_section: "01-core-functionality"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Shared primitives and utilities for the convergence runtime."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
//! Core shared primitives for the R-CPE convergence workspace.
//! This crate exposes configuration loading, logging bootstrap, and the
//! scheduling directive returned by every reconciler.

pub mod config;
pub mod directive;
pub mod logging;

pub use config::{AppConfig, ConvergenceConfig, LoadedAppConfig, LoggingConfig};
pub use directive::Directive;
pub use logging::{init_tracing, LogFormat};
