//! Composition root of the `sig-attention` binary.
//!
//! 1. **Configuration.** [`config`] layers defaults, the TOML file and the
//!    command line into [`config::Settings`].
//! 2. **Logging.** [`telemetry`] installs the `tracing` subscriber (text or
//!    JSON).
//! 3. **Wiring.** [`run`] builds the `gitee` and `community` adapters, hands
//!    them to [`attention::Router`] and writes the ordered reports with
//!    [`report`].

pub mod config;
pub mod report;
pub mod run;
pub mod telemetry;

pub use config::{AppConfig, Cli, Settings};
pub use run::{execute, RunSummary};
