//! Head unit application host library.
//!
//! Brings a vehicle head unit up in a fixed phase order, keeps it running
//! behind a presentation shell and tears it down exactly once.

pub mod config;
pub mod hardware;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod plugins;
pub mod services;
pub mod ui;

pub use config::schema::AppConfig;
pub use lifecycle::{Launch, Orchestrator, RunReport};
pub use observability::faults::FaultHandler;
