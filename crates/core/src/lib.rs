//! # Bridge Core
//!
//! The query layer that sits between the host and a native health store.
//!
//! This crate owns everything with state or concurrency:
//! - configuration resolved once at startup ([`BridgeConfig`], [`BridgeContext`])
//! - the [`HealthStore`] seam and an in-memory implementation with demo data
//! - the [`QueryOrchestrator`], which turns raw host strings into wire documents
//! - the registry of long-running observer queries
//!
//! **No wire concerns**: encoding and decoding live in `bridge-wire`, the record model in
//! `health-records`.

pub mod config;
pub mod constants;
pub mod demo;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod store;

pub use config::{BridgeConfig, BridgeContext};
pub use error::{CoreError, CoreResult};
pub use orchestrator::{ObserverQuery, QueryOrchestrator};
pub use registry::LongRunningQueries;
pub use store::{DateRange, HealthStore, InMemoryHealthStore};
