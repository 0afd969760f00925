//! relab: a lab-session rescheduling workflow engine.
//!
//! Students submit requests to move a lab session to another date and time
//! slot; the request then travels a fixed multi-stage approval pipeline
//! (lab advisor, module coordinator, lab coordinator), with rejection
//! reachable at every stage and an appeal path for rejected requests.
//!
//! The crate is organized in three layers:
//! - [`domain`]: pure types and the transition tables, no I/O
//! - [`storage`]: the [`storage::Storage`] trait with Postgres and
//!   in-memory backends
//! - [`api`]: the axum REST surface

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod storage;

pub use config::Config;
pub use error::{RelabError, Result};
