//! Core domain types for the reschedule workflow engine.
//!
//! This module contains pure domain types with no persistence dependencies:
//! - Reschedule request typestate machine
//! - Appeals and their single terminal review
//! - Course modules, users, and roles
//! - Schedulable resources and the availability rule

pub mod appeal;
pub mod module;
pub mod request;
pub mod resource;
pub mod user;

// Re-export commonly used types from each submodule
// Note: We don't use glob re-exports to avoid name collisions between
// request and appeal status enums.
