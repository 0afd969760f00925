//! Reschedule request aggregate - domain model and state transitions.
//!
//! This module contains the core domain logic for reschedule requests:
//! - Request types and states (typestate pattern)
//! - The role-gated transition table
//! - Flat record representation for storage and API responses

pub mod state;
pub mod transitions;

// Re-export commonly used types
pub use state::*;
pub use transitions::{ReviewAction, advance};
