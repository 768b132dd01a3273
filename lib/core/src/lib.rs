//! Core types shared by every flowline crate.
//!
//! This crate provides the strongly-typed identifiers used across the
//! workflow model, the messaging adapters and the execution engine, plus the
//! `Result` alias built on rootcause reports.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ContactId, ConversationId, ExecutionId, ParseIdError, UserId, WorkflowId};
