//! Workflow execution engine.
//!
//! Runs per-recipient executions of workflow graphs:
//!
//! - **Driver**: [`WorkflowEngine`] walks the graph from the trigger node,
//!   one node at a time, until the execution pauses, waits or finishes
//! - **Handlers**: per-kind node evaluation producing a [`StepOutcome`]
//! - **Resumption**: matching inbound replies to suspended executions
//! - **Delays**: timer-driven continuations on the tokio runtime
//! - **Registry**: in-memory execution storage behind [`ExecutionRegistry`]
//!
//! Messaging collaborators come from `flowline-messaging`; definitions are
//! read through `flowline_workflow::WorkflowStore`.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod handlers;
pub mod registry;
pub mod resume;
pub mod scheduler;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use config::{EngineConfig, ResumePolicy};
pub use engine::{Collaborators, WorkflowEngine};
pub use error::{EngineError, StepFailure, WebhookError};
pub use event::{InboundEvent, InboundEventKind, ResumeOutcome};
pub use handlers::StepOutcome;
pub use registry::{
    ExecutionRegistry, ExecutionSlot, ExecutionSummary, InMemoryExecutionRegistry,
};
pub use scheduler::DelayScheduler;
pub use webhook::{HttpWebhookSender, WebhookPayload, WebhookRequest, WebhookSender};
