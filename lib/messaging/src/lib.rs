//! Outbound messaging for the flowline engine.
//!
//! The engine talks to four external collaborators while evaluating action
//! nodes. This crate defines their contracts and the adapters that shape
//! data for them:
//!
//! - [`RecipientResolver`]: contact details and channel credentials
//! - [`MessageGateway`]: provider-shaped payload submission, with the
//!   reqwest-backed [`HttpGateway`]
//! - [`ConversationRecorder`]: audit log of every sent message
//! - [`AssignmentDirectory`]: operator lookup and conversation assignment

pub mod directory;
pub mod error;
pub mod gateway;
pub mod payload;
pub mod recipient;
pub mod recorder;

pub use directory::{Assignee, AssignmentDirectory};
pub use error::{DirectoryError, GatewayError, PayloadError, RecorderError, ResolveError};
pub use gateway::{GatewayConfig, HttpGateway, MessageGateway, SentMessage};
pub use payload::{OutboundMessage, PreparedMessage};
pub use recipient::{ChannelCredentials, Recipient, RecipientResolver, normalize_address};
pub use recorder::{ConversationRecorder, OutboundRecord};
