//! Recipient and channel resolution.

use crate::error::ResolveError;
use async_trait::async_trait;
use flowline_core::ContactId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credentials for the business channel a message is sent from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCredentials {
    /// Provider-side identifier of the sending number.
    pub phone_number_id: String,
    /// Bearer token for the provider API.
    pub access_token: String,
}

// Keep the token out of logs.
impl fmt::Debug for ChannelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCredentials")
            .field("phone_number_id", &self.phone_number_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// A resolved recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub contact_id: ContactId,
    pub name: Option<String>,
    /// Raw address as stored in the contact directory.
    pub address: String,
    pub channel: ChannelCredentials,
}

impl Recipient {
    /// Returns the address in the form the provider expects.
    #[must_use]
    pub fn normalized_address(&self) -> String {
        normalize_address(&self.address)
    }
}

/// Collaborator contract for looking up recipients.
#[async_trait]
pub trait RecipientResolver: Send + Sync {
    /// Resolves a contact and the channel used to reach them.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ContactNotFound`] or
    /// [`ResolveError::ChannelNotConfigured`] when the recipient cannot be
    /// messaged.
    async fn resolve(&self, contact_id: ContactId) -> Result<Recipient, ResolveError>;
}

/// Normalizes a phone address to international form.
///
/// Formatting characters are removed, a leading `00` becomes `+`, and a
/// leading `+` is added when missing.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    let digits: String = address
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if digits.starts_with('+') {
        digits
    } else if let Some(rest) = digits.strip_prefix("00") {
        format!("+{rest}")
    } else {
        format!("+{digits}")
    }
}
