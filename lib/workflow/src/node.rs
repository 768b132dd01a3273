//! Workflow node types and configurations.
//!
//! The editor stores each node as `{id, kind, config}` where `config` is a
//! loose JSON object. The config is decoded exactly once, when the node is
//! loaded, into one of the typed [`NodeConfig`] variants. A config that does
//! not decode is kept as [`NodeConfig::Malformed`] so that the problem only
//! surfaces if an execution actually reaches the node.

use flowline_core::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Identifier of a node, unique within its graph.
///
/// Node IDs are authored by the editor, so they are plain strings rather
/// than generated ULIDs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node ID from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of a workflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point of the workflow.
    Trigger,
    /// Sends a message or performs a conversation operation.
    Action,
    /// Branches on a predicate over the accumulated state.
    Condition,
    /// Waits before continuing.
    Delay,
    /// Calls an external HTTP endpoint.
    Webhook,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Trigger => "trigger",
            Self::Action => "action",
            Self::Condition => "condition",
            Self::Delay => "delay",
            Self::Webhook => "webhook",
        };
        f.write_str(name)
    }
}

/// Configuration for trigger nodes.
///
/// Trigger settings belong to the surrounding application (keywords,
/// channels, ...). The engine only traverses past the trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerConfig {
    pub settings: serde_json::Map<String, JsonValue>,
}

/// Configuration for action nodes, selected by `actionType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "actionType", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Plain text message.
    #[serde(alias = "send_message")]
    SendText(TextMessageConfig),
    /// Interactive message with reply buttons.
    SendButtons(ButtonMessageConfig),
    /// Image message.
    #[serde(alias = "send_media")]
    SendImage(MediaMessageConfig),
    /// Video message.
    SendVideo(MediaMessageConfig),
    /// Interactive list message.
    SendList(ListMessageConfig),
    /// Assign the recipient's conversation to an operator.
    AssignConversation(AssignConversationConfig),
}

impl ActionConfig {
    /// Returns the wire name of the action type.
    #[must_use]
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::SendText(_) => "send_text",
            Self::SendButtons(_) => "send_buttons",
            Self::SendImage(_) => "send_image",
            Self::SendVideo(_) => "send_video",
            Self::SendList(_) => "send_list",
            Self::AssignConversation(_) => "assign_conversation",
        }
    }

    /// Returns true if the action waits for a button or list selection.
    #[must_use]
    pub fn awaits_interaction(&self) -> bool {
        matches!(self, Self::SendButtons(_) | Self::SendList(_))
    }
}

/// Text message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageConfig {
    #[serde(alias = "text", alias = "body")]
    pub message: String,
}

/// Interactive reply-button message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonMessageConfig {
    #[serde(alias = "message")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default)]
    pub buttons: Vec<ButtonOption>,
}

/// One reply button. The editor may leave `id` empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "text")]
    pub title: String,
}

/// Image or video message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMessageConfig {
    /// Uploaded media handle or remote URL.
    #[serde(alias = "url", alias = "mediaUrl", alias = "imageUrl", alias = "videoUrl")]
    pub media: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Interactive list message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessageConfig {
    #[serde(alias = "message")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default = "default_list_button_text")]
    pub button_text: String,
    #[serde(default)]
    pub sections: Vec<ListSection>,
}

fn default_list_button_text() -> String {
    "Options".to_string()
}

/// A titled group of list rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub rows: Vec<ListRow>,
}

/// One selectable list row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Conversation assignment target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignConversationConfig {
    #[serde(alias = "assigneeId")]
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Comparison applied by condition nodes.
///
/// Unknown operator names fall back to `Contains`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionOperator {
    #[default]
    Contains,
    Equals,
    StartsWith,
    EndsWith,
}

impl ConditionOperator {
    /// Evaluates the operator. Both sides are expected to be lower-cased.
    #[must_use]
    pub fn evaluate(self, haystack: &str, needle: &str) -> bool {
        match self {
            Self::Contains => haystack.contains(needle),
            Self::Equals => haystack == needle,
            Self::StartsWith => haystack.starts_with(needle),
            Self::EndsWith => haystack.ends_with(needle),
        }
    }

    /// Returns the wire name of the operator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Equals => "equals",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
        }
    }
}

impl From<String> for ConditionOperator {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "equals" | "eq" => Self::Equals,
            "starts_with" | "startswith" => Self::StartsWith,
            "ends_with" | "endswith" => Self::EndsWith,
            _ => Self::Contains,
        }
    }
}

impl From<ConditionOperator> for String {
    fn from(op: ConditionOperator) -> Self {
        op.as_str().to_string()
    }
}

/// Configuration for condition nodes.
///
/// Every field is defaulted: a condition with an empty config compares
/// against the empty string and therefore always matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
    #[serde(default)]
    pub operator: ConditionOperator,
    #[serde(default, alias = "compareValue")]
    pub value: String,
    /// Pause until the recipient replies before evaluating.
    #[serde(default, alias = "waitForResponse")]
    pub wait_for_reply: bool,
}

/// Unit of a delay duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    Seconds,
    #[default]
    Minutes,
    Hours,
    Days,
}

impl DelayUnit {
    fn seconds(self) -> u64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 60 * 60,
            Self::Days => 24 * 60 * 60,
        }
    }
}

/// Configuration for delay nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayConfig {
    #[serde(default, alias = "amount", alias = "delay")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub unit: DelayUnit,
}

impl DelayConfig {
    /// Returns the configured wait, or `None` when unset or zero.
    #[must_use]
    pub fn wait(&self) -> Option<Duration> {
        let amount = self.duration.filter(|amount| *amount > 0)?;
        Some(Duration::from_secs(amount.saturating_mul(self.unit.seconds())))
    }
}

/// HTTP method used by webhook nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    #[serde(alias = "get")]
    Get,
    #[default]
    #[serde(alias = "post")]
    Post,
    #[serde(alias = "put")]
    Put,
    #[serde(alias = "patch")]
    Patch,
    #[serde(alias = "delete")]
    Delete,
}

impl WebhookMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Configuration for webhook nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub method: WebhookMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Typed node configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    Trigger(TriggerConfig),
    Action(ActionConfig),
    Condition(ConditionConfig),
    Delay(DelayConfig),
    Webhook(WebhookConfig),
    /// The authored config could not be decoded for its kind.
    Malformed {
        kind: NodeKind,
        reason: String,
        raw: JsonValue,
    },
}

impl NodeConfig {
    /// Decodes an editor config for the given node kind.
    ///
    /// A `null` config is treated as an empty object. Decode failures are
    /// preserved as [`NodeConfig::Malformed`] rather than rejected.
    #[must_use]
    pub fn decode(kind: NodeKind, raw: JsonValue) -> Self {
        let raw = if raw.is_null() {
            JsonValue::Object(serde_json::Map::new())
        } else {
            raw
        };

        let decoded = match kind {
            NodeKind::Trigger => serde_json::from_value(raw.clone()).map(Self::Trigger),
            NodeKind::Action => serde_json::from_value(raw.clone()).map(Self::Action),
            NodeKind::Condition => serde_json::from_value(raw.clone()).map(Self::Condition),
            NodeKind::Delay => serde_json::from_value(raw.clone()).map(Self::Delay),
            NodeKind::Webhook => serde_json::from_value(raw.clone()).map(Self::Webhook),
        };

        decoded.unwrap_or_else(|e| Self::Malformed {
            kind,
            reason: e.to_string(),
            raw,
        })
    }

    /// Returns the node kind this config belongs to.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Trigger(_) => NodeKind::Trigger,
            Self::Action(_) => NodeKind::Action,
            Self::Condition(_) => NodeKind::Condition,
            Self::Delay(_) => NodeKind::Delay,
            Self::Webhook(_) => NodeKind::Webhook,
            Self::Malformed { kind, .. } => *kind,
        }
    }

    /// Encodes the config back into its editor representation.
    #[must_use]
    pub fn to_raw(&self) -> JsonValue {
        let encoded = match self {
            Self::Trigger(config) => serde_json::to_value(config),
            Self::Action(config) => serde_json::to_value(config),
            Self::Condition(config) => serde_json::to_value(config),
            Self::Delay(config) => serde_json::to_value(config),
            Self::Webhook(config) => serde_json::to_value(config),
            Self::Malformed { raw, .. } => return raw.clone(),
        };
        encoded.unwrap_or(JsonValue::Null)
    }
}

/// A workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NodeDocument", into = "NodeDocument")]
pub struct Node {
    pub id: NodeId,
    /// Display label from the editor.
    pub name: Option<String>,
    pub config: NodeConfig,
}

impl Node {
    /// Creates a node with the given ID and configuration.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            name: None,
            config,
        }
    }

    /// Sets the display label.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }
}

/// Editor representation of a node.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeDocument {
    id: NodeId,
    #[serde(alias = "type")]
    kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    config: JsonValue,
}

impl From<NodeDocument> for Node {
    fn from(doc: NodeDocument) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            config: NodeConfig::decode(doc.kind, doc.config),
        }
    }
}

impl From<Node> for NodeDocument {
    fn from(node: Node) -> Self {
        Self {
            kind: node.kind(),
            config: node.config.to_raw(),
            id: node.id,
            name: node.name,
        }
    }
}
