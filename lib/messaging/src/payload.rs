//! Provider payload construction.
//!
//! Action configs are turned into the Cloud API message shape:
//!
//! ```json
//! {"messaging_product": "whatsapp", "recipient_type": "individual",
//!  "to": "+14155550100", "type": "text", "text": {"body": "..."}}
//! ```
//!
//! Interactive messages need stable option IDs, because the ID the recipient
//! taps is what the engine later matches against outgoing edges. Options the
//! editor left without an ID get `<node-id>-option-<n>` (1-based).

use crate::error::PayloadError;
use flowline_workflow::ActionConfig;
use flowline_workflow::node::{
    ButtonMessageConfig, ListMessageConfig, MediaMessageConfig, TextMessageConfig,
};
use flowline_workflow::{NodeId, OfferedOption};
use serde::Serialize;
use tracing::warn;

/// Reply-button messages carry at most this many buttons.
pub const MAX_BUTTONS: usize = 3;

const MESSAGING_PRODUCT: &str = "whatsapp";
const RECIPIENT_TYPE: &str = "individual";

/// A message ready to be submitted to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    messaging_product: &'static str,
    recipient_type: &'static str,
    pub to: String,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl OutboundMessage {
    fn new(to: impl Into<String>, body: MessageBody) -> Self {
        Self {
            messaging_product: MESSAGING_PRODUCT,
            recipient_type: RECIPIENT_TYPE,
            to: to.into(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    Text { text: TextBody },
    Image { image: MediaRef },
    Video { video: MediaRef },
    Interactive { interactive: Interactive },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBody {
    pub preview_url: bool,
    pub body: String,
}

/// Either an uploaded media handle or a remote link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl MediaRef {
    fn new(media: &str, caption: Option<String>) -> Self {
        let media = media.trim().to_string();
        if is_media_handle(&media) {
            Self {
                id: Some(media),
                link: None,
                caption,
            }
        } else {
            Self {
                id: None,
                link: Some(media),
                caption,
            }
        }
    }
}

/// Returns true if `media` is an uploaded media handle rather than a URL.
#[must_use]
pub fn is_media_handle(media: &str) -> bool {
    !media.is_empty() && media.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Interactive {
    Button {
        #[serde(skip_serializing_if = "Option::is_none")]
        header: Option<InteractiveHeader>,
        body: TextPart,
        #[serde(skip_serializing_if = "Option::is_none")]
        footer: Option<TextPart>,
        action: ButtonAction,
    },
    List {
        #[serde(skip_serializing_if = "Option::is_none")]
        header: Option<InteractiveHeader>,
        body: TextPart,
        #[serde(skip_serializing_if = "Option::is_none")]
        footer: Option<TextPart>,
        action: ListAction,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractiveHeader {
    #[serde(rename = "type")]
    kind: &'static str,
    pub text: String,
}

impl InteractiveHeader {
    fn text(text: String) -> Self {
        Self { kind: "text", text }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonAction {
    pub buttons: Vec<ReplyButton>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyButton {
    #[serde(rename = "type")]
    kind: &'static str,
    pub reply: ReplyOption,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyOption {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListAction {
    pub button: String,
    pub sections: Vec<ListSectionPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListSectionPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub rows: Vec<ListRowPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListRowPayload {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An outbound message together with what the engine needs after sending.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMessage {
    pub message: OutboundMessage,
    /// Message type as recorded in the conversation history.
    pub message_type: &'static str,
    /// Human-readable content for the conversation history.
    pub content: String,
    /// Options offered to the recipient; empty for non-interactive messages.
    pub options: Vec<OfferedOption>,
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, PayloadError> {
    let value = value.trim();
    if value.is_empty() {
        Err(PayloadError::MissingField { field })
    } else {
        Ok(value)
    }
}

fn option_id(node_id: &NodeId, authored: Option<&String>, position: usize) -> String {
    authored
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map_or_else(
            || format!("{node_id}-option-{}", position + 1),
            str::to_string,
        )
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl PreparedMessage {
    /// Builds the message for a message-sending action.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::NotAMessage`] for actions that send nothing,
    /// or the builder's error for incomplete configs.
    pub fn for_action(
        node_id: &NodeId,
        to: impl Into<String>,
        action: &ActionConfig,
    ) -> Result<Self, PayloadError> {
        match action {
            ActionConfig::SendText(config) => Self::text(to, config),
            ActionConfig::SendImage(config) => Self::image(to, config),
            ActionConfig::SendVideo(config) => Self::video(to, config),
            ActionConfig::SendButtons(config) => Self::buttons(node_id, to, config),
            ActionConfig::SendList(config) => Self::list(node_id, to, config),
            ActionConfig::AssignConversation(_) => Err(PayloadError::NotAMessage {
                action_type: action.action_type(),
            }),
        }
    }

    /// Builds a plain text message.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::MissingField`] if the message is empty.
    pub fn text(to: impl Into<String>, config: &TextMessageConfig) -> Result<Self, PayloadError> {
        let body = required(&config.message, "message")?.to_string();
        Ok(Self {
            message: OutboundMessage::new(
                to,
                MessageBody::Text {
                    text: TextBody {
                        preview_url: false,
                        body: body.clone(),
                    },
                },
            ),
            message_type: "text",
            content: body,
            options: Vec::new(),
        })
    }

    /// Builds an image message.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::MissingField`] if no media is configured.
    pub fn image(to: impl Into<String>, config: &MediaMessageConfig) -> Result<Self, PayloadError> {
        let media = required(&config.media, "media")?;
        let caption = non_empty(config.caption.as_ref());
        Ok(Self {
            content: caption.clone().unwrap_or_else(|| media.to_string()),
            message: OutboundMessage::new(
                to,
                MessageBody::Image {
                    image: MediaRef::new(media, caption),
                },
            ),
            message_type: "image",
            options: Vec::new(),
        })
    }

    /// Builds a video message.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::MissingField`] if no media is configured.
    pub fn video(to: impl Into<String>, config: &MediaMessageConfig) -> Result<Self, PayloadError> {
        let media = required(&config.media, "media")?;
        let caption = non_empty(config.caption.as_ref());
        Ok(Self {
            content: caption.clone().unwrap_or_else(|| media.to_string()),
            message: OutboundMessage::new(
                to,
                MessageBody::Video {
                    video: MediaRef::new(media, caption),
                },
            ),
            message_type: "video",
            options: Vec::new(),
        })
    }

    /// Builds a reply-button message.
    ///
    /// Buttons past [`MAX_BUTTONS`] are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is empty or no button has a title.
    pub fn buttons(
        node_id: &NodeId,
        to: impl Into<String>,
        config: &ButtonMessageConfig,
    ) -> Result<Self, PayloadError> {
        let body = required(&config.body, "body")?.to_string();

        let authored: Vec<_> = config
            .buttons
            .iter()
            .filter(|button| !button.title.trim().is_empty())
            .collect();
        if authored.len() > MAX_BUTTONS {
            warn!(
                node_id = %node_id,
                authored = authored.len(),
                max = MAX_BUTTONS,
                "Dropping extra reply buttons"
            );
        }

        let options: Vec<OfferedOption> = authored
            .into_iter()
            .take(MAX_BUTTONS)
            .enumerate()
            .map(|(position, button)| OfferedOption {
                id: option_id(node_id, button.id.as_ref(), position),
                title: button.title.trim().to_string(),
            })
            .collect();
        if options.is_empty() {
            return Err(PayloadError::NoOptions {
                action_type: "send_buttons",
            });
        }

        let buttons = options
            .iter()
            .map(|option| ReplyButton {
                kind: "reply",
                reply: ReplyOption {
                    id: option.id.clone(),
                    title: option.title.clone(),
                },
            })
            .collect();

        Ok(Self {
            message: OutboundMessage::new(
                to,
                MessageBody::Interactive {
                    interactive: Interactive::Button {
                        header: non_empty(config.header.as_ref()).map(InteractiveHeader::text),
                        body: TextPart { text: body.clone() },
                        footer: non_empty(config.footer.as_ref()).map(|text| TextPart { text }),
                        action: ButtonAction { buttons },
                    },
                },
            ),
            message_type: "interactive",
            content: body,
            options,
        })
    }

    /// Builds a list message. Row IDs are numbered across all sections.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is empty or the list has no rows.
    pub fn list(
        node_id: &NodeId,
        to: impl Into<String>,
        config: &ListMessageConfig,
    ) -> Result<Self, PayloadError> {
        let body = required(&config.body, "body")?.to_string();

        let mut options = Vec::new();
        let mut sections = Vec::with_capacity(config.sections.len());
        for section in &config.sections {
            let mut rows = Vec::with_capacity(section.rows.len());
            for row in &section.rows {
                let id = option_id(node_id, row.id.as_ref(), options.len());
                let title = row.title.trim().to_string();
                options.push(OfferedOption {
                    id: id.clone(),
                    title: title.clone(),
                });
                rows.push(ListRowPayload {
                    id,
                    title,
                    description: non_empty(row.description.as_ref()),
                });
            }
            sections.push(ListSectionPayload {
                title: non_empty(section.title.as_ref()),
                rows,
            });
        }
        if options.is_empty() {
            return Err(PayloadError::NoOptions {
                action_type: "send_list",
            });
        }

        Ok(Self {
            message: OutboundMessage::new(
                to,
                MessageBody::Interactive {
                    interactive: Interactive::List {
                        header: non_empty(config.header.as_ref()).map(InteractiveHeader::text),
                        body: TextPart { text: body.clone() },
                        footer: non_empty(config.footer.as_ref()).map(|text| TextPart { text }),
                        action: ListAction {
                            button: config.button_text.clone(),
                            sections,
                        },
                    },
                },
            ),
            message_type: "interactive",
            content: body,
            options,
        })
    }
}
