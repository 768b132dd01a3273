//! In-memory collaborators and graph builders for engine tests.

use crate::config::EngineConfig;
use crate::engine::{Collaborators, WorkflowEngine};
use crate::error::WebhookError;
use crate::webhook::{WebhookRequest, WebhookSender};
use async_trait::async_trait;
use flowline_core::{ContactId, ConversationId, UserId, WorkflowId};
use flowline_messaging::{
    Assignee, AssignmentDirectory, ChannelCredentials, ConversationRecorder, DirectoryError,
    GatewayError, MessageGateway, OutboundMessage, OutboundRecord, Recipient, RecipientResolver,
    RecorderError, ResolveError, SentMessage,
};
use flowline_workflow::node::{
    AssignConversationConfig, ButtonMessageConfig, ButtonOption, DelayUnit, ListMessageConfig,
    ListRow, ListSection, TextMessageConfig, TriggerConfig, WebhookMethod,
};
use flowline_workflow::{
    ActionConfig, ConditionConfig, DelayConfig, Edge, InMemoryWorkflowStore, Node, NodeConfig,
    RunOutcome, StoreError, WebhookConfig, Workflow, WorkflowGraph, WorkflowStore,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub(crate) struct FakeResolver {
    missing: Mutex<HashSet<ContactId>>,
}

impl FakeResolver {
    pub(crate) fn mark_missing(&self, contact_id: ContactId) {
        self.missing.lock().unwrap().insert(contact_id);
    }
}

#[async_trait]
impl RecipientResolver for FakeResolver {
    async fn resolve(&self, contact_id: ContactId) -> Result<Recipient, ResolveError> {
        if self.missing.lock().unwrap().contains(&contact_id) {
            return Err(ResolveError::ContactNotFound { contact_id });
        }
        Ok(Recipient {
            contact_id,
            name: Some("Ada".to_string()),
            address: "+1 (555) 010-0000".to_string(),
            channel: ChannelCredentials {
                phone_number_id: "1234567890".to_string(),
                access_token: "test-token".to_string(),
            },
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeGateway {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: Mutex<bool>,
}

impl FakeGateway {
    pub(crate) fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn fail_sends(&self) {
        *self.failing.lock().unwrap() = true;
    }
}

#[async_trait]
impl MessageGateway for FakeGateway {
    async fn send(
        &self,
        _channel: &ChannelCredentials,
        message: &OutboundMessage,
    ) -> Result<SentMessage, GatewayError> {
        if *self.failing.lock().unwrap() {
            return Err(GatewayError::Rejected {
                status: 401,
                body: "invalid token".to_string(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(SentMessage {
            provider_message_id: Some(format!("wamid.{}", sent.len())),
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeRecorder {
    records: Mutex<Vec<OutboundRecord>>,
    failing: Mutex<bool>,
}

impl FakeRecorder {
    pub(crate) fn records(&self) -> Vec<OutboundRecord> {
        self.records.lock().unwrap().clone()
    }

    pub(crate) fn fail_records(&self) {
        *self.failing.lock().unwrap() = true;
    }
}

#[async_trait]
impl ConversationRecorder for FakeRecorder {
    async fn record(&self, record: OutboundRecord) -> Result<(), RecorderError> {
        if *self.failing.lock().unwrap() {
            return Err(RecorderError::Unavailable {
                reason: "history store offline".to_string(),
            });
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// Workflow store whose reads always fail.
pub(crate) struct UnreachableStore;

#[async_trait]
impl WorkflowStore for UnreachableStore {
    async fn load(&self, _workflow_id: WorkflowId) -> Result<Option<Arc<Workflow>>, StoreError> {
        Err(StoreError::Unavailable {
            reason: "connection refused".to_string(),
        })
    }

    async fn record_outcome(
        &self,
        _workflow_id: WorkflowId,
        _outcome: RunOutcome,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeDirectory {
    users: Mutex<HashMap<UserId, Assignee>>,
    conversations: Mutex<HashMap<ContactId, ConversationId>>,
    assignments: Mutex<Vec<(ContactId, UserId)>>,
    notes: Mutex<Vec<(ConversationId, String)>>,
}

impl FakeDirectory {
    pub(crate) fn add_user(&self, display_name: &str) -> UserId {
        let user_id = UserId::new();
        self.users.lock().unwrap().insert(
            user_id,
            Assignee {
                user_id,
                display_name: display_name.to_string(),
            },
        );
        user_id
    }

    pub(crate) fn add_conversation(&self, contact_id: ContactId) -> ConversationId {
        let conversation_id = ConversationId::new();
        self.conversations
            .lock()
            .unwrap()
            .insert(contact_id, conversation_id);
        conversation_id
    }

    pub(crate) fn assignments(&self) -> Vec<(ContactId, UserId)> {
        self.assignments.lock().unwrap().clone()
    }

    pub(crate) fn notes(&self) -> Vec<(ConversationId, String)> {
        self.notes.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssignmentDirectory for FakeDirectory {
    async fn find_user(&self, user_id: UserId) -> Result<Option<Assignee>, DirectoryError> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }

    async fn assign_conversation(
        &self,
        contact_id: ContactId,
        assignee: &Assignee,
    ) -> Result<Option<ConversationId>, DirectoryError> {
        let conversation_id = self.conversations.lock().unwrap().get(&contact_id).copied();
        if conversation_id.is_some() {
            self.assignments
                .lock()
                .unwrap()
                .push((contact_id, assignee.user_id));
        }
        Ok(conversation_id)
    }

    async fn append_note(
        &self,
        conversation_id: ConversationId,
        note: &str,
    ) -> Result<(), DirectoryError> {
        self.notes
            .lock()
            .unwrap()
            .push((conversation_id, note.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeWebhooks {
    requests: Mutex<Vec<WebhookRequest>>,
    failing: Mutex<bool>,
}

impl FakeWebhooks {
    pub(crate) fn requests(&self) -> Vec<WebhookRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn fail_deliveries(&self) {
        *self.failing.lock().unwrap() = true;
    }
}

#[async_trait]
impl WebhookSender for FakeWebhooks {
    async fn deliver(&self, request: &WebhookRequest) -> Result<u16, WebhookError> {
        self.requests.lock().unwrap().push(request.clone());
        if *self.failing.lock().unwrap() {
            return Err(WebhookError::Transport {
                url: request.url.clone(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(200)
    }
}

/// An engine wired to in-memory collaborators.
pub(crate) struct Harness {
    pub(crate) store: Arc<InMemoryWorkflowStore>,
    pub(crate) resolver: Arc<FakeResolver>,
    pub(crate) gateway: Arc<FakeGateway>,
    pub(crate) recorder: Arc<FakeRecorder>,
    pub(crate) directory: Arc<FakeDirectory>,
    pub(crate) webhooks: Arc<FakeWebhooks>,
    pub(crate) engine: WorkflowEngine,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub(crate) fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let resolver = Arc::new(FakeResolver::default());
        let gateway = Arc::new(FakeGateway::default());
        let recorder = Arc::new(FakeRecorder::default());
        let directory = Arc::new(FakeDirectory::default());
        let webhooks = Arc::new(FakeWebhooks::default());

        let engine = WorkflowEngine::new(
            config,
            Collaborators {
                store: store.clone(),
                resolver: resolver.clone(),
                gateway: gateway.clone(),
                recorder: recorder.clone(),
                directory: directory.clone(),
                webhooks: webhooks.clone(),
            },
        );

        Self {
            store,
            resolver,
            gateway,
            recorder,
            directory,
            webhooks,
            engine,
        }
    }

    /// Stores an active workflow around the graph.
    pub(crate) async fn install(&self, graph: WorkflowGraph) -> WorkflowId {
        self.store.insert(Workflow::with_graph("Test", graph)).await
    }
}

pub(crate) fn graph(nodes: Vec<Node>, edges: Vec<Edge>) -> WorkflowGraph {
    let mut graph = WorkflowGraph::new();
    for node in nodes {
        graph.add_node(node).unwrap();
    }
    for edge in edges {
        graph.add_edge(edge).unwrap();
    }
    graph
}

pub(crate) fn trigger(id: &str) -> Node {
    Node::new(id, NodeConfig::Trigger(TriggerConfig::default()))
}

pub(crate) fn text(id: &str, message: &str) -> Node {
    Node::new(
        id,
        NodeConfig::Action(ActionConfig::SendText(TextMessageConfig {
            message: message.to_string(),
        })),
    )
}

pub(crate) fn buttons(id: &str, options: &[(&str, &str)]) -> Node {
    Node::new(
        id,
        NodeConfig::Action(ActionConfig::SendButtons(ButtonMessageConfig {
            body: "Pick one".to_string(),
            header: None,
            footer: None,
            buttons: options
                .iter()
                .map(|(option_id, title)| ButtonOption {
                    id: Some((*option_id).to_string()),
                    title: (*title).to_string(),
                })
                .collect(),
        })),
    )
}

pub(crate) fn list(id: &str, rows: &[(&str, &str)]) -> Node {
    Node::new(
        id,
        NodeConfig::Action(ActionConfig::SendList(ListMessageConfig {
            body: "Choose a topic".to_string(),
            header: None,
            footer: None,
            button_text: "Topics".to_string(),
            sections: vec![ListSection {
                title: Some("Help".to_string()),
                rows: rows
                    .iter()
                    .map(|(row_id, title)| ListRow {
                        id: Some((*row_id).to_string()),
                        title: (*title).to_string(),
                        description: None,
                    })
                    .collect(),
            }],
        })),
    )
}

pub(crate) fn condition(id: &str, value: &str, wait_for_reply: bool) -> Node {
    Node::new(
        id,
        NodeConfig::Condition(ConditionConfig {
            value: value.to_string(),
            wait_for_reply,
            ..ConditionConfig::default()
        }),
    )
}

pub(crate) fn delay(id: &str, seconds: u64) -> Node {
    Node::new(
        id,
        NodeConfig::Delay(DelayConfig {
            duration: Some(seconds),
            unit: DelayUnit::Seconds,
        }),
    )
}

pub(crate) fn webhook(id: &str, url: &str) -> Node {
    Node::new(
        id,
        NodeConfig::Webhook(WebhookConfig {
            url: url.to_string(),
            method: WebhookMethod::Post,
            headers: BTreeMap::from([("X-Flow".to_string(), "test".to_string())]),
        }),
    )
}

pub(crate) fn assign(id: &str, user_id: UserId) -> Node {
    Node::new(
        id,
        NodeConfig::Action(ActionConfig::AssignConversation(AssignConversationConfig {
            user_id,
            note: None,
        })),
    )
}
