//! Conversation message buffer.
//!
//! Messages are ordered by the backend's per-conversation sequence number,
//! not by arrival order. Local sends carry a client-generated id and no
//! sequence until the backend confirms them, either through the send
//! response or through the channel echo referencing the client id. The
//! buffer merges whichever lands first and drops the other.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{MessageId, OperatorId, TicketId, MAX_CONVERSATION_MESSAGES};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum MessageAuthor {
    Operator { id: OperatorId },
    Reporter,
}

impl MessageAuthor {
    #[must_use]
    pub const fn is_operator(&self) -> bool {
        matches!(self, Self::Operator { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Sending,
    Sent,
    Failed,
}

/// One message as held by the core. `seq` is `None` for an optimistic local
/// send that the backend has not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub ticket_id: TicketId,
    pub author: MessageAuthor,
    pub body: String,
    pub sent_at_ms: u64,
    pub seq: Option<u64>,
    pub delivery: DeliveryState,
}

impl ChatMessage {
    /// Optimistic local send. Gets a fresh client id which doubles as the
    /// idempotency key for the persist request.
    #[must_use]
    pub fn local(
        ticket_id: TicketId,
        operator_id: OperatorId,
        body: String,
        sent_at_ms: u64,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            ticket_id,
            author: MessageAuthor::Operator { id: operator_id },
            body,
            sent_at_ms,
            seq: None,
            delivery: DeliveryState::Sending,
        }
    }
}

/// Wire form of a message, as delivered over the channel and returned by
/// the history endpoint. Always sequenced. `client_ref` carries the client
/// id of the send it echoes, when there is one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub id: MessageId,
    pub ticket_id: TicketId,
    pub author: MessageAuthor,
    pub body: String,
    pub sent_at_ms: u64,
    pub seq: u64,
    pub client_ref: Option<MessageId>,
}

impl From<MessageEvent> for ChatMessage {
    fn from(event: MessageEvent) -> Self {
        Self {
            id: event.id,
            ticket_id: event.ticket_id,
            author: event.author,
            body: event.body,
            sent_at_ms: event.sent_at_ms,
            seq: Some(event.seq),
            delivery: DeliveryState::Sent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    DuplicateDropped,
    EchoMerged,
}

/// Buffer for the selected conversation. Kept sorted by sequence, with
/// unconfirmed local sends after everything sequenced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationBuffer {
    messages: Vec<ChatMessage>,
}

impl ConversationBuffer {
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Applies a message from the channel or from a history response.
    pub fn apply_remote(&mut self, event: MessageEvent) -> InsertOutcome {
        if let Some(reference) = event.client_ref.clone() {
            if let Some(local) = self.messages.iter_mut().find(|m| m.id == reference) {
                if local.seq.is_some() {
                    debug!(id = %event.id, "dropping repeated echo");
                    return InsertOutcome::DuplicateDropped;
                }
                local.seq = Some(event.seq);
                local.sent_at_ms = event.sent_at_ms;
                local.delivery = DeliveryState::Sent;
                self.resort();
                return InsertOutcome::EchoMerged;
            }
        }
        if self.messages.iter().any(|m| m.id == event.id) {
            debug!(id = %event.id, "dropping duplicate message");
            return InsertOutcome::DuplicateDropped;
        }
        self.messages.push(ChatMessage::from(event));
        self.resort();
        self.enforce_limit();
        InsertOutcome::Inserted
    }

    /// Merges a batch of history messages. Live messages that raced the
    /// fetch are already in the buffer and deduplicate naturally.
    pub fn seed_history(&mut self, events: Vec<MessageEvent>) {
        for event in events {
            let _ = self.apply_remote(event);
        }
    }

    /// Appends an optimistic local send.
    pub fn append_local(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.resort();
        self.enforce_limit();
    }

    /// Confirms a local send from the persist response. No-op when the
    /// channel echo already merged the confirmation.
    pub fn mark_sent(&mut self, id: &MessageId, seq: u64, sent_at_ms: u64) -> bool {
        let Some(local) = self.messages.iter_mut().find(|m| &m.id == id) else {
            return false;
        };
        if local.seq.is_none() {
            local.seq = Some(seq);
            local.sent_at_ms = sent_at_ms;
        }
        local.delivery = DeliveryState::Sent;
        self.resort();
        true
    }

    /// Marks a still-pending local send as failed. A send the backend has
    /// already confirmed stays confirmed.
    pub fn mark_failed(&mut self, id: &MessageId) -> bool {
        let Some(local) = self
            .messages
            .iter_mut()
            .find(|m| &m.id == id && m.delivery == DeliveryState::Sending)
        else {
            return false;
        };
        local.delivery = DeliveryState::Failed;
        true
    }

    fn resort(&mut self) {
        self.messages
            .sort_by_key(|m| (m.seq.unwrap_or(u64::MAX), m.sent_at_ms));
    }

    fn enforce_limit(&mut self) {
        if self.messages.len() > MAX_CONVERSATION_MESSAGES {
            let excess = self.messages.len() - MAX_CONVERSATION_MESSAGES;
            self.messages.drain(0..excess);
        }
    }
}
