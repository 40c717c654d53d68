use std::fmt;

use crux_core::capability::{Capability, CapabilityContext, Operation};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::MessageEvent;
use crate::{OperatorId, SupportTicket, TicketId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Operations on the persistent event connection. `Open` starts a stream
/// that keeps yielding results until the connection dies; the rest are
/// fire-and-forget signals on the already-open connection.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "snake_case")]
pub enum ChannelOperation {
    Open {
        url: String,
        // The token crosses to the shell in the clear; Debug output
        // below redacts it.
        token: String,
        operator_id: OperatorId,
        epoch: u64,
    },
    Join {
        ticket_id: TicketId,
    },
    Presence {
        operator_id: OperatorId,
        status: PresenceStatus,
    },
    Close,
}

impl fmt::Debug for ChannelOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open {
                url,
                operator_id,
                epoch,
                ..
            } => f
                .debug_struct("Open")
                .field("url", url)
                .field("token", &"[REDACTED]")
                .field("operator_id", operator_id)
                .field("epoch", epoch)
                .finish(),
            Self::Join { ticket_id } => {
                f.debug_struct("Join").field("ticket_id", ticket_id).finish()
            }
            Self::Presence {
                operator_id,
                status,
            } => f
                .debug_struct("Presence")
                .field("operator_id", operator_id)
                .field("status", status)
                .finish(),
            Self::Close => f.write_str("Close"),
        }
    }
}

impl Operation for ChannelOperation {
    type Output = ChannelResult;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChannelEvent {
    Opened,
    TicketOpened { ticket: SupportTicket },
    MessageReceived { message: MessageEvent },
    Closed { reason: Option<String> },
}

impl ChannelEvent {
    /// `Closed` ends the stream; everything else keeps it alive.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChannelError {
    #[error("failed to open channel: {reason}")]
    ConnectFailed { reason: String },

    #[error("channel authentication rejected")]
    AuthRejected,

    #[error("connection dropped: {reason}")]
    Dropped { reason: String },

    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl ChannelError {
    #[must_use]
    pub const fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::AuthRejected)
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectFailed { .. } | Self::Dropped { .. })
    }
}

pub type ChannelResult = Result<ChannelEvent, ChannelError>;

pub struct Channel<Ev> {
    context: CapabilityContext<ChannelOperation, Ev>,
}

impl<Ev> Capability<Ev> for Channel<Ev> {
    type Operation = ChannelOperation;
    type MappedSelf<MappedEv> = Channel<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static,
    {
        Channel::new(self.context.map_event(f))
    }
}

impl<Ev> Channel<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<ChannelOperation, Ev>) -> Self {
        Self { context }
    }

    /// Open the connection and forward every delivery to the app until the
    /// stream ends. A terminal result (error or clean close) stops the
    /// forwarding task; reconnection is the app's decision, not ours.
    pub fn open<F>(&self, url: String, token: String, operator_id: OperatorId, epoch: u64, make_event: F)
    where
        F: Fn(ChannelResult) -> Ev + Send + Sync + 'static,
        Ev: Send,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let mut deliveries = context.stream_from_shell(ChannelOperation::Open {
                url,
                token,
                operator_id,
                epoch,
            });

            while let Some(result) = deliveries.next().await {
                let terminal = match &result {
                    Ok(event) => event.is_terminal(),
                    Err(_) => true,
                };
                context.update_app(make_event(result));
                if terminal {
                    break;
                }
            }
        });
    }

    pub fn join(&self, ticket_id: TicketId)
    where
        Ev: Send,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            context.notify_shell(ChannelOperation::Join { ticket_id }).await;
        });
    }

    pub fn presence(&self, operator_id: OperatorId, status: PresenceStatus)
    where
        Ev: Send,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            context
                .notify_shell(ChannelOperation::Presence {
                    operator_id,
                    status,
                })
                .await;
        });
    }

    pub fn close(&self)
    where
        Ev: Send,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            context.notify_shell(ChannelOperation::Close).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_debug_redacts_token() {
        let op = ChannelOperation::Open {
            url: "wss://events.example.com/ops".into(),
            token: "secret-token".into(),
            operator_id: OperatorId::new("op-1"),
            epoch: 3,
        };
        let rendered = format!("{op:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn test_operation_serialization_round_trip() {
        let op = ChannelOperation::Join {
            ticket_id: TicketId::new("t-42"),
        };
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains(r#""op":"join""#));
        let back: ChannelOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
    }

    #[test]
    fn test_open_serializes_token_for_shell() {
        let op = ChannelOperation::Open {
            url: "wss://events.example.com/ops".into(),
            token: "tok".into(),
            operator_id: OperatorId::new("op-1"),
            epoch: 0,
        };
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains(r#""token":"tok""#));
    }

    #[test]
    fn test_event_tags_are_snake_case() {
        let json = serde_json::to_string(&ChannelEvent::Closed { reason: None }).unwrap();
        assert!(json.contains(r#""type":"closed""#));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(ChannelEvent::Closed { reason: None }.is_terminal());
        assert!(!ChannelEvent::Opened.is_terminal());
    }

    #[test]
    fn test_error_classification() {
        assert!(ChannelError::ConnectFailed {
            reason: "refused".into()
        }
        .is_retryable());
        assert!(ChannelError::Dropped {
            reason: "reset".into()
        }
        .is_retryable());
        assert!(!ChannelError::AuthRejected.is_retryable());
        assert!(ChannelError::AuthRejected.is_auth_rejected());
        assert!(!ChannelError::Protocol {
            message: "bad frame".into()
        }
        .is_retryable());
    }
}
