//! Request builders for the platform API.
//!
//! Everything here is pure: builders produce an [`HttpRequest`] value (or a
//! build error) and never touch the shell. All authorized requests carry the
//! session bearer token; mutating requests that must not double-apply carry
//! an idempotency key.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::{HttpError, HttpRequest, HttpRequestBuilder};
use crate::directory::{DirectoryCommand, DirectorySection};
use crate::session::{OperatorProfile, SessionContext, SessionEndpoints};
use crate::{MessageId, TicketId, TicketKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequestBody {
    email: String,
    password: String,
}

/// Body of a successful login.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponseBody {
    pub token: String,
    pub operator: OperatorProfile,
}

impl fmt::Debug for LoginResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponseBody")
            .field("token", &"[REDACTED]")
            .field("operator", &self.operator)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequestBody {
    body: String,
    client_ref: MessageId,
}

/// Body returned when a message is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponseBody {
    pub id: MessageId,
    pub seq: u64,
    pub sent_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ResolveRequestBody {
    notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ReasonBody {
    reason: String,
}

pub fn login_request(
    endpoints: &SessionEndpoints,
    email: &str,
    password: &SecretString,
) -> Result<HttpRequest, HttpError> {
    let body = LoginRequestBody {
        email: email.to_string(),
        password: password.expose_secret().clone(),
    };
    HttpRequestBuilder::post(&endpoints.api_url("/api/v1/auth/login"))
        .json(&body)
        .finish()
}

pub fn active_tickets_request(
    context: &SessionContext,
    kind: TicketKind,
) -> Result<HttpRequest, HttpError> {
    let path = format!("/api/v1/support/{}/tickets", kind.path_segment());
    authorized_get(context, &path)
}

pub fn history_request(
    context: &SessionContext,
    kind: TicketKind,
    ticket_id: &TicketId,
) -> Result<HttpRequest, HttpError> {
    let path = format!(
        "/api/v1/support/{}/tickets/{}/messages",
        kind.path_segment(),
        ticket_id.as_str()
    );
    authorized_get(context, &path)
}

/// Persists a chat message. The client id doubles as the idempotency key,
/// so a retried send can never store twice.
pub fn post_message_request(
    context: &SessionContext,
    kind: TicketKind,
    ticket_id: &TicketId,
    client_ref: &MessageId,
    body: &str,
) -> Result<HttpRequest, HttpError> {
    let path = format!(
        "/api/v1/support/{}/tickets/{}/messages",
        kind.path_segment(),
        ticket_id.as_str()
    );
    let payload = SendMessageRequestBody {
        body: body.to_string(),
        client_ref: client_ref.clone(),
    };
    HttpRequestBuilder::post(&context.endpoints().api_url(&path))
        .bearer(context.bearer_token())
        .idempotency_key(client_ref.as_str())
        .json(&payload)
        .finish()
}

pub fn resolve_request(
    context: &SessionContext,
    kind: TicketKind,
    ticket_id: &TicketId,
    notes: &str,
) -> Result<HttpRequest, HttpError> {
    let path = format!(
        "/api/v1/support/{}/tickets/{}/resolve",
        kind.path_segment(),
        ticket_id.as_str()
    );
    HttpRequestBuilder::post(&context.endpoints().api_url(&path))
        .bearer(context.bearer_token())
        .json(&ResolveRequestBody {
            notes: notes.to_string(),
        })
        .finish()
}

pub fn section_request(
    context: &SessionContext,
    section: DirectorySection,
) -> Result<HttpRequest, HttpError> {
    let path = format!("/api/v1/{}", section.path_segment());
    authorized_get(context, &path)
}

pub fn command_request(
    context: &SessionContext,
    command: &DirectoryCommand,
) -> Result<HttpRequest, HttpError> {
    let (path, reason) = command_route(command);
    let mut builder = HttpRequestBuilder::post(&context.endpoints().api_url(&path))
        .bearer(context.bearer_token());
    if let Some(reason) = reason {
        builder = builder.json(&ReasonBody { reason });
    }
    builder.finish()
}

fn command_route(command: &DirectoryCommand) -> (String, Option<String>) {
    match command {
        DirectoryCommand::ApproveDocument { id } => {
            (format!("/api/v1/documents/{}/approve", id.as_str()), None)
        }
        DirectoryCommand::RejectDocument { id, reason } => (
            format!("/api/v1/documents/{}/reject", id.as_str()),
            Some(reason.clone()),
        ),
        DirectoryCommand::SuspendDriver { id, reason } => (
            format!("/api/v1/drivers/{}/suspend", id.as_str()),
            Some(reason.clone()),
        ),
        DirectoryCommand::ReinstateDriver { id } => {
            (format!("/api/v1/drivers/{}/reinstate", id.as_str()), None)
        }
        DirectoryCommand::BlockCustomer { id } => {
            (format!("/api/v1/customers/{}/block", id.as_str()), None)
        }
        DirectoryCommand::UnblockCustomer { id } => {
            (format!("/api/v1/customers/{}/unblock", id.as_str()), None)
        }
        DirectoryCommand::DeactivateCoupon { id } => {
            (format!("/api/v1/coupons/{}/deactivate", id.as_str()), None)
        }
        DirectoryCommand::RetireServiceArea { id } => {
            (format!("/api/v1/service-areas/{}/retire", id.as_str()), None)
        }
        DirectoryCommand::EndPromotion { id } => {
            (format!("/api/v1/promotions/{}/end", id.as_str()), None)
        }
        DirectoryCommand::CloseHelpRequest { id } => {
            (format!("/api/v1/help-requests/{}/close", id.as_str()), None)
        }
    }
}

fn authorized_get(context: &SessionContext, path: &str) -> Result<HttpRequest, HttpError> {
    HttpRequestBuilder::get(&context.endpoints().api_url(path))
        .bearer(context.bearer_token())
        .finish()
}
