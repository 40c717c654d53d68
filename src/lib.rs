// lib.rs - Operations console core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api;
pub mod capabilities;
pub mod channel;
pub mod conversation;
pub mod directory;
pub mod session;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::capabilities::{
    ChannelError, ChannelResult, HttpError, HttpResult, StoreError, StoreResult, TimerOutput,
};
use crate::channel::{ChannelPhase, ChannelState};
use crate::conversation::ConversationBuffer;
use crate::directory::{CommandError, DirectoryCommand, DirectorySection, DirectoryState};
use crate::session::{SessionContext, SessionError};

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::{render::Render, App as CruxApp};

pub const MAX_CONNECT_ATTEMPTS: u32 = 5;
pub const BASE_RETRY_DELAY_MS: u64 = 1000;
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;
pub const JITTER_MAX_MS: u64 = 1000;
pub const MAX_ACTIVE_TICKETS: usize = 200;
pub const MAX_CONVERSATION_MESSAGES: usize = 500;
pub const MAX_SECTION_ROWS: usize = 500;
pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    RateLimited,
    Storage,
    Serialization,
    Deserialization,
    Channel,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Channel => "CHANNEL_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network
            | Self::Timeout
            | Self::Conflict
            | Self::RateLimited
            | Self::Storage
            | Self::Channel => ErrorSeverity::Transient,

            Self::Serialization
            | Self::Deserialization
            | Self::Internal
            | Self::InvalidState => ErrorSeverity::Fatal,

            Self::Authentication
            | Self::Authorization
            | Self::Validation
            | Self::NotFound
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimited | Self::Storage | Self::Channel
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub retry_after_ms: Option<u64>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            retry_after_ms: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_retry_after(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to reach the platform. Please check your connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Authentication => "Your session has expired. Please sign in again.".into(),
            ErrorKind::Authorization => {
                "You don't have permission to perform this action.".into()
            }
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::NotFound => "The requested record could not be found.".into(),
            ErrorKind::Conflict => {
                "This action conflicts with a recent change. Please refresh and try again.".into()
            }
            ErrorKind::RateLimited => {
                if let Some(retry_after) = self.retry_after_ms {
                    let seconds = retry_after / 1000;
                    format!("Too many requests. Please wait {seconds} seconds and try again.")
                } else {
                    "Too many requests. Please wait a moment and try again.".into()
                }
            }
            ErrorKind::Storage => "Unable to save the session locally.".into(),
            ErrorKind::Serialization | ErrorKind::Deserialization => {
                "A data error occurred. Please contact support if this persists.".into()
            }
            ErrorKind::Channel => {
                "The live connection was interrupted. Reconnecting...".into()
            }
            ErrorKind::InvalidState => {
                "The console is in an invalid state. Please reload the page.".into()
            }
            ErrorKind::Internal | ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again or contact support.".into()
            }
        }
    }

    #[must_use]
    pub fn from_http_status(status: u16, body: Option<&[u8]>) -> Self {
        let kind = match status {
            400 => ErrorKind::Validation,
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Authorization,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::Timeout,
            409 => ErrorKind::Conflict,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::Internal,
            _ => ErrorKind::Unknown,
        };

        let message = body
            .and_then(|b| serde_json::from_slice::<ApiErrorResponse>(b).ok())
            .map(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP error: {status}"));

        Self::new(kind, message).with_context("http_status", status.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

pub type AppResult<T> = Result<T, AppError>;

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        let kind = match &e {
            HttpError::Network { .. } => ErrorKind::Network,
            HttpError::Timeout { .. } => ErrorKind::Timeout,
            HttpError::Deserialize { .. } => ErrorKind::Deserialization,
            HttpError::Serialize { .. } => ErrorKind::Serialization,
            HttpError::InvalidUrl { .. }
            | HttpError::InvalidHeader { .. }
            | HttpError::BodyTooLarge { .. } => ErrorKind::Internal,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<ChannelError> for AppError {
    fn from(e: ChannelError) -> Self {
        let kind = if e.is_auth_rejected() {
            ErrorKind::Authentication
        } else {
            ErrorKind::Channel
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        let kind = match &e {
            StoreError::InvalidKey { .. } => ErrorKind::Internal,
            StoreError::ValueTooLarge { .. } => ErrorKind::Validation,
            StoreError::Io { .. } => ErrorKind::Storage,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        let kind = match &e {
            SessionError::InvalidEndpoint { .. } => ErrorKind::Validation,
            SessionError::Encode { .. } => ErrorKind::Serialization,
            SessionError::Decode { .. } => ErrorKind::Deserialization,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<CommandError> for AppError {
    fn from(e: CommandError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorId(pub String);

impl OperatorId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub String);

impl TicketId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message ids are minted client-side for optimistic sends; the same value
/// doubles as the idempotency key for the persist request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripId(pub String);

impl TripId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TripId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriverId(pub String);

impl DriverId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DriverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouponId(pub String);

impl CouponId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CouponId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceAreaId(pub String);

impl ServiceAreaId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServiceAreaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromotionId(pub String);

impl PromotionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PromotionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HelpRequestId(pub String);

impl HelpRequestId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HelpRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[must_use]
pub fn get_current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[must_use]
pub fn format_time_ago(timestamp_ms: u64, now_ms: u64) -> String {
    if timestamp_ms > now_ms {
        return "Just now".into();
    }

    let diff_secs = now_ms.saturating_sub(timestamp_ms) / 1000;

    if diff_secs < 5 {
        return "Just now".into();
    }
    if diff_secs < 60 {
        return format!("{diff_secs}s ago");
    }

    let diff_mins = diff_secs / 60;
    if diff_mins < 60 {
        return format!("{diff_mins}m ago");
    }

    let diff_hours = diff_mins / 60;
    if diff_hours < 24 {
        return format!("{diff_hours}h ago");
    }

    let diff_days = diff_hours / 24;
    if diff_days < 7 {
        return format!("{diff_days}d ago");
    }

    format!("{}w ago", diff_days / 7)
}

/// Uniform jitter draw added to every reconnect delay.
#[must_use]
pub fn generate_jitter() -> u64 {
    use rand::Rng;
    rand::thread_rng().gen_range(0..=JITTER_MAX_MS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    Customer,
    Driver,
}

impl TicketKind {
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Driver => "driver",
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Customer => "Customer tickets",
            Self::Driver => "Driver tickets",
        }
    }

    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Customer => Self::Driver,
            Self::Driver => Self::Customer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[must_use]
    pub const fn is_urgent(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// A support request as pushed over the channel and returned by the active
/// ticket list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    pub id: TicketId,
    pub kind: TicketKind,
    pub trip_id: Option<TripId>,
    pub reporter_name: String,
    pub summary: String,
    pub priority: TicketPriority,
    pub is_sos: bool,
    pub opened_at_ms: u64,
}

impl SupportTicket {
    #[must_use]
    pub fn badge(&self) -> Option<&'static str> {
        if self.is_sos {
            Some("SOS")
        } else if self.priority.is_urgent() {
            Some(self.priority.label())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketInsert {
    Inserted,
    Duplicate,
}

/// Newest-first queue of unresolved tickets of one kind. Inserts are
/// idempotent on id; the queue is bounded and evicts from the tail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketQueue {
    tickets: Vec<SupportTicket>,
}

impl TicketQueue {
    #[must_use]
    pub fn tickets(&self) -> &[SupportTicket] {
        &self.tickets
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &TicketId) -> Option<&SupportTicket> {
        self.tickets.iter().find(|t| &t.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &TicketId) -> bool {
        self.get(id).is_some()
    }

    pub fn insert(&mut self, ticket: SupportTicket) -> TicketInsert {
        if self.contains(&ticket.id) {
            tracing::debug!(id = %ticket.id, "dropping duplicate ticket push");
            return TicketInsert::Duplicate;
        }
        self.tickets.insert(0, ticket);
        if self.tickets.len() > MAX_ACTIVE_TICKETS {
            tracing::warn!(cap = MAX_ACTIVE_TICKETS, "ticket queue full, evicting oldest");
            self.tickets.truncate(MAX_ACTIVE_TICKETS);
        }
        TicketInsert::Inserted
    }

    pub fn remove(&mut self, id: &TicketId) -> bool {
        let before = self.tickets.len();
        self.tickets.retain(|t| &t.id != id);
        self.tickets.len() != before
    }

    /// Replaces the queue with a freshly fetched list, preserving server
    /// order and dropping duplicate ids past the first occurrence.
    pub fn replace_all(&mut self, tickets: Vec<SupportTicket>) {
        self.tickets.clear();
        for ticket in tickets {
            if !self.contains(&ticket.id) {
                self.tickets.push(ticket);
            }
        }
        self.tickets.truncate(MAX_ACTIVE_TICKETS);
    }

    pub fn clear(&mut self) {
        self.tickets.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    /// Restoring a persisted session at startup.
    #[default]
    Booting,
    Login,
    Ready,
}

impl AppState {
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// The selected ticket and everything scoped to it. Dropping the selection
/// drops the buffer and both drafts with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConversation {
    pub kind: TicketKind,
    pub ticket_id: TicketId,
    pub buffer: ConversationBuffer,
    pub draft: String,
    pub resolve_notes: String,
    pub history_loading: bool,
    pub fetch_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub created_at_ms: u64,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            created_at_ms: get_current_time_ms(),
            duration_ms: kind.default_duration_ms(),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) > self.duration_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

pub struct Model {
    pub state: AppState,
    pub endpoints: Option<crate::session::SessionEndpoints>,
    pub session: Option<SessionContext>,
    pub login_in_flight: bool,
    pub channel: ChannelState,
    pub network_online: bool,
    pub active_tab: TicketKind,
    pub customer_tickets: TicketQueue,
    pub driver_tickets: TicketQueue,
    pub selection: Option<ActiveConversation>,
    pub history_generation: u64,
    pub directory: DirectoryState,
    pub active_section: DirectorySection,
    pub active_error: Option<AppError>,
    pub active_toast: Option<ToastMessage>,
    pub view_timestamp_ms: u64,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            state: AppState::Booting,
            endpoints: None,
            session: None,
            login_in_flight: false,
            channel: ChannelState::default(),
            network_online: true,
            active_tab: TicketKind::Customer,
            customer_tickets: TicketQueue::default(),
            driver_tickets: TicketQueue::default(),
            selection: None,
            history_generation: 0,
            directory: DirectoryState::default(),
            active_section: DirectorySection::Drivers,
            active_error: None,
            active_toast: None,
            view_timestamp_ms: get_current_time_ms(),
        }
    }
}

impl Model {
    pub fn update_timestamp(&mut self) {
        self.view_timestamp_ms = get_current_time_ms();
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.active_toast = Some(ToastMessage::new(message, kind));
    }

    pub fn clear_toast(&mut self) {
        self.active_toast = None;
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn queue(&self, kind: TicketKind) -> &TicketQueue {
        match kind {
            TicketKind::Customer => &self.customer_tickets,
            TicketKind::Driver => &self.driver_tickets,
        }
    }

    pub fn queue_mut(&mut self, kind: TicketKind) -> &mut TicketQueue {
        match kind {
            TicketKind::Customer => &mut self.customer_tickets,
            TicketKind::Driver => &mut self.driver_tickets,
        }
    }

    /// Replaces the selection with a fresh conversation and returns the
    /// history-fetch generation the response must echo. Any previous buffer
    /// and drafts are dropped here.
    pub fn select_ticket(&mut self, kind: TicketKind, ticket_id: TicketId) -> u64 {
        self.history_generation += 1;
        self.selection = Some(ActiveConversation {
            kind,
            ticket_id,
            buffer: ConversationBuffer::default(),
            draft: String::new(),
            resolve_notes: String::new(),
            history_loading: true,
            fetch_id: self.history_generation,
        });
        self.history_generation
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    #[must_use]
    pub fn selected_ticket_id(&self) -> Option<&TicketId> {
        self.selection.as_ref().map(|s| &s.ticket_id)
    }

    /// Wipes everything owned by the authenticated session. Endpoints stay:
    /// they come from startup config, not from login.
    pub fn reset_session_state(&mut self) {
        self.session = None;
        self.login_in_flight = false;
        self.channel.reset();
        self.customer_tickets.clear();
        self.driver_tickets.clear();
        self.selection = None;
        self.directory = DirectoryState::default();
        self.active_tab = TicketKind::Customer;
        self.active_section = DirectorySection::Drivers;
        self.state = AppState::Login;
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Noop,

    /// Startup config from the shell. Arrives exactly once, before anything
    /// else.
    Started {
        api_base: String,
        events_url: String,
    },
    SessionRestored(Box<StoreResult>),

    LoginSubmitted {
        email: String,
        password: String,
    },
    LoginResponse(Box<HttpResult>),
    SnapshotPersisted(Box<StoreResult>),
    LogoutRequested,
    SessionErased(Box<StoreResult>),

    ReconnectRequested,
    ChannelDelivery {
        epoch: u64,
        result: Box<ChannelResult>,
    },
    RetryTimerElapsed(TimerOutput),
    NetworkStatusChanged {
        online: bool,
    },

    TabSelected {
        kind: TicketKind,
    },
    TicketSelected {
        kind: TicketKind,
        ticket_id: TicketId,
    },
    TicketDeselected,
    TicketsResponse {
        kind: TicketKind,
        result: Box<HttpResult>,
    },
    HistoryResponse {
        fetch_id: u64,
        result: Box<HttpResult>,
    },

    MessageDraftChanged {
        text: String,
    },
    SendMessageRequested,
    MessageSendResponse {
        client_ref: MessageId,
        result: Box<HttpResult>,
    },

    ResolveNotesChanged {
        text: String,
    },
    ResolveRequested,
    ResolveResponse {
        kind: TicketKind,
        ticket_id: TicketId,
        result: Box<HttpResult>,
    },

    SectionSelected {
        section: DirectorySection,
    },
    SectionRefreshRequested {
        section: DirectorySection,
    },
    SectionResponse {
        section: DirectorySection,
        epoch: u64,
        result: Box<HttpResult>,
    },
    CommandRequested(DirectoryCommand),
    CommandResponse {
        command: DirectoryCommand,
        result: Box<HttpResult>,
    },

    DismissError,
    DismissToast,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Started { .. } => "started",
            Self::SessionRestored(_) => "session_restored",
            Self::LoginSubmitted { .. } => "login_submitted",
            Self::LoginResponse(_) => "login_response",
            Self::SnapshotPersisted(_) => "snapshot_persisted",
            Self::LogoutRequested => "logout_requested",
            Self::SessionErased(_) => "session_erased",
            Self::ReconnectRequested => "reconnect_requested",
            Self::ChannelDelivery { .. } => "channel_delivery",
            Self::RetryTimerElapsed(_) => "retry_timer_elapsed",
            Self::NetworkStatusChanged { .. } => "network_status_changed",
            Self::TabSelected { .. } => "tab_selected",
            Self::TicketSelected { .. } => "ticket_selected",
            Self::TicketDeselected => "ticket_deselected",
            Self::TicketsResponse { .. } => "tickets_response",
            Self::HistoryResponse { .. } => "history_response",
            Self::MessageDraftChanged { .. } => "message_draft_changed",
            Self::SendMessageRequested => "send_message_requested",
            Self::MessageSendResponse { .. } => "message_send_response",
            Self::ResolveNotesChanged { .. } => "resolve_notes_changed",
            Self::ResolveRequested => "resolve_requested",
            Self::ResolveResponse { .. } => "resolve_response",
            Self::SectionSelected { .. } => "section_selected",
            Self::SectionRefreshRequested { .. } => "section_refresh_requested",
            Self::SectionResponse { .. } => "section_response",
            Self::CommandRequested(_) => "command_requested",
            Self::CommandResponse { .. } => "command_response",
            Self::DismissError => "dismiss_error",
            Self::DismissToast => "dismiss_toast",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::LoginSubmitted { .. }
                | Self::LogoutRequested
                | Self::ReconnectRequested
                | Self::TabSelected { .. }
                | Self::TicketSelected { .. }
                | Self::TicketDeselected
                | Self::MessageDraftChanged { .. }
                | Self::SendMessageRequested
                | Self::ResolveNotesChanged { .. }
                | Self::ResolveRequested
                | Self::SectionSelected { .. }
                | Self::SectionRefreshRequested { .. }
                | Self::CommandRequested(_)
                | Self::DismissError
                | Self::DismissToast
        )
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::Noop
    }
}

/// The connecting/connected/disconnected triple the status indicator shows.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionIndicator {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionView {
    pub indicator: ConnectionIndicator,
    pub can_reconnect: bool,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketListItem {
    pub id: String,
    pub reporter_name: String,
    pub summary: String,
    pub priority: TicketPriority,
    pub is_sos: bool,
    pub badge: Option<String>,
    pub time_ago: String,
    pub is_selected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageView {
    pub id: String,
    pub body: String,
    pub from_operator: bool,
    pub delivery: crate::conversation::DeliveryState,
    pub time_ago: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationView {
    pub ticket_id: String,
    pub kind: TicketKind,
    pub messages: Vec<MessageView>,
    pub draft: String,
    pub resolve_notes: String,
    pub history_loading: bool,
    pub can_send: bool,
    pub can_resolve: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionView {
    pub section: DirectorySection,
    pub title: String,
    pub status: crate::directory::LoadStatus,
    pub rows: Vec<crate::directory::DirectoryRow>,
    pub fetched_time_ago: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    Loading,
    Login {
        submitting: bool,
    },
    Ready {
        connection: ConnectionView,
        active_tab: TicketKind,
        customer_tickets: Vec<TicketListItem>,
        driver_tickets: Vec<TicketListItem>,
        conversation: Option<ConversationView>,
        active_section: DirectorySection,
        section: SectionView,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub state: ViewState,
    pub error: Option<UserFacingError>,
    pub toast: Option<ToastView>,
    pub is_authenticated: bool,
    pub operator_name: Option<String>,
}

pub mod app {
    use super::*;
    use crate::api;
    use crate::capabilities::{Capabilities, ChannelEvent, HttpResponse, PresenceStatus};
    use crate::channel::LossOutcome;
    use crate::conversation::{ChatMessage, MessageEvent};
    use crate::directory::{LoadStatus, SectionPayload};
    use crate::api::{LoginResponseBody, SendMessageResponseBody};
    use crate::session::{snapshot_store_key, SessionEndpoints, SessionSnapshot};
    use secrecy::SecretString;
    use tracing::{debug, info, warn};

    #[derive(Default)]
    pub struct App;

    impl App {
        /// Treats any received non-2xx response as an `AppError`; transport
        /// failures are converted on the same path.
        fn check(result: HttpResult) -> Result<HttpResponse, AppError> {
            match result {
                Ok(response) if response.is_success() => Ok(response),
                Ok(response) => Err(AppError::from_http_status(
                    response.status,
                    Some(&response.body),
                )),
                Err(e) => Err(AppError::from(e)),
            }
        }

        /// One-shot request failed. Authentication failures end the session;
        /// everything else becomes a dismissable inline error.
        fn fail_request(model: &mut Model, caps: &Capabilities, error: AppError) {
            if matches!(error.kind, ErrorKind::Authentication) {
                Self::expire_session(model, caps);
                return;
            }
            warn!(code = error.code(), "request failed: {error}");
            model.set_error(error);
            caps.render().render();
        }

        fn expire_session(model: &mut Model, caps: &Capabilities) {
            info!("session expired, returning to login");
            caps.channel().close();
            if let Some(key) = snapshot_store_key() {
                caps.store().delete(&key, |result| {
                    Event::SessionErased(Box::new(result))
                });
            }
            model.reset_session_state();
            model.set_error(AppError::new(ErrorKind::Authentication, "Session expired"));
            caps.render().render();
        }

        fn open_channel(model: &mut Model, caps: &Capabilities, epoch: u64) {
            let Some(session) = &model.session else {
                model.channel.reset();
                return;
            };
            caps.channel().open(
                session.endpoints().events_url().to_string(),
                session.bearer_token().to_string(),
                session.operator().id.clone(),
                epoch,
                move |result| Event::ChannelDelivery {
                    epoch,
                    result: Box::new(result),
                },
            );
        }

        /// Transitions into the authenticated console: connect the channel
        /// and load the initially visible directory section.
        fn enter_ready(model: &mut Model, caps: &Capabilities) {
            model.state = AppState::Ready;
            let epoch = model.channel.begin_connect();
            Self::open_channel(model, caps, epoch);
            Self::begin_section_load(model, caps, model.active_section);
        }

        fn send_ticket_refresh(model: &Model, caps: &Capabilities, kind: TicketKind) {
            let Some(session) = &model.session else {
                return;
            };
            match api::active_tickets_request(session, kind) {
                Ok(request) => caps.http().send(request, move |result| {
                    Event::TicketsResponse {
                        kind,
                        result: Box::new(result),
                    }
                }),
                Err(e) => warn!("failed to build ticket list request: {e}"),
            }
        }

        fn begin_section_load(model: &mut Model, caps: &Capabilities, section: DirectorySection) {
            let Some(session) = model.session.clone() else {
                return;
            };
            let epoch = model.directory.begin(section);
            match api::section_request(&session, section) {
                Ok(request) => caps.http().send(request, move |result| {
                    Event::SectionResponse {
                        section,
                        epoch,
                        result: Box::new(result),
                    }
                }),
                Err(e) => {
                    model.directory.fail(section, epoch, e.to_string());
                    warn!("failed to build section request: {e}");
                }
            }
        }

        fn decode_section(
            section: DirectorySection,
            response: &HttpResponse,
        ) -> Result<SectionPayload, AppError> {
            let payload = match section {
                DirectorySection::Drivers => SectionPayload::Drivers(response.json()?),
                DirectorySection::Customers => SectionPayload::Customers(response.json()?),
                DirectorySection::Trips => SectionPayload::Trips(response.json()?),
                DirectorySection::Documents => SectionPayload::Documents(response.json()?),
                DirectorySection::Coupons => SectionPayload::Coupons(response.json()?),
                DirectorySection::ServiceAreas => {
                    SectionPayload::ServiceAreas(response.json()?)
                }
                DirectorySection::Promotions => SectionPayload::Promotions(response.json()?),
                DirectorySection::Notifications => {
                    SectionPayload::Notifications(response.json()?)
                }
                DirectorySection::HelpRequests => {
                    SectionPayload::HelpRequests(response.json()?)
                }
            };
            Ok(payload)
        }

        fn persist_snapshot(model: &Model, caps: &Capabilities) {
            let Some(session) = &model.session else {
                return;
            };
            let Some(key) = snapshot_store_key() else {
                warn!("session snapshot key unavailable");
                return;
            };
            match session.snapshot().encode() {
                Ok(bytes) => caps.store().write(&key, bytes, |result| {
                    Event::SnapshotPersisted(Box::new(result))
                }),
                Err(e) => warn!("failed to encode session snapshot: {e}"),
            }
        }

        fn handle_channel_event(
            &self,
            model: &mut Model,
            caps: &Capabilities,
            epoch: u64,
            event: ChannelEvent,
        ) {
            match event {
                ChannelEvent::Opened => {
                    if !model.channel.mark_connected(epoch) {
                        return;
                    }
                    if let Some(session) = &model.session {
                        caps.channel()
                            .presence(session.operator().id.clone(), PresenceStatus::Online);
                    }
                    Self::send_ticket_refresh(model, caps, TicketKind::Customer);
                    Self::send_ticket_refresh(model, caps, TicketKind::Driver);
                    caps.render().render();
                }

                ChannelEvent::TicketOpened { ticket } => {
                    if epoch != model.channel.epoch() {
                        debug!(epoch, "ignoring ticket push from stale stream");
                        return;
                    }
                    let kind = ticket.kind;
                    if model.queue_mut(kind).insert(ticket) == TicketInsert::Inserted {
                        caps.render().render();
                    }
                }

                ChannelEvent::MessageReceived { message } => {
                    if epoch != model.channel.epoch() {
                        debug!(epoch, "ignoring message push from stale stream");
                        return;
                    }
                    Self::apply_live_message(model, message);
                    caps.render().render();
                }

                ChannelEvent::Closed { reason } => {
                    debug!(?reason, "channel closed");
                    self.handle_connection_loss(model, caps, epoch);
                }
            }
        }

        fn apply_live_message(model: &mut Model, message: MessageEvent) {
            let Some(selection) = model.selection.as_mut() else {
                debug!(ticket = %message.ticket_id, "dropping message with no selection");
                return;
            };
            if selection.ticket_id != message.ticket_id {
                debug!(
                    ticket = %message.ticket_id,
                    selected = %selection.ticket_id,
                    "dropping message for unselected ticket"
                );
                return;
            }
            let _ = selection.buffer.apply_remote(message);
        }

        fn handle_connection_loss(&self, model: &mut Model, caps: &Capabilities, epoch: u64) {
            match model.channel.connection_lost(epoch, generate_jitter()) {
                Some(LossOutcome::Retry { failures, delay_ms }) => {
                    if model.network_online {
                        info!(failures, delay_ms, "scheduling channel reconnect");
                        caps.timer()
                            .after(model.channel.epoch(), delay_ms, Event::RetryTimerElapsed);
                    } else {
                        // Parked; the online edge re-arms the timer.
                        info!(failures, "offline, parking channel reconnect");
                    }
                    caps.render().render();
                }
                Some(LossOutcome::GaveUp) => {
                    model.show_toast(
                        "Live connection lost. Reconnect when ready.",
                        ToastKind::Warning,
                    );
                    caps.render().render();
                }
                None => {}
            }
        }

        fn build_ticket_items(
            queue: &TicketQueue,
            selected: Option<&TicketId>,
            now_ms: u64,
        ) -> Vec<TicketListItem> {
            queue
                .tickets()
                .iter()
                .map(|ticket| TicketListItem {
                    id: ticket.id.as_str().to_string(),
                    reporter_name: ticket.reporter_name.clone(),
                    summary: ticket.summary.clone(),
                    priority: ticket.priority,
                    is_sos: ticket.is_sos,
                    badge: ticket.badge().map(str::to_string),
                    time_ago: format_time_ago(ticket.opened_at_ms, now_ms),
                    is_selected: selected == Some(&ticket.id),
                })
                .collect()
        }

        fn build_conversation(model: &Model, now_ms: u64) -> Option<ConversationView> {
            let selection = model.selection.as_ref()?;
            let messages = selection
                .buffer
                .messages()
                .iter()
                .map(|message| MessageView {
                    id: message.id.as_str().to_string(),
                    body: message.body.clone(),
                    from_operator: message.author.is_operator(),
                    delivery: message.delivery,
                    time_ago: format_time_ago(message.sent_at_ms, now_ms),
                })
                .collect();
            Some(ConversationView {
                ticket_id: selection.ticket_id.as_str().to_string(),
                kind: selection.kind,
                messages,
                draft: selection.draft.clone(),
                resolve_notes: selection.resolve_notes.clone(),
                history_loading: selection.history_loading,
                can_send: !selection.draft.trim().is_empty(),
                can_resolve: !selection.resolve_notes.trim().is_empty(),
            })
        }

        fn build_section_view(model: &Model, now_ms: u64) -> SectionView {
            let section = model.active_section;
            SectionView {
                section,
                title: section.title().to_string(),
                status: model.directory.status(section).clone(),
                rows: model.directory.rows(section),
                fetched_time_ago: model
                    .directory
                    .fetched_at_ms(section)
                    .map(|at| format_time_ago(at, now_ms)),
            }
        }

        fn build_connection(model: &Model) -> ConnectionView {
            match model.channel.phase() {
                ChannelPhase::Connecting { .. } => ConnectionView {
                    indicator: ConnectionIndicator::Connecting,
                    can_reconnect: false,
                    retry_delay_ms: None,
                },
                ChannelPhase::Connected => ConnectionView {
                    indicator: ConnectionIndicator::Connected,
                    can_reconnect: false,
                    retry_delay_ms: None,
                },
                ChannelPhase::RetryScheduled { delay_ms, .. } => ConnectionView {
                    indicator: ConnectionIndicator::Disconnected,
                    can_reconnect: false,
                    retry_delay_ms: Some(delay_ms),
                },
                ChannelPhase::GaveUp => ConnectionView {
                    indicator: ConnectionIndicator::Disconnected,
                    can_reconnect: true,
                    retry_delay_ms: None,
                },
                ChannelPhase::Idle => ConnectionView {
                    indicator: ConnectionIndicator::Disconnected,
                    can_reconnect: false,
                    retry_delay_ms: None,
                },
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            model.update_timestamp();
            debug!(
                event = event.name(),
                user_initiated = event.is_user_initiated(),
                "update"
            );

            match event {
                Event::Noop => {}

                Event::Started {
                    api_base,
                    events_url,
                } => {
                    match SessionEndpoints::new(&api_base, &events_url) {
                        Ok(endpoints) => {
                            model.endpoints = Some(endpoints);
                            model.state = AppState::Booting;
                            if let Some(key) = snapshot_store_key() {
                                caps.store().read(&key, |result| {
                                    Event::SessionRestored(Box::new(result))
                                });
                            }
                        }
                        Err(e) => {
                            model.state = AppState::Login;
                            model.set_error(
                                AppError::from(e).with_severity(ErrorSeverity::Fatal),
                            );
                        }
                    }
                    caps.render().render();
                }

                Event::SessionRestored(result) => {
                    let restored = match *result {
                        Ok(output) => output.value().map(<[u8]>::to_vec),
                        Err(e) => {
                            warn!("session restore read failed: {e}");
                            None
                        }
                    };
                    match restored {
                        Some(bytes) => match SessionSnapshot::decode(&bytes)
                            .and_then(SessionSnapshot::into_context)
                        {
                            Ok(context) => {
                                info!(operator = %context.operator().id, "session restored");
                                model.session = Some(context);
                                Self::enter_ready(model, caps);
                            }
                            Err(e) => {
                                warn!("discarding unreadable session snapshot: {e}");
                                if let Some(key) = snapshot_store_key() {
                                    caps.store().delete(&key, |result| {
                                        Event::SessionErased(Box::new(result))
                                    });
                                }
                                model.state = AppState::Login;
                            }
                        },
                        None => {
                            model.state = AppState::Login;
                        }
                    }
                    caps.render().render();
                }

                Event::LoginSubmitted { email, password } => {
                    let email = email.trim().to_string();
                    if email.is_empty() || password.is_empty() {
                        model.set_error(AppError::new(
                            ErrorKind::Validation,
                            "Email and password are required",
                        ));
                        caps.render().render();
                        return;
                    }
                    let Some(endpoints) = &model.endpoints else {
                        model.set_error(AppError::new(
                            ErrorKind::InvalidState,
                            "Startup configuration missing",
                        ));
                        caps.render().render();
                        return;
                    };
                    match api::login_request(endpoints, &email, &SecretString::new(password)) {
                        Ok(request) => {
                            model.login_in_flight = true;
                            model.clear_error();
                            caps.http().send(request, |result| {
                                Event::LoginResponse(Box::new(result))
                            });
                        }
                        Err(e) => model.set_error(e.into()),
                    }
                    caps.render().render();
                }

                Event::LoginResponse(result) => {
                    model.login_in_flight = false;
                    match Self::check(*result) {
                        Ok(response) => match response.json::<LoginResponseBody>() {
                            Ok(body) => {
                                let Some(endpoints) = model.endpoints.clone() else {
                                    return;
                                };
                                let context = SessionContext::new(
                                    endpoints,
                                    SecretString::new(body.token),
                                    body.operator,
                                );
                                info!(operator = %context.operator().id, "login succeeded");
                                model.session = Some(context);
                                model.clear_error();
                                Self::persist_snapshot(model, caps);
                                Self::enter_ready(model, caps);
                                caps.render().render();
                            }
                            Err(e) => {
                                model.set_error(AppError::from(e));
                                caps.render().render();
                            }
                        },
                        Err(error) => {
                            // A 401 here is wrong credentials, not an
                            // expired session.
                            model.set_error(error);
                            caps.render().render();
                        }
                    }
                }

                Event::SnapshotPersisted(result) => {
                    if let Err(e) = *result {
                        warn!("failed to persist session snapshot: {e}");
                    }
                }

                Event::LogoutRequested => {
                    if let Some(session) = &model.session {
                        caps.channel()
                            .presence(session.operator().id.clone(), PresenceStatus::Offline);
                    }
                    caps.channel().close();
                    if let Some(key) = snapshot_store_key() {
                        caps.store().delete(&key, |result| {
                            Event::SessionErased(Box::new(result))
                        });
                    }
                    model.reset_session_state();
                    info!("logged out");
                    caps.render().render();
                }

                Event::SessionErased(result) => {
                    if let Err(e) = *result {
                        warn!("failed to erase session snapshot: {e}");
                    }
                }

                Event::ReconnectRequested => {
                    if !model.channel.phase().can_reconnect_manually() {
                        debug!("manual reconnect ignored outside GaveUp");
                        return;
                    }
                    let epoch = model.channel.begin_connect();
                    Self::open_channel(model, caps, epoch);
                    caps.render().render();
                }

                Event::ChannelDelivery { epoch, result } => match *result {
                    Ok(event) => self.handle_channel_event(model, caps, epoch, event),
                    Err(e) => {
                        if e.is_auth_rejected() {
                            Self::expire_session(model, caps);
                            return;
                        }
                        warn!(epoch, "channel error: {e}");
                        self.handle_connection_loss(model, caps, epoch);
                    }
                },

                Event::RetryTimerElapsed(TimerOutput::Elapsed { id }) => {
                    if !model.network_online {
                        debug!(id, "retry timer fired while offline, staying parked");
                        return;
                    }
                    if let Some(epoch) = model.channel.retry_now(id) {
                        Self::open_channel(model, caps, epoch);
                        caps.render().render();
                    }
                }

                Event::NetworkStatusChanged { online } => {
                    let was_online = model.network_online;
                    model.network_online = online;
                    if online && !was_online {
                        if let ChannelPhase::RetryScheduled { delay_ms, .. } =
                            model.channel.phase()
                        {
                            info!(delay_ms, "back online, resuming channel reconnect");
                            caps.timer().after(
                                model.channel.epoch(),
                                delay_ms,
                                Event::RetryTimerElapsed,
                            );
                        }
                    }
                    caps.render().render();
                }

                Event::TabSelected { kind } => {
                    if model.active_tab != kind {
                        model.active_tab = kind;
                        // Tab switch drops the other kind's selection and
                        // its buffer wholesale.
                        model.clear_selection();
                        caps.render().render();
                    }
                }

                Event::TicketSelected { kind, ticket_id } => {
                    if !model.queue(kind).contains(&ticket_id) {
                        warn!(id = %ticket_id, "selected ticket is not in the active list");
                        return;
                    }
                    let Some(session) = model.session.clone() else {
                        return;
                    };
                    model.active_tab = kind;
                    let fetch_id = model.select_ticket(kind, ticket_id.clone());
                    caps.channel().join(ticket_id.clone());
                    match api::history_request(&session, kind, &ticket_id) {
                        Ok(request) => caps.http().send(request, move |result| {
                            Event::HistoryResponse {
                                fetch_id,
                                result: Box::new(result),
                            }
                        }),
                        Err(e) => {
                            if let Some(selection) = model.selection.as_mut() {
                                selection.history_loading = false;
                            }
                            model.set_error(e.into());
                        }
                    }
                    caps.render().render();
                }

                Event::TicketDeselected => {
                    model.clear_selection();
                    caps.render().render();
                }

                Event::TicketsResponse { kind, result } => match Self::check(*result) {
                    Ok(response) => match response.json::<Vec<SupportTicket>>() {
                        Ok(tickets) => {
                            model.queue_mut(kind).replace_all(tickets);
                            caps.render().render();
                        }
                        Err(e) => Self::fail_request(model, caps, e.into()),
                    },
                    Err(error) => Self::fail_request(model, caps, error),
                },

                Event::HistoryResponse { fetch_id, result } => {
                    if fetch_id != model.history_generation {
                        debug!(
                            fetch_id,
                            current = model.history_generation,
                            "ignoring stale history response"
                        );
                        return;
                    }
                    if let Some(selection) = model.selection.as_mut() {
                        selection.history_loading = false;
                    }
                    match Self::check(*result) {
                        Ok(response) => match response.json::<Vec<MessageEvent>>() {
                            Ok(events) => {
                                if let Some(selection) = model.selection.as_mut() {
                                    selection.buffer.seed_history(events);
                                }
                                caps.render().render();
                            }
                            Err(e) => Self::fail_request(model, caps, e.into()),
                        },
                        Err(error) => Self::fail_request(model, caps, error),
                    }
                }

                Event::MessageDraftChanged { text } => {
                    if let Some(selection) = model.selection.as_mut() {
                        selection.draft = text;
                        caps.render().render();
                    }
                }

                Event::SendMessageRequested => {
                    let Some(selection) = &model.selection else {
                        model.set_error(AppError::new(
                            ErrorKind::Validation,
                            "Select a ticket before sending a message",
                        ));
                        caps.render().render();
                        return;
                    };
                    let text = selection.draft.trim().to_string();
                    let kind = selection.kind;
                    let ticket_id = selection.ticket_id.clone();
                    if text.is_empty() {
                        model.set_error(AppError::new(
                            ErrorKind::Validation,
                            "Message cannot be empty",
                        ));
                        caps.render().render();
                        return;
                    }
                    if text.chars().count() > MAX_MESSAGE_CHARS {
                        model.set_error(AppError::new(
                            ErrorKind::Validation,
                            format!("Message exceeds {MAX_MESSAGE_CHARS} characters"),
                        ));
                        caps.render().render();
                        return;
                    }
                    let Some(session) = model.session.clone() else {
                        return;
                    };
                    let message = ChatMessage::local(
                        ticket_id.clone(),
                        session.operator().id.clone(),
                        text.clone(),
                        get_current_time_ms(),
                    );
                    let client_ref = message.id.clone();
                    match api::post_message_request(&session, kind, &ticket_id, &client_ref, &text)
                    {
                        Ok(request) => {
                            if let Some(selection) = model.selection.as_mut() {
                                selection.buffer.append_local(message);
                                selection.draft.clear();
                            }
                            let reference = client_ref;
                            caps.http().send(request, move |result| {
                                Event::MessageSendResponse {
                                    client_ref: reference,
                                    result: Box::new(result),
                                }
                            });
                        }
                        Err(e) => model.set_error(e.into()),
                    }
                    caps.render().render();
                }

                Event::MessageSendResponse { client_ref, result } => {
                    match Self::check(*result) {
                        Ok(response) => match response.json::<SendMessageResponseBody>() {
                            Ok(body) => {
                                if let Some(selection) = model.selection.as_mut() {
                                    selection.buffer.mark_sent(
                                        &client_ref,
                                        body.seq,
                                        body.sent_at_ms,
                                    );
                                }
                                caps.render().render();
                            }
                            Err(e) => {
                                if let Some(selection) = model.selection.as_mut() {
                                    selection.buffer.mark_failed(&client_ref);
                                }
                                Self::fail_request(model, caps, e.into());
                            }
                        },
                        Err(error) => {
                            if let Some(selection) = model.selection.as_mut() {
                                selection.buffer.mark_failed(&client_ref);
                            }
                            Self::fail_request(model, caps, error);
                        }
                    }
                }

                Event::ResolveNotesChanged { text } => {
                    if let Some(selection) = model.selection.as_mut() {
                        selection.resolve_notes = text;
                        caps.render().render();
                    }
                }

                Event::ResolveRequested => {
                    let Some(selection) = &model.selection else {
                        model.set_error(AppError::new(
                            ErrorKind::Validation,
                            "Select a ticket before resolving",
                        ));
                        caps.render().render();
                        return;
                    };
                    let notes = selection.resolve_notes.trim().to_string();
                    let kind = selection.kind;
                    let ticket_id = selection.ticket_id.clone();
                    if notes.is_empty() {
                        model.set_error(AppError::new(
                            ErrorKind::Validation,
                            "Resolution notes are required",
                        ));
                        caps.render().render();
                        return;
                    }
                    let Some(session) = model.session.clone() else {
                        return;
                    };
                    match api::resolve_request(&session, kind, &ticket_id, &notes) {
                        Ok(request) => {
                            let id = ticket_id;
                            caps.http().send(request, move |result| {
                                Event::ResolveResponse {
                                    kind,
                                    ticket_id: id,
                                    result: Box::new(result),
                                }
                            });
                        }
                        Err(e) => {
                            model.set_error(e.into());
                            caps.render().render();
                        }
                    }
                }

                Event::ResolveResponse {
                    kind,
                    ticket_id,
                    result,
                } => match Self::check(*result) {
                    Ok(_) => {
                        model.queue_mut(kind).remove(&ticket_id);
                        if model.selected_ticket_id() == Some(&ticket_id) {
                            model.clear_selection();
                        }
                        model.show_toast("Ticket resolved", ToastKind::Success);
                        caps.render().render();
                    }
                    Err(error) => Self::fail_request(model, caps, error),
                },

                Event::SectionSelected { section } => {
                    model.active_section = section;
                    if matches!(
                        model.directory.status(section),
                        LoadStatus::NotLoaded | LoadStatus::Failed { .. }
                    ) {
                        Self::begin_section_load(model, caps, section);
                    }
                    caps.render().render();
                }

                Event::SectionRefreshRequested { section } => {
                    Self::begin_section_load(model, caps, section);
                    caps.render().render();
                }

                Event::SectionResponse {
                    section,
                    epoch,
                    result,
                } => match Self::check(*result) {
                    Ok(response) => match Self::decode_section(section, &response) {
                        Ok(payload) => {
                            model
                                .directory
                                .complete(epoch, payload, get_current_time_ms());
                            caps.render().render();
                        }
                        Err(e) => {
                            model
                                .directory
                                .fail(section, epoch, e.user_facing_message());
                            Self::fail_request(model, caps, e);
                        }
                    },
                    Err(error) => {
                        model
                            .directory
                            .fail(section, epoch, error.user_facing_message());
                        Self::fail_request(model, caps, error);
                    }
                },

                Event::CommandRequested(command) => {
                    if let Err(e) = command.validate() {
                        model.set_error(e.into());
                        caps.render().render();
                        return;
                    }
                    let Some(session) = model.session.clone() else {
                        return;
                    };
                    match api::command_request(&session, &command) {
                        Ok(request) => {
                            caps.http().send(request, move |result| {
                                Event::CommandResponse {
                                    command,
                                    result: Box::new(result),
                                }
                            });
                        }
                        Err(e) => {
                            model.set_error(e.into());
                            caps.render().render();
                        }
                    }
                }

                Event::CommandResponse { command, result } => match Self::check(*result) {
                    Ok(_) => {
                        model.show_toast(command.success_message(), ToastKind::Success);
                        Self::begin_section_load(model, caps, command.section());
                        caps.render().render();
                    }
                    Err(error) => Self::fail_request(model, caps, error),
                },

                Event::DismissError => {
                    model.clear_error();
                    caps.render().render();
                }

                Event::DismissToast => {
                    model.clear_toast();
                    caps.render().render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let now_ms = model.view_timestamp_ms;

            let state = match model.state {
                AppState::Booting => ViewState::Loading,

                AppState::Login => ViewState::Login {
                    submitting: model.login_in_flight,
                },

                AppState::Ready => {
                    let selected = model.selected_ticket_id();
                    ViewState::Ready {
                        connection: Self::build_connection(model),
                        active_tab: model.active_tab,
                        customer_tickets: Self::build_ticket_items(
                            &model.customer_tickets,
                            selected,
                            now_ms,
                        ),
                        driver_tickets: Self::build_ticket_items(
                            &model.driver_tickets,
                            selected,
                            now_ms,
                        ),
                        conversation: Self::build_conversation(model, now_ms),
                        active_section: model.active_section,
                        section: Self::build_section_view(model, now_ms),
                    }
                }
            };

            ViewModel {
                state,
                error: model.active_error.as_ref().map(UserFacingError::from),
                toast: model.active_toast.as_ref().map(ToastView::from),
                is_authenticated: model.is_authenticated(),
                operator_name: model
                    .session
                    .as_ref()
                    .map(|s| s.operator().name.clone()),
            }
        }
    }
}
