//! Fleet directory: the read-mostly console sections backed by REST lists,
//! plus the moderation commands that act on their records.
//!
//! Each section keeps its own load epoch. A response is applied only when
//! its epoch matches the latest request for that section, so a slow refresh
//! can never clobber a newer one.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    CouponId, CustomerId, DocumentId, DriverId, HelpRequestId, NotificationId, PromotionId,
    ServiceAreaId, TripId, MAX_SECTION_ROWS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectorySection {
    Drivers,
    Customers,
    Trips,
    Documents,
    Coupons,
    ServiceAreas,
    Promotions,
    Notifications,
    HelpRequests,
}

impl DirectorySection {
    pub const ALL: [Self; 9] = [
        Self::Drivers,
        Self::Customers,
        Self::Trips,
        Self::Documents,
        Self::Coupons,
        Self::ServiceAreas,
        Self::Promotions,
        Self::Notifications,
        Self::HelpRequests,
    ];

    /// Path segment under `/api/v1/`.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Drivers => "drivers",
            Self::Customers => "customers",
            Self::Trips => "trips",
            Self::Documents => "documents",
            Self::Coupons => "coupons",
            Self::ServiceAreas => "service-areas",
            Self::Promotions => "promotions",
            Self::Notifications => "notifications",
            Self::HelpRequests => "help-requests",
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Drivers => "Drivers",
            Self::Customers => "Customers",
            Self::Trips => "Trips",
            Self::Documents => "Documents",
            Self::Coupons => "Coupons",
            Self::ServiceAreas => "Service areas",
            Self::Promotions => "Promotions",
            Self::Notifications => "Notifications",
            Self::HelpRequests => "Help requests",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    NotLoaded,
    Loading,
    Loaded,
    Failed { message: String },
}

impl LoadStatus {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// One section's remote list. Previous items stay visible while a refresh
/// is in flight; they are replaced wholesale when it lands.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCollection<T> {
    items: Vec<T>,
    status: LoadStatus,
    fetched_at_ms: Option<u64>,
    epoch: u64,
}

impl<T> Default for RemoteCollection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            status: LoadStatus::NotLoaded,
            fetched_at_ms: None,
            epoch: 0,
        }
    }
}

impl<T> RemoteCollection<T> {
    /// Starts a load and returns the epoch the response must echo.
    pub fn begin(&mut self) -> u64 {
        self.epoch += 1;
        self.status = LoadStatus::Loading;
        self.epoch
    }

    pub fn complete(&mut self, epoch: u64, mut items: Vec<T>, now_ms: u64) -> bool {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "ignoring stale section load");
            return false;
        }
        items.truncate(MAX_SECTION_ROWS);
        self.items = items;
        self.status = LoadStatus::Loaded;
        self.fetched_at_ms = Some(now_ms);
        true
    }

    pub fn fail(&mut self, epoch: u64, message: String) -> bool {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "ignoring stale section failure");
            return false;
        }
        self.status = LoadStatus::Failed { message };
        true
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub const fn status(&self) -> &LoadStatus {
        &self.status
    }

    #[must_use]
    pub const fn fetched_at_ms(&self) -> Option<u64> {
        self.fetched_at_ms
    }

    /// Epoch of the newest load. Responses carrying anything else are stale.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Pending,
    Approved,
    Suspended,
}

impl DriverStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Suspended => "suspended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverRecord {
    pub id: DriverId,
    pub name: String,
    pub phone: String,
    pub status: DriverStatus,
    pub rating: Option<f64>,
    pub total_trips: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub id: CustomerId,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub blocked: bool,
    pub total_trips: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Requested,
    Accepted,
    Started,
    Completed,
    Cancelled,
}

impl TripStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Accepted => "accepted",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRecord {
    pub id: TripId,
    pub customer_name: String,
    pub driver_name: Option<String>,
    pub status: TripStatus,
    pub fare: Option<f64>,
    pub requested_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub driver_id: DriverId,
    pub driver_name: String,
    pub kind: String,
    pub status: ReviewStatus,
    pub submitted_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponRecord {
    pub id: CouponId,
    pub code: String,
    pub discount_percent: u32,
    pub active: bool,
    pub expires_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAreaRecord {
    pub id: ServiceAreaId,
    pub name: String,
    pub city: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRecord {
    pub id: PromotionId,
    pub title: String,
    pub body: String,
    pub starts_at_ms: u64,
    pub ends_at_ms: u64,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub title: String,
    pub body: String,
    pub audience: String,
    pub sent_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpRequestStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpRequestRecord {
    pub id: HelpRequestId,
    pub requester_name: String,
    pub subject: String,
    pub status: HelpRequestStatus,
    pub opened_at_ms: u64,
}

/// Decoded body of a section list response.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionPayload {
    Drivers(Vec<DriverRecord>),
    Customers(Vec<CustomerRecord>),
    Trips(Vec<TripRecord>),
    Documents(Vec<DocumentRecord>),
    Coupons(Vec<CouponRecord>),
    ServiceAreas(Vec<ServiceAreaRecord>),
    Promotions(Vec<PromotionRecord>),
    Notifications(Vec<NotificationRecord>),
    HelpRequests(Vec<HelpRequestRecord>),
}

impl SectionPayload {
    #[must_use]
    pub const fn section(&self) -> DirectorySection {
        match self {
            Self::Drivers(_) => DirectorySection::Drivers,
            Self::Customers(_) => DirectorySection::Customers,
            Self::Trips(_) => DirectorySection::Trips,
            Self::Documents(_) => DirectorySection::Documents,
            Self::Coupons(_) => DirectorySection::Coupons,
            Self::ServiceAreas(_) => DirectorySection::ServiceAreas,
            Self::Promotions(_) => DirectorySection::Promotions,
            Self::Notifications(_) => DirectorySection::Notifications,
            Self::HelpRequests(_) => DirectorySection::HelpRequests,
        }
    }
}

/// Flat row shape the shell renders for any section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRow {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub badge: Option<String>,
}

trait TabularRecord {
    fn row(&self) -> DirectoryRow;
}

impl TabularRecord for DriverRecord {
    fn row(&self) -> DirectoryRow {
        let badge = match self.status {
            DriverStatus::Approved => None,
            status => Some(status.label().to_string()),
        };
        DirectoryRow {
            id: self.id.as_str().to_string(),
            title: self.name.clone(),
            subtitle: format!("{} - {} trips", self.phone, self.total_trips),
            badge,
        }
    }
}

impl TabularRecord for CustomerRecord {
    fn row(&self) -> DirectoryRow {
        DirectoryRow {
            id: self.id.as_str().to_string(),
            title: self.name.clone(),
            subtitle: self.email.clone(),
            badge: self.blocked.then(|| "blocked".to_string()),
        }
    }
}

impl TabularRecord for TripRecord {
    fn row(&self) -> DirectoryRow {
        let driver = self.driver_name.as_deref().unwrap_or("unassigned");
        DirectoryRow {
            id: self.id.as_str().to_string(),
            title: self.customer_name.clone(),
            subtitle: format!("{} - {driver}", self.status.label()),
            badge: matches!(self.status, TripStatus::Cancelled)
                .then(|| "cancelled".to_string()),
        }
    }
}

impl TabularRecord for DocumentRecord {
    fn row(&self) -> DirectoryRow {
        let badge = match self.status {
            ReviewStatus::Approved => None,
            status => Some(status.label().to_string()),
        };
        DirectoryRow {
            id: self.id.as_str().to_string(),
            title: self.driver_name.clone(),
            subtitle: self.kind.clone(),
            badge,
        }
    }
}

impl TabularRecord for CouponRecord {
    fn row(&self) -> DirectoryRow {
        DirectoryRow {
            id: self.id.as_str().to_string(),
            title: self.code.clone(),
            subtitle: format!("{}% off", self.discount_percent),
            badge: (!self.active).then(|| "inactive".to_string()),
        }
    }
}

impl TabularRecord for ServiceAreaRecord {
    fn row(&self) -> DirectoryRow {
        DirectoryRow {
            id: self.id.as_str().to_string(),
            title: self.name.clone(),
            subtitle: self.city.clone(),
            badge: (!self.active).then(|| "inactive".to_string()),
        }
    }
}

impl TabularRecord for PromotionRecord {
    fn row(&self) -> DirectoryRow {
        DirectoryRow {
            id: self.id.as_str().to_string(),
            title: self.title.clone(),
            subtitle: self.body.clone(),
            badge: (!self.active).then(|| "ended".to_string()),
        }
    }
}

impl TabularRecord for NotificationRecord {
    fn row(&self) -> DirectoryRow {
        DirectoryRow {
            id: self.id.as_str().to_string(),
            title: self.title.clone(),
            subtitle: self.audience.clone(),
            badge: None,
        }
    }
}

impl TabularRecord for HelpRequestRecord {
    fn row(&self) -> DirectoryRow {
        DirectoryRow {
            id: self.id.as_str().to_string(),
            title: self.subject.clone(),
            subtitle: self.requester_name.clone(),
            badge: matches!(self.status, HelpRequestStatus::Open)
                .then(|| "open".to_string()),
        }
    }
}

/// All nine section collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryState {
    drivers: RemoteCollection<DriverRecord>,
    customers: RemoteCollection<CustomerRecord>,
    trips: RemoteCollection<TripRecord>,
    documents: RemoteCollection<DocumentRecord>,
    coupons: RemoteCollection<CouponRecord>,
    service_areas: RemoteCollection<ServiceAreaRecord>,
    promotions: RemoteCollection<PromotionRecord>,
    notifications: RemoteCollection<NotificationRecord>,
    help_requests: RemoteCollection<HelpRequestRecord>,
}

impl DirectoryState {
    pub fn begin(&mut self, section: DirectorySection) -> u64 {
        match section {
            DirectorySection::Drivers => self.drivers.begin(),
            DirectorySection::Customers => self.customers.begin(),
            DirectorySection::Trips => self.trips.begin(),
            DirectorySection::Documents => self.documents.begin(),
            DirectorySection::Coupons => self.coupons.begin(),
            DirectorySection::ServiceAreas => self.service_areas.begin(),
            DirectorySection::Promotions => self.promotions.begin(),
            DirectorySection::Notifications => self.notifications.begin(),
            DirectorySection::HelpRequests => self.help_requests.begin(),
        }
    }

    pub fn complete(&mut self, epoch: u64, payload: SectionPayload, now_ms: u64) -> bool {
        match payload {
            SectionPayload::Drivers(items) => self.drivers.complete(epoch, items, now_ms),
            SectionPayload::Customers(items) => self.customers.complete(epoch, items, now_ms),
            SectionPayload::Trips(items) => self.trips.complete(epoch, items, now_ms),
            SectionPayload::Documents(items) => self.documents.complete(epoch, items, now_ms),
            SectionPayload::Coupons(items) => self.coupons.complete(epoch, items, now_ms),
            SectionPayload::ServiceAreas(items) => {
                self.service_areas.complete(epoch, items, now_ms)
            }
            SectionPayload::Promotions(items) => self.promotions.complete(epoch, items, now_ms),
            SectionPayload::Notifications(items) => {
                self.notifications.complete(epoch, items, now_ms)
            }
            SectionPayload::HelpRequests(items) => {
                self.help_requests.complete(epoch, items, now_ms)
            }
        }
    }

    pub fn fail(&mut self, section: DirectorySection, epoch: u64, message: String) -> bool {
        match section {
            DirectorySection::Drivers => self.drivers.fail(epoch, message),
            DirectorySection::Customers => self.customers.fail(epoch, message),
            DirectorySection::Trips => self.trips.fail(epoch, message),
            DirectorySection::Documents => self.documents.fail(epoch, message),
            DirectorySection::Coupons => self.coupons.fail(epoch, message),
            DirectorySection::ServiceAreas => self.service_areas.fail(epoch, message),
            DirectorySection::Promotions => self.promotions.fail(epoch, message),
            DirectorySection::Notifications => self.notifications.fail(epoch, message),
            DirectorySection::HelpRequests => self.help_requests.fail(epoch, message),
        }
    }

    #[must_use]
    pub fn status(&self, section: DirectorySection) -> &LoadStatus {
        match section {
            DirectorySection::Drivers => self.drivers.status(),
            DirectorySection::Customers => self.customers.status(),
            DirectorySection::Trips => self.trips.status(),
            DirectorySection::Documents => self.documents.status(),
            DirectorySection::Coupons => self.coupons.status(),
            DirectorySection::ServiceAreas => self.service_areas.status(),
            DirectorySection::Promotions => self.promotions.status(),
            DirectorySection::Notifications => self.notifications.status(),
            DirectorySection::HelpRequests => self.help_requests.status(),
        }
    }

    #[must_use]
    pub fn epoch(&self, section: DirectorySection) -> u64 {
        match section {
            DirectorySection::Drivers => self.drivers.epoch(),
            DirectorySection::Customers => self.customers.epoch(),
            DirectorySection::Trips => self.trips.epoch(),
            DirectorySection::Documents => self.documents.epoch(),
            DirectorySection::Coupons => self.coupons.epoch(),
            DirectorySection::ServiceAreas => self.service_areas.epoch(),
            DirectorySection::Promotions => self.promotions.epoch(),
            DirectorySection::Notifications => self.notifications.epoch(),
            DirectorySection::HelpRequests => self.help_requests.epoch(),
        }
    }

    #[must_use]
    pub fn fetched_at_ms(&self, section: DirectorySection) -> Option<u64> {
        match section {
            DirectorySection::Drivers => self.drivers.fetched_at_ms(),
            DirectorySection::Customers => self.customers.fetched_at_ms(),
            DirectorySection::Trips => self.trips.fetched_at_ms(),
            DirectorySection::Documents => self.documents.fetched_at_ms(),
            DirectorySection::Coupons => self.coupons.fetched_at_ms(),
            DirectorySection::ServiceAreas => self.service_areas.fetched_at_ms(),
            DirectorySection::Promotions => self.promotions.fetched_at_ms(),
            DirectorySection::Notifications => self.notifications.fetched_at_ms(),
            DirectorySection::HelpRequests => self.help_requests.fetched_at_ms(),
        }
    }

    #[must_use]
    pub fn rows(&self, section: DirectorySection) -> Vec<DirectoryRow> {
        fn collect<T: TabularRecord>(items: &[T]) -> Vec<DirectoryRow> {
            items.iter().map(TabularRecord::row).collect()
        }
        match section {
            DirectorySection::Drivers => collect(self.drivers.items()),
            DirectorySection::Customers => collect(self.customers.items()),
            DirectorySection::Trips => collect(self.trips.items()),
            DirectorySection::Documents => collect(self.documents.items()),
            DirectorySection::Coupons => collect(self.coupons.items()),
            DirectorySection::ServiceAreas => collect(self.service_areas.items()),
            DirectorySection::Promotions => collect(self.promotions.items()),
            DirectorySection::Notifications => collect(self.notifications.items()),
            DirectorySection::HelpRequests => collect(self.help_requests.items()),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("a reason is required to {action}")]
    MissingReason { action: &'static str },
}

/// Moderation actions submitted from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DirectoryCommand {
    ApproveDocument { id: DocumentId },
    RejectDocument { id: DocumentId, reason: String },
    SuspendDriver { id: DriverId, reason: String },
    ReinstateDriver { id: DriverId },
    BlockCustomer { id: CustomerId },
    UnblockCustomer { id: CustomerId },
    DeactivateCoupon { id: CouponId },
    RetireServiceArea { id: ServiceAreaId },
    EndPromotion { id: PromotionId },
    CloseHelpRequest { id: HelpRequestId },
}

impl DirectoryCommand {
    #[must_use]
    pub const fn section(&self) -> DirectorySection {
        match self {
            Self::ApproveDocument { .. } | Self::RejectDocument { .. } => {
                DirectorySection::Documents
            }
            Self::SuspendDriver { .. } | Self::ReinstateDriver { .. } => DirectorySection::Drivers,
            Self::BlockCustomer { .. } | Self::UnblockCustomer { .. } => {
                DirectorySection::Customers
            }
            Self::DeactivateCoupon { .. } => DirectorySection::Coupons,
            Self::RetireServiceArea { .. } => DirectorySection::ServiceAreas,
            Self::EndPromotion { .. } => DirectorySection::Promotions,
            Self::CloseHelpRequest { .. } => DirectorySection::HelpRequests,
        }
    }

    /// Commands that take a reason refuse to run without one.
    pub fn validate(&self) -> Result<(), CommandError> {
        match self {
            Self::RejectDocument { reason, .. } if reason.trim().is_empty() => {
                Err(CommandError::MissingReason {
                    action: "reject a document",
                })
            }
            Self::SuspendDriver { reason, .. } if reason.trim().is_empty() => {
                Err(CommandError::MissingReason {
                    action: "suspend a driver",
                })
            }
            _ => Ok(()),
        }
    }

    #[must_use]
    pub const fn success_message(&self) -> &'static str {
        match self {
            Self::ApproveDocument { .. } => "Document approved",
            Self::RejectDocument { .. } => "Document rejected",
            Self::SuspendDriver { .. } => "Driver suspended",
            Self::ReinstateDriver { .. } => "Driver reinstated",
            Self::BlockCustomer { .. } => "Customer blocked",
            Self::UnblockCustomer { .. } => "Customer unblocked",
            Self::DeactivateCoupon { .. } => "Coupon deactivated",
            Self::RetireServiceArea { .. } => "Service area retired",
            Self::EndPromotion { .. } => "Promotion ended",
            Self::CloseHelpRequest { .. } => "Help request closed",
        }
    }
}
