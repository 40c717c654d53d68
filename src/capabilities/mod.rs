mod channel;
mod http;
mod store;
mod timer;

pub use self::channel::{
    Channel, ChannelError, ChannelEvent, ChannelOperation, ChannelResult, PresenceStatus,
};
pub use self::http::{
    Http, HttpError, HttpHeader, HttpMethod, HttpRequest, HttpRequestBuilder, HttpResponse,
    HttpResult,
};
pub use self::store::{
    KeyNamespace, SessionStore, StoreError, StoreKey, StoreOperation, StoreOutput, StoreResult,
};
pub use self::timer::{Timer, TimerOperation, TimerOutput};

// We use Crux's built-in Render capability directly because it provides
// all necessary functionality for triggering view updates.
pub use crux_core::render::Render;

use crate::{App, Event};

pub type AppHttp = Http<Event>;
pub type AppChannel = Channel<Event>;
pub type AppStore = SessionStore<Event>;
pub type AppTimer = Timer<Event>;
pub type AppRender = Render<Event>;

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

// The Effect derive reads field types syntactically, so these are spelled
// out rather than going through the App* aliases.
#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub channel: Channel<Event>,
    pub store: SessionStore<Event>,
    pub timer: Timer<Event>,
    pub render: Render<Event>,
}

impl Capabilities {
    #[must_use]
    pub fn http(&self) -> &AppHttp {
        &self.http
    }

    #[must_use]
    pub fn channel(&self) -> &AppChannel {
        &self.channel
    }

    #[must_use]
    pub fn store(&self) -> &AppStore {
        &self.store
    }

    #[must_use]
    pub fn timer(&self) -> &AppTimer {
        &self.timer
    }

    #[must_use]
    pub fn render(&self) -> &AppRender {
        &self.render
    }
}
