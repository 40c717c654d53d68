use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_KEY_LENGTH: usize = 256;
pub const MAX_VALUE_BYTES: usize = 64 * 1024;

/// Namespaced storage key. The raw form handed to the shell is
/// `namespace:key`, e.g. `session:operator_v1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey {
    namespace: KeyNamespace,
    key: String,
}

impl StoreKey {
    pub fn new(namespace: KeyNamespace, key: impl Into<String>) -> Result<Self, StoreError> {
        let key = key.into();
        Self::validate_key(&key)?;
        Ok(Self { namespace, key })
    }

    #[must_use]
    pub fn raw(&self) -> String {
        format!("{}:{}", self.namespace.prefix(), self.key)
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    fn validate_key(key: &str) -> Result<(), StoreError> {
        if key.trim().is_empty() {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "key cannot be empty".into(),
            });
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(StoreError::InvalidKey {
                key: key.chars().take(50).collect(),
                reason: format!("key exceeds maximum length of {MAX_KEY_LENGTH} bytes"),
            });
        }
        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "key contains invalid characters".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyNamespace {
    Session,
    Settings,
}

impl KeyNamespace {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Settings => "settings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "snake_case")]
pub enum StoreOperation {
    Read {
        key: String,
    },
    Write {
        key: String,
        #[serde(with = "serde_bytes")]
        value: Vec<u8>,
    },
    Delete {
        key: String,
    },
}

impl Operation for StoreOperation {
    type Output = StoreResult;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StoreOutput {
    Value {
        #[serde(with = "serde_bytes")]
        value: Option<Vec<u8>>,
    },
    Written,
    Deleted,
}

impl StoreOutput {
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Self::Value { value } => value.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid key {key}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("value of {size} bytes exceeds maximum of {max}")]
    ValueTooLarge { size: usize, max: usize },

    #[error("storage failure: {message}")]
    Io { message: String },
}

pub type StoreResult = Result<StoreOutput, StoreError>;

pub struct SessionStore<Ev> {
    context: CapabilityContext<StoreOperation, Ev>,
}

impl<Ev> Capability<Ev> for SessionStore<Ev> {
    type Operation = StoreOperation;
    type MappedSelf<MappedEv> = SessionStore<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static,
    {
        SessionStore::new(self.context.map_event(f))
    }
}

impl<Ev> SessionStore<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<StoreOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn read<F>(&self, key: &StoreKey, make_event: F)
    where
        F: FnOnce(StoreResult) -> Ev + Send + 'static,
        Ev: Send,
    {
        self.request(
            StoreOperation::Read { key: key.raw() },
            make_event,
        );
    }

    pub fn write<F>(&self, key: &StoreKey, value: Vec<u8>, make_event: F)
    where
        F: FnOnce(StoreResult) -> Ev + Send + 'static,
        Ev: Send,
    {
        if value.len() > MAX_VALUE_BYTES {
            let err = StoreError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_BYTES,
            };
            self.context.update_app(make_event(Err(err)));
            return;
        }
        self.request(
            StoreOperation::Write {
                key: key.raw(),
                value,
            },
            make_event,
        );
    }

    pub fn delete<F>(&self, key: &StoreKey, make_event: F)
    where
        F: FnOnce(StoreResult) -> Ev + Send + 'static,
        Ev: Send,
    {
        self.request(
            StoreOperation::Delete { key: key.raw() },
            make_event,
        );
    }

    fn request<F>(&self, operation: StoreOperation, make_event: F)
    where
        F: FnOnce(StoreResult) -> Ev + Send + 'static,
        Ev: Send,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context.request_from_shell(operation).await;
            context.update_app(make_event(result));
        });
    }
}
