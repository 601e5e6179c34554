use crate::domain::{ConnectionKind, DomainResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

/// Opaque authentication material for one application
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credential {
    values: BTreeMap<String, String>,
}

impl Credential {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Credential {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

/// Trait for loading credentials for an application
///
/// Implementations fail with DomainError::Authentication when the backing
/// file or environment variable is absent or malformed.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn load(&self, application_name: &str, kind: ConnectionKind)
        -> DomainResult<Credential>;
}
