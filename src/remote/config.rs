//! Remote configuration as read from and written to the store.

use serde::{Deserialize, Serialize};

/// Persisted shape of one named remote.
///
/// `fetch` and `push` hold refspec strings in their configured order; they
/// are parsed on load and rendered back on save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: String,
    pub push_url: Option<String>,
    pub fetch: Vec<String>,
    pub push: Vec<String>,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}
