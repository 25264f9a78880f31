//! Remote session: identity, refspec lists, and operation entry points.
//!
//! A session is bound to one [`Store`] for its lifetime. The transport is
//! handed in per operation. Operations block the calling thread; a session
//! supports one operation at a time (external serialization is the
//! caller's business).

use std::fmt;

use tracing::debug;

use crate::provider::{Store, Transport};
use crate::refspec::{Direction, Refspec};
use crate::remote::callbacks::{NotifySink, TransferStats};
use crate::remote::config::RemoteConfig;
use crate::remote::error::RemoteError;
use crate::remote::{fetch, push};

/// The fetch refspec a freshly created remote gets.
pub fn default_fetch_refspec(name: &str) -> String {
    format!("+refs/heads/*:refs/remotes/{name}/*")
}

/// A configured remote plus the store it is bound to.
pub struct Session<S: Store> {
    store: S,
    name: String,
    url: String,
    push_url: Option<String>,
    fetch_refspecs: Vec<Refspec>,
    push_refspecs: Vec<Refspec>,
    stats: TransferStats,
    /// Transient sessions skip persistence; `save` is a no-op.
    transient: bool,
}

impl<S: Store> Session<S> {
    /// Load an existing named remote from the store's configuration.
    pub fn load(store: S, name: &str) -> Result<Self, RemoteError> {
        let config = store
            .read_config(name)
            .map_err(RemoteError::Persistence)?
            .ok_or_else(|| RemoteError::RemoteNotFound(name.to_string()))?;

        let fetch_refspecs = parse_list(&config.fetch, Direction::Fetch)
            .map_err(|e| config_error(name, "fetch", e))?;
        let push_refspecs = parse_list(&config.push, Direction::Push)
            .map_err(|e| config_error(name, "push", e))?;
        if config.url.is_empty() {
            return Err(RemoteError::Config {
                field: format!("remote.{name}.url"),
                reason: "empty".to_string(),
            });
        }

        Ok(Self {
            store,
            name: name.to_string(),
            url: config.url,
            push_url: config.push_url,
            fetch_refspecs,
            push_refspecs,
            stats: TransferStats::default(),
            transient: false,
        })
    }

    /// Create a new named remote with the default fetch refspec and
    /// persist it.
    pub fn create(store: S, name: &str, url: &str) -> Result<Self, RemoteError> {
        if store
            .read_config(name)
            .map_err(RemoteError::Persistence)?
            .is_some()
        {
            return Err(RemoteError::NameConflict(name.to_string()));
        }
        let mut session = Self::in_memory(store, name, url)?;
        session.transient = false;
        session.add_fetch(&default_fetch_refspec(name))?;
        session.save()?;
        Ok(session)
    }

    /// Create a transient session that is never persisted; `save` becomes
    /// a no-op.
    pub fn in_memory(store: S, name: &str, url: &str) -> Result<Self, RemoteError> {
        if url.is_empty() {
            return Err(RemoteError::Config {
                field: "url".to_string(),
                reason: "empty".to_string(),
            });
        }
        Ok(Self {
            store,
            name: name.to_string(),
            url: url.to_string(),
            push_url: None,
            fetch_refspecs: Vec::new(),
            push_refspecs: Vec::new(),
            stats: TransferStats::default(),
            transient: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn push_url(&self) -> Option<&str> {
        self.push_url.as_deref()
    }

    /// The url push operations use: `push_url` when set, else `url`.
    pub fn effective_push_url(&self) -> &str {
        self.push_url.as_deref().unwrap_or(&self.url)
    }

    pub fn set_url(&mut self, url: &str) -> Result<(), RemoteError> {
        if url.is_empty() {
            return Err(RemoteError::Config {
                field: "url".to_string(),
                reason: "empty".to_string(),
            });
        }
        self.url = url.to_string();
        Ok(())
    }

    pub fn set_push_url(&mut self, url: &str) -> Result<(), RemoteError> {
        if url.is_empty() {
            return Err(RemoteError::Config {
                field: "push_url".to_string(),
                reason: "empty".to_string(),
            });
        }
        self.push_url = Some(url.to_string());
        Ok(())
    }

    pub fn clear_push_url(&mut self) {
        self.push_url = None;
    }

    /// Total refspec count, fetch list first.
    pub fn refspec_count(&self) -> usize {
        self.fetch_refspecs.len() + self.push_refspecs.len()
    }

    /// Refspec at `index` over the combined fetch-then-push list.
    ///
    /// The returned borrow shares the session's lifetime; refspecs never
    /// outlive the session that owns them.
    pub fn get_refspec(&self, index: usize) -> Result<&Refspec, RemoteError> {
        let count = self.refspec_count();
        self.fetch_refspecs
            .iter()
            .chain(self.push_refspecs.iter())
            .nth(index)
            .ok_or(RemoteError::IndexOutOfRange { index, count })
    }

    pub fn fetch_refspecs(&self) -> Vec<String> {
        self.fetch_refspecs.iter().map(|s| s.to_string()).collect()
    }

    pub fn push_refspecs(&self) -> Vec<String> {
        self.push_refspecs.iter().map(|s| s.to_string()).collect()
    }

    /// Replace the fetch refspec list. All-or-nothing: if any entry fails
    /// to parse, the prior list is left untouched.
    pub fn set_fetch_refspecs<I, T>(&mut self, specs: I) -> Result<(), RemoteError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let parsed = parse_iter(specs, Direction::Fetch)?;
        self.fetch_refspecs = parsed;
        Ok(())
    }

    /// Replace the push refspec list, atomically as for fetch.
    pub fn set_push_refspecs<I, T>(&mut self, specs: I) -> Result<(), RemoteError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let parsed = parse_iter(specs, Direction::Push)?;
        self.push_refspecs = parsed;
        Ok(())
    }

    pub fn add_fetch(&mut self, spec: &str) -> Result<(), RemoteError> {
        self.fetch_refspecs
            .push(Refspec::parse(spec, Direction::Fetch)?);
        Ok(())
    }

    pub fn add_push(&mut self, spec: &str) -> Result<(), RemoteError> {
        self.push_refspecs
            .push(Refspec::parse(spec, Direction::Push)?);
        Ok(())
    }

    /// Rename the remote.
    ///
    /// Fetch refspecs matching the default glob for the old name are
    /// rewritten to the new name; any other fetch refspec is left alone
    /// and its string is returned as a non-fatal warning for the caller
    /// to fix up. The new-name configuration is persisted and the old one
    /// removed.
    pub fn rename(&mut self, new_name: &str) -> Result<Vec<String>, RemoteError> {
        if new_name.is_empty() {
            return Err(RemoteError::Config {
                field: "name".to_string(),
                reason: "empty".to_string(),
            });
        }
        if self
            .store
            .read_config(new_name)
            .map_err(RemoteError::Persistence)?
            .is_some()
        {
            return Err(RemoteError::NameConflict(new_name.to_string()));
        }

        let old_default = default_fetch_refspec(&self.name);
        let new_default = default_fetch_refspec(new_name);
        let mut problems = Vec::new();
        for spec in &mut self.fetch_refspecs {
            if spec.to_string() == old_default {
                *spec = Refspec::parse(&new_default, Direction::Fetch)?;
            } else {
                problems.push(spec.to_string());
            }
        }

        let old_name = std::mem::replace(&mut self.name, new_name.to_string());
        if !self.transient {
            self.save()?;
            self.store
                .remove_config(&old_name)
                .map_err(RemoteError::Persistence)?;
        }
        debug!(old = %old_name, new = new_name, problems = problems.len(), "remote renamed");
        Ok(problems)
    }

    /// Persist name, urls, and refspec lists to the store's configuration.
    /// No-op for in-memory sessions.
    pub fn save(&mut self) -> Result<(), RemoteError> {
        if self.transient {
            return Ok(());
        }
        let config = RemoteConfig {
            url: self.url.clone(),
            push_url: self.push_url.clone(),
            fetch: self.fetch_refspecs(),
            push: self.push_refspecs(),
        };
        self.store
            .write_config(&self.name, &config)
            .map_err(RemoteError::Persistence)
    }

    /// Counters from the last successful fetch. Overwritten in place per
    /// operation; copy it out before fetching again if you need history.
    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    /// Negotiate, download, and apply tip updates. Blocks until done.
    ///
    /// Tip updates are applied individually; when a sink handler aborts,
    /// updates applied so far stay applied. The stats snapshot is only
    /// overwritten on success.
    pub fn fetch(
        &mut self,
        transport: &mut dyn Transport,
        sink: &mut NotifySink<'_>,
    ) -> Result<TransferStats, RemoteError> {
        let stats = fetch::run(
            &self.url,
            &self.fetch_refspecs,
            &mut self.store,
            transport,
            sink,
        )?;
        self.stats = stats;
        Ok(stats)
    }

    /// Push one ad-hoc refspec. Blocks until the remote's report is in.
    pub fn push(
        &mut self,
        transport: &mut dyn Transport,
        refspec: &str,
        sink: &mut NotifySink<'_>,
    ) -> Result<(), RemoteError> {
        push::run(self.effective_push_url(), refspec, transport, sink)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

// Manual impl: the store carries no Debug bound and is not interesting here.
impl<S: Store> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("push_url", &self.push_url)
            .field("refspecs", &self.refspec_count())
            .field("transient", &self.transient)
            .finish_non_exhaustive()
    }
}

fn parse_list(specs: &[String], direction: Direction) -> Result<Vec<Refspec>, RemoteError> {
    parse_iter(specs, direction)
}

fn parse_iter<I, T>(specs: I, direction: Direction) -> Result<Vec<Refspec>, RemoteError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    specs
        .into_iter()
        .map(|s| Refspec::parse(s.as_ref(), direction).map_err(RemoteError::from))
        .collect()
}

fn config_error(remote: &str, list: &str, err: RemoteError) -> RemoteError {
    RemoteError::Config {
        field: format!("remote.{remote}.{list}"),
        reason: err.to_string(),
    }
}
