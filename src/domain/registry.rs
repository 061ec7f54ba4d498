//! Per-context records with a secondary index by OBS URL.
//!
//! [`ContextRegistry`] is the only store of context state. The URL index is
//! maintained incrementally on every configuration change so that status
//! fan-out to contexts sharing a URL never scans the whole map.

use std::collections::{BTreeSet, HashMap};

use super::session::{Session, SessionKey};
use super::settings::ContextConfig;
use super::ContextId;

/// Everything the plugin knows about one context.
#[derive(Debug)]
pub struct ContextRecord {
    config: ContextConfig,
    /// Action identifier the context was created with, echoed back to the
    /// settings editor.
    pub action: Option<String>,
    /// Whether a settings editor is showing this context.
    pub inspector_attached: bool,
    /// Current OBS connection attempt, if any.
    pub session: Option<Session>,
}

impl ContextRecord {
    /// Cached configuration.
    #[must_use]
    pub const fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Returns `true` if a session exists and is authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_authenticated)
    }
}

/// Store of all live contexts.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: HashMap<ContextId, ContextRecord>,
    by_url: HashMap<String, BTreeSet<ContextId>>,
}

impl ContextRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a context's configuration, creating the record
    /// on first sight. Returns the previous configuration.
    pub fn upsert(&mut self, context: &ContextId, config: ContextConfig) -> Option<ContextConfig> {
        let new_url = config.url.clone();
        let previous = match self.contexts.get_mut(context) {
            Some(record) => Some(std::mem::replace(&mut record.config, config)),
            None => {
                self.contexts.insert(
                    context.clone(),
                    ContextRecord {
                        config,
                        action: None,
                        inspector_attached: false,
                        session: None,
                    },
                );
                None
            }
        };

        match &previous {
            Some(old) if old.url == new_url => {}
            Some(old) => {
                self.unindex(&old.url, context);
                self.index(new_url, context);
            }
            None => self.index(new_url, context),
        }
        previous
    }

    /// Updates only the counter value. Returns the new configuration, or
    /// `None` if the context is unknown.
    pub fn set_value(&mut self, context: &ContextId, value: i64) -> Option<&ContextConfig> {
        let record = self.contexts.get_mut(context)?;
        record.config.value = value;
        Some(&record.config)
    }

    /// Removes a context and returns its record.
    pub fn remove(&mut self, context: &ContextId) -> Option<ContextRecord> {
        let record = self.contexts.remove(context)?;
        self.unindex(&record.config.url, context);
        Some(record)
    }

    /// Looks up a context.
    #[must_use]
    pub fn get(&self, context: &ContextId) -> Option<&ContextRecord> {
        self.contexts.get(context)
    }

    /// Looks up a context for mutation of its non-config state.
    pub fn get_mut(&mut self, context: &ContextId) -> Option<&mut ContextRecord> {
        self.contexts.get_mut(context)
    }

    /// Returns the session a transport event belongs to, or `None` if the
    /// context is gone or has since moved on to another attempt.
    pub fn session_for(&mut self, key: &SessionKey) -> Option<&mut Session> {
        self.contexts
            .get_mut(&key.context)?
            .session
            .as_mut()
            .filter(|s| s.id == key.session)
    }

    /// Contexts whose cached configuration uses the same URL as `context`,
    /// including `context` itself.
    #[must_use]
    pub fn sharing_url_with(&self, context: &ContextId) -> Vec<ContextId> {
        self.contexts
            .get(context)
            .and_then(|r| self.by_url.get(&r.config.url))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Iterates over all records.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ContextId, &mut ContextRecord)> {
        self.contexts.iter_mut()
    }

    /// Number of contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Returns `true` if no contexts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    fn index(&mut self, url: String, context: &ContextId) {
        self.by_url.entry(url).or_default().insert(context.clone());
    }

    fn unindex(&mut self, url: &str, context: &ContextId) {
        if let Some(set) = self.by_url.get_mut(url) {
            set.remove(context);
            if set.is_empty() {
                self.by_url.remove(url);
            }
        }
    }
}
