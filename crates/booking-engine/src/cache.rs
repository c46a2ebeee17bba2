//! Explicit compiled-template cache for batch generation.
//!
//! Owner-scoped keys and a bounded TTL; the cache is passed into the
//! generator by the caller, never held as ambient global state. Owners
//! editing a template must invalidate their entries — the TTL is the
//! backstop, not the primary freshness mechanism.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::slots::{compile, CompiledTemplate};
use crate::template::WeeklyTemplate;

struct CacheEntry {
    compiled: CompiledTemplate,
    cached_at: DateTime<Utc>,
}

/// TTL-bounded cache of compiled templates, keyed by `(owner, event)`.
pub struct TemplateCache {
    ttl: Duration,
    entries: HashMap<(String, String), CacheEntry>,
}

impl TemplateCache {
    pub fn new(ttl: Duration) -> Self {
        TemplateCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Return the cached compilation of `template` if fresh, compiling and
    /// caching it otherwise.
    pub(crate) fn get_or_compile(
        &mut self,
        template: &WeeklyTemplate,
        now: DateTime<Utc>,
    ) -> Result<CompiledTemplate> {
        let key = (template.owner.clone(), template.event.clone());
        if let Some(entry) = self.entries.get(&key) {
            if now - entry.cached_at < self.ttl {
                return Ok(entry.compiled.clone());
            }
        }
        let compiled = compile(template)?;
        self.entries.insert(
            key,
            CacheEntry {
                compiled: compiled.clone(),
                cached_at: now,
            },
        );
        Ok(compiled)
    }

    /// Drop every cached entry belonging to `owner`.
    pub fn invalidate_owner(&mut self, owner: &str) {
        self.entries.retain(|(entry_owner, _), _| entry_owner != owner);
    }

    /// Drop one owner's entry for one template.
    pub fn invalidate(&mut self, owner: &str, event: &str) {
        self.entries
            .remove(&(owner.to_string(), event.to_string()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
