use std::collections::HashMap;
use std::sync::RwLock;

/// Scope a cached reply belongs to. Warm-up replies carry no user context and
/// may be served to anyone; replies generated for a user embed that user's
/// history and must stay private to the same user id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheScope {
    Shared,
    User(String),
}

/// In-memory prompt cache keyed by the exact message text within a scope.
/// Entries are never evicted or expired for the lifetime of the process.
#[derive(Default)]
pub struct PromptCache {
    entries: RwLock<HashMap<CacheScope, HashMap<String, String>>>,
}

impl PromptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: &CacheScope, message: &str) -> Option<String> {
        let entries = self.entries.read().ok()?;
        entries.get(scope)?.get(message).cloned()
    }

    pub fn put(&self, scope: CacheScope, message: impl Into<String>, reply: impl Into<String>) {
        if let Ok(mut entries) = self.entries.write() {
            entries
                .entry(scope)
                .or_default()
                .insert(message.into(), reply.into());
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|entries| entries.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
