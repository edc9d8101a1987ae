use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::afk::AfkMonitor;
use crate::cache::{CacheScope, PromptCache};
use crate::error::{NovaError, Result};
use crate::memory::{MemoryStore, Role, UserMemory};
use crate::providers::GeminiClient;

/// Foreground message pipeline: validation, memory, cache and the upstream
/// call, in that order. Owned by the daemon state and shared by handlers.
pub struct ChatService {
    gemini: Arc<GeminiClient>,
    memory: Arc<MemoryStore>,
    cache: Arc<PromptCache>,
    afk: Arc<AfkMonitor>,
}

impl ChatService {
    pub fn new(
        gemini: Arc<GeminiClient>,
        memory: Arc<MemoryStore>,
        cache: Arc<PromptCache>,
        afk: Arc<AfkMonitor>,
    ) -> Self {
        Self {
            gemini,
            memory,
            cache,
            afk,
        }
    }

    /// Runs one chat turn. Returns the reply text on success; the caller maps
    /// errors onto HTTP statuses. A failed memory write is logged but does not
    /// fail the turn.
    pub async fn handle_message(
        &self,
        user_id: &str,
        message: &str,
        user_info: Option<&Map<String, Value>>,
    ) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Err(NovaError::Validation("Mesaj boş".to_string()));
        }
        self.afk.touch();

        let mut memory = self.memory.load(user_id).await;
        if let Some(info) = user_info {
            memory.merge_info(info);
        }
        memory.push_turn(Role::User, message);

        let reply = match self.cached_reply(user_id, message) {
            Some(reply) => {
                debug!("cache hit for user {user_id}");
                reply
            }
            None => {
                let prompt = build_prompt(&memory, message);
                let reply = self
                    .gemini
                    .generate(&prompt, self.afk.speed_multiplier())
                    .await?;
                self.cache
                    .put(CacheScope::User(user_id.to_string()), message, reply.clone());
                reply
            }
        };

        memory.push_turn(Role::Assistant, reply.clone());
        if let Err(err) = self.memory.save(user_id, memory).await {
            error!("conversation for user {user_id} was not persisted: {err}");
        }
        Ok(reply)
    }

    // Warm-up entries carry no user context, so the shared scope is a safe
    // fallback for any user's own scope.
    fn cached_reply(&self, user_id: &str, message: &str) -> Option<String> {
        self.cache
            .get(&CacheScope::User(user_id.to_string()), message)
            .or_else(|| self.cache.get(&CacheScope::Shared, message))
    }
}

fn build_prompt(memory: &UserMemory, message: &str) -> String {
    let context = serde_json::to_string(memory).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Kullanıcıyla geçmiş konuşmalar: {context}\n\
         Kullanıcı yeni mesajı: {message}\n\
         Bu bilgilere dayanarak kişisel ve ilgili bir yanıt üret ve cevabı Türkçe ver."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    async fn keyless_service(dir: &std::path::Path) -> (ChatService, Arc<PromptCache>) {
        let config = Config::default();
        let gemini = Arc::new(GeminiClient::new(&config));
        let memory = Arc::new(MemoryStore::open(dir).await.unwrap());
        let cache = Arc::new(PromptCache::new());
        let afk = Arc::new(AfkMonitor::new(config.warm_speed_multiplier));
        let service = ChatService::new(gemini, memory, Arc::clone(&cache), afk);
        (service, cache)
    }

    #[test]
    fn prompt_embeds_memory_and_new_message() {
        let mut memory = UserMemory::default();
        memory.info.insert("ad".to_string(), Value::String("Ali".to_string()));
        memory.push_turn(Role::User, "Selam");

        let prompt = build_prompt(&memory, "Selam");
        assert!(prompt.starts_with("Kullanıcıyla geçmiş konuşmalar: {"));
        assert!(prompt.contains(r#""ad":"Ali""#));
        assert!(prompt.contains("\nKullanıcı yeni mesajı: Selam\n"));
        assert!(prompt.ends_with("cevabı Türkçe ver."));
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_any_side_effect() {
        let temp = tempdir().unwrap();
        let (service, _cache) = keyless_service(temp.path()).await;

        let err = service.handle_message("ali", "   ", None).await.unwrap_err();
        assert!(matches!(err, NovaError::Validation(ref msg) if msg == "Mesaj boş"));
        assert!(!temp.path().join("user_ali.json").exists());
    }

    #[tokio::test]
    async fn shared_cache_answers_without_an_upstream_call() {
        let temp = tempdir().unwrap();
        let (service, cache) = keyless_service(temp.path()).await;
        cache.put(CacheScope::Shared, "Merhaba!", "Merhaba, hoş geldin!");

        // The client has no key, so any upstream dispatch would error.
        let reply = service.handle_message("ali", "Merhaba!", None).await.unwrap();
        assert_eq!(reply, "Merhaba, hoş geldin!");

        let saved = std::fs::read_to_string(temp.path().join("user_ali.json")).unwrap();
        let record: Value = serde_json::from_str(&saved).unwrap();
        let turns = record["conversation"].as_array().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1]["text"], "Merhaba, hoş geldin!");
    }

    #[tokio::test]
    async fn user_scoped_entries_are_invisible_to_other_users() {
        let temp = tempdir().unwrap();
        let (service, cache) = keyless_service(temp.path()).await;
        cache.put(
            CacheScope::User("alice".to_string()),
            "Planım ne?",
            "Yarın toplantın var.",
        );

        let err = service
            .handle_message("bob", "Planım ne?", None)
            .await
            .unwrap_err();
        assert!(matches!(err, NovaError::Config(_)));
    }
}
