use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::afk::AfkMonitor;
use crate::cache::{CacheScope, PromptCache};
use crate::config::Config;
use crate::error::Result;
use crate::providers::{GeminiClient, EMPTY_REPLY_FALLBACK};
use crate::scheduler::ScheduledJob;

/// Periodic job that pre-populates the shared cache with canned prompts once
/// traffic has been quiet for longer than the idle threshold. Each prompt is
/// fetched at most once per process run; fetch failures are logged and left
/// uncached.
pub struct WarmupJob {
    gemini: Arc<GeminiClient>,
    cache: Arc<PromptCache>,
    afk: Arc<AfkMonitor>,
    prompts: Vec<String>,
    interval: Duration,
    idle_threshold: Duration,
    fetch_permits: Arc<Semaphore>,
    attempted: Mutex<HashSet<String>>,
}

impl WarmupJob {
    pub fn new(
        gemini: Arc<GeminiClient>,
        cache: Arc<PromptCache>,
        afk: Arc<AfkMonitor>,
        config: &Config,
    ) -> Self {
        Self {
            gemini,
            cache,
            afk,
            prompts: config.warmup_prompts.clone(),
            interval: config.warmup_interval,
            idle_threshold: config.idle_threshold,
            fetch_permits: Arc::new(Semaphore::new(config.warmup_concurrency.max(1))),
            attempted: Mutex::new(HashSet::new()),
        }
    }

    fn should_fetch(&self, prompt: &str) -> bool {
        if self.cache.get(&CacheScope::Shared, prompt).is_some() {
            return false;
        }
        match self.attempted.lock() {
            Ok(mut attempted) => attempted.insert(prompt.to_string()),
            Err(_) => false,
        }
    }

    fn spawn_fetch(&self, prompt: String) {
        let gemini = Arc::clone(&self.gemini);
        let cache = Arc::clone(&self.cache);
        let afk = Arc::clone(&self.afk);
        let permits = Arc::clone(&self.fetch_permits);
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire().await else {
                return;
            };
            match gemini.generate(&prompt, afk.speed_multiplier()).await {
                Ok(reply) if reply != EMPTY_REPLY_FALLBACK => {
                    debug!("warm-up cached a reply for {prompt:?}");
                    cache.put(CacheScope::Shared, prompt, reply);
                }
                Ok(_) => warn!("warm-up fetch for {prompt:?} returned no usable text"),
                Err(err) => warn!("warm-up fetch for {prompt:?} failed: {err}"),
            }
        });
    }
}

#[async_trait]
impl ScheduledJob for WarmupJob {
    fn name(&self) -> &str {
        "warmup"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        let idle = self.afk.idle_for();
        if idle > self.idle_threshold {
            if self.afk.enter_warm() {
                info!("no traffic for {idle:?}, entering warm mode");
            }
            for prompt in &self.prompts {
                if self.should_fetch(prompt) {
                    self.spawn_fetch(prompt.clone());
                }
            }
        } else if self.afk.leave_warm() {
            info!("traffic resumed, leaving warm mode");
        }
        Ok(())
    }
}
