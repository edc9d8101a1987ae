use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Generative Language API key. When absent the warm-up job is not
    /// scheduled and chat requests fail with a configuration error.
    pub api_key: Option<String>,
    pub data_dir: String,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub warmup_interval: Duration,
    pub idle_threshold: Duration,
    pub warm_speed_multiplier: f64,
    pub warmup_concurrency: usize,
    pub warmup_prompts: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            api_key: None,
            data_dir: "kullanicilar".to_string(),
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            request_timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_base_delay: Duration::from_secs(3),
            warmup_interval: Duration::from_secs(120),
            idle_threshold: Duration::from_secs(60),
            warm_speed_multiplier: 0.8,
            warmup_concurrency: 5,
            warmup_prompts: vec!["Merhaba!".to_string(), "Nasılsın?".to_string()],
        }
    }
}

impl Config {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false)
    }
}
