pub mod gemini;

pub use gemini::{GeminiClient, EMPTY_REPLY_FALLBACK};
