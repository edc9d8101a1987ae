pub mod chat;
pub mod warmup;

pub use chat::ChatService;
pub use warmup::WarmupJob;
