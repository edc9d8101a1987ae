use thiserror::Error;

#[derive(Debug, Error)]
pub enum NovaError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub use crate::Result;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_error_display() {
        let err = NovaError::Config("x".to_string());
        assert!(format!("{err}").contains("configuration error"));
        let err = NovaError::Upstream("boom".to_string());
        assert!(format!("{err}").contains("upstream error: boom"));
        let err = NovaError::Validation("Mesaj boş".to_string());
        assert!(format!("{err}").contains("Mesaj boş"));
    }
}
