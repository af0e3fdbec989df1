use ledger_core::EngineError;
use ledger_documents::DocumentError;
use thiserror::Error;

/// Errores de las aplicaciones del workspace.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("engine: {0}")]
    Engine(#[from] EngineError),
    #[error("document: {0}")]
    Document(#[from] DocumentError),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Setup(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_keep_their_message() {
        let e: AppError = EngineError::NotFound("instance".into()).into();
        assert_eq!(e.to_string(), "engine: not found: instance");
    }
}
