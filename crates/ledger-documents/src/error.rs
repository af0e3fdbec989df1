use ledger_core::DocumentRef;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DocumentError {
    #[error("{0}")]
    ValidationError(String),
    #[error("document {0} is already registered")]
    Duplicate(DocumentRef),
}
