//! Errores del motor.
//!
//! La taxonomía sigue la política de propagación del motor: cada error se
//! recupera en la frontera del procesador de decisiones / contabilización y se
//! entrega como resultado tipado. Ningún error deja una instancia o acción a
//! medio actualizar: el `WorkflowStore` revierte la unidad de trabajo completa.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{ActionStatus, DocumentRef, DocumentType, InstanceStatus};

/// Fallas de validación de una definición (se detectan al guardarla).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("definition has no steps")]
    Empty,
    #[error("duplicate step id {0}")]
    DuplicateStep(Uuid),
    #[error("step {step} references unknown parent {parent}")]
    UnknownParent { step: Uuid, parent: Uuid },
    #[error("step {0} is part of a parent cycle")]
    Cycle(Uuid),
    #[error("step {0} has a contradictory amount gate (min > max)")]
    ContradictoryGate(Uuid),
    #[error("approval step {0} cannot have child steps")]
    ApprovalWithChildren(Uuid),
    #[error("group step {0} has no child steps")]
    EmptyGroup(Uuid),
    #[error("definition snapshot: {0}")]
    Snapshot(String),
}

/// Fallas de configuración: nunca se resuelven aprobando automáticamente.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no active workflow definition for {document_type} (branch {branch_id:?})")]
    NoActiveDefinition { document_type: DocumentType, branch_id: Option<i64> },
    #[error("no workflow step applies to amount {amount_in_base} (branch {branch_id:?})")]
    NoApplicableStep { amount_in_base: Decimal, branch_id: Option<i64> },
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(#[from] DefinitionError),
    #[error("no account mapping for document {0}")]
    MissingAccountMapping(DocumentRef),
    #[error("workflow definition {0} is referenced by instances; deactivate it instead")]
    DefinitionInUse(Uuid),
    #[error("engine collaborator not configured: {0}")]
    MissingCollaborator(&'static str),
}

/// Carreras perdidas o decisiones repetidas: desde el punto de vista del
/// llamador son idempotentes ("ya decidido").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConcurrencyError {
    #[error("workflow instance {instance_id} is already {status}")]
    InstanceTerminal { instance_id: Uuid, status: InstanceStatus },
    #[error("action for step {step_id} was already {status}")]
    ActionAlreadyDecided { step_id: Uuid, status: ActionStatus },
    #[error("document {0} already has a pending workflow instance")]
    PendingInstanceExists(DocumentRef),
    #[error("document {0} already holds a posted journal entry")]
    AlreadyPosted(DocumentRef),
}

/// Errores del backend de persistencia, neutrales respecto al motor concreto.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("write conflict (retryable): {0}")]
    Conflict(String),
    /// La fila sigue referenciada por otra (restricción de clave foránea).
    #[error("still referenced: {0}")]
    Referenced(String),
    #[error("transient storage failure: {0}")]
    Transient(String),
    #[error("storage backend: {0}")]
    Backend(String),
}

/// Error de alto nivel devuelto por todas las operaciones del motor.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("actor {actor_id} is not authorized to act on step {step_id}")]
    Authorization { actor_id: String, step_id: Uuid },
    #[error("already decided: {0}")]
    Concurrency(#[from] ConcurrencyError),
    #[error("invalid state transition {from} -> {to}")]
    InvalidStateTransition { from: InstanceStatus, to: InstanceStatus },
    #[error("step {step_id} has no pending action in instance {instance_id}")]
    StepNotDue { instance_id: Uuid, step_id: Uuid },
    #[error("posting invariant violated: {0}")]
    PostingInvariant(String),
    #[error("numbering conflict for {key}/{year}")]
    NumberingConflict { key: String, year: i32 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("storage: {0}")]
    Storage(#[from] StoreError),
    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

impl From<DefinitionError> for EngineError {
    fn from(err: DefinitionError) -> Self {
        EngineError::Configuration(ConfigurationError::InvalidDefinition(err))
    }
}

impl EngineError {
    /// Indica si repetir la unidad de trabajo completa puede tener éxito.
    pub fn is_retryable(&self) -> bool {
        matches!(self,
                 EngineError::NumberingConflict { .. }
                 | EngineError::Storage(StoreError::Conflict(_))
                 | EngineError::Storage(StoreError::Transient(_)))
    }

    /// Fallas que requieren atención del administrador (no son errores del
    /// usuario que decide).
    pub fn is_system_fault(&self) -> bool {
        matches!(self,
                 EngineError::PostingInvariant(_)
                 | EngineError::Configuration(ConfigurationError::MissingAccountMapping(_))
                 | EngineError::Storage(StoreError::Backend(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(EngineError::NumberingConflict { key: "JournalEntry".into(),
                                                 year: 2025 }.is_retryable());
        assert!(EngineError::Storage(StoreError::Transient("pool".into())).is_retryable());
        assert!(!EngineError::PostingInvariant("x".into()).is_retryable());
    }

    #[test]
    fn definition_error_becomes_configuration_error() {
        let err: EngineError = DefinitionError::Empty.into();
        assert!(matches!(err, EngineError::Configuration(ConfigurationError::InvalidDefinition(DefinitionError::Empty))));
        assert_eq!(err.to_string(),
                   "configuration error: invalid workflow definition: definition has no steps");
    }

    #[test]
    fn posting_invariant_is_system_fault() {
        assert!(EngineError::PostingInvariant("debit != credit".into()).is_system_fault());
        assert!(!EngineError::Authorization { actor_id: "u1".into(),
                                              step_id: Uuid::nil() }.is_system_fault());
    }
}
