use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::{EngineError, StoreError};
use crate::event::{WorkflowEvent, WorkflowEventKind};
use crate::model::{DocumentLedgerState, DocumentRef, DocumentType, JournalEntry, WorkflowAction,
                   WorkflowDefinition, WorkflowInstance};

/// Operaciones disponibles dentro de una transacción.
pub trait UnitOfWork {
    // --- definiciones ---
    /// Inserta o reemplaza la definición (pasos incluidos).
    fn save_definition(&mut self, definition: &WorkflowDefinition) -> Result<(), StoreError>;
    fn definition(&mut self, id: Uuid) -> Result<Option<WorkflowDefinition>, StoreError>;
    /// Todas las definiciones, opcionalmente filtradas por tipo, por
    /// `created_at` ascendente.
    fn definitions(&mut self, document_type: Option<DocumentType>) -> Result<Vec<WorkflowDefinition>, StoreError>;
    /// Devuelve `false` si no existe.
    fn set_definition_active(&mut self, id: Uuid, active: bool) -> Result<bool, StoreError>;
    /// `false` si no existe; `Referenced` si alguna instancia la usa.
    fn delete_definition(&mut self, id: Uuid) -> Result<bool, StoreError>;
    fn count_instances_for_definition(&mut self, id: Uuid) -> Result<i64, StoreError>;

    // --- instancias ---
    /// Falla con `UniqueViolation` si el documento ya tiene una instancia
    /// pendiente.
    fn insert_instance(&mut self, instance: &WorkflowInstance) -> Result<(), StoreError>;
    /// Lee la instancia bloqueándola hasta el fin de la transacción.
    fn lock_instance(&mut self, id: Uuid) -> Result<Option<WorkflowInstance>, StoreError>;
    fn instance(&mut self, id: Uuid) -> Result<Option<WorkflowInstance>, StoreError>;
    fn update_instance(&mut self, instance: &WorkflowInstance) -> Result<(), StoreError>;
    fn pending_instance_for(&mut self, document: DocumentRef) -> Result<Option<WorkflowInstance>, StoreError>;
    /// Última instancia abierta para el documento, en cualquier estado.
    fn latest_instance_for(&mut self, document: DocumentRef) -> Result<Option<WorkflowInstance>, StoreError>;

    // --- acciones ---
    /// Acciones de la instancia por `created_at` ascendente.
    fn actions(&mut self, instance_id: Uuid) -> Result<Vec<WorkflowAction>, StoreError>;
    /// `false` (sin cambios) si ya existe una acción para `(instance, step)`.
    fn insert_action(&mut self, action: &WorkflowAction) -> Result<bool, StoreError>;
    fn update_action(&mut self, action: &WorkflowAction) -> Result<(), StoreError>;
    /// Todas las acciones pendientes de instancias pendientes.
    fn pending_actions(&mut self) -> Result<Vec<WorkflowAction>, StoreError>;

    // --- contadores ---
    /// Incremento atómico de `(key, year)`; el primer valor es 1.
    fn increment_counter(&mut self, key: &str, year: i32) -> Result<i64, StoreError>;

    // --- asientos ---
    /// Falla con `UniqueViolation` si el documento ya tiene asiento.
    fn insert_journal_entry(&mut self, entry: &JournalEntry) -> Result<(), StoreError>;
    fn journal_entry(&mut self, id: Uuid) -> Result<Option<JournalEntry>, StoreError>;
    fn journal_entry_for_document(&mut self, document: DocumentRef) -> Result<Option<JournalEntry>, StoreError>;

    // --- estado del documento ---
    fn document_state(&mut self, document: DocumentRef) -> Result<Option<DocumentLedgerState>, StoreError>;
    fn upsert_document_state(&mut self, state: &DocumentLedgerState) -> Result<(), StoreError>;
    /// Fija la referencia contable sólo si sigue nula; `false` si ya estaba.
    fn mark_document_posted(&mut self,
                            document: DocumentRef,
                            journal_entry_id: Uuid,
                            at: DateTime<Utc>)
                            -> Result<bool, StoreError>;

    // --- eventos ---
    fn append_event(&mut self,
                    instance_id: Uuid,
                    kind: WorkflowEventKind,
                    ts: DateTime<Utc>)
                    -> Result<WorkflowEvent, StoreError>;
    fn events(&mut self, instance_id: Uuid) -> Result<Vec<WorkflowEvent>, StoreError>;
}

/// Fábrica de unidades de trabajo.
///
/// La closure puede ejecutarse más de una vez si el backend reintenta fallas
/// transitorias, por eso es `FnMut` y no debe tener efectos fuera de la
/// `UnitOfWork`.
pub trait WorkflowStore: Send + Sync {
    fn transaction<T, F>(&self, f: F) -> Result<T, EngineError>
        where F: FnMut(&mut dyn UnitOfWork) -> Result<T, EngineError>;
}
