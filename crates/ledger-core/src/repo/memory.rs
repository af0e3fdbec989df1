//! Backend en memoria con semántica transaccional completa.
//!
//! Cada transacción toma el mutex, trabaja sobre una copia del estado y la
//! publica sólo si la closure devuelve `Ok`. Mantener el mutex durante toda
//! la transacción la hace serializable: dos decisiones sobre la misma
//! instancia, o dos incrementos del mismo contador, nunca se intercalan.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use super::{UnitOfWork, WorkflowStore};
use crate::errors::{EngineError, StoreError};
use crate::event::{WorkflowEvent, WorkflowEventKind};
use crate::model::{ActionStatus, DocumentLedgerState, DocumentRef, DocumentStatus, DocumentType, InstanceStatus,
                   JournalEntry, WorkflowAction, WorkflowDefinition, WorkflowInstance};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    definitions: IndexMap<Uuid, WorkflowDefinition>,
    instances: IndexMap<Uuid, WorkflowInstance>,
    actions: IndexMap<Uuid, WorkflowAction>,
    action_keys: HashSet<(Uuid, Uuid)>,
    counters: HashMap<(String, i32), i64>,
    entries: IndexMap<Uuid, JournalEntry>,
    documents: HashMap<DocumentRef, DocumentLedgerState>,
    events: HashMap<Uuid, Vec<WorkflowEvent>>,
}

#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    state: Mutex<MemoryState>,
    counter_conflicts: AtomicU32,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hace fallar los próximos `n` incrementos de contador con
    /// `StoreError::Conflict`, como lo haría una carrera perdida en Postgres.
    pub fn inject_counter_conflicts(&self, n: u32) {
        self.counter_conflicts.store(n, Ordering::SeqCst);
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn transaction<T, F>(&self, mut f: F) -> Result<T, EngineError>
        where F: FnMut(&mut dyn UnitOfWork) -> Result<T, EngineError>
    {
        let mut guard = self.state
                            .lock()
                            .map_err(|_| StoreError::Backend("in-memory store mutex poisoned".into()))?;
        let mut working = guard.clone();
        let mut uow = MemoryUnitOfWork { state: &mut working,
                                         conflicts: &self.counter_conflicts };
        let out = f(&mut uow)?;
        *guard = working;
        Ok(out)
    }
}

struct MemoryUnitOfWork<'a> {
    state: &'a mut MemoryState,
    conflicts: &'a AtomicU32,
}

impl UnitOfWork for MemoryUnitOfWork<'_> {
    fn save_definition(&mut self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        self.state.definitions.insert(definition.id, definition.clone());
        Ok(())
    }

    fn definition(&mut self, id: Uuid) -> Result<Option<WorkflowDefinition>, StoreError> {
        Ok(self.state.definitions.get(&id).cloned())
    }

    fn definitions(&mut self, document_type: Option<DocumentType>) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let mut defs: Vec<WorkflowDefinition> = self.state
                                                    .definitions
                                                    .values()
                                                    .filter(|d| document_type.map_or(true, |t| d.document_type == t))
                                                    .cloned()
                                                    .collect();
        defs.sort_by_key(|d| d.created_at);
        Ok(defs)
    }

    fn set_definition_active(&mut self, id: Uuid, active: bool) -> Result<bool, StoreError> {
        Ok(match self.state.definitions.get_mut(&id) {
            Some(def) => {
                def.active = active;
                true
            }
            None => false,
        })
    }

    fn delete_definition(&mut self, id: Uuid) -> Result<bool, StoreError> {
        if self.state.instances.values().any(|i| i.definition_id == id) {
            return Err(StoreError::Referenced(format!("definition {id}")));
        }
        Ok(self.state.definitions.shift_remove(&id).is_some())
    }

    fn count_instances_for_definition(&mut self, id: Uuid) -> Result<i64, StoreError> {
        Ok(self.state.instances.values().filter(|i| i.definition_id == id).count() as i64)
    }

    fn insert_instance(&mut self, instance: &WorkflowInstance) -> Result<(), StoreError> {
        let clash = self.state
                        .instances
                        .values()
                        .any(|i| i.document == instance.document && i.status == InstanceStatus::Pending);
        if clash && instance.status == InstanceStatus::Pending {
            return Err(StoreError::UniqueViolation(format!("pending instance for {}", instance.document)));
        }
        if self.state.instances.contains_key(&instance.id) {
            return Err(StoreError::UniqueViolation(format!("instance {}", instance.id)));
        }
        self.state.instances.insert(instance.id, instance.clone());
        Ok(())
    }

    fn lock_instance(&mut self, id: Uuid) -> Result<Option<WorkflowInstance>, StoreError> {
        // el mutex de la transacción ya da exclusión
        self.instance(id)
    }

    fn instance(&mut self, id: Uuid) -> Result<Option<WorkflowInstance>, StoreError> {
        Ok(self.state.instances.get(&id).cloned())
    }

    fn update_instance(&mut self, instance: &WorkflowInstance) -> Result<(), StoreError> {
        match self.state.instances.get_mut(&instance.id) {
            Some(slot) => {
                *slot = instance.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("instance {}", instance.id))),
        }
    }

    fn pending_instance_for(&mut self, document: DocumentRef) -> Result<Option<WorkflowInstance>, StoreError> {
        Ok(self.state
               .instances
               .values()
               .find(|i| i.document == document && i.status == InstanceStatus::Pending)
               .cloned())
    }

    fn latest_instance_for(&mut self, document: DocumentRef) -> Result<Option<WorkflowInstance>, StoreError> {
        Ok(self.state.instances.values().rev().find(|i| i.document == document).cloned())
    }

    fn actions(&mut self, instance_id: Uuid) -> Result<Vec<WorkflowAction>, StoreError> {
        Ok(self.state
               .actions
               .values()
               .filter(|a| a.instance_id == instance_id)
               .cloned()
               .collect())
    }

    fn insert_action(&mut self, action: &WorkflowAction) -> Result<bool, StoreError> {
        if !self.state.action_keys.insert((action.instance_id, action.step_id)) {
            return Ok(false);
        }
        self.state.actions.insert(action.id, action.clone());
        Ok(true)
    }

    fn update_action(&mut self, action: &WorkflowAction) -> Result<(), StoreError> {
        match self.state.actions.get_mut(&action.id) {
            Some(slot) => {
                *slot = action.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("action {}", action.id))),
        }
    }

    fn pending_actions(&mut self) -> Result<Vec<WorkflowAction>, StoreError> {
        let instances = &self.state.instances;
        Ok(self.state
               .actions
               .values()
               .filter(|a| a.status == ActionStatus::Pending)
               .filter(|a| {
                   instances.get(&a.instance_id)
                            .is_some_and(|i| i.status == InstanceStatus::Pending)
               })
               .cloned()
               .collect())
    }

    fn increment_counter(&mut self, key: &str, year: i32) -> Result<i64, StoreError> {
        let injected = self.conflicts
                           .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                           .is_ok();
        if injected {
            return Err(StoreError::Conflict(format!("counter {key}/{year}")));
        }
        let value = self.state.counters.entry((key.to_string(), year)).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    fn insert_journal_entry(&mut self, entry: &JournalEntry) -> Result<(), StoreError> {
        if self.state.entries.values().any(|e| e.document == entry.document) {
            return Err(StoreError::UniqueViolation(format!("journal entry for {}", entry.document)));
        }
        if self.state
               .entries
               .values()
               .any(|e| e.fiscal_year == entry.fiscal_year && e.number == entry.number)
        {
            return Err(StoreError::UniqueViolation(format!("journal entry number {}", entry.reference())));
        }
        self.state.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    fn journal_entry(&mut self, id: Uuid) -> Result<Option<JournalEntry>, StoreError> {
        Ok(self.state.entries.get(&id).cloned())
    }

    fn journal_entry_for_document(&mut self, document: DocumentRef) -> Result<Option<JournalEntry>, StoreError> {
        Ok(self.state.entries.values().find(|e| e.document == document).cloned())
    }

    fn document_state(&mut self, document: DocumentRef) -> Result<Option<DocumentLedgerState>, StoreError> {
        Ok(self.state.documents.get(&document).cloned())
    }

    fn upsert_document_state(&mut self, state: &DocumentLedgerState) -> Result<(), StoreError> {
        self.state.documents.insert(state.document, state.clone());
        Ok(())
    }

    fn mark_document_posted(&mut self,
                            document: DocumentRef,
                            journal_entry_id: Uuid,
                            at: DateTime<Utc>)
                            -> Result<bool, StoreError> {
        let state = self.state
                        .documents
                        .entry(document)
                        .or_insert_with(|| DocumentLedgerState::submitted(document, at));
        if state.journal_entry_id.is_some() {
            return Ok(false);
        }
        state.journal_entry_id = Some(journal_entry_id);
        state.status = DocumentStatus::Posted;
        state.updated_at = at;
        Ok(true)
    }

    fn append_event(&mut self,
                    instance_id: Uuid,
                    kind: WorkflowEventKind,
                    ts: DateTime<Utc>)
                    -> Result<WorkflowEvent, StoreError> {
        let list = self.state.events.entry(instance_id).or_default();
        let event = WorkflowEvent { seq: list.len() as i64,
                                    instance_id,
                                    kind,
                                    ts };
        list.push(event.clone());
        Ok(event)
    }

    fn events(&mut self, instance_id: Uuid) -> Result<Vec<WorkflowEvent>, StoreError> {
        Ok(self.state.events.get(&instance_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let store = InMemoryWorkflowStore::new();
        let res: Result<(), EngineError> = store.transaction(|uow| {
                                                    uow.increment_counter("K", 2025)?;
                                                    Err(EngineError::PostingInvariant("boom".into()))
                                                });
        assert!(res.is_err());
        let next = store.transaction(|uow| Ok(uow.increment_counter("K", 2025)?)).unwrap();
        assert_eq!(next, 1);
    }

    #[test]
    fn action_insert_is_idempotent_per_step() {
        let store = InMemoryWorkflowStore::new();
        let instance_id = Uuid::new_v4();
        let step_id = Uuid::new_v4();
        let (first, second) = store.transaction(|uow| {
                                       let a = WorkflowAction::pending(instance_id, step_id, Utc::now());
                                       let b = WorkflowAction::pending(instance_id, step_id, Utc::now());
                                       Ok((uow.insert_action(&a)?, uow.insert_action(&b)?))
                                   })
                                   .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[test]
    fn referenced_definition_cannot_be_removed() {
        use crate::model::{DocumentSubmission, DocumentType};
        use crate::step::{ApproverRule, WorkflowStep};
        use rust_decimal_macros::dec;

        let store = InMemoryWorkflowStore::new();
        let def = WorkflowDefinition::new("d", DocumentType::PaymentVoucher)
            .with_step(WorkflowStep::approval("A", 1, ApproverRule::user("ana")));
        let sub = DocumentSubmission::in_base(DocumentRef::new(DocumentType::PaymentVoucher, 1), dec!(5), 1, None, "u");
        let err = store.transaction(|uow| {
                           uow.save_definition(&def)?;
                           uow.insert_instance(&WorkflowInstance::open(&def, &sub, Utc::now())?)?;
                           Ok(uow.delete_definition(def.id)?)
                       })
                       .unwrap_err();
        assert!(matches!(err, EngineError::Storage(StoreError::Referenced(_))));
    }

    #[test]
    fn injected_conflicts_are_consumed() {
        let store = InMemoryWorkflowStore::new();
        store.inject_counter_conflicts(1);
        let err = store.transaction(|uow| Ok(uow.increment_counter("K", 2025)?)).unwrap_err();
        assert!(matches!(err, EngineError::Storage(StoreError::Conflict(_))));
        assert_eq!(store.transaction(|uow| Ok(uow.increment_counter("K", 2025)?)).unwrap(), 1);
    }
}
