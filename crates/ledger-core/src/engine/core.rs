//! `ApprovalEngine`: punto de entrada del motor.
//!
//! Cada operación pública abre exactamente una transacción en el
//! `WorkflowStore`; las notificaciones se despachan después del commit.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{EngineBuilder, NumberingService, PostingService};
use crate::collab::{AccountMapper, ApproverDirectory, Notifier};
use crate::config::EngineConfig;
use crate::errors::{ConfigurationError, EngineError, StoreError};
use crate::event::WorkflowEvent;
use crate::model::{DocumentLedgerState, DocumentRef, DocumentType, JournalEntry, WorkflowAction, WorkflowDefinition,
                   WorkflowInstance};
use crate::repo::{UnitOfWork, WorkflowStore};

pub struct ApprovalEngine<S: WorkflowStore> {
    pub(crate) store: Arc<S>,
    pub(crate) directory: Arc<dyn ApproverDirectory>,
    pub(crate) accounts: Arc<dyn AccountMapper>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) numbering: NumberingService,
    pub(crate) posting: PostingService,
    pub(crate) config: EngineConfig,
    pub(crate) clock: fn() -> DateTime<Utc>,
}

/// Entrada de la bandeja de un aprobador.
#[derive(Debug, Clone, PartialEq)]
pub struct InboxItem {
    pub action_id: Uuid,
    pub instance_id: Uuid,
    pub step_id: Uuid,
    pub step_name: String,
    pub document: DocumentRef,
    pub amount_in_base: Decimal,
    pub created_at: DateTime<Utc>,
}

impl<S: WorkflowStore> ApprovalEngine<S> {
    #[inline]
    pub fn builder(store: Arc<S>) -> EngineBuilder<S> {
        EngineBuilder::new(store)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    // --- definiciones ---

    /// Valida y guarda (inserta o reemplaza) una definición.
    pub fn save_definition(&self, definition: &WorkflowDefinition) -> Result<(), EngineError> {
        definition.validate()?;
        self.store.transaction(|uow| {
                      uow.save_definition(definition)?;
                      Ok(())
                  })?;
        debug!("definition:saved id={} type={} steps={}",
               definition.id,
               definition.document_type,
               definition.steps.len());
        Ok(())
    }

    pub fn definition(&self, id: Uuid) -> Result<WorkflowDefinition, EngineError> {
        self.store
            .transaction(|uow| uow.definition(id).map_err(EngineError::from))?
            .ok_or_else(|| EngineError::NotFound(format!("workflow definition {id}")))
    }

    pub fn definitions(&self, document_type: Option<DocumentType>) -> Result<Vec<WorkflowDefinition>, EngineError> {
        self.store.transaction(|uow| Ok(uow.definitions(document_type)?))
    }

    /// Activa o desactiva (baja lógica). Las instancias abiertas no se ven
    /// afectadas: siguen con su snapshot.
    pub fn set_definition_active(&self, id: Uuid, active: bool) -> Result<(), EngineError> {
        let found = self.store.transaction(|uow| Ok(uow.set_definition_active(id, active)?))?;
        if !found {
            return Err(EngineError::NotFound(format!("workflow definition {id}")));
        }
        debug!("definition:active id={id} active={active}");
        Ok(())
    }

    /// Borra una definición que ninguna instancia referencia.
    ///
    /// Una instancia abierta en paralelo, después del conteo, llega como
    /// `StoreError::Referenced` desde el backend y se informa igual que si el
    /// conteo la hubiera visto.
    pub fn delete_definition(&self, id: Uuid) -> Result<(), EngineError> {
        self.store.transaction(|uow| {
                      if uow.count_instances_for_definition(id)? > 0 {
                          return Err(ConfigurationError::DefinitionInUse(id).into());
                      }
                      match uow.delete_definition(id) {
                          Ok(true) => Ok(()),
                          Ok(false) => Err(EngineError::NotFound(format!("workflow definition {id}"))),
                          Err(StoreError::Referenced(_)) => Err(ConfigurationError::DefinitionInUse(id).into()),
                          Err(e) => Err(e.into()),
                      }
                  })
    }

    /// Definición activa para el tipo y la sucursal.
    pub fn find_active_definition(&self,
                                  document_type: DocumentType,
                                  branch_id: Option<i64>)
                                  -> Result<WorkflowDefinition, EngineError> {
        self.store.transaction(|uow| find_active_definition(uow, document_type, branch_id))
    }

    // --- consultas ---

    pub fn instance(&self, id: Uuid) -> Result<WorkflowInstance, EngineError> {
        self.store
            .transaction(|uow| Ok(uow.instance(id)?))?
            .ok_or_else(|| EngineError::NotFound(format!("workflow instance {id}")))
    }

    /// Instancia más reciente del documento, en cualquier estado.
    pub fn instance_for_document(&self, document: DocumentRef) -> Result<Option<WorkflowInstance>, EngineError> {
        self.store.transaction(|uow| Ok(uow.latest_instance_for(document)?))
    }

    pub fn actions(&self, instance_id: Uuid) -> Result<Vec<WorkflowAction>, EngineError> {
        self.store.transaction(|uow| Ok(uow.actions(instance_id)?))
    }

    pub fn events(&self, instance_id: Uuid) -> Result<Vec<WorkflowEvent>, EngineError> {
        self.store.transaction(|uow| Ok(uow.events(instance_id)?))
    }

    pub fn journal_entry_for_document(&self, document: DocumentRef) -> Result<Option<JournalEntry>, EngineError> {
        self.store.transaction(|uow| Ok(uow.journal_entry_for_document(document)?))
    }

    pub fn document_state(&self, document: DocumentRef) -> Result<Option<DocumentLedgerState>, EngineError> {
        self.store.transaction(|uow| Ok(uow.document_state(document)?))
    }

    /// Bandeja del actor: acciones pendientes que está autorizado a decidir.
    pub fn pending_actions_for(&self, actor_id: &str) -> Result<Vec<InboxItem>, EngineError> {
        let directory = self.directory.as_ref();
        self.store.transaction(|uow| {
                      let pending = uow.pending_actions()?;
                      let mut instances: HashMap<Uuid, WorkflowInstance> = HashMap::new();
                      let mut items = Vec::new();
                      for action in pending {
                          if !instances.contains_key(&action.instance_id) {
                              match uow.instance(action.instance_id)? {
                                  Some(inst) => {
                                      instances.insert(inst.id, inst);
                                  }
                                  None => continue,
                              }
                          }
                          let Some(instance) = instances.get(&action.instance_id) else {
                              continue;
                          };
                          let Some(step) = instance.steps.iter().find(|s| s.id == action.step_id) else {
                              continue;
                          };
                          let Some(rule) = step.rule() else {
                              continue;
                          };
                          if super::decision::authorize(directory, rule, actor_id, instance.branch_id)? {
                              items.push(InboxItem { action_id: action.id,
                                                     instance_id: instance.id,
                                                     step_id: step.id,
                                                     step_name: step.name.clone(),
                                                     document: instance.document,
                                                     amount_in_base: instance.document_amount_in_base,
                                                     created_at: action.created_at });
                          }
                      }
                      items.sort_by_key(|i| i.created_at);
                      Ok(items)
                  })
    }

    // --- numeración ---

    /// Siguiente número para `(key, year)` en su propia transacción.
    pub fn next_number(&self, key: &str, year: i32) -> Result<i64, EngineError> {
        let numbering = self.numbering;
        self.store.transaction(|uow| numbering.next(uow, key, year))
    }
}

/// Las definiciones de sucursal ganan sobre las globales; entre iguales, la
/// más antigua.
pub(crate) fn find_active_definition(uow: &mut dyn UnitOfWork,
                                     document_type: DocumentType,
                                     branch_id: Option<i64>)
                                     -> Result<WorkflowDefinition, EngineError> {
    let candidates: Vec<WorkflowDefinition> = uow.definitions(Some(document_type))?
                                                 .into_iter()
                                                 .filter(|d| d.applies_to(document_type, branch_id))
                                                 .collect();
    let scoped = candidates.iter().find(|d| d.branch_id.is_some());
    let global = candidates.iter().find(|d| d.branch_id.is_none());
    scoped.or(global)
          .cloned()
          .ok_or_else(|| ConfigurationError::NoActiveDefinition { document_type, branch_id }.into())
}
