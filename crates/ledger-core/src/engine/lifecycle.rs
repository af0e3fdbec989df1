//! Máquina de estados de la instancia: apertura, avance y cancelación.
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::{debug, info};
use uuid::Uuid;

use super::core::find_active_definition;
use super::outbox::{Notification, Outbox};
use super::ApprovalEngine;
use crate::errors::{ConcurrencyError, EngineError, StoreError};
use crate::event::WorkflowEventKind;
use crate::model::{ActionStatus, DocumentLedgerState, DocumentStatus, DocumentSubmission, InstanceStatus,
                   JournalEntry, WorkflowAction, WorkflowInstance};
use crate::repo::{UnitOfWork, WorkflowStore};
use crate::routing::{NodeState, RoutingContext, RoutingEvaluator};

/// Re-evalúa la instancia y aplica el resultado dentro de la unidad de
/// trabajo.
///
/// - Raíz abierta: materializa una acción por cada hoja vencida (no-op si ya
///   existe) y retira las pendientes que dejaron de estar vencidas.
/// - Raíz satisfecha o rechazada: transiciona la instancia y retira todas las
///   acciones pendientes.
///
/// Devuelve las acciones creadas. No persiste la instancia; eso queda a
/// cargo del llamador.
pub(crate) fn advance(uow: &mut dyn UnitOfWork,
                      instance: &mut WorkflowInstance,
                      at: DateTime<Utc>,
                      outbox: &mut Outbox)
                      -> Result<Vec<WorkflowAction>, EngineError> {
    let forest = instance.forest()?;
    let actions = uow.actions(instance.id)?;
    let evaluation = RoutingEvaluator.evaluate(&RoutingContext::for_instance(instance, &forest), &actions)?;

    let mut created = Vec::new();
    let keep_open = match evaluation.root {
        NodeState::Open => {
            for step_id in &evaluation.due {
                let action = WorkflowAction::pending(instance.id, *step_id, at);
                if !uow.insert_action(&action)? {
                    continue;
                }
                uow.append_event(instance.id, WorkflowEventKind::ActionCreated { step_id: *step_id }, at)?;
                if let Some(rule) = forest.get(step_id).and_then(|s| s.rule()) {
                    outbox.push(Notification::ActionCreated { instance_id: instance.id,
                                                              step_id: *step_id,
                                                              rule: rule.clone(),
                                                              document_branch: instance.branch_id });
                }
                created.push(action);
            }
            instance.current_step_order = evaluation.current_step_order;
            Some(evaluation.due.iter().copied().collect::<HashSet<Uuid>>())
        }
        NodeState::Satisfied | NodeState::Rejected => {
            let next = if evaluation.root == NodeState::Satisfied {
                InstanceStatus::Approved
            } else {
                InstanceStatus::Rejected
            };
            instance.transition(next, at)?;
            None
        }
    };

    for mut action in actions.into_iter().filter(|a| a.status == ActionStatus::Pending) {
        let still_due = keep_open.as_ref().is_some_and(|due| due.contains(&action.step_id));
        if still_due {
            continue;
        }
        action.withdraw(at);
        uow.update_action(&action)?;
        uow.append_event(instance.id, WorkflowEventKind::ActionWithdrawn { step_id: action.step_id }, at)?;
        outbox.push(Notification::ActionResolved { instance_id: instance.id,
                                                   step_id: action.step_id,
                                                   status: ActionStatus::Withdrawn });
    }

    if instance.is_terminal() {
        if let Some(kind) = WorkflowEventKind::for_terminal(instance.status, "") {
            uow.append_event(instance.id, kind, at)?;
        }
        info!("instance:{} id={} document={}", instance.status, instance.id, instance.document);
    }
    Ok(created)
}

/// Actualiza (o crea) el estado contable del documento.
pub(crate) fn set_document_status(uow: &mut dyn UnitOfWork,
                                  instance: &WorkflowInstance,
                                  status: DocumentStatus,
                                  at: DateTime<Utc>)
                                  -> Result<(), EngineError> {
    let mut state = uow.document_state(instance.document)?
                       .unwrap_or_else(|| DocumentLedgerState::submitted(instance.document, at));
    state.status = status;
    state.updated_at = at;
    uow.upsert_document_state(&state)?;
    Ok(())
}

impl<S: WorkflowStore> ApprovalEngine<S> {
    /// Abre la instancia de aprobación de un documento recién enviado.
    ///
    /// Elige la definición activa, fija el snapshot de pasos y montos, y
    /// materializa las acciones iniciales. Falla (sin dejar rastro) si no hay
    /// definición activa, si ningún paso aplica al monto/sucursal, si el
    /// documento ya tiene una instancia pendiente o si ya fue contabilizado.
    pub fn open_instance(&self, submission: &DocumentSubmission) -> Result<WorkflowInstance, EngineError> {
        submission.validate()?;
        let document = submission.document;
        debug!("instance:open:start document={document} amount_in_base={}",
               submission.amount_in_base);
        let (instance, outbox) = self.store.transaction(|uow| {
            let at = self.now();
            if uow.pending_instance_for(document)?.is_some() {
                return Err(ConcurrencyError::PendingInstanceExists(document).into());
            }
            if uow.document_state(document)?
                  .is_some_and(|s| s.journal_entry_id.is_some())
            {
                return Err(ConcurrencyError::AlreadyPosted(document).into());
            }
            let definition = find_active_definition(uow, document.document_type, submission.branch_id)?;
            let mut instance = WorkflowInstance::open(&definition, submission, at)?;
            match uow.insert_instance(&instance) {
                Ok(()) => {}
                Err(StoreError::UniqueViolation(_)) => {
                    return Err(ConcurrencyError::PendingInstanceExists(document).into());
                }
                Err(e) => return Err(e.into()),
            }
            uow.append_event(instance.id,
                             WorkflowEventKind::InstanceOpened { document,
                                                                 definition_id: definition.id,
                                                                 definition_hash: instance.definition_hash.clone() },
                             at)?;
            uow.upsert_document_state(&DocumentLedgerState::submitted(document, at))?;

            let mut outbox = Outbox::new();
            advance(uow, &mut instance, at, &mut outbox)?;
            uow.update_instance(&instance)?;
            Ok((instance, outbox))
        })?;
        outbox.dispatch(self.directory.as_ref(), self.notifier.as_ref());
        info!("instance:opened id={} document={document} definition={} hash={}",
              instance.id,
              instance.definition_id,
              instance.definition_hash);
        Ok(instance)
    }

    /// Cancela una instancia pendiente (documento retirado).
    pub fn cancel(&self, instance_id: Uuid, actor_id: &str) -> Result<WorkflowInstance, EngineError> {
        let (instance, outbox) = self.store.transaction(|uow| {
            let at = self.now();
            let mut instance = uow.lock_instance(instance_id)?
                                  .ok_or_else(|| EngineError::NotFound(format!("workflow instance {instance_id}")))?;
            instance.transition(InstanceStatus::Cancelled, at)?;
            let mut outbox = Outbox::new();
            for mut action in uow.actions(instance_id)?
                                 .into_iter()
                                 .filter(|a| a.status == ActionStatus::Pending)
            {
                action.withdraw(at);
                uow.update_action(&action)?;
                uow.append_event(instance_id, WorkflowEventKind::ActionWithdrawn { step_id: action.step_id }, at)?;
                outbox.push(Notification::ActionResolved { instance_id,
                                                           step_id: action.step_id,
                                                           status: ActionStatus::Withdrawn });
            }
            uow.append_event(instance_id,
                             WorkflowEventKind::InstanceCancelled { actor_id: actor_id.to_string() },
                             at)?;
            set_document_status(uow, &instance, DocumentStatus::Cancelled, at)?;
            uow.update_instance(&instance)?;
            Ok((instance, outbox))
        })?;
        outbox.dispatch(self.directory.as_ref(), self.notifier.as_ref());
        info!("instance:cancelled id={instance_id} by={actor_id}");
        Ok(instance)
    }

    /// Contabiliza una instancia aprobada que todavía no tiene asiento.
    ///
    /// En el flujo normal el asiento se registra dentro de la decisión que
    /// aprueba; esta entrada sólo sirve para reintentos explícitos. Una
    /// instancia no aprobada o ya contabilizada produce
    /// `InvalidStateTransition`.
    pub fn post(&self, instance_id: Uuid) -> Result<JournalEntry, EngineError> {
        self.store.transaction(|uow| {
                      let at = self.now();
                      let instance = uow.lock_instance(instance_id)?
                                        .ok_or_else(|| EngineError::NotFound(format!("workflow instance {instance_id}")))?;
                      let posted = uow.document_state(instance.document)?
                                      .is_some_and(|s| s.journal_entry_id.is_some());
                      if instance.status != InstanceStatus::Approved || posted {
                          return Err(EngineError::InvalidStateTransition { from: instance.status,
                                                                           to: InstanceStatus::Approved });
                      }
                      self.posting.post(uow, &self.numbering, self.accounts.as_ref(), &instance, at)
                  })
    }
}
