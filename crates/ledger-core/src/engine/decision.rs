//! Procesador de decisiones.
//!
//! `decide` valida, registra la decisión, re-evalúa la instancia y, si queda
//! aprobada, contabiliza; todo en una única transacción con la instancia
//! bloqueada. Cualquier error revierte la unidad de trabajo completa.
use log::{debug, info};
use uuid::Uuid;

use super::lifecycle::{advance, set_document_status};
use super::outbox::{Notification, Outbox};
use super::ApprovalEngine;
use crate::collab::ApproverDirectory;
use crate::errors::{ConcurrencyError, EngineError};
use crate::event::WorkflowEventKind;
use crate::model::{Decision, DocumentStatus, InstanceStatus, JournalEntry, WorkflowAction, WorkflowInstance};
use crate::repo::WorkflowStore;
use crate::step::ApproverRule;

/// Resultado de una decisión aceptada.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    /// Instancia tras la re-evaluación.
    pub instance: WorkflowInstance,
    /// La acción decidida.
    pub action: WorkflowAction,
    /// Acciones que vencieron a raíz de esta decisión.
    pub new_actions: Vec<WorkflowAction>,
    /// Asiento registrado si la decisión aprobó la instancia.
    pub journal_entry: Option<JournalEntry>,
}

/// ¿Puede `actor_id` decidir un paso con esta regla?
///
/// Una regla de sucursal sin sucursal fija usa la del documento.
pub(crate) fn authorize(directory: &dyn ApproverDirectory,
                        rule: &ApproverRule,
                        actor_id: &str,
                        document_branch: Option<i64>)
                        -> Result<bool, EngineError> {
    Ok(match rule {
        ApproverRule::User { user_id } => user_id == actor_id,
        ApproverRule::Permission { permission } => directory.has_permission(actor_id, permission)?,
        ApproverRule::Branch { branch_id } => match branch_id.or(document_branch) {
            Some(b) => directory.is_branch_member(actor_id, b)?,
            None => false,
        },
    })
}

impl<S: WorkflowStore> ApprovalEngine<S> {
    /// Registra la decisión de `actor_id` sobre el paso `step_id`.
    ///
    /// Fallas, en el orden en que se comprueban:
    /// - instancia inexistente: `NotFound`;
    /// - instancia terminal: `Concurrency(InstanceTerminal)`;
    /// - sin acción para el paso: `StepNotDue`;
    /// - acción ya resuelta o retirada: `Concurrency(ActionAlreadyDecided)`;
    /// - actor no habilitado: `Authorization`.
    pub fn decide(&self,
                  instance_id: Uuid,
                  step_id: Uuid,
                  actor_id: &str,
                  decision: Decision,
                  notes: Option<&str>)
                  -> Result<DecisionOutcome, EngineError> {
        debug!("decide:start instance_id={instance_id} step_id={step_id} actor={actor_id} decision={decision:?}");
        let (outcome, outbox) = self.store.transaction(|uow| {
            let at = self.now();
            let mut instance = uow.lock_instance(instance_id)?
                                  .ok_or_else(|| EngineError::NotFound(format!("workflow instance {instance_id}")))?;
            if instance.is_terminal() {
                return Err(ConcurrencyError::InstanceTerminal { instance_id,
                                                                status: instance.status }.into());
            }
            let mut action = uow.actions(instance_id)?
                                .into_iter()
                                .find(|a| a.step_id == step_id)
                                .ok_or(EngineError::StepNotDue { instance_id, step_id })?;
            if !action.status.is_pending() {
                return Err(ConcurrencyError::ActionAlreadyDecided { step_id,
                                                                    status: action.status }.into());
            }
            let rule = instance.steps
                               .iter()
                               .find(|s| s.id == step_id)
                               .and_then(|s| s.rule())
                               .ok_or(EngineError::StepNotDue { instance_id, step_id })?;
            if !authorize(self.directory.as_ref(), rule, actor_id, instance.branch_id)? {
                return Err(EngineError::Authorization { actor_id: actor_id.to_string(),
                                                        step_id });
            }

            let mut outbox = Outbox::new();
            action.resolve(decision, actor_id, notes.map(str::to_string), at);
            uow.update_action(&action)?;
            uow.append_event(instance_id,
                             WorkflowEventKind::ActionDecided { step_id,
                                                                actor_id: actor_id.to_string(),
                                                                status: action.status },
                             at)?;
            outbox.push(Notification::ActionResolved { instance_id,
                                                       step_id,
                                                       status: action.status });

            let new_actions = advance(uow, &mut instance, at, &mut outbox)?;
            let journal_entry = match instance.status {
                InstanceStatus::Approved => {
                    Some(self.posting.post(uow, &self.numbering, self.accounts.as_ref(), &instance, at)?)
                }
                InstanceStatus::Rejected => {
                    set_document_status(uow, &instance, DocumentStatus::Rejected, at)?;
                    None
                }
                _ => None,
            };
            uow.update_instance(&instance)?;
            Ok((DecisionOutcome { instance,
                                  action,
                                  new_actions,
                                  journal_entry },
                outbox))
        })?;
        outbox.dispatch(self.directory.as_ref(), self.notifier.as_ref());
        info!("decide:done instance_id={instance_id} step_id={step_id} actor={actor_id} action={} instance={}",
              outcome.action.status,
              outcome.instance.status);
        Ok(outcome)
    }

    pub fn approve(&self, instance_id: Uuid, step_id: Uuid, actor_id: &str) -> Result<DecisionOutcome, EngineError> {
        self.decide(instance_id, step_id, actor_id, Decision::Approve, None)
    }

    pub fn reject(&self,
                  instance_id: Uuid,
                  step_id: Uuid,
                  actor_id: &str,
                  notes: Option<&str>)
                  -> Result<DecisionOutcome, EngineError> {
        self.decide(instance_id, step_id, actor_id, Decision::Reject, notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::StaticDirectory;

    #[test]
    fn branch_rule_without_branch_uses_document_branch() {
        let dir = StaticDirectory::new().add_member("ana", 1);
        assert!(authorize(&dir, &ApproverRule::branch(None), "ana", Some(1)).unwrap());
        assert!(!authorize(&dir, &ApproverRule::branch(None), "ana", Some(2)).unwrap());
        assert!(!authorize(&dir, &ApproverRule::branch(None), "ana", None).unwrap());
        assert!(authorize(&dir, &ApproverRule::branch(Some(1)), "ana", Some(9)).unwrap());
    }

    #[test]
    fn user_rule_is_exact_match() {
        let dir = StaticDirectory::new();
        assert!(authorize(&dir, &ApproverRule::user("ana"), "ana", None).unwrap());
        assert!(!authorize(&dir, &ApproverRule::user("ana"), "Ana", None).unwrap());
    }
}
