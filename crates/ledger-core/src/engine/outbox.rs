//! Notificaciones acumuladas durante la transacción y despachadas después
//! del commit. Un fallo de entrega se registra con `warn!` y se descarta.
use log::warn;
use uuid::Uuid;

use crate::collab::{ApproverDirectory, Notifier};
use crate::model::ActionStatus;
use crate::step::ApproverRule;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ActionCreated {
        instance_id: Uuid,
        step_id: Uuid,
        rule: ApproverRule,
        document_branch: Option<i64>,
    },
    ActionResolved { instance_id: Uuid, step_id: Uuid, status: ActionStatus },
}

#[derive(Debug, Default, Clone)]
pub struct Outbox {
    items: Vec<Notification>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, n: Notification) {
        self.items.push(n);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn dispatch(self, directory: &dyn ApproverDirectory, notifier: &dyn Notifier) {
        for item in self.items {
            let result = match &item {
                Notification::ActionCreated { instance_id,
                                              step_id,
                                              rule,
                                              document_branch, } => {
                    let candidates = match directory.candidates(rule, *document_branch) {
                        Ok(c) => c,
                        Err(e) => {
                            warn!("notify:candidates instance_id={instance_id} step_id={step_id} error={e}");
                            Vec::new()
                        }
                    };
                    notifier.action_created(*instance_id, *step_id, &candidates)
                }
                Notification::ActionResolved { instance_id, step_id, status } => {
                    notifier.action_resolved(*instance_id, *step_id, *status)
                }
            };
            if let Err(e) = result {
                warn!("notify:failed {item:?} error={e}");
            }
        }
    }
}
