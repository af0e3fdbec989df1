use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{ActionStatus, DocumentRef, InstanceStatus};

/// Contrato observable del motor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEventKind {
    /// Primer evento de toda instancia; fija el hash de la definición.
    InstanceOpened { document: DocumentRef, definition_id: Uuid, definition_hash: String },
    ActionCreated { step_id: Uuid },
    ActionDecided { step_id: Uuid, actor_id: String, status: ActionStatus },
    /// El paso dejó de estar vencido antes de decidirse.
    ActionWithdrawn { step_id: Uuid },
    InstanceApproved,
    InstanceRejected,
    InstanceCancelled { actor_id: String },
    EntryPosted { journal_entry_id: Uuid, number: i64, fiscal_year: i32 },
}

impl WorkflowEventKind {
    /// Nombre estable (columna `event_type`).
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEventKind::InstanceOpened { .. } => "instance_opened",
            WorkflowEventKind::ActionCreated { .. } => "action_created",
            WorkflowEventKind::ActionDecided { .. } => "action_decided",
            WorkflowEventKind::ActionWithdrawn { .. } => "action_withdrawn",
            WorkflowEventKind::InstanceApproved => "instance_approved",
            WorkflowEventKind::InstanceRejected => "instance_rejected",
            WorkflowEventKind::InstanceCancelled { .. } => "instance_cancelled",
            WorkflowEventKind::EntryPosted { .. } => "entry_posted",
        }
    }

    /// Evento de cierre asociado a un estado terminal.
    pub fn for_terminal(status: InstanceStatus, actor_id: &str) -> Option<Self> {
        match status {
            InstanceStatus::Approved => Some(WorkflowEventKind::InstanceApproved),
            InstanceStatus::Rejected => Some(WorkflowEventKind::InstanceRejected),
            InstanceStatus::Cancelled => Some(WorkflowEventKind::InstanceCancelled { actor_id: actor_id.to_string() }),
            InstanceStatus::Pending => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub seq: i64, // asignado por el store (orden de inserción por instancia)
    pub instance_id: Uuid,
    pub kind: WorkflowEventKind,
    pub ts: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_matches_serde_tag() {
        let kind = WorkflowEventKind::ActionWithdrawn { step_id: Uuid::nil() };
        let v = serde_json::to_value(&kind).unwrap();
        assert_eq!(v["type"], kind.event_type());
    }
}
