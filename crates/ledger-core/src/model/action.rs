use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado de una acción de aprobación. `Pending` es el único no terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Approved,
    Rejected,
    /// Retirada por el motor (instancia resuelta o paso ya no vencido).
    Withdrawn,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Approved => "approved",
            ActionStatus::Rejected => "rejected",
            ActionStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ActionStatus::Pending),
            "approved" => Some(ActionStatus::Approved),
            "rejected" => Some(ActionStatus::Rejected),
            "withdrawn" => Some(ActionStatus::Withdrawn),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ActionStatus::Pending)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decisión de un aprobador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn outcome(&self) -> ActionStatus {
        match self {
            Decision::Approve => ActionStatus::Approved,
            Decision::Reject => ActionStatus::Rejected,
        }
    }
}

/// Acción de aprobación: a lo sumo una por `(instance_id, step_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowAction {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub step_id: Uuid,
    pub status: ActionStatus,
    /// Actor que decidió; `None` mientras esté pendiente o si fue retirada.
    pub user_id: Option<String>,
    pub actioned_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowAction {
    pub fn pending(instance_id: Uuid, step_id: Uuid, at: DateTime<Utc>) -> Self {
        Self { id: Uuid::new_v4(),
               instance_id,
               step_id,
               status: ActionStatus::Pending,
               user_id: None,
               actioned_at: None,
               notes: None,
               created_at: at }
    }

    /// Registra la decisión. El llamador ya verificó que estaba pendiente.
    pub fn resolve(&mut self, decision: Decision, actor_id: &str, notes: Option<String>, at: DateTime<Utc>) {
        self.status = decision.outcome();
        self.user_id = Some(actor_id.to_string());
        self.notes = notes;
        self.actioned_at = Some(at);
    }

    pub fn withdraw(&mut self, at: DateTime<Utc>) {
        self.status = ActionStatus::Withdrawn;
        self.actioned_at = Some(at);
    }
}
