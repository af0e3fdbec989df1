//! Instancia de aprobación y su máquina de estados.
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApprovalMode, DocumentRef, DocumentSubmission, WorkflowDefinition};
use crate::errors::{DefinitionError, EngineError};
use crate::step::{Connector, StepForest, WorkflowStep};

/// Estado de la instancia. Transiciones válidas: `Pending -> {Approved,
/// Rejected, Cancelled}`. Los tres destinos son terminales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::Pending)
    }

    pub fn can_transition_to(&self, next: InstanceStatus) -> bool {
        matches!((self, next),
                 (InstanceStatus::Pending, InstanceStatus::Approved)
                 | (InstanceStatus::Pending, InstanceStatus::Rejected)
                 | (InstanceStatus::Pending, InstanceStatus::Cancelled))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Pending => "pending",
            InstanceStatus::Approved => "approved",
            InstanceStatus::Rejected => "rejected",
            InstanceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InstanceStatus::Pending),
            "approved" => Some(InstanceStatus::Approved),
            "rejected" => Some(InstanceStatus::Rejected),
            "cancelled" => Some(InstanceStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ejecución de una definición para un documento concreto.
///
/// Lleva su propia copia de los pasos (`steps`) tomada al abrirse, junto al
/// hash de esa copia.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub definition_hash: String,
    pub approval_mode: ApprovalMode,
    pub root_connector: Connector,
    pub steps: Vec<WorkflowStep>,
    pub document: DocumentRef,
    pub status: InstanceStatus,
    /// `order` del paso de primer nivel que contiene el primer paso vencido.
    pub current_step_order: Option<i32>,
    pub document_amount: Decimal,
    pub document_amount_in_base: Decimal,
    pub document_currency_id: i64,
    pub exchange_rate: Decimal,
    pub branch_id: Option<i64>,
    pub initiator_id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowInstance {
    /// Abre una instancia `Pending` a partir de la definición activa.
    pub fn open(definition: &WorkflowDefinition,
                submission: &DocumentSubmission,
                at: DateTime<Utc>)
                -> Result<Self, DefinitionError> {
        let (_, hash) = definition.snapshot()?;
        Ok(Self { id: Uuid::new_v4(),
                  definition_id: definition.id,
                  definition_hash: hash,
                  approval_mode: definition.approval_mode,
                  root_connector: definition.root_connector,
                  steps: definition.steps.clone(),
                  document: submission.document,
                  status: InstanceStatus::Pending,
                  current_step_order: None,
                  document_amount: submission.original_amount,
                  document_amount_in_base: submission.amount_in_base,
                  document_currency_id: submission.currency_id,
                  exchange_rate: submission.exchange_rate,
                  branch_id: submission.branch_id,
                  initiator_id: submission.initiator_id.clone(),
                  created_at: at,
                  completed_at: None })
    }

    pub fn forest(&self) -> Result<StepForest, DefinitionError> {
        StepForest::build(&self.steps)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Aplica una transición; `completed_at` se fija al llegar a terminal.
    pub fn transition(&mut self, next: InstanceStatus, at: DateTime<Utc>) -> Result<(), EngineError> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidStateTransition { from: self.status, to: next });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(at);
            self.current_step_order = None;
        }
        Ok(())
    }
}
