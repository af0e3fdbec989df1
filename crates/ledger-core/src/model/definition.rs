//! Definición de workflow: metadatos más su bosque de pasos.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::DocumentType;
use crate::constants::ENGINE_VERSION;
use crate::errors::DefinitionError;
use crate::hashing::{hash_value, to_canonical_json};
use crate::step::{Connector, StepForest, WorkflowStep};

/// Cómo se habilitan los hermanos de un mismo nivel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Todos los hermanos elegibles vencen a la vez.
    #[default]
    Parallel,
    /// Un hermano vence sólo cuando los anteriores (por `order`) terminaron.
    Sequential,
}

impl ApprovalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalMode::Parallel => "parallel",
            ApprovalMode::Sequential => "sequential",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" => Some(ApprovalMode::Parallel),
            "sequential" => Some(ApprovalMode::Sequential),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definición de aprobación para un tipo de documento.
///
/// `branch_id = None` aplica a todas las sucursales; una definición con
/// sucursal tiene prioridad sobre la global al elegir la activa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: Uuid,
    pub name: String,
    pub document_type: DocumentType,
    pub branch_id: Option<i64>,
    pub active: bool,
    pub approval_mode: ApprovalMode,
    /// Conector implícito sobre los pasos de primer nivel.
    pub root_connector: Connector,
    pub steps: Vec<WorkflowStep>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, document_type: DocumentType) -> Self {
        Self { id: Uuid::new_v4(),
               name: name.into(),
               document_type,
               branch_id: None,
               active: true,
               approval_mode: ApprovalMode::Parallel,
               root_connector: Connector::And,
               steps: Vec::new(),
               created_at: Utc::now() }
    }

    pub fn for_branch(mut self, branch_id: i64) -> Self {
        self.branch_id = Some(branch_id);
        self
    }

    pub fn with_mode(mut self, mode: ApprovalMode) -> Self {
        self.approval_mode = mode;
        self
    }

    pub fn with_root_connector(mut self, connector: Connector) -> Self {
        self.root_connector = connector;
        self
    }

    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Valida la estructura (misma regla que al construir el bosque).
    pub fn validate(&self) -> Result<(), DefinitionError> {
        self.forest().map(|_| ())
    }

    pub fn forest(&self) -> Result<StepForest, DefinitionError> {
        StepForest::build(&self.steps)
    }

    /// ¿Es candidata para un documento de este tipo y sucursal?
    pub fn applies_to(&self, document_type: DocumentType, branch_id: Option<i64>) -> bool {
        self.active
        && self.document_type == document_type
        && match self.branch_id {
            None => true,
            Some(b) => branch_id == Some(b),
        }
    }

    /// Snapshot canónico de la parte que gobierna el ruteo, y su hash.
    ///
    /// La instancia guarda ambos: cambios posteriores a la definición no
    /// alteran instancias ya abiertas.
    pub fn snapshot(&self) -> Result<(serde_json::Value, String), DefinitionError> {
        let steps = serde_json::to_value(&self.steps).map_err(|e| DefinitionError::Snapshot(e.to_string()))?;
        let value = json!({
            "engine_version": ENGINE_VERSION,
            "approval_mode": self.approval_mode.as_str(),
            "root_connector": self.root_connector.as_str(),
            "steps": steps,
        });
        let hash = hash_value(&value);
        log::trace!("definition {} snapshot {}", self.id, to_canonical_json(&value));
        Ok((value, hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::ApproverRule;

    #[test]
    fn branch_specific_applies_only_to_branch() {
        let global = WorkflowDefinition::new("g", DocumentType::PaymentVoucher);
        let scoped = WorkflowDefinition::new("s", DocumentType::PaymentVoucher).for_branch(3);
        assert!(global.applies_to(DocumentType::PaymentVoucher, Some(3)));
        assert!(global.applies_to(DocumentType::PaymentVoucher, None));
        assert!(scoped.applies_to(DocumentType::PaymentVoucher, Some(3)));
        assert!(!scoped.applies_to(DocumentType::PaymentVoucher, Some(4)));
        assert!(!scoped.clone().inactive().applies_to(DocumentType::PaymentVoucher, Some(3)));
        assert!(!global.applies_to(DocumentType::ReceiptVoucher, None));
    }

    #[test]
    fn snapshot_hash_is_stable_and_sensitive() {
        let step = WorkflowStep::approval("a", 1, ApproverRule::user("u1"));
        let def = WorkflowDefinition::new("d", DocumentType::ReceiptVoucher).with_step(step);
        let (_, h1) = def.snapshot().unwrap();
        let (_, h2) = def.clone().snapshot().unwrap();
        assert_eq!(h1, h2);
        let (_, h3) = def.with_mode(ApprovalMode::Sequential).snapshot().unwrap();
        assert_ne!(h1, h3);
    }
}
