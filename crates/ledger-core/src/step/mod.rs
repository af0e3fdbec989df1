//! Pasos de aprobación.
//!
//! Un paso es una hoja (`StepNode::Approval`, una regla de aprobador) o un
//! grupo (`StepNode::Group`, conector AND/OR sobre sus hijos). Los pasos de
//! una definición forman un bosque que se valida al guardarse (`StepForest`).

mod approver;
mod forest;
mod gate;

pub use approver::ApproverRule;
pub use forest::StepForest;
pub use gate::AmountGate;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Conector de un grupo: AND exige todos los hijos, OR basta con uno.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connector::And => "and",
            Connector::Or => "or",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Some(Connector::And),
            "or" => Some(Connector::Or),
            _ => None,
        }
    }
}

/// Rol del paso dentro del bosque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepNode {
    /// Hoja: requiere la firma de un aprobador según la regla.
    Approval { rule: ApproverRule },
    /// Compuesto: combina a sus hijos con el conector.
    Group { connector: Connector },
}

/// Paso de una definición de workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: Uuid,
    /// `None` para pasos de primer nivel.
    pub parent_id: Option<Uuid>,
    /// Secuencia visible y desempate entre hermanos.
    pub order: i32,
    pub name: String,
    /// Compuerta de monto en moneda base, `[min, max)`.
    pub gate: AmountGate,
    pub node: StepNode,
}

impl WorkflowStep {
    /// Paso hoja con la regla de aprobador dada.
    pub fn approval(name: impl Into<String>, order: i32, rule: ApproverRule) -> Self {
        Self { id: Uuid::new_v4(),
               parent_id: None,
               order,
               name: name.into(),
               gate: AmountGate::unbounded(),
               node: StepNode::Approval { rule } }
    }

    /// Paso compuesto con el conector dado.
    pub fn group(name: impl Into<String>, order: i32, connector: Connector) -> Self {
        Self { id: Uuid::new_v4(),
               parent_id: None,
               order,
               name: name.into(),
               gate: AmountGate::unbounded(),
               node: StepNode::Group { connector } }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn under(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn gated(mut self, gate: AmountGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn rule(&self) -> Option<&ApproverRule> {
        match &self.node {
            StepNode::Approval { rule } => Some(rule),
            StepNode::Group { .. } => None,
        }
    }

    pub fn connector(&self) -> Option<Connector> {
        match self.node {
            StepNode::Group { connector } => Some(connector),
            StepNode::Approval { .. } => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.node, StepNode::Group { .. })
    }
}
