//! Colaboradores externos del motor: directorio de aprobadores, mapeo de
//! cuentas por documento y notificaciones.
//!
//! Son traits `Send + Sync` inyectados en el `ApprovalEngine`. Las
//! implementaciones estáticas de este módulo sirven para pruebas y demos.
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::model::{ActionStatus, Side, WorkflowInstance};
use crate::step::ApproverRule;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{collaborator}: {message}")]
pub struct CollaboratorError {
    pub collaborator: &'static str,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self { collaborator, message: message.into() }
    }
}

impl From<CollaboratorError> for EngineError {
    fn from(err: CollaboratorError) -> Self {
        EngineError::Collaborator(err.to_string())
    }
}

/// Responde "¿X tiene el permiso P?" y "¿X pertenece a la sucursal B?".
pub trait ApproverDirectory: Send + Sync {
    fn has_permission(&self, actor_id: &str, permission: &str) -> Result<bool, CollaboratorError>;
    fn is_branch_member(&self, actor_id: &str, branch_id: i64) -> Result<bool, CollaboratorError>;

    /// Candidatos a notificar para una regla. Por defecto sólo se conoce al
    /// usuario nombrado.
    fn candidates(&self, rule: &ApproverRule, _document_branch: Option<i64>) -> Result<Vec<String>, CollaboratorError> {
        Ok(match rule {
            ApproverRule::User { user_id } => vec![user_id.clone()],
            _ => Vec::new(),
        })
    }
}

/// Línea propuesta por el colaborador del documento, en moneda original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingLine {
    pub account_id: i64,
    pub side: Side,
    pub amount: Decimal,
    pub cost_center_id: Option<i64>,
    pub memo: Option<String>,
    /// Línea designada para absorber el residuo de redondeo.
    pub absorbs_rounding: bool,
}

impl PostingLine {
    pub fn debit(account_id: i64, amount: Decimal) -> Self {
        Self { account_id,
               side: Side::Debit,
               amount,
               cost_center_id: None,
               memo: None,
               absorbs_rounding: false }
    }

    pub fn credit(account_id: i64, amount: Decimal) -> Self {
        Self { side: Side::Credit, ..Self::debit(account_id, amount) }
    }

    pub fn with_cost_center(mut self, cost_center_id: Option<i64>) -> Self {
        self.cost_center_id = cost_center_id;
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn absorbing_rounding(mut self) -> Self {
        self.absorbs_rounding = true;
        self
    }
}

/// Mapeo de cuentas específico de cada tipo de documento.
pub trait AccountMapper: Send + Sync {
    /// `Ok(None)` cuando el documento no tiene mapeo configurado.
    fn posting_lines(&self, instance: &WorkflowInstance) -> Result<Option<Vec<PostingLine>>, CollaboratorError>;
}

/// Receptor de notificaciones; fire-and-forget desde el punto de vista del
/// motor.
pub trait Notifier: Send + Sync {
    fn action_created(&self, instance_id: Uuid, step_id: Uuid, candidates: &[String]) -> Result<(), CollaboratorError>;
    fn action_resolved(&self, instance_id: Uuid, step_id: Uuid, status: ActionStatus) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn action_created(&self, _: Uuid, _: Uuid, _: &[String]) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn action_resolved(&self, _: Uuid, _: Uuid, _: ActionStatus) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Notificación registrada por `RecordingNotifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentNotification {
    Created { instance_id: Uuid, step_id: Uuid, candidates: Vec<String> },
    Resolved { instance_id: Uuid, step_id: Uuid, status: ActionStatus },
}

/// Guarda todo lo que recibe. Con `failing()` además responde error, para
/// comprobar que el motor no depende del resultado.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail: true }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn record(&self, n: SentNotification) -> Result<(), CollaboratorError> {
        self.sent
            .lock()
            .map_err(|_| CollaboratorError::new("notifier", "recorder mutex poisoned"))?
            .push(n);
        if self.fail {
            return Err(CollaboratorError::new("notifier", "delivery failed"));
        }
        Ok(())
    }
}

impl Notifier for RecordingNotifier {
    fn action_created(&self, instance_id: Uuid, step_id: Uuid, candidates: &[String]) -> Result<(), CollaboratorError> {
        self.record(SentNotification::Created { instance_id,
                                                step_id,
                                                candidates: candidates.to_vec() })
    }

    fn action_resolved(&self, instance_id: Uuid, step_id: Uuid, status: ActionStatus) -> Result<(), CollaboratorError> {
        self.record(SentNotification::Resolved { instance_id, step_id, status })
    }
}

/// Directorio fijo en memoria.
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    permissions: HashMap<String, BTreeSet<String>>,
    branches: HashMap<String, BTreeSet<i64>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, actor_id: impl Into<String>, permission: impl Into<String>) -> Self {
        self.permissions.entry(actor_id.into()).or_default().insert(permission.into());
        self
    }

    pub fn add_member(mut self, actor_id: impl Into<String>, branch_id: i64) -> Self {
        self.branches.entry(actor_id.into()).or_default().insert(branch_id);
        self
    }
}

impl ApproverDirectory for StaticDirectory {
    fn has_permission(&self, actor_id: &str, permission: &str) -> Result<bool, CollaboratorError> {
        Ok(self.permissions.get(actor_id).is_some_and(|p| p.contains(permission)))
    }

    fn is_branch_member(&self, actor_id: &str, branch_id: i64) -> Result<bool, CollaboratorError> {
        Ok(self.branches.get(actor_id).is_some_and(|b| b.contains(&branch_id)))
    }

    fn candidates(&self, rule: &ApproverRule, document_branch: Option<i64>) -> Result<Vec<String>, CollaboratorError> {
        let mut out: Vec<String> = match rule {
            ApproverRule::User { user_id } => vec![user_id.clone()],
            ApproverRule::Permission { permission } => self.permissions
                                                           .iter()
                                                           .filter(|(_, perms)| perms.contains(permission))
                                                           .map(|(actor, _)| actor.clone())
                                                           .collect(),
            ApproverRule::Branch { branch_id } => match branch_id.or(document_branch) {
                Some(b) => self.branches
                               .iter()
                               .filter(|(_, set)| set.contains(&b))
                               .map(|(actor, _)| actor.clone())
                               .collect(),
                None => Vec::new(),
            },
        };
        out.sort();
        Ok(out)
    }
}
