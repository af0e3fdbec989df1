//! Filas Diesel y su mapeo a los tipos de dominio de `ledger-core`.
//!
//! Los enums se guardan como texto (`as_str`) y se vuelven a parsear al leer;
//! un valor desconocido es una fila corrupta, nunca un default silencioso.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use ledger_core::{ActionStatus, AmountGate, ApprovalMode, Connector, DocumentLedgerState, DocumentRef, DocumentStatus,
                  DocumentType, EntryStatus, InstanceStatus, JournalEntry, JournalEntryLine, StepNode, StoreError,
                  WorkflowAction, WorkflowDefinition, WorkflowEvent, WorkflowEventKind, WorkflowInstance,
                  WorkflowStep};
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::schema::{document_ledger_states, journal_entries, journal_entry_lines, workflow_actions,
                    workflow_definitions, workflow_events, workflow_instances, workflow_steps};

fn corrupt(what: &str, value: &str) -> StoreError {
    StoreError::Backend(format!("corrupt row: unknown {what} '{value}'"))
}

fn parse_with<T>(what: &str, value: &str, parse: fn(&str) -> Option<T>) -> Result<T, StoreError> {
    parse(value).ok_or_else(|| corrupt(what, value))
}

fn document_type(value: &str) -> Result<DocumentType, StoreError> {
    value.parse().map_err(|_| corrupt("document type", value))
}

// --- definiciones ---

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = workflow_definitions)]
#[diesel(treat_none_as_null = true)]
pub struct DefinitionRow<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub document_type: &'static str,
    pub branch_id: Option<i64>,
    pub active: bool,
    pub approval_mode: &'static str,
    pub root_connector: &'static str,
    pub created_at: DateTime<Utc>,
}

impl<'a> DefinitionRow<'a> {
    pub fn from_domain(def: &'a WorkflowDefinition) -> Self {
        Self { id: def.id,
               name: &def.name,
               document_type: def.document_type.as_str(),
               branch_id: def.branch_id,
               active: def.active,
               approval_mode: def.approval_mode.as_str(),
               root_connector: def.root_connector.as_str(),
               created_at: def.created_at }
    }
}

#[derive(Queryable, Debug)]
pub struct DefinitionRecord {
    pub id: Uuid,
    pub name: String,
    pub document_type: String,
    pub branch_id: Option<i64>,
    pub active: bool,
    pub approval_mode: String,
    pub root_connector: String,
    pub created_at: DateTime<Utc>,
}

impl DefinitionRecord {
    pub fn into_domain(self, steps: Vec<WorkflowStep>) -> Result<WorkflowDefinition, StoreError> {
        Ok(WorkflowDefinition { id: self.id,
                                name: self.name,
                                document_type: document_type(&self.document_type)?,
                                branch_id: self.branch_id,
                                active: self.active,
                                approval_mode: parse_with("approval mode", &self.approval_mode, ApprovalMode::parse)?,
                                root_connector: parse_with("connector", &self.root_connector, Connector::parse)?,
                                steps,
                                created_at: self.created_at })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_steps)]
pub struct StepRow<'a> {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub position: i32,
    pub step_order: i32,
    pub name: &'a str,
    pub step_type: &'static str,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub node: Value,
}

impl<'a> StepRow<'a> {
    pub fn from_domain(definition_id: Uuid, position: usize, step: &'a WorkflowStep) -> Result<Self, StoreError> {
        let step_type = match &step.node {
            StepNode::Approval { rule } => rule.step_type(),
            StepNode::Group { .. } => "group",
        };
        let node = serde_json::to_value(&step.node).map_err(|e| StoreError::Backend(format!("step node: {e}")))?;
        Ok(Self { id: step.id,
                  definition_id,
                  parent_id: step.parent_id,
                  position: position as i32,
                  step_order: step.order,
                  name: &step.name,
                  step_type,
                  min_amount: step.gate.min,
                  max_amount: step.gate.max,
                  node })
    }
}

#[derive(Queryable, Debug)]
pub struct StepRecord {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub position: i32,
    pub step_order: i32,
    pub name: String,
    pub step_type: String,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub node: Value,
}

impl StepRecord {
    pub fn into_domain(self) -> Result<WorkflowStep, StoreError> {
        let node: StepNode = serde_json::from_value(self.node).map_err(|e| StoreError::Backend(format!("corrupt step node {}: {e}", self.id)))?;
        Ok(WorkflowStep { id: self.id,
                          parent_id: self.parent_id,
                          order: self.step_order,
                          name: self.name,
                          gate: AmountGate { min: self.min_amount,
                                             max: self.max_amount },
                          node })
    }
}

// --- instancias ---

#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_instances)]
pub struct InstanceRow<'a> {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub definition_hash: &'a str,
    pub approval_mode: &'static str,
    pub root_connector: &'static str,
    pub steps: Value,
    pub document_type: &'static str,
    pub document_id: i64,
    pub status: &'static str,
    pub current_step_order: Option<i32>,
    pub document_amount: Decimal,
    pub document_amount_in_base: Decimal,
    pub document_currency_id: i64,
    pub exchange_rate: Decimal,
    pub branch_id: Option<i64>,
    pub initiator_id: &'a str,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl<'a> InstanceRow<'a> {
    pub fn from_domain(instance: &'a WorkflowInstance) -> Result<Self, StoreError> {
        let steps = serde_json::to_value(&instance.steps).map_err(|e| StoreError::Backend(format!("instance steps: {e}")))?;
        Ok(Self { id: instance.id,
                  definition_id: instance.definition_id,
                  definition_hash: &instance.definition_hash,
                  approval_mode: instance.approval_mode.as_str(),
                  root_connector: instance.root_connector.as_str(),
                  steps,
                  document_type: instance.document.document_type.as_str(),
                  document_id: instance.document.document_id,
                  status: instance.status.as_str(),
                  current_step_order: instance.current_step_order,
                  document_amount: instance.document_amount,
                  document_amount_in_base: instance.document_amount_in_base,
                  document_currency_id: instance.document_currency_id,
                  exchange_rate: instance.exchange_rate,
                  branch_id: instance.branch_id,
                  initiator_id: &instance.initiator_id,
                  created_at: instance.created_at,
                  completed_at: instance.completed_at })
    }
}

#[derive(Queryable, Debug)]
pub struct InstanceRecord {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub definition_hash: String,
    pub approval_mode: String,
    pub root_connector: String,
    pub steps: Value,
    pub document_type: String,
    pub document_id: i64,
    pub status: String,
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

impl InstanceRecord {
    pub fn into_domain(self) -> Result<WorkflowInstance, StoreError> {
        let steps: Vec<WorkflowStep> =
            serde_json::from_value(self.steps).map_err(|e| StoreError::Backend(format!("corrupt steps snapshot {}: {e}", self.id)))?;
        Ok(WorkflowInstance { id: self.id,
                              definition_id: self.definition_id,
                              definition_hash: self.definition_hash,
                              approval_mode: parse_with("approval mode", &self.approval_mode, ApprovalMode::parse)?,
                              root_connector: parse_with("connector", &self.root_connector, Connector::parse)?,
                              steps,
                              document: DocumentRef::new(document_type(&self.document_type)?, self.document_id),
                              status: parse_with("instance status", &self.status, InstanceStatus::parse)?,
                              current_step_order: self.current_step_order,
                              document_amount: self.document_amount,
                              document_amount_in_base: self.document_amount_in_base,
                              document_currency_id: self.document_currency_id,
                              exchange_rate: self.exchange_rate,
                              branch_id: self.branch_id,
                              initiator_id: self.initiator_id,
                              created_at: self.created_at,
                              completed_at: self.completed_at })
    }
}

// --- acciones ---

#[derive(Insertable, Queryable, Debug)]
#[diesel(table_name = workflow_actions)]
pub struct ActionRow {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub step_id: Uuid,
    pub status: String,
    pub user_id: Option<String>,
    pub actioned_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActionRow {
    pub fn from_domain(action: &WorkflowAction) -> Self {
        Self { id: action.id,
               instance_id: action.instance_id,
               step_id: action.step_id,
               status: action.status.as_str().to_string(),
               user_id: action.user_id.clone(),
               actioned_at: action.actioned_at,
               notes: action.notes.clone(),
               created_at: action.created_at }
    }

    pub fn into_domain(self) -> Result<WorkflowAction, StoreError> {
        Ok(WorkflowAction { id: self.id,
                            instance_id: self.instance_id,
                            step_id: self.step_id,
                            status: parse_with("action status", &self.status, ActionStatus::parse)?,
                            user_id: self.user_id,
                            actioned_at: self.actioned_at,
                            notes: self.notes,
                            created_at: self.created_at })
    }
}

// --- asientos ---

#[derive(Insertable, Queryable, Debug)]
#[diesel(table_name = journal_entries)]
pub struct EntryRow {
    pub id: Uuid,
    pub number: i64,
    pub fiscal_year: i32,
    pub entry_date: NaiveDate,
    pub status: String,
    pub description: String,
    pub document_type: String,
    pub document_id: i64,
    pub instance_id: Uuid,
    pub currency_id: i64,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Queryable, Debug)]
#[diesel(table_name = journal_entry_lines)]
pub struct EntryLineRow {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub line_no: i32,
    pub account_id: i64,
    pub debit: Decimal,
    pub credit: Decimal,
    pub cost_center_id: Option<i64>,
    pub memo: Option<String>,
}

impl EntryRow {
    pub fn from_domain(entry: &JournalEntry) -> (Self, Vec<EntryLineRow>) {
        let lines = entry.lines
                         .iter()
                         .map(|l| EntryLineRow { id: l.id,
                                                 entry_id: entry.id,
                                                 line_no: l.line_no,
                                                 account_id: l.account_id,
                                                 debit: l.debit,
                                                 credit: l.credit,
                                                 cost_center_id: l.cost_center_id,
                                                 memo: l.memo.clone() })
                         .collect();
        let row = Self { id: entry.id,
                         number: entry.number,
                         fiscal_year: entry.fiscal_year,
                         entry_date: entry.date,
                         status: entry.status.as_str().to_string(),
                         description: entry.description.clone(),
                         document_type: entry.document.document_type.as_str().to_string(),
                         document_id: entry.document.document_id,
                         instance_id: entry.instance_id,
                         currency_id: entry.currency_id,
                         total_debit: entry.total_debit,
                         total_credit: entry.total_credit,
                         created_at: entry.created_at };
        (row, lines)
    }

    pub fn into_domain(self, lines: Vec<EntryLineRow>) -> Result<JournalEntry, StoreError> {
        let lines = lines.into_iter()
                         .map(|l| JournalEntryLine { id: l.id,
                                                     line_no: l.line_no,
                                                     account_id: l.account_id,
                                                     debit: l.debit,
                                                     credit: l.credit,
                                                     cost_center_id: l.cost_center_id,
                                                     memo: l.memo })
                         .collect();
        Ok(JournalEntry { id: self.id,
                          number: self.number,
                          fiscal_year: self.fiscal_year,
                          date: self.entry_date,
                          status: parse_with("entry status", &self.status, EntryStatus::parse)?,
                          description: self.description,
                          document: DocumentRef::new(document_type(&self.document_type)?, self.document_id),
                          instance_id: self.instance_id,
                          currency_id: self.currency_id,
                          total_debit: self.total_debit,
                          total_credit: self.total_credit,
                          lines,
                          created_at: self.created_at })
    }
}

// --- estado del documento ---

#[derive(Insertable, AsChangeset, Queryable, Debug)]
#[diesel(table_name = document_ledger_states)]
#[diesel(primary_key(document_type, document_id))]
#[diesel(treat_none_as_null = true)]
pub struct DocumentStateRow {
    pub document_type: String,
    pub document_id: i64,
    pub status: String,
    pub journal_entry_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentStateRow {
    pub fn from_domain(state: &DocumentLedgerState) -> Self {
        Self { document_type: state.document.document_type.as_str().to_string(),
               document_id: state.document.document_id,
               status: state.status.as_str().to_string(),
               journal_entry_id: state.journal_entry_id,
               updated_at: state.updated_at }
    }

    pub fn into_domain(self) -> Result<DocumentLedgerState, StoreError> {
        Ok(DocumentLedgerState { document: DocumentRef::new(document_type(&self.document_type)?, self.document_id),
                                 status: parse_with("document status", &self.status, DocumentStatus::parse)?,
                                 journal_entry_id: self.journal_entry_id,
                                 updated_at: self.updated_at })
    }
}

// --- eventos ---

/// Se guarda el enum completo como JSON (`payload`) y, aparte, el nombre
/// estable de la variante en `event_type`.
#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_events)]
pub struct NewEventRow<'a> {
    pub instance_id: Uuid,
    pub event_type: &'a str,
    pub payload: &'a Value,
    pub ts: DateTime<Utc>,
}

#[derive(Queryable, Debug)]
pub struct EventRow {
    pub seq: i64,
    pub instance_id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub ts: DateTime<Utc>,
}

impl EventRow {
    pub fn into_domain(self) -> Result<WorkflowEvent, StoreError> {
        let kind: WorkflowEventKind =
            serde_json::from_value(self.payload).map_err(|e| StoreError::Backend(format!("corrupt event {} ({}): {e}", self.seq, self.event_type)))?;
        Ok(WorkflowEvent { seq: self.seq,
                           instance_id: self.instance_id,
                           kind,
                           ts: self.ts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{ApproverRule, DocumentSubmission};
    use rust_decimal_macros::dec;

    #[test]
    fn step_row_keeps_gate_and_type() {
        let step = WorkflowStep::approval("Gerente", 1, ApproverRule::permission("vouchers.approve"))
            .gated(AmountGate::between(dec!(1000), dec!(10000)));
        let row = StepRow::from_domain(Uuid::nil(), 0, &step).unwrap();
        assert_eq!(row.step_type, "permission_approval");
        assert_eq!(row.min_amount, Some(dec!(1000)));
        let record = StepRecord { id: row.id,
                                  definition_id: row.definition_id,
                                  parent_id: row.parent_id,
                                  position: row.position,
                                  step_order: row.step_order,
                                  name: row.name.to_string(),
                                  step_type: row.step_type.to_string(),
                                  min_amount: row.min_amount,
                                  max_amount: row.max_amount,
                                  node: row.node.clone() };
        assert_eq!(record.into_domain().unwrap(), step);
    }

    #[test]
    fn unknown_status_is_a_corrupt_row() {
        let row = ActionRow { id: Uuid::new_v4(),
                              instance_id: Uuid::new_v4(),
                              step_id: Uuid::new_v4(),
                              status: "maybe".into(),
                              user_id: None,
                              actioned_at: None,
                              notes: None,
                              created_at: Utc::now() };
        assert!(matches!(row.into_domain(), Err(StoreError::Backend(m)) if m.contains("maybe")));
    }

    #[test]
    fn instance_row_snapshot_survives_json() {
        let def = WorkflowDefinition::new("Pagos", DocumentType::PaymentVoucher)
            .with_step(WorkflowStep::approval("Contralor", 1, ApproverRule::user("controller")));
        let doc = DocumentRef::new(DocumentType::PaymentVoucher, 7);
        let sub = DocumentSubmission::in_base(doc, dec!(250), 1, Some(1), "clerk");
        let instance = WorkflowInstance::open(&def, &sub, Utc::now()).unwrap();
        let row = InstanceRow::from_domain(&instance).unwrap();
        let steps: Vec<WorkflowStep> = serde_json::from_value(row.steps).unwrap();
        assert_eq!(steps, instance.steps);
        assert_eq!(row.status, "pending");
    }
}
