//! `UnitOfWork` sobre una conexión Postgres dentro de una transacción abierta.
//!
//! Las sentencias que pueden fallar de forma esperada (violaciones de unicidad,
//! conflictos de contador) corren en una transacción anidada (SAVEPOINT): en
//! Postgres un error aborta la transacción completa, y el motor necesita poder
//! seguir usando la unidad de trabajo tras un conflicto reintentable.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use ledger_core::{ActionStatus, DocumentLedgerState, DocumentRef, DocumentStatus, DocumentType, InstanceStatus,
                  JournalEntry, StoreError, UnitOfWork, WorkflowAction, WorkflowDefinition, WorkflowEvent,
                  WorkflowEventKind, WorkflowInstance, WorkflowStep};
use log::debug;
use uuid::Uuid;

use super::rows::{ActionRow, DefinitionRecord, DefinitionRow, DocumentStateRow, EntryLineRow, EntryRow, EventRow,
                  InstanceRecord, InstanceRow, NewEventRow, StepRecord, StepRow};
use crate::error::PersistenceError;
use crate::schema::{counters, document_ledger_states, journal_entries, journal_entry_lines, workflow_actions,
                    workflow_definitions, workflow_events, workflow_instances, workflow_steps};

fn db(err: diesel::result::Error) -> StoreError {
    PersistenceError::from(err).into()
}

pub(crate) struct PgUnitOfWork<'a> {
    pub(crate) conn: &'a mut PgConnection,
}

impl PgUnitOfWork<'_> {
    fn load_definitions(&mut self, records: Vec<DefinitionRecord>) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let step_rows: Vec<StepRecord> = workflow_steps::table.filter(workflow_steps::definition_id.eq_any(ids))
                                                              .order((workflow_steps::definition_id.asc(),
                                                                      workflow_steps::position.asc()))
                                                              .load(self.conn)
                                                              .map_err(db)?;
        let mut by_definition: HashMap<Uuid, Vec<WorkflowStep>> = HashMap::new();
        for row in step_rows {
            let definition_id = row.definition_id;
            by_definition.entry(definition_id).or_default().push(row.into_domain()?);
        }
        records.into_iter()
               .map(|r| {
                   let steps = by_definition.remove(&r.id).unwrap_or_default();
                   r.into_domain(steps)
               })
               .collect()
    }

    fn load_entry(&mut self, row: Option<EntryRow>) -> Result<Option<JournalEntry>, StoreError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let lines: Vec<EntryLineRow> = journal_entry_lines::table.filter(journal_entry_lines::entry_id.eq(row.id))
                                                                 .order(journal_entry_lines::line_no.asc())
                                                                 .load(self.conn)
                                                                 .map_err(db)?;
        row.into_domain(lines).map(Some)
    }
}

fn document_filter(document: DocumentRef) -> (&'static str, i64) {
    (document.document_type.as_str(), document.document_id)
}

impl UnitOfWork for PgUnitOfWork<'_> {
    fn save_definition(&mut self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        debug!("save_definition:start id={} steps={}", definition.id, definition.steps.len());
        let row = DefinitionRow::from_domain(definition);
        let steps = definition.steps
                              .iter()
                              .enumerate()
                              .map(|(pos, step)| StepRow::from_domain(definition.id, pos, step))
                              .collect::<Result<Vec<_>, _>>()?;
        diesel::insert_into(workflow_definitions::table).values(&row)
                                                        .on_conflict(workflow_definitions::id)
                                                        .do_update()
                                                        .set(&row)
                                                        .execute(self.conn)
                                                        .map_err(db)?;
        diesel::delete(workflow_steps::table.filter(workflow_steps::definition_id.eq(definition.id))).execute(self.conn)
                                                                                                    .map_err(db)?;
        diesel::insert_into(workflow_steps::table).values(&steps)
                                                  .execute(self.conn)
                                                  .map_err(db)?;
        debug!("save_definition:done id={}", definition.id);
        Ok(())
    }

    fn definition(&mut self, id: Uuid) -> Result<Option<WorkflowDefinition>, StoreError> {
        let record: Option<DefinitionRecord> = workflow_definitions::table.find(id)
                                                                          .first(self.conn)
                                                                          .optional()
                                                                          .map_err(db)?;
        match record {
            Some(r) => Ok(self.load_definitions(vec![r])?.pop()),
            None => Ok(None),
        }
    }

    fn definitions(&mut self, document_type: Option<DocumentType>) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let mut query = workflow_definitions::table.into_boxed();
        if let Some(t) = document_type {
            query = query.filter(workflow_definitions::document_type.eq(t.as_str()));
        }
        let records: Vec<DefinitionRecord> = query.order((workflow_definitions::created_at.asc(),
                                                          workflow_definitions::id.asc()))
                                                  .load(self.conn)
                                                  .map_err(db)?;
        self.load_definitions(records)
    }

    fn set_definition_active(&mut self, id: Uuid, active: bool) -> Result<bool, StoreError> {
        let n = diesel::update(workflow_definitions::table.find(id)).set(workflow_definitions::active.eq(active))
                                                                    .execute(self.conn)
                                                                    .map_err(db)?;
        Ok(n > 0)
    }

    fn delete_definition(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let n = diesel::delete(workflow_definitions::table.find(id)).execute(self.conn)
                                                                    .map_err(db)?;
        Ok(n > 0)
    }

    fn count_instances_for_definition(&mut self, id: Uuid) -> Result<i64, StoreError> {
        workflow_instances::table.filter(workflow_instances::definition_id.eq(id))
                                 .count()
                                 .get_result(self.conn)
                                 .map_err(db)
    }

    fn insert_instance(&mut self, instance: &WorkflowInstance) -> Result<(), StoreError> {
        let row = InstanceRow::from_domain(instance)?;
        self.conn
            .transaction(|c| {
                diesel::insert_into(workflow_instances::table).values(&row)
                                                              .execute(c)
            })
            .map_err(db)?;
        Ok(())
    }

    fn lock_instance(&mut self, id: Uuid) -> Result<Option<WorkflowInstance>, StoreError> {
        let record: Option<InstanceRecord> = workflow_instances::table.find(id)
                                                                      .for_update()
                                                                      .first(self.conn)
                                                                      .optional()
                                                                      .map_err(db)?;
        record.map(InstanceRecord::into_domain).transpose()
    }

    fn instance(&mut self, id: Uuid) -> Result<Option<WorkflowInstance>, StoreError> {
        let record: Option<InstanceRecord> = workflow_instances::table.find(id)
                                                                      .first(self.conn)
                                                                      .optional()
                                                                      .map_err(db)?;
        record.map(InstanceRecord::into_domain).transpose()
    }

    fn update_instance(&mut self, instance: &WorkflowInstance) -> Result<(), StoreError> {
        let n = diesel::update(workflow_instances::table.find(instance.id))
            .set((workflow_instances::status.eq(instance.status.as_str()),
                  workflow_instances::current_step_order.eq(instance.current_step_order),
                  workflow_instances::completed_at.eq(instance.completed_at)))
            .execute(self.conn)
            .map_err(db)?;
        if n == 0 {
            return Err(StoreError::NotFound(format!("instance {}", instance.id)));
        }
        Ok(())
    }

    fn pending_instance_for(&mut self, document: DocumentRef) -> Result<Option<WorkflowInstance>, StoreError> {
        let (doc_type, doc_id) = document_filter(document);
        let record: Option<InstanceRecord> =
            workflow_instances::table.filter(workflow_instances::document_type.eq(doc_type))
                                     .filter(workflow_instances::document_id.eq(doc_id))
                                     .filter(workflow_instances::status.eq(InstanceStatus::Pending.as_str()))
                                     .first(self.conn)
                                     .optional()
                                     .map_err(db)?;
        record.map(InstanceRecord::into_domain).transpose()
    }

    fn latest_instance_for(&mut self, document: DocumentRef) -> Result<Option<WorkflowInstance>, StoreError> {
        let (doc_type, doc_id) = document_filter(document);
        let record: Option<InstanceRecord> =
            workflow_instances::table.filter(workflow_instances::document_type.eq(doc_type))
                                     .filter(workflow_instances::document_id.eq(doc_id))
                                     .order(workflow_instances::created_at.desc())
                                     .first(self.conn)
                                     .optional()
                                     .map_err(db)?;
        record.map(InstanceRecord::into_domain).transpose()
    }

    fn actions(&mut self, instance_id: Uuid) -> Result<Vec<WorkflowAction>, StoreError> {
        let rows: Vec<ActionRow> = workflow_actions::table.filter(workflow_actions::instance_id.eq(instance_id))
                                                          .order((workflow_actions::created_at.asc(),
                                                                  workflow_actions::id.asc()))
                                                          .load(self.conn)
                                                          .map_err(db)?;
        rows.into_iter().map(ActionRow::into_domain).collect()
    }

    fn insert_action(&mut self, action: &WorkflowAction) -> Result<bool, StoreError> {
        let n = diesel::insert_into(workflow_actions::table).values(ActionRow::from_domain(action))
                                                            .on_conflict((workflow_actions::instance_id,
                                                                          workflow_actions::step_id))
                                                            .do_nothing()
                                                            .execute(self.conn)
                                                            .map_err(db)?;
        Ok(n == 1)
    }

    fn update_action(&mut self, action: &WorkflowAction) -> Result<(), StoreError> {
        let n = diesel::update(workflow_actions::table.find(action.id))
            .set((workflow_actions::status.eq(action.status.as_str()),
                  workflow_actions::user_id.eq(action.user_id.as_deref()),
                  workflow_actions::actioned_at.eq(action.actioned_at),
                  workflow_actions::notes.eq(action.notes.as_deref())))
            .execute(self.conn)
            .map_err(db)?;
        if n == 0 {
            return Err(StoreError::NotFound(format!("action {}", action.id)));
        }
        Ok(())
    }

    fn pending_actions(&mut self) -> Result<Vec<WorkflowAction>, StoreError> {
        let rows: Vec<ActionRow> =
            workflow_actions::table.inner_join(workflow_instances::table)
                                   .filter(workflow_actions::status.eq(ActionStatus::Pending.as_str()))
                                   .filter(workflow_instances::status.eq(InstanceStatus::Pending.as_str()))
                                   .select(workflow_actions::all_columns)
                                   .order((workflow_actions::created_at.asc(), workflow_actions::id.asc()))
                                   .load(self.conn)
                                   .map_err(db)?;
        rows.into_iter().map(ActionRow::into_domain).collect()
    }

    fn increment_counter(&mut self, key: &str, year: i32) -> Result<i64, StoreError> {
        // Upsert atómico: dos transacciones nunca obtienen el mismo valor.
        let value = self.conn
                        .transaction(|c| {
                            diesel::insert_into(counters::table)
                                .values((counters::key.eq(key), counters::year.eq(year), counters::value.eq(1_i64)))
                                .on_conflict((counters::key, counters::year))
                                .do_update()
                                .set(counters::value.eq(counters::value + 1_i64))
                                .returning(counters::value)
                                .get_result::<i64>(c)
                        })
                        .map_err(db)?;
        debug!("increment_counter key={key} year={year} value={value}");
        Ok(value)
    }

    fn insert_journal_entry(&mut self, entry: &JournalEntry) -> Result<(), StoreError> {
        let (row, lines) = EntryRow::from_domain(entry);
        self.conn
            .transaction(|c| {
                diesel::insert_into(journal_entries::table).values(&row).execute(c)?;
                diesel::insert_into(journal_entry_lines::table).values(&lines).execute(c)
            })
            .map_err(db)?;
        Ok(())
    }

    fn journal_entry(&mut self, id: Uuid) -> Result<Option<JournalEntry>, StoreError> {
        let row: Option<EntryRow> = journal_entries::table.find(id)
                                                          .first(self.conn)
                                                          .optional()
                                                          .map_err(db)?;
        self.load_entry(row)
    }

    fn journal_entry_for_document(&mut self, document: DocumentRef) -> Result<Option<JournalEntry>, StoreError> {
        let (doc_type, doc_id) = document_filter(document);
        let row: Option<EntryRow> = journal_entries::table.filter(journal_entries::document_type.eq(doc_type))
                                                          .filter(journal_entries::document_id.eq(doc_id))
                                                          .first(self.conn)
                                                          .optional()
                                                          .map_err(db)?;
        self.load_entry(row)
    }

    fn document_state(&mut self, document: DocumentRef) -> Result<Option<DocumentLedgerState>, StoreError> {
        let row: Option<DocumentStateRow> = document_ledger_states::table.find(document_filter(document))
                                                                         .first(self.conn)
                                                                         .optional()
                                                                         .map_err(db)?;
        row.map(DocumentStateRow::into_domain).transpose()
    }

    fn upsert_document_state(&mut self, state: &DocumentLedgerState) -> Result<(), StoreError> {
        let row = DocumentStateRow::from_domain(state);
        diesel::insert_into(document_ledger_states::table).values(&row)
                                                          .on_conflict((document_ledger_states::document_type,
                                                                        document_ledger_states::document_id))
                                                          .do_update()
                                                          .set(&row)
                                                          .execute(self.conn)
                                                          .map_err(db)?;
        Ok(())
    }

    fn mark_document_posted(&mut self,
                            document: DocumentRef,
                            journal_entry_id: Uuid,
                            at: DateTime<Utc>)
                            -> Result<bool, StoreError> {
        let seed = DocumentStateRow::from_domain(&DocumentLedgerState::submitted(document, at));
        diesel::insert_into(document_ledger_states::table).values(&seed)
                                                          .on_conflict_do_nothing()
                                                          .execute(self.conn)
                                                          .map_err(db)?;
        // Sólo gana quien encuentra la referencia todavía nula.
        let n = diesel::update(document_ledger_states::table.find(document_filter(document))
                                                            .filter(document_ledger_states::journal_entry_id.is_null()))
            .set((document_ledger_states::journal_entry_id.eq(Some(journal_entry_id)),
                  document_ledger_states::status.eq(DocumentStatus::Posted.as_str()),
                  document_ledger_states::updated_at.eq(at)))
            .execute(self.conn)
            .map_err(db)?;
        Ok(n == 1)
    }

    fn append_event(&mut self,
                    instance_id: Uuid,
                    kind: WorkflowEventKind,
                    ts: DateTime<Utc>)
                    -> Result<WorkflowEvent, StoreError> {
        let payload = serde_json::to_value(&kind).map_err(|e| StoreError::Backend(format!("event payload: {e}")))?;
        let seq: i64 = diesel::insert_into(workflow_events::table).values(NewEventRow { instance_id,
                                                                                       event_type: kind.event_type(),
                                                                                       payload: &payload,
                                                                                       ts })
                                                                  .returning(workflow_events::seq)
                                                                  .get_result(self.conn)
                                                                  .map_err(db)?;
        debug!("append_event instance_id={instance_id} seq={seq} type={}", kind.event_type());
        Ok(WorkflowEvent { seq,
                           instance_id,
                           kind,
                           ts })
    }

    fn events(&mut self, instance_id: Uuid) -> Result<Vec<WorkflowEvent>, StoreError> {
        let rows: Vec<EventRow> = workflow_events::table.filter(workflow_events::instance_id.eq(instance_id))
                                                        .order(workflow_events::seq.asc())
                                                        .load(self.conn)
                                                        .map_err(db)?;
        rows.into_iter().map(EventRow::into_domain).collect()
    }
}
