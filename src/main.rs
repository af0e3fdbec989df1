//! Demo del motor: define un workflow de comprobantes de pago, envía dos
//! documentos (uno bajo y uno sobre el umbral del CFO), los aprueba y muestra
//! los asientos resultantes.
//!
//! Corre en memoria; con `--features pg_demo` y `DATABASE_URL` definida corre
//! además el mismo escenario sobre Postgres.

use std::sync::Arc;

use chrono::Utc;
use ledgerflow::ledger_core::{AmountGate, ApprovalEngine, ApproverRule, Connector, DocumentType, InMemoryWorkflowStore,
                              InstanceStatus, JournalEntry, StaticDirectory, WorkflowDefinition, WorkflowStep,
                              WorkflowStore};
use ledgerflow::ledger_documents::{Document, DocumentRegistry};
use ledgerflow::{init_logging, AppError, CONFIG};
use log::info;
use rust_decimal::Decimal;

const CASH: i64 = 1000;
const PAYABLES: i64 = 2100;

fn payment_workflow(branch_id: i64) -> (WorkflowDefinition, [WorkflowStep; 4]) {
    let review = WorkflowStep::group("revisión", 1, Connector::Or);
    let branch = WorkflowStep::approval("sucursal", 1, ApproverRule::branch(None)).under(review.id);
    let controller = WorkflowStep::approval("contraloría", 2, ApproverRule::permission("vouchers.approve")).under(review.id);
    let cfo = WorkflowStep::approval("cfo", 2, ApproverRule::user("cfo"))
        .gated(AmountGate::at_least(Decimal::from(10_000)));
    let def = WorkflowDefinition::new("comprobantes de pago", DocumentType::PaymentVoucher)
        .for_branch(branch_id)
        .with_root_connector(Connector::And)
        .with_step(review.clone())
        .with_step(branch.clone())
        .with_step(controller.clone())
        .with_step(cfo.clone());
    (def, [review, branch, controller, cfo])
}

/// `run_id` separa documentos y sucursal entre corridas sobre la misma base.
fn run_scenario<S: WorkflowStore>(label: &str, store: Arc<S>, run_id: i64) -> Result<Vec<JournalEntry>, AppError> {
    let registry = Arc::new(DocumentRegistry::new());
    let directory = StaticDirectory::new().add_member("ana", run_id)
                                          .grant("luis", "vouchers.approve");
    let engine = ApprovalEngine::builder(store).directory(Arc::new(directory))
                                               .accounts(registry.clone())
                                               .config(CONFIG.engine.clone())
                                               .build()?;
    let (def, [_, branch, _, cfo]) = payment_workflow(run_id);
    engine.save_definition(&def)?;

    let mut entries = Vec::new();
    for (offset, amount) in [(0, 8_000), (1, 25_000)] {
        let doc = Document::payment_voucher(run_id + offset, Decimal::from(amount), PAYABLES, CASH).in_branch(run_id)
                                                                                                 .initiated_by("clerk");
        let sub = registry.register(doc)?;
        let instance = engine.open_instance(&sub)?;
        info!("[{label}] {} abierto: {} acciones", sub.document, engine.actions(instance.id)?.len());

        let mut out = engine.approve(instance.id, branch.id, "ana")?;
        if out.instance.status == InstanceStatus::Pending {
            out = engine.approve(instance.id, cfo.id, "cfo")?;
        }
        if let Some(entry) = out.journal_entry {
            info!("[{label}] {} -> {} por {}", sub.document, entry.reference(), entry.total_debit);
            entries.push(entry);
        }
    }
    Ok(entries)
}

fn main() -> Result<(), AppError> {
    init_logging();
    let run_id = Utc::now().timestamp_millis();

    let entries = run_scenario("memoria", Arc::new(InMemoryWorkflowStore::new()), run_id)?;
    println!("{}", serde_json::to_string_pretty(&entries)?);

    #[cfg(feature = "pg_demo")]
    if CONFIG.database_url.is_some() {
        let pool = ledgerflow::ledger_persistence::build_dev_pool_from_env().map_err(|e| AppError::Setup(e.to_string()))?;
        let store = Arc::new(ledgerflow::ledger_persistence::PgWorkflowStore::from_pool(pool));
        let entries = run_scenario("postgres", store, run_id)?;
        println!("{}", serde_json::to_string_pretty(&entries)?);
    }
    Ok(())
}
