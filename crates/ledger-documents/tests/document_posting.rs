use std::sync::Arc;

use ledger_core::{ApprovalEngine, ApproverRule, ConfigurationError, DocumentRef, DocumentSubmission, DocumentType,
                  EngineError, InMemoryWorkflowStore, InstanceStatus, StaticDirectory, WorkflowDefinition,
                  WorkflowStep};
use ledger_documents::{Document, DocumentRegistry, ScreenLine};
use rust_decimal_macros::dec;

fn setup() -> (ApprovalEngine<InMemoryWorkflowStore>, Arc<DocumentRegistry>, WorkflowStep) {
    let registry = Arc::new(DocumentRegistry::new());
    let engine = ApprovalEngine::builder(Arc::new(InMemoryWorkflowStore::new()))
        .directory(Arc::new(StaticDirectory::new().grant("controller", "vouchers.approve")))
        .accounts(registry.clone())
        .build()
        .unwrap();
    let step = WorkflowStep::approval("controller", 1, ApproverRule::permission("vouchers.approve"));
    for t in DocumentType::ALL {
        let def = WorkflowDefinition::new(format!("{t} approval"), t).with_step(step.clone());
        engine.save_definition(&def).unwrap();
    }
    (engine, registry, step)
}

fn approve(engine: &ApprovalEngine<InMemoryWorkflowStore>, sub: &DocumentSubmission, step: &WorkflowStep) -> ledger_core::JournalEntry {
    let instance = engine.open_instance(sub).unwrap();
    let step_id = instance.steps
                          .iter()
                          .find(|s| s.name == step.name)
                          .map(|s| s.id)
                          .unwrap();
    let out = engine.approve(instance.id, step_id, "controller").unwrap();
    assert_eq!(out.instance.status, InstanceStatus::Approved);
    out.journal_entry.expect("posted")
}

#[test]
fn every_document_type_posts_balanced_entries() {
    let (engine, registry, step) = setup();
    let docs = vec![Document::payment_voucher(1, dec!(120), 2100, 1000),
                    Document::receipt_voucher(2, dec!(75.5), 1000, 1200),
                    Document::disbursement_voucher(3, dec!(300), 5100, 1010).with_cost_center(40),
                    Document::asset_expense(4, dec!(999.99), 1500, 2200),
                    Document::dynamic_entry(5,
                                            vec![ScreenLine::debit(5100, dec!(10)),
                                                 ScreenLine::debit(5300, dec!(15)),
                                                 ScreenLine::credit(1000, dec!(25))])];
    for (i, doc) in docs.into_iter().enumerate() {
        let sub = registry.register(doc).unwrap();
        let entry = approve(&engine, &sub, &step);
        assert!(entry.is_balanced(), "{}", sub.document);
        assert_eq!(entry.number, i as i64 + 1);
        assert_eq!(entry.total_debit, sub.amount_in_base);
    }
    let dv = engine.journal_entry_for_document(DocumentRef::new(DocumentType::DisbursementVoucher, 3))
                   .unwrap()
                   .unwrap();
    assert!(dv.lines.iter().all(|l| l.cost_center_id == Some(40)));
}

#[test]
fn foreign_currency_voucher_posts_in_base() {
    let (engine, registry, step) = setup();
    let doc = Document::payment_voucher(11, dec!(100.01), 2100, 1000).in_currency(2, dec!(0.335))
                                                                     .initiated_by("clerk");
    let sub = registry.register(doc).unwrap();
    let entry = approve(&engine, &sub, &step);
    assert_eq!(entry.total_debit, dec!(33.50));
    assert_eq!(entry.total_credit, dec!(33.50));
    assert_eq!(entry.currency_id, 1);
}

#[test]
fn document_missing_from_registry_fails_posting() {
    let (engine, _registry, step) = setup();
    let sub = Document::payment_voucher(21, dec!(10), 2100, 1000).submission().unwrap();
    let instance = engine.open_instance(&sub).unwrap();
    let step_id = instance.steps[0].id;
    assert_eq!(instance.steps[0].name, step.name);
    let err = engine.approve(instance.id, step_id, "controller").unwrap_err();
    assert_eq!(err, EngineError::Configuration(ConfigurationError::MissingAccountMapping(sub.document)));
    // la decisión se revierte completa
    assert_eq!(engine.instance(instance.id).unwrap().status, InstanceStatus::Pending);
}
