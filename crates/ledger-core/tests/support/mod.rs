#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use ledger_core::{AccountMapper, ApprovalEngine, CollaboratorError, DocumentRef, DocumentSubmission, DocumentType,
                  InMemoryWorkflowStore, Notifier, PostingLine, StaticDirectory, WorkflowInstance};
use rust_decimal::Decimal;

pub const CASH: i64 = 1000;
pub const EXPENSE: i64 = 5100;

/// Mapeo fijo: débito a gastos, crédito a caja, por el monto original.
/// `broken` fuerza un mapeo desbalanceado.
#[derive(Default)]
pub struct SimpleMapper {
    pub broken: Mutex<bool>,
    pub missing: Mutex<bool>,
}

impl AccountMapper for SimpleMapper {
    fn posting_lines(&self, instance: &WorkflowInstance) -> Result<Option<Vec<PostingLine>>, CollaboratorError> {
        if *self.missing.lock().unwrap() {
            return Ok(None);
        }
        let amount = instance.document_amount;
        let credit = if *self.broken.lock().unwrap() { amount - Decimal::ONE } else { amount };
        Ok(Some(vec![PostingLine::debit(EXPENSE, amount), PostingLine::credit(CASH, credit)]))
    }
}

pub fn directory() -> StaticDirectory {
    StaticDirectory::new().add_member("branch1-user", 1)
                          .add_member("branch2-user", 2)
                          .grant("controller", "vouchers.approve")
                          .grant("auditor", "vouchers.approve")
}

pub fn engine_with(mapper: Arc<SimpleMapper>, notifier: Arc<dyn Notifier>) -> ApprovalEngine<InMemoryWorkflowStore> {
    ApprovalEngine::builder(Arc::new(InMemoryWorkflowStore::new())).directory(Arc::new(directory()))
                                                                   .accounts(mapper)
                                                                   .notifier(notifier)
                                                                   .build()
                                                                   .unwrap()
}

pub fn engine() -> (ApprovalEngine<InMemoryWorkflowStore>, Arc<SimpleMapper>) {
    let mapper = Arc::new(SimpleMapper::default());
    (engine_with(mapper.clone(), Arc::new(ledger_core::NoopNotifier)), mapper)
}

pub fn submission(doc_type: DocumentType, id: i64, amount: Decimal, branch: Option<i64>) -> DocumentSubmission {
    DocumentSubmission::in_base(DocumentRef::new(doc_type, id), amount, 1, branch, "clerk")
}
