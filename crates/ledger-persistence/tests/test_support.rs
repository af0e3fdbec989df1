#![allow(dead_code)]

use std::sync::Arc;

use ledger_core::{AccountMapper, ApprovalEngine, CollaboratorError, DocumentRef, DocumentSubmission, DocumentType,
                  EngineConfig, PostingLine, StaticDirectory, WorkflowInstance};
use ledger_persistence::config::DbConfig;
use ledger_persistence::pg::{build_pool, PgPool, PgWorkflowStore, PoolProvider};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use uuid::Uuid;

pub const CASH: i64 = 1000;
pub const EXPENSE: i64 = 5100;

pub static TEST_POOL: Lazy<Option<PgPool>> = Lazy::new(|| {
    if std::env::var("DATABASE_URL").is_err() {
        return None;
    }
    let cfg = DbConfig::from_env().ok()?;
    match build_pool(&cfg.url, 1, cfg.max_connections.max(4)) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("No se pudo construir pool de test: {e}");
            None
        }
    }
});

pub fn with_pool<F, R>(f: F) -> Option<R>
    where F: FnOnce(&PgPool) -> R
{
    match TEST_POOL.as_ref() {
        Some(p) => Some(f(p)),
        None => {
            eprintln!("skip (no DATABASE_URL)");
            None
        }
    }
}

/// Identificador positivo único por corrida (la base persiste entre tests).
pub fn unique_id() -> i64 {
    (Uuid::new_v4().as_u128() as i64).abs().max(1)
}

pub struct FixedMapper;

impl AccountMapper for FixedMapper {
    fn posting_lines(&self, instance: &WorkflowInstance) -> Result<Option<Vec<PostingLine>>, CollaboratorError> {
        let amount = instance.document_amount;
        Ok(Some(vec![PostingLine::debit(EXPENSE, amount), PostingLine::credit(CASH, amount)]))
    }
}

pub fn directory() -> StaticDirectory {
    StaticDirectory::new().grant("controller", "vouchers.approve")
                          .grant("auditor", "vouchers.approve")
}

pub type PgEngine = ApprovalEngine<PgWorkflowStore<PoolProvider>>;

/// Motor sobre Postgres con una clave de numeración propia del test.
pub fn pg_engine(pool: &PgPool, journal_key: &str) -> PgEngine {
    let config = EngineConfig { journal_key: journal_key.to_string(),
                                ..EngineConfig::default() };
    ApprovalEngine::builder(Arc::new(PgWorkflowStore::from_pool(pool.clone()))).directory(Arc::new(directory()))
                                                                               .accounts(Arc::new(FixedMapper))
                                                                               .config(config)
                                                                               .build()
                                                                               .unwrap()
}

pub fn submission(doc_type: DocumentType, amount: Decimal, branch: i64) -> DocumentSubmission {
    DocumentSubmission::in_base(DocumentRef::new(doc_type, unique_id()), amount, 1, Some(branch), "clerk")
}
