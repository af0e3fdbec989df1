//! Builder de `ApprovalEngine`.
//!
//! El store es obligatorio desde el inicio; el directorio de aprobadores y el
//! mapeo de cuentas deben declararse antes de `build()`. El notificador es
//! opcional (`NoopNotifier`).
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{ApprovalEngine, NumberingService, PostingService};
use crate::collab::{AccountMapper, ApproverDirectory, NoopNotifier, Notifier};
use crate::config::EngineConfig;
use crate::errors::{ConfigurationError, EngineError};
use crate::repo::WorkflowStore;

pub struct EngineBuilder<S: WorkflowStore> {
    store: Arc<S>,
    directory: Option<Arc<dyn ApproverDirectory>>,
    accounts: Option<Arc<dyn AccountMapper>>,
    notifier: Option<Arc<dyn Notifier>>,
    config: EngineConfig,
    clock: fn() -> DateTime<Utc>,
}

impl<S: WorkflowStore> EngineBuilder<S> {
    pub(crate) fn new(store: Arc<S>) -> Self {
        Self { store,
               directory: None,
               accounts: None,
               notifier: None,
               config: EngineConfig::default(),
               clock: Utc::now }
    }

    pub fn directory(mut self, directory: Arc<dyn ApproverDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn accounts(mut self, accounts: Arc<dyn AccountMapper>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Reloj usado para fechas de acciones, instancias y asientos.
    pub fn clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<ApprovalEngine<S>, EngineError> {
        let directory = self.directory.ok_or(ConfigurationError::MissingCollaborator("approver directory"))?;
        let accounts = self.accounts.ok_or(ConfigurationError::MissingCollaborator("account mapper"))?;
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier));
        Ok(ApprovalEngine { store: self.store,
                            directory,
                            accounts,
                            notifier,
                            numbering: NumberingService::new(self.config.numbering_retries),
                            posting: PostingService::new(self.config.journal_key.clone(),
                                                         self.config.base_currency_id),
                            config: self.config,
                            clock: self.clock })
    }
}
