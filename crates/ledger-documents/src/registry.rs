//! Registro de documentos enviados y mapeo de cuentas por tipo.
//!
//! El motor sólo conoce `(tipo, id)`; al contabilizar pide las líneas al
//! registro, que las construye con el monto capturado en la instancia.

use std::collections::HashMap;
use std::sync::RwLock;

use ledger_core::{AccountMapper, CollaboratorError, DocumentRef, DocumentSubmission, PostingLine, WorkflowInstance};
use log::debug;

use crate::{Document, DocumentError};

const COLLABORATOR: &str = "document registry";

#[derive(Debug, Default)]
pub struct DocumentRegistry {
    documents: RwLock<HashMap<DocumentRef, Document>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Valida y guarda el documento; devuelve el envío listo para
    /// `open_instance`.
    pub fn register(&self, document: Document) -> Result<DocumentSubmission, DocumentError> {
        let submission = document.submission()?;
        let mut docs = self.documents
                           .write()
                           .map_err(|_| DocumentError::ValidationError("document registry lock poisoned".into()))?;
        if docs.contains_key(&submission.document) {
            return Err(DocumentError::Duplicate(submission.document));
        }
        debug!("register document={} amount_in_base={}", submission.document, submission.amount_in_base);
        docs.insert(submission.document, document);
        Ok(submission)
    }

    pub fn get(&self, reference: DocumentRef) -> Option<Document> {
        self.documents.read().ok()?.get(&reference).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AccountMapper for DocumentRegistry {
    fn posting_lines(&self, instance: &WorkflowInstance) -> Result<Option<Vec<PostingLine>>, CollaboratorError> {
        let docs = self.documents
                       .read()
                       .map_err(|_| CollaboratorError::new(COLLABORATOR, "lock poisoned"))?;
        let Some(document) = docs.get(&instance.document) else {
            return Ok(None);
        };
        let lines = document.posting_lines(instance.document_amount)
                            .map_err(|e| CollaboratorError::new(COLLABORATOR, e.to_string()))?;
        Ok(Some(lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScreenLine;
    use chrono::Utc;
    use ledger_core::{ApproverRule, WorkflowDefinition, WorkflowStep};
    use rust_decimal_macros::dec;

    fn instance_for(sub: &DocumentSubmission) -> WorkflowInstance {
        let def = WorkflowDefinition::new("t", sub.document.document_type)
            .with_step(WorkflowStep::approval("a", 1, ApproverRule::user("u")));
        WorkflowInstance::open(&def, sub, Utc::now()).unwrap()
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let registry = DocumentRegistry::new();
        registry.register(Document::payment_voucher(1, dec!(10), 2100, 1000)).unwrap();
        let err = registry.register(Document::payment_voucher(1, dec!(20), 2100, 1000)).unwrap_err();
        assert!(matches!(err, DocumentError::Duplicate(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_document_has_no_mapping() {
        let registry = DocumentRegistry::new();
        let other = DocumentRegistry::new();
        let sub = other.register(Document::receipt_voucher(5, dec!(10), 1000, 1200)).unwrap();
        assert_eq!(registry.posting_lines(&instance_for(&sub)).unwrap(), None);
    }

    #[test]
    fn dynamic_entry_uses_its_explicit_lines() {
        let registry = DocumentRegistry::new();
        let doc = Document::dynamic_entry(8,
                                          vec![ScreenLine::debit(5100, dec!(60)),
                                               ScreenLine::debit(5200, dec!(40)),
                                               ScreenLine::credit(1000, dec!(100)).with_memo("petty cash")]);
        let sub = registry.register(doc).unwrap();
        let lines = registry.posting_lines(&instance_for(&sub)).unwrap().unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].memo.as_deref(), Some("petty cash"));
    }
}
