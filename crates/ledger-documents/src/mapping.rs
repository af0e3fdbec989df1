//! Tabla fija de cuentas por tipo de documento.
//!
//! Para procesos que no guardan los documentos en memoria (la CLI): cada tipo
//! de comprobante se contabiliza con un par débito/crédito configurado.

use std::collections::HashMap;

use ledger_core::{AccountMapper, CollaboratorError, DocumentType, PostingLine, WorkflowInstance};
use serde::{Deserialize, Serialize};

use crate::DocumentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPair {
    pub debit_account: i64,
    pub credit_account: i64,
    #[serde(default)]
    pub cost_center_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountTable {
    pairs: HashMap<DocumentType, AccountPair>,
}

impl AccountTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, document_type: DocumentType, debit_account: i64, credit_account: i64) -> Self {
        self.pairs.insert(document_type,
                          AccountPair { debit_account,
                                        credit_account,
                                        cost_center_id: None });
        self
    }

    /// `{"payment_voucher": {"debit_account": 2100, "credit_account": 1000}, ...}`
    pub fn from_json(raw: &str) -> Result<Self, DocumentError> {
        let table: Self = serde_json::from_str(raw).map_err(|e| DocumentError::ValidationError(format!("account table: {e}")))?;
        if let Some((t, _)) = table.pairs.iter().find(|(_, p)| p.debit_account == p.credit_account) {
            return Err(DocumentError::ValidationError(format!("account table: {t} debits and credits the same account")));
        }
        Ok(table)
    }

    pub fn pair(&self, document_type: DocumentType) -> Option<AccountPair> {
        self.pairs.get(&document_type).copied()
    }
}

impl AccountMapper for AccountTable {
    fn posting_lines(&self, instance: &WorkflowInstance) -> Result<Option<Vec<PostingLine>>, CollaboratorError> {
        Ok(self.pair(instance.document.document_type).map(|p| {
                                                          let amount = instance.document_amount;
                                                          vec![PostingLine::debit(p.debit_account, amount).with_cost_center(p.cost_center_id),
                                                               PostingLine::credit(p.credit_account, amount).with_cost_center(p.cost_center_id)]
                                                      }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snake_case_document_types() {
        let table = AccountTable::from_json(r#"{"payment_voucher": {"debit_account": 2100, "credit_account": 1000},
                                                "asset_expense": {"debit_account": 1500, "credit_account": 2200, "cost_center_id": 9}}"#).unwrap();
        assert_eq!(table.pair(DocumentType::PaymentVoucher).unwrap().debit_account, 2100);
        assert_eq!(table.pair(DocumentType::AssetExpense).unwrap().cost_center_id, Some(9));
        assert!(table.pair(DocumentType::ReceiptVoucher).is_none());
    }

    #[test]
    fn same_account_on_both_sides_is_rejected() {
        let err = AccountTable::from_json(r#"{"receipt_voucher": {"debit_account": 1, "credit_account": 1}}"#);
        assert!(err.is_err());
    }
}
