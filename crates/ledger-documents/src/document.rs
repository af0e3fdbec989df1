use std::fmt;

use ledger_core::constants::BASE_DECIMAL_PLACES;
use ledger_core::{DocumentRef, DocumentSubmission, DocumentType, PostingLine, Side};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::DocumentError;

/// Línea explícita de un asiento de pantalla dinámica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenLine {
    pub account_id: i64,
    pub side: Side,
    pub amount: Decimal,
    pub cost_center_id: Option<i64>,
    pub memo: Option<String>,
}

impl ScreenLine {
    pub fn debit(account_id: i64, amount: Decimal) -> Self {
        Self { account_id,
               side: Side::Debit,
               amount,
               cost_center_id: None,
               memo: None }
    }

    pub fn credit(account_id: i64, amount: Decimal) -> Self {
        Self { side: Side::Credit, ..Self::debit(account_id, amount) }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// Contenido contable de cada tipo de documento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentBody {
    /// Débito al beneficiario, crédito a caja.
    PaymentVoucher { payee_account: i64, cash_account: i64 },
    /// Débito a caja, crédito al cliente.
    ReceiptVoucher { cash_account: i64, customer_account: i64 },
    /// Débito al gasto, crédito al banco.
    DisbursementVoucher { expense_account: i64, bank_account: i64 },
    /// Débito al activo, crédito al pasivo acumulado.
    AssetExpense { asset_account: i64, accrued_account: i64 },
    DynamicScreenEntry { lines: Vec<ScreenLine> },
}

impl DocumentBody {
    pub fn document_type(&self) -> DocumentType {
        match self {
            DocumentBody::PaymentVoucher { .. } => DocumentType::PaymentVoucher,
            DocumentBody::ReceiptVoucher { .. } => DocumentType::ReceiptVoucher,
            DocumentBody::DisbursementVoucher { .. } => DocumentType::DisbursementVoucher,
            DocumentBody::AssetExpense { .. } => DocumentType::AssetExpense,
            DocumentBody::DynamicScreenEntry { .. } => DocumentType::DynamicScreenEntry,
        }
    }

    /// `(débito, crédito)` para los comprobantes de dos líneas.
    fn account_pair(&self) -> Option<(i64, i64)> {
        match *self {
            DocumentBody::PaymentVoucher { payee_account,
                                           cash_account, } => Some((payee_account, cash_account)),
            DocumentBody::ReceiptVoucher { cash_account,
                                           customer_account, } => Some((cash_account, customer_account)),
            DocumentBody::DisbursementVoucher { expense_account,
                                                bank_account, } => Some((expense_account, bank_account)),
            DocumentBody::AssetExpense { asset_account,
                                         accrued_account, } => Some((asset_account, accrued_account)),
            DocumentBody::DynamicScreenEntry { .. } => None,
        }
    }
}

/// Documento de negocio enviado a aprobación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    id: i64,
    /// Monto en la moneda original del documento.
    amount: Decimal,
    currency_id: i64,
    exchange_rate: Decimal,
    branch_id: Option<i64>,
    cost_center_id: Option<i64>,
    initiator_id: String,
    body: DocumentBody,
}

impl Document {
    pub fn new(id: i64, amount: Decimal, body: DocumentBody) -> Self {
        Document { id,
                   amount,
                   currency_id: 1,
                   exchange_rate: Decimal::ONE,
                   branch_id: None,
                   cost_center_id: None,
                   initiator_id: "system".to_string(),
                   body }
    }

    pub fn payment_voucher(id: i64, amount: Decimal, payee_account: i64, cash_account: i64) -> Self {
        Self::new(id, amount, DocumentBody::PaymentVoucher { payee_account, cash_account })
    }

    pub fn receipt_voucher(id: i64, amount: Decimal, cash_account: i64, customer_account: i64) -> Self {
        Self::new(id, amount, DocumentBody::ReceiptVoucher { cash_account, customer_account })
    }

    pub fn disbursement_voucher(id: i64, amount: Decimal, expense_account: i64, bank_account: i64) -> Self {
        Self::new(id, amount, DocumentBody::DisbursementVoucher { expense_account, bank_account })
    }

    pub fn asset_expense(id: i64, amount: Decimal, asset_account: i64, accrued_account: i64) -> Self {
        Self::new(id, amount, DocumentBody::AssetExpense { asset_account, accrued_account })
    }

    /// El monto del documento es el total de débitos de sus líneas.
    pub fn dynamic_entry(id: i64, lines: Vec<ScreenLine>) -> Self {
        let amount = lines.iter()
                          .filter(|l| l.side == Side::Debit)
                          .map(|l| l.amount)
                          .sum();
        Self::new(id, amount, DocumentBody::DynamicScreenEntry { lines })
    }

    pub fn in_branch(mut self, branch_id: i64) -> Self {
        self.branch_id = Some(branch_id);
        self
    }

    /// Moneda original y tasa hacia la moneda base, fijada al enviar.
    pub fn in_currency(mut self, currency_id: i64, exchange_rate: Decimal) -> Self {
        self.currency_id = currency_id;
        self.exchange_rate = exchange_rate;
        self
    }

    pub fn with_cost_center(mut self, cost_center_id: i64) -> Self {
        self.cost_center_id = Some(cost_center_id);
        self
    }

    pub fn initiated_by(mut self, initiator_id: impl Into<String>) -> Self {
        self.initiator_id = initiator_id.into();
        self
    }

    pub fn reference(&self) -> DocumentRef {
        DocumentRef::new(self.body.document_type(), self.id)
    }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn branch_id(&self) -> Option<i64> { self.branch_id }
    pub fn body(&self) -> &DocumentBody { &self.body }

    pub fn amount_in_base(&self) -> Decimal {
        (self.amount * self.exchange_rate).round_dp_with_strategy(BASE_DECIMAL_PLACES,
                                                                  RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.amount <= Decimal::ZERO {
            return Err(DocumentError::ValidationError(format!("document {} must have a positive amount",
                                                              self.reference())));
        }
        if self.exchange_rate <= Decimal::ZERO {
            return Err(DocumentError::ValidationError(format!("document {} has a non-positive exchange rate",
                                                              self.reference())));
        }
        if self.initiator_id.trim().is_empty() {
            return Err(DocumentError::ValidationError("initiator id is empty".to_string()));
        }
        match &self.body {
            DocumentBody::DynamicScreenEntry { lines } => self.validate_lines(lines),
            body => match body.account_pair() {
                Some((debit, credit)) if debit == credit => {
                    Err(DocumentError::ValidationError(format!("document {} debits and credits account {debit}",
                                                               self.reference())))
                }
                _ => Ok(()),
            },
        }
    }

    fn validate_lines(&self, lines: &[ScreenLine]) -> Result<(), DocumentError> {
        if lines.iter().any(|l| l.amount <= Decimal::ZERO) {
            return Err(DocumentError::ValidationError(format!("document {} has a non-positive line",
                                                              self.reference())));
        }
        let debit: Decimal = lines.iter().filter(|l| l.side == Side::Debit).map(|l| l.amount).sum();
        let credit: Decimal = lines.iter().filter(|l| l.side == Side::Credit).map(|l| l.amount).sum();
        if debit.is_zero() || credit.is_zero() {
            return Err(DocumentError::ValidationError(format!("document {} needs debit and credit lines",
                                                              self.reference())));
        }
        if debit != credit {
            return Err(DocumentError::ValidationError(format!("document {} lines are unbalanced ({debit} != {credit})",
                                                              self.reference())));
        }
        if debit != self.amount {
            return Err(DocumentError::ValidationError(format!("document {} amount {} differs from its lines",
                                                              self.reference(),
                                                              self.amount)));
        }
        Ok(())
    }

    /// Envío para el motor: monto original, tasa y monto en base ya fijados.
    pub fn submission(&self) -> Result<DocumentSubmission, DocumentError> {
        self.validate()?;
        Ok(DocumentSubmission { document: self.reference(),
                                amount_in_base: self.amount_in_base(),
                                original_amount: self.amount,
                                currency_id: self.currency_id,
                                exchange_rate: self.exchange_rate,
                                branch_id: self.branch_id,
                                initiator_id: self.initiator_id.clone() })
    }

    /// Líneas en moneda original por `amount` (el monto capturado en la
    /// instancia).
    pub fn posting_lines(&self, amount: Decimal) -> Result<Vec<PostingLine>, DocumentError> {
        if let DocumentBody::DynamicScreenEntry { lines } = &self.body {
            if amount != self.amount {
                return Err(DocumentError::ValidationError(format!("document {} changed since submission ({} != {amount})",
                                                                  self.reference(),
                                                                  self.amount)));
            }
            return Ok(lines.iter()
                           .map(|l| {
                               let line = match l.side {
                                   Side::Debit => PostingLine::debit(l.account_id, l.amount),
                                   Side::Credit => PostingLine::credit(l.account_id, l.amount),
                               };
                               let line = line.with_cost_center(l.cost_center_id.or(self.cost_center_id));
                               match &l.memo {
                                   Some(memo) => line.with_memo(memo.clone()),
                                   None => line,
                               }
                           })
                           .collect());
        }
        let Some((debit, credit)) = self.body.account_pair() else {
            return Ok(Vec::new());
        };
        let memo = self.reference().to_string();
        Ok(vec![PostingLine::debit(debit, amount).with_cost_center(self.cost_center_id)
                                                 .with_memo(memo.clone()),
                PostingLine::credit(credit, amount).with_cost_center(self.cost_center_id)
                                                   .with_memo(memo)])
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} amount={} currency={}>", self.reference(), self.amount, self.currency_id)
    }
}
