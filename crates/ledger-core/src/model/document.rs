use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::BASE_DECIMAL_PLACES;
use crate::errors::EngineError;

/// Tipos de documento que pasan por aprobación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    PaymentVoucher,
    ReceiptVoucher,
    DisbursementVoucher,
    DynamicScreenEntry,
    AssetExpense,
}

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [DocumentType::PaymentVoucher,
                                        DocumentType::ReceiptVoucher,
                                        DocumentType::DisbursementVoucher,
                                        DocumentType::DynamicScreenEntry,
                                        DocumentType::AssetExpense];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::PaymentVoucher => "payment_voucher",
            DocumentType::ReceiptVoucher => "receipt_voucher",
            DocumentType::DisbursementVoucher => "disbursement_voucher",
            DocumentType::DynamicScreenEntry => "dynamic_screen_entry",
            DocumentType::AssetExpense => "asset_expense",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL.iter()
                         .copied()
                         .find(|t| t.as_str() == s.trim())
                         .ok_or_else(|| EngineError::Validation(format!("unknown document type '{s}'")))
    }
}

/// Referencia polimórfica `(tipo, id)` a un documento de negocio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_type: DocumentType,
    pub document_id: i64,
}

impl DocumentRef {
    pub fn new(document_type: DocumentType, document_id: i64) -> Self {
        Self { document_type, document_id }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document_type, self.document_id)
    }
}

/// Datos que el documento aporta al abrir su instancia de aprobación.
///
/// El tipo de cambio queda capturado aquí; la contabilización usa siempre el
/// valor registrado en la instancia, nunca una tasa recalculada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSubmission {
    pub document: DocumentRef,
    pub amount_in_base: Decimal,
    pub original_amount: Decimal,
    pub currency_id: i64,
    pub exchange_rate: Decimal,
    pub branch_id: Option<i64>,
    pub initiator_id: String,
}

impl DocumentSubmission {
    /// Envío en moneda base (tasa 1).
    pub fn in_base(document: DocumentRef,
                   amount: Decimal,
                   currency_id: i64,
                   branch_id: Option<i64>,
                   initiator_id: impl Into<String>)
                   -> Self {
        Self { document,
               amount_in_base: amount,
               original_amount: amount,
               currency_id,
               exchange_rate: Decimal::ONE,
               branch_id,
               initiator_id: initiator_id.into() }
    }

    /// Monto original convertido a moneda base, redondeado como en la
    /// contabilización.
    pub fn converted_amount(&self) -> Decimal {
        (self.original_amount * self.exchange_rate).round_dp_with_strategy(BASE_DECIMAL_PLACES,
                                                                           RoundingStrategy::MidpointAwayFromZero)
    }

    /// El ruteo usa `amount_in_base` y el asiento usa `original_amount *
    /// exchange_rate`: ambos deben coincidir.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.amount_in_base.is_sign_negative() || self.original_amount.is_sign_negative() {
            return Err(EngineError::Validation(format!("document {} has a negative amount", self.document)));
        }
        if self.exchange_rate <= Decimal::ZERO {
            return Err(EngineError::Validation(format!("document {} has a non-positive exchange rate",
                                                       self.document)));
        }
        let converted = self.converted_amount();
        if converted != self.amount_in_base {
            return Err(EngineError::Validation(format!("document {} declares amount_in_base {} but {} x {} = {}",
                                                       self.document,
                                                       self.amount_in_base,
                                                       self.original_amount,
                                                       self.exchange_rate,
                                                       converted)));
        }
        if self.initiator_id.trim().is_empty() {
            return Err(EngineError::Validation("initiator id is empty".into()));
        }
        Ok(())
    }
}

/// Estado contable del documento, mantenido por el motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Submitted,
    Posted,
    Rejected,
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Submitted => "submitted",
            DocumentStatus::Posted => "posted",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(DocumentStatus::Submitted),
            "posted" => Some(DocumentStatus::Posted),
            "rejected" => Some(DocumentStatus::Rejected),
            "cancelled" => Some(DocumentStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estado del documento y referencia a su asiento (única, una sola vez).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLedgerState {
    pub document: DocumentRef,
    pub status: DocumentStatus,
    pub journal_entry_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentLedgerState {
    pub fn submitted(document: DocumentRef, at: DateTime<Utc>) -> Self {
        Self { document, status: DocumentStatus::Submitted, journal_entry_id: None, updated_at: at }
    }
}
