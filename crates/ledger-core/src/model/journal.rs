//! Asiento contable en partida doble.
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DocumentRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Draft,
    Posted,
    Reversed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Posted => "posted",
            EntryStatus::Reversed => "reversed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(EntryStatus::Draft),
            "posted" => Some(EntryStatus::Posted),
            "reversed" => Some(EntryStatus::Reversed),
            _ => None,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Debit,
    Credit,
}

/// Línea de asiento: exactamente uno de `debit`/`credit` es positivo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryLine {
    pub id: Uuid,
    pub line_no: i32,
    pub account_id: i64,
    pub debit: Decimal,
    pub credit: Decimal,
    pub cost_center_id: Option<i64>,
    pub memo: Option<String>,
}

impl JournalEntryLine {
    pub fn side(&self) -> Side {
        if self.debit > Decimal::ZERO {
            Side::Debit
        } else {
            Side::Credit
        }
    }

    pub fn amount(&self) -> Decimal {
        self.debit + self.credit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    /// Secuencial por año fiscal.
    pub number: i64,
    pub fiscal_year: i32,
    pub date: NaiveDate,
    pub status: EntryStatus,
    pub description: String,
    pub document: DocumentRef,
    pub instance_id: Uuid,
    pub currency_id: i64,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub lines: Vec<JournalEntryLine>,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Referencia legible, p. ej. `JE-2025-000042`.
    pub fn reference(&self) -> String {
        format!("JE-{}-{:06}", self.fiscal_year, self.number)
    }

    pub fn is_balanced(&self) -> bool {
        let debit: Decimal = self.lines.iter().map(|l| l.debit).sum();
        let credit: Decimal = self.lines.iter().map(|l| l.credit).sum();
        debit == credit && debit == self.total_debit && credit == self.total_credit
    }
}
