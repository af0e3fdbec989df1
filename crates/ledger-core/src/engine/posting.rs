//! Servicio de contabilización.
//!
//! Convierte las líneas del colaborador (moneda original) a moneda base con
//! la tasa capturada en la instancia, redondea a `BASE_DECIMAL_PLACES` y
//! deposita el residuo de redondeo en una sola línea designada. Un asiento
//! que no cuadra nunca se persiste: el error revierte toda la transacción.
use chrono::{DateTime, Datelike, Utc};
use log::{error, info};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use super::NumberingService;
use crate::collab::{AccountMapper, PostingLine};
use crate::constants::BASE_DECIMAL_PLACES;
use crate::errors::{ConcurrencyError, ConfigurationError, EngineError, StoreError};
use crate::event::WorkflowEventKind;
use crate::model::{EntryStatus, JournalEntry, JournalEntryLine, Side, WorkflowInstance};
use crate::repo::UnitOfWork;

#[derive(Debug, Clone)]
pub struct PostingService {
    journal_key: String,
    base_currency_id: i64,
}

impl PostingService {
    pub fn new(journal_key: impl Into<String>, base_currency_id: i64) -> Self {
        Self { journal_key: journal_key.into(), base_currency_id }
    }

    pub fn journal_key(&self) -> &str {
        &self.journal_key
    }

    /// Convierte y balancea las líneas.
    ///
    /// Reglas:
    /// - al menos un débito y un crédito, todos los montos positivos;
    /// - balance exacto en moneda original;
    /// - tras convertir, el residuo no puede superar un centavo por línea;
    /// - el residuo va a la línea marcada `absorbs_rounding` o, si no hay, a la
    ///   de mayor monto (la primera ante empate).
    pub fn build_lines(lines: &[PostingLine], rate: Decimal) -> Result<Vec<JournalEntryLine>, EngineError> {
        if rate <= Decimal::ZERO {
            return Err(EngineError::PostingInvariant(format!("non-positive exchange rate {rate}")));
        }
        if !lines.iter().any(|l| l.side == Side::Debit) || !lines.iter().any(|l| l.side == Side::Credit) {
            return Err(EngineError::PostingInvariant("entry needs at least one debit and one credit line".into()));
        }
        if let Some(bad) = lines.iter().find(|l| l.amount <= Decimal::ZERO) {
            return Err(EngineError::PostingInvariant(format!("line for account {} has non-positive amount {}",
                                                             bad.account_id, bad.amount)));
        }
        let (orig_debit, orig_credit) = totals(lines.iter().map(|l| (l.side, l.amount)));
        if orig_debit != orig_credit {
            return Err(EngineError::PostingInvariant(format!("unbalanced in original currency: debit {orig_debit} != credit {orig_credit}")));
        }

        let mut converted: Vec<(Side, Decimal)> =
            lines.iter()
                 .map(|l| {
                     (l.side,
                      (l.amount * rate).round_dp_with_strategy(BASE_DECIMAL_PLACES,
                                                               RoundingStrategy::MidpointAwayFromZero))
                 })
                 .collect();

        let (debit, credit) = totals(converted.iter().copied());
        let diff = debit - credit;
        if !diff.is_zero() {
            let cent = Decimal::new(1, BASE_DECIMAL_PLACES);
            let limit = cent * Decimal::from(lines.len() as i64);
            if diff.abs() > limit {
                return Err(EngineError::PostingInvariant(format!("rounding remainder {diff} exceeds {limit}")));
            }
            let idx = absorbing_line(lines, &converted);
            let (side, amount) = converted[idx];
            let adjusted = match side {
                Side::Debit => amount - diff,
                Side::Credit => amount + diff,
            };
            if adjusted <= Decimal::ZERO {
                return Err(EngineError::PostingInvariant(format!("rounding remainder {diff} cannot be absorbed by line {}",
                                                                 idx + 1)));
            }
            converted[idx] = (side, adjusted);
        }

        let (debit, credit) = totals(converted.iter().copied());
        if debit != credit {
            return Err(EngineError::PostingInvariant(format!("debit {debit} != credit {credit} after conversion")));
        }

        Ok(lines.iter()
                .zip(converted)
                .enumerate()
                .map(|(i, (line, (side, amount)))| {
                    let (debit, credit) = match side {
                        Side::Debit => (amount, Decimal::ZERO),
                        Side::Credit => (Decimal::ZERO, amount),
                    };
                    JournalEntryLine { id: Uuid::new_v4(),
                                       line_no: i as i32 + 1,
                                       account_id: line.account_id,
                                       debit,
                                       credit,
                                       cost_center_id: line.cost_center_id,
                                       memo: line.memo.clone() }
                })
                .collect())
    }

    /// Registra el asiento de una instancia aprobada.
    ///
    /// Debe llamarse dentro de la misma unidad de trabajo que aprobó la
    /// instancia. La referencia contable del documento se verifica nula y se
    /// fija en esa misma transacción.
    pub fn post(&self,
                uow: &mut dyn UnitOfWork,
                numbering: &NumberingService,
                accounts: &dyn AccountMapper,
                instance: &WorkflowInstance,
                at: DateTime<Utc>)
                -> Result<JournalEntry, EngineError> {
        let document = instance.document;
        if uow.document_state(document)?
              .is_some_and(|s| s.journal_entry_id.is_some())
        {
            return Err(ConcurrencyError::AlreadyPosted(document).into());
        }

        let proposed = accounts.posting_lines(instance)?
                               .ok_or(ConfigurationError::MissingAccountMapping(document))?;
        let lines = match Self::build_lines(&proposed, instance.exchange_rate) {
            Ok(lines) => lines,
            Err(e) => {
                error!("posting:invariant instance_id={} document={document} {e}", instance.id);
                return Err(e);
            }
        };

        let date = at.date_naive();
        let fiscal_year = date.year();
        let number = numbering.next(uow, &self.journal_key, fiscal_year)?;
        let (total_debit, total_credit) = totals(lines.iter().map(|l| (l.side(), l.amount())));
        let entry = JournalEntry { id: Uuid::new_v4(),
                                   number,
                                   fiscal_year,
                                   date,
                                   status: EntryStatus::Posted,
                                   description: format!("{document} approved via workflow {}", instance.id),
                                   document,
                                   instance_id: instance.id,
                                   currency_id: self.base_currency_id,
                                   total_debit,
                                   total_credit,
                                   lines,
                                   created_at: at };

        match uow.insert_journal_entry(&entry) {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(_)) => return Err(ConcurrencyError::AlreadyPosted(document).into()),
            Err(e) => return Err(e.into()),
        }
        if !uow.mark_document_posted(document, entry.id, at)? {
            return Err(ConcurrencyError::AlreadyPosted(document).into());
        }
        uow.append_event(instance.id,
                         WorkflowEventKind::EntryPosted { journal_entry_id: entry.id,
                                                          number,
                                                          fiscal_year },
                         at)?;
        info!("posting:done instance_id={} document={document} entry={} total={total_debit}",
              instance.id,
              entry.reference());
        Ok(entry)
    }
}

fn totals(items: impl Iterator<Item = (Side, Decimal)>) -> (Decimal, Decimal) {
    items.fold((Decimal::ZERO, Decimal::ZERO), |(d, c), (side, amount)| match side {
             Side::Debit => (d + amount, c),
             Side::Credit => (d, c + amount),
         })
}

fn absorbing_line(lines: &[PostingLine], converted: &[(Side, Decimal)]) -> usize {
    if let Some(idx) = lines.iter().position(|l| l.absorbs_rounding) {
        return idx;
    }
    let mut best = 0;
    for (i, (_, amount)) in converted.iter().enumerate() {
        if *amount > converted[best].1 {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sums(lines: &[JournalEntryLine]) -> (Decimal, Decimal) {
        (lines.iter().map(|l| l.debit).sum(), lines.iter().map(|l| l.credit).sum())
    }

    #[test]
    fn base_currency_lines_pass_through() {
        let lines = [PostingLine::debit(5100, dec!(8000)), PostingLine::credit(1000, dec!(8000))];
        let out = PostingService::build_lines(&lines, Decimal::ONE).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(sums(&out), (dec!(8000), dec!(8000)));
        assert_eq!(out[0].line_no, 1);
        assert_eq!(out[1].credit, dec!(8000));
        assert!(out.iter().all(|l| l.debit.is_zero() ^ l.credit.is_zero()));
    }

    #[test]
    fn rounding_remainder_goes_to_designated_line() {
        // 3 x 0.335 = 1.005 -> 1.01 ; cada 0.335 -> 0.34 => 1.02 en débitos
        let lines = [PostingLine::debit(1, dec!(1)),
                     PostingLine::debit(2, dec!(1)),
                     PostingLine::debit(3, dec!(1)).absorbing_rounding(),
                     PostingLine::credit(9, dec!(3))];
        let out = PostingService::build_lines(&lines, dec!(0.335)).unwrap();
        let (d, c) = sums(&out);
        assert_eq!(d, c);
        assert_eq!(c, dec!(1.01));
        assert_eq!(out[0].debit, dec!(0.34));
        assert_eq!(out[2].debit, dec!(0.33));
    }

    #[test]
    fn remainder_defaults_to_largest_line() {
        let lines = [PostingLine::debit(1, dec!(1)),
                     PostingLine::debit(2, dec!(1)),
                     PostingLine::debit(3, dec!(1)),
                     PostingLine::credit(9, dec!(3))];
        let out = PostingService::build_lines(&lines, dec!(0.335)).unwrap();
        // sin línea marcada, el crédito (1.01) es el mayor y absorbe +0.01
        assert_eq!(out[3].credit, dec!(1.02));
        assert_eq!(sums(&out).0, sums(&out).1);
    }

    #[test]
    fn unbalanced_mapping_is_invariant_error() {
        let lines = [PostingLine::debit(1, dec!(100)), PostingLine::credit(2, dec!(99))];
        let err = PostingService::build_lines(&lines, Decimal::ONE).unwrap_err();
        assert!(matches!(err, EngineError::PostingInvariant(_)));
        assert!(err.is_system_fault());
    }

    #[test]
    fn one_sided_or_empty_rejected() {
        assert!(PostingService::build_lines(&[], Decimal::ONE).is_err());
        assert!(PostingService::build_lines(&[PostingLine::debit(1, dec!(1))], Decimal::ONE).is_err());
        let zero = [PostingLine::debit(1, dec!(0)), PostingLine::credit(2, dec!(0))];
        assert!(PostingService::build_lines(&zero, Decimal::ONE).is_err());
    }
}
