use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Compuerta de monto `[min, max)` evaluada contra el monto del documento en
/// moneda base. Un límite ausente no acota ese lado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AmountGate {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl AmountGate {
    pub fn unbounded() -> Self {
        Self { min: None, max: None }
    }

    pub fn between(min: Decimal, max: Decimal) -> Self {
        Self { min: Some(min), max: Some(max) }
    }

    pub fn at_least(min: Decimal) -> Self {
        Self { min: Some(min), max: None }
    }

    pub fn below(max: Decimal) -> Self {
        Self { min: None, max: Some(max) }
    }

    /// Inclusivo abajo, exclusivo arriba.
    pub fn contains(&self, amount: Decimal) -> bool {
        let above_min = self.min.map_or(true, |min| amount >= min);
        let below_max = self.max.map_or(true, |max| amount < max);
        above_min && below_max
    }

    /// `min <= max` cuando ambos existen.
    pub fn is_consistent(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => min <= max,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn lower_bound_inclusive_upper_exclusive() {
        let gate = AmountGate::between(dec!(0), dec!(10000));
        assert!(gate.contains(dec!(0)));
        assert!(gate.contains(dec!(9999.99)));
        assert!(!gate.contains(dec!(10000)));
    }

    #[test]
    fn missing_bounds_are_unbounded() {
        assert!(AmountGate::unbounded().contains(dec!(-5)));
        assert!(AmountGate::at_least(dec!(10000)).contains(dec!(10000)));
        assert!(AmountGate::at_least(dec!(10000)).contains(dec!(99999999)));
        assert!(!AmountGate::below(dec!(100)).contains(dec!(100)));
    }

    #[test]
    fn contradictory_gate_detected() {
        assert!(!AmountGate::between(dec!(10), dec!(5)).is_consistent());
        assert!(AmountGate::between(dec!(5), dec!(5)).is_consistent());
    }
}
