//! Holdings derived from the trade ledger.

use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
}

impl Position {
    pub fn empty(symbol: &str) -> Self {
        Position {
            symbol: symbol.to_string(),
            quantity: Decimal::ZERO,
            average_cost: Decimal::ZERO,
        }
    }

    /// Blend a purchase into the cost basis. The fee is capitalised into the
    /// basis, so average cost is (held × avg + price × qty + fee) / new qty.
    /// Returns `false` without modifying the position if the basis overflows.
    pub fn add_purchase(&mut self, quantity: Decimal, price: Decimal, fee: Decimal) -> bool {
        let Some(new_quantity) = self.quantity.checked_add(quantity) else {
            return false;
        };
        if new_quantity.is_zero() {
            return true;
        }
        let average_cost = self
            .quantity
            .checked_mul(self.average_cost)
            .zip(price.checked_mul(quantity))
            .and_then(|(held, bought)| held.checked_add(bought))
            .and_then(|basis| basis.checked_add(fee))
            .and_then(|basis| basis.checked_div(new_quantity));
        match average_cost {
            Some(average_cost) => {
                self.average_cost = average_cost;
                self.quantity = new_quantity;
                true
            }
            None => false,
        }
    }

    /// Remove sold shares. Average cost is unchanged by sells.
    /// Returns `false` without modifying the position if `quantity` exceeds
    /// the holding.
    pub fn remove_shares(&mut self, quantity: Decimal) -> bool {
        if quantity > self.quantity {
            return false;
        }
        self.quantity -= quantity;
        true
    }

    pub fn is_closed(&self) -> bool {
        self.quantity.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn first_purchase_sets_basis_including_fee() {
        let mut pos = Position::empty("AAPL");
        pos.add_purchase(dec!(2), dec!(100), dec!(1));
        assert_eq!(pos.quantity, dec!(2));
        assert_eq!(pos.average_cost, dec!(100.5));
    }

    #[test]
    fn second_purchase_blends_weighted() {
        let mut pos = Position::empty("AAPL");
        pos.add_purchase(dec!(2), dec!(100), dec!(1));
        pos.add_purchase(dec!(1), dec!(130), dec!(1));
        assert_eq!(pos.quantity, dec!(3));
        assert_eq!(pos.average_cost, dec!(332) / dec!(3));
    }

    #[test]
    fn sell_keeps_average_cost() {
        let mut pos = Position::empty("AAPL");
        pos.add_purchase(dec!(4), dec!(50), dec!(0));
        assert!(pos.remove_shares(dec!(1)));
        assert_eq!(pos.quantity, dec!(3));
        assert_eq!(pos.average_cost, dec!(50));
    }

    #[test]
    fn oversell_is_refused() {
        let mut pos = Position::empty("AAPL");
        pos.add_purchase(dec!(1), dec!(50), dec!(0));
        assert!(!pos.remove_shares(dec!(2)));
        assert_eq!(pos.quantity, dec!(1));
    }

    #[test]
    fn full_sell_closes() {
        let mut pos = Position::empty("AAPL");
        pos.add_purchase(dec!(1), dec!(50), dec!(0));
        assert!(pos.remove_shares(dec!(1)));
        assert!(pos.is_closed());
    }

    #[test]
    fn overflowing_purchase_leaves_position_unchanged() {
        let mut pos = Position::empty("AAPL");
        assert!(pos.add_purchase(dec!(2), dec!(100), dec!(1)));
        assert!(!pos.add_purchase(Decimal::MAX, dec!(10), dec!(0)));
        assert_eq!(pos.quantity, dec!(2));
        assert_eq!(pos.average_cost, dec!(100.5));
    }
}
