//! Cart pricing.
//!
//! Totals are derived from server-held cart state at the moment they are
//! needed and are never trusted from client input. All amounts are
//! `Decimal` rounded to 2 places (half-up) at the point of storage.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

/// Flat sales tax applied to every priceable cart. No jurisdictional
/// rules, no multi-currency.
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2); // 0.08

/// One cart line joined with the product price current at read time.
/// A `None` price marks a quote-only product, which never contributes
/// to the subtotal.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product_id: i32,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// subtotal = round2(Σ price × qty) over priceable lines,
/// tax = round2(subtotal × rate), total = subtotal + tax.
pub fn compute_totals(lines: &[PricedLine]) -> CartTotals {
    let subtotal: Decimal = lines
        .iter()
        .filter_map(|line| {
            line.unit_price
                .map(|price| price * Decimal::from(line.quantity))
        })
        .sum();

    let subtotal = round_money(subtotal);
    let tax = round_money(subtotal * TAX_RATE);
    let total = subtotal + tax;

    CartTotals {
        subtotal,
        tax,
        total,
    }
}

/// 2 decimal places, midpoints rounded away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts an already-rounded amount into integer minor units for the
/// payment provider. Returns `None` if the amount does not fit in `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED).to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: i32, quantity: i32, unit_price: Option<&str>) -> PricedLine {
        PricedLine {
            product_id,
            quantity,
            unit_price: unit_price.map(|p| p.parse().unwrap()),
        }
    }

    #[test]
    fn two_line_cart() {
        // {A: 10.00 x 2, B: 5.00 x 1} -> 25.00 / 2.00 / 27.00
        let totals = compute_totals(&[line(1, 2, Some("10.00")), line(2, 1, Some("5.00"))]);
        assert_eq!(totals.subtotal, "25.00".parse::<Decimal>().unwrap());
        assert_eq!(totals.tax, "2.00".parse::<Decimal>().unwrap());
        assert_eq!(totals.total, "27.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn quote_only_lines_do_not_price() {
        let totals = compute_totals(&[line(1, 3, None)]);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn quote_only_lines_are_skipped_amid_priced_ones() {
        let totals = compute_totals(&[line(1, 5, None), line(2, 1, Some("12.50"))]);
        assert_eq!(totals.subtotal, "12.50".parse::<Decimal>().unwrap());
        assert_eq!(totals.tax, "1.00".parse::<Decimal>().unwrap());
        assert_eq!(totals.total, "13.50".parse::<Decimal>().unwrap());
    }

    #[test]
    fn empty_cart_prices_to_zero() {
        let totals = compute_totals(&[]);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn tax_rounds_to_two_places() {
        // 10.31 * 0.08 = 0.8248 -> 0.82
        let totals = compute_totals(&[line(1, 1, Some("10.31"))]);
        assert_eq!(totals.tax, "0.82".parse::<Decimal>().unwrap());
        // 10.94 * 0.08 = 0.8752 -> 0.88
        let totals = compute_totals(&[line(1, 1, Some("10.94"))]);
        assert_eq!(totals.tax, "0.88".parse::<Decimal>().unwrap());
    }

    #[test]
    fn midpoints_round_up() {
        assert_eq!(
            round_money("1.005".parse().unwrap()),
            "1.01".parse::<Decimal>().unwrap()
        );
        assert_eq!(
            round_money("2.675".parse().unwrap()),
            "2.68".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn total_is_sum_of_rounded_parts() {
        let totals = compute_totals(&[line(1, 3, Some("3.33")), line(2, 2, Some("7.49"))]);
        assert_eq!(totals.total, totals.subtotal + totals.tax);
    }

    #[test]
    fn minor_units_for_payment_provider() {
        assert_eq!(to_minor_units("27.00".parse().unwrap()), Some(2700));
        assert_eq!(to_minor_units("0.01".parse().unwrap()), Some(1));
        assert_eq!(to_minor_units(Decimal::ZERO), Some(0));
    }
}
