use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Price breakdown for a set of cart or order lines. Derived on demand and
/// never stored, so the client store and the server always agree on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceQuote {
    #[schema(value_type = String)]
    pub items_price: Decimal,
    #[schema(value_type = String)]
    pub shipping_price: Decimal,
    #[schema(value_type = String)]
    pub tax_price: Decimal,
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

/// Compute the quote for `(unit price, quantity)` lines.
///
/// Shipping is free above 100, otherwise a flat 10. Tax is 15% of the items
/// subtotal. Rounding is half-up to 2 decimal places and happens only at the
/// tax and total steps, never per line; the order matters for the client and
/// server totals to reconcile digit for digit.
pub fn quote<I>(lines: I) -> PriceQuote
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    let free_shipping_threshold = Decimal::from(100);
    let shipping_fee = Decimal::from(10);
    let tax_rate = Decimal::new(15, 2);

    let items_price: Decimal = lines
        .into_iter()
        .map(|(price, quantity)| price * Decimal::from(quantity))
        .sum();

    let shipping_price = if items_price > free_shipping_threshold {
        Decimal::ZERO
    } else {
        shipping_fee
    };

    let tax_price = (items_price * tax_rate)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let total_price = (items_price + shipping_price + tax_price)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    PriceQuote {
        items_price,
        shipping_price,
        tax_price,
        total_price,
    }
}
