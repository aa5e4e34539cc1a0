use rust_decimal::Decimal;
use shopcore_domain::Fiat;

use crate::models::RefundBreakdown;

/// Computes the refund owed on cancellation.
///
/// For mixed orders (both digital and physical items) the refundable base
/// excludes digital items — they are treated as already delivered and
/// non-refundable — and is `sum(physical item prices) + shipping_cost`.
/// Digital-only or physical-only orders refund the full amount paid.
pub fn compute_refund_breakdown(
    total_paid: Fiat,
    is_mixed_order: bool,
    physical_items_total: Fiat,
    shipping_cost: Fiat,
    penalty_applies: bool,
    penalty_percent: Decimal,
) -> RefundBreakdown {
    let refundable_base = if is_mixed_order {
        physical_items_total.checked_add(shipping_cost).unwrap_or(physical_items_total)
    } else {
        total_paid
    };

    let (penalty_amount, final_refund, stored_percent) = if penalty_applies {
        let penalty = refundable_base.percent(penalty_percent);
        let final_refund = refundable_base.checked_sub(penalty).unwrap_or(Fiat::ZERO);
        (penalty, final_refund, Some(penalty_percent))
    } else {
        (Fiat::ZERO, refundable_base, None)
    };

    RefundBreakdown {
        total_paid,
        refundable_base,
        penalty_percent: stored_percent,
        penalty_amount,
        final_refund,
    }
}

/// If no payment was made but the cancellation is penalty-bearing, a
/// "reservation fee" is deducted from whatever wallet balance the user
/// already holds, capped at the order total.
pub fn compute_reservation_fee(
    order_total: Fiat,
    wallet_balance: Fiat,
    penalty_percent: Decimal,
) -> Fiat {
    order_total.min(wallet_balance).percent(penalty_percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fiat(v: i64) -> Fiat {
        Fiat::new(Decimal::from(v))
    }

    #[test]
    fn mixed_order_refunds_only_physical_portion() {
        // S2: digital €10, physical €20, shipping €3, paid in full €33, no penalty (admin cancel).
        let breakdown = compute_refund_breakdown(fiat(33), true, fiat(20), fiat(3), false, dec!(0));
        assert_eq!(breakdown.final_refund, fiat(23));
    }

    #[test]
    fn digital_only_order_refunds_full_amount_paid() {
        let breakdown = compute_refund_breakdown(fiat(10), false, Fiat::ZERO, Fiat::ZERO, false, dec!(0));
        assert_eq!(breakdown.final_refund, fiat(10));
    }

    #[test]
    fn penalty_reduces_refundable_base() {
        let breakdown = compute_refund_breakdown(fiat(100), false, Fiat::ZERO, Fiat::ZERO, true, dec!(10));
        assert_eq!(breakdown.penalty_amount, fiat(10));
        assert_eq!(breakdown.final_refund, fiat(90));
    }

    #[test]
    fn reservation_fee_is_capped_at_order_total() {
        let fee = compute_reservation_fee(fiat(10), fiat(100), dec!(10));
        assert_eq!(fee, fiat(1));
    }
}
