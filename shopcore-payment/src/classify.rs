use rust_decimal::Decimal;

use crate::models::{ConfirmedPayment, PaymentVerdict};

/// Classifies an inbound confirmed payment against what was required.
/// Order of checks matters: currency mismatch and lateness are reported
/// ahead of amount comparison since they apply regardless of amount.
pub fn classify_payment(payment: ConfirmedPayment, tolerance_percent: Decimal) -> PaymentVerdict {
    if payment.paid_currency != payment.required_currency {
        return PaymentVerdict::CurrencyMismatch;
    }
    if payment.now > payment.deadline {
        return PaymentVerdict::LatePayment;
    }
    if payment.paid == payment.required {
        return PaymentVerdict::ExactMatch;
    }
    if payment.paid < payment.required {
        return PaymentVerdict::Underpayment;
    }
    if payment.paid.within_tolerance_of(payment.required, tolerance_percent) {
        PaymentVerdict::MinorOverpayment
    } else {
        PaymentVerdict::Overpayment
    }
}
