use rand::Rng;

use crate::error::PaymentError;

const INVOICE_NUMBER_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
const INVOICE_NUMBER_CODE_LEN: usize = 6;
const MAX_GENERATION_ATTEMPTS: u32 = 10;

/// Generates an `INV-<year>-<code>` number, retrying against a uniqueness
/// check up to 10 times. The alphabet omits `0`/`O`/`1`/`I`/`L` to avoid
/// characters that are easily confused when read aloud or transcribed.
pub async fn generate_invoice_number<F, Fut>(year: i32, exists: F) -> Result<String, PaymentError>
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = Result<bool, PaymentError>>,
{
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let code: String = (0..INVOICE_NUMBER_CODE_LEN)
            .map(|_| INVOICE_NUMBER_ALPHABET[rng.gen_range(0..INVOICE_NUMBER_ALPHABET.len())] as char)
            .collect();
        let candidate = format!("INV-{year}-{code}");
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
    }
    Err(PaymentError::InvoiceNumberExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn generates_expected_format() {
        let number = generate_invoice_number(2026, |_| async { Ok(false) }).await.unwrap();
        assert!(number.starts_with("INV-2026-"));
        assert_eq!(number.len(), "INV-2026-".len() + 6);
    }

    #[tokio::test]
    async fn retries_on_collision_then_succeeds() {
        let attempts = AtomicUsize::new(0);
        let number = generate_invoice_number(2026, |_| {
            let first = attempts.fetch_add(1, Ordering::SeqCst) == 0;
            async move { Ok(first) }
        })
        .await
        .unwrap();
        assert!(number.starts_with("INV-2026-"));
    }

    #[tokio::test]
    async fn exhausts_after_ten_collisions() {
        let result = generate_invoice_number(2026, |_| async { Ok(true) }).await;
        assert!(matches!(result, Err(PaymentError::InvoiceNumberExhausted)));
    }
}
