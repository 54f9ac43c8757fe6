//! Receipt code polling after a confirmed vote

use std::time::Duration;

use tokio::time;
use tracing::{debug, info, warn};

use votechain_core::{Candidate, Receipt, ReceiptLookup, TxHash};

use crate::backend::Backend;
use crate::config::Timeouts;
use crate::policy::{Deadline, Ticker};

/// Bounds for the lookup loop
#[derive(Debug, Clone)]
pub struct ReceiptPolling {
    pub window: Duration,
    pub interval: Duration,
    pub lookup_timeout: Duration,
}

impl From<&Timeouts> for ReceiptPolling {
    fn from(t: &Timeouts) -> Self {
        Self {
            window: t.receipt_window,
            interval: t.receipt_poll_interval,
            lookup_timeout: t.receipt_lookup,
        }
    }
}

/// Poll for the receipt code of `tx_hash`
///
/// Always returns: with the code once the backend has one, or with a
/// placeholder receipt when the window runs out.
pub async fn resolve_receipt(
    backend: &dyn Backend,
    tx_hash: &TxHash,
    candidate: Candidate,
    polling: &ReceiptPolling,
) -> Receipt {
    let deadline = Deadline::after(polling.window);
    let mut ticker = Ticker::new(polling.interval);
    let mut lookups = 0u32;

    loop {
        ticker.tick().await;
        if deadline.expired() {
            break;
        }
        lookups += 1;
        let budget = polling.lookup_timeout.min(deadline.remaining());
        match time::timeout(budget, backend.lookup_receipt(tx_hash)).await {
            Ok(Ok(ReceiptLookup::Found(code))) => {
                info!("Receipt code {} after {} lookups", code, lookups);
                return Receipt::with_code(code, tx_hash.clone(), candidate);
            }
            Ok(Ok(ReceiptLookup::Pending)) => debug!("Receipt code not ready"),
            Ok(Err(e)) => debug!("Receipt lookup failed: {}", e),
            Err(_) => debug!("Receipt lookup timed out"),
        }
    }

    warn!(
        "No receipt code for {} within {:?}; issuing placeholder",
        tx_hash, polling.window
    );
    Receipt::placeholder(tx_hash.clone(), candidate)
}
