//! Payment-processor settlement notifications.

use serde::{Deserialize, Serialize};

use crate::{Transaction, UserId};

/// An authenticated notification that a token purchase was paid.
///
/// Not stored on its own: the `event_id` becomes the idempotency key of the
/// purchase transaction it produces, which is what guarantees at most one
/// credit per event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementEvent {
    /// Processor-assigned event id, globally unique.
    pub event_id: String,

    /// The user to credit, read back from checkout metadata.
    pub user_id: UserId,

    /// Tokens to credit.
    pub token_amount: i64,

    /// The signature header the notification arrived with.
    pub raw_payload_signature: String,
}

impl SettlementEvent {
    /// The completed purchase entry that applying this event records.
    #[must_use]
    pub fn purchase_transaction(&self) -> Transaction {
        Transaction::purchase(
            self.user_id,
            self.token_amount,
            format!("Purchased {} tokens", self.token_amount),
        )
        .with_idempotency_key(self.event_id.clone())
    }
}
