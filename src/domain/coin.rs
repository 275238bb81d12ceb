use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{coins_for_amount, Cents, ClientId, Coins};

pub type CoinTransactionId = i64;

/// One entry in a client's loyalty-coin log.
/// Entries are never edited; a reversal deletes the row after compensating
/// the client's balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinTransaction {
    pub id: CoinTransactionId,
    pub client_id: ClientId,
    /// Client name at posting time. Not re-synced on rename.
    pub client_name: String,
    /// Fiat amount that earned the coins (0 for manual adjustments)
    pub amount_cents: Cents,
    /// Signed delta applied to the client's coin balance
    pub coins_added: Coins,
    pub date: DateTime<Utc>,
}

/// A coin posting before it has been persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CoinPosting {
    pub client_id: ClientId,
    pub client_name: String,
    pub amount_cents: Cents,
    pub coins_added: Coins,
    pub date: DateTime<Utc>,
}

impl CoinPosting {
    /// Coins earned by a purchase.
    pub fn purchase(
        client_id: ClientId,
        client_name: impl Into<String>,
        amount_cents: Cents,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id,
            client_name: client_name.into(),
            amount_cents,
            coins_added: coins_for_amount(amount_cents),
            date,
        }
    }

    /// Out-of-band correction of the balance, recorded in the log.
    pub fn adjustment(
        client_id: ClientId,
        client_name: impl Into<String>,
        coins_delta: Coins,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id,
            client_name: client_name.into(),
            amount_cents: 0,
            coins_added: coins_delta,
            date,
        }
    }

    pub fn into_transaction(self, id: CoinTransactionId) -> CoinTransaction {
        CoinTransaction {
            id,
            client_id: self.client_id,
            client_name: self.client_name,
            amount_cents: self.amount_cents,
            coins_added: self.coins_added,
            date: self.date,
        }
    }
}
