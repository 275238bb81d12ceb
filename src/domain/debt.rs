use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, ClientId};

pub type DebtTransactionId = i64;

/// Notes recorded on balance corrections made through the client update path.
pub const ADJUSTMENT_NOTE: &str = "Manual balance adjustment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtTransactionType {
    /// Purchase on credit: the debt grows
    Charge,
    /// Money received: the debt shrinks, possibly below zero
    Payment,
}

impl DebtTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtTransactionType::Charge => "charge",
            DebtTransactionType::Payment => "payment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "charge" => Some(DebtTransactionType::Charge),
            "payment" => Some(DebtTransactionType::Payment),
            _ => None,
        }
    }

    /// Signed effect of `amount` on a debt balance.
    pub fn signed(&self, amount: Cents) -> Cents {
        match self {
            DebtTransactionType::Charge => amount,
            DebtTransactionType::Payment => -amount,
        }
    }

    /// Balance after applying `amount`. No floor: overpayment leaves a credit.
    pub fn apply(&self, balance: Cents, amount: Cents) -> Cents {
        balance + self.signed(amount)
    }
}

impl std::fmt::Display for DebtTransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One row of a client's running-debt log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtTransaction {
    pub id: DebtTransactionId,
    pub client_id: ClientId,
    /// Client name at posting time. Not re-synced on rename.
    pub client_name: String,
    /// Unsigned magnitude; direction comes from `transaction_type`
    pub amount_cents: Cents,
    pub transaction_type: DebtTransactionType,
    /// Client debt balance immediately after this entry was applied
    pub balance_after: Cents,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl DebtTransaction {
    pub fn signed_amount(&self) -> Cents {
        self.transaction_type.signed(self.amount_cents)
    }

    pub fn is_payment(&self) -> bool {
        self.transaction_type == DebtTransactionType::Payment
    }
}

/// A debt posting before it has been persisted. `balance_after` is assigned
/// by the store from the atomically updated client balance.
#[derive(Debug, Clone, PartialEq)]
pub struct DebtPosting {
    pub client_id: ClientId,
    pub client_name: String,
    pub amount_cents: Cents,
    pub transaction_type: DebtTransactionType,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl DebtPosting {
    pub fn new(
        client_id: ClientId,
        client_name: impl Into<String>,
        amount_cents: Cents,
        transaction_type: DebtTransactionType,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id,
            client_name: client_name.into(),
            amount_cents,
            transaction_type,
            date,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Correction that moves the balance by `delta`, recorded as a regular entry.
    pub fn adjustment(
        client_id: ClientId,
        client_name: impl Into<String>,
        delta: Cents,
        date: DateTime<Utc>,
    ) -> Self {
        let transaction_type = if delta >= 0 {
            DebtTransactionType::Charge
        } else {
            DebtTransactionType::Payment
        };
        Self::new(client_id, client_name, delta.abs(), transaction_type, date)
            .with_notes(Some(ADJUSTMENT_NOTE.to_string()))
    }

    pub fn signed_amount(&self) -> Cents {
        self.transaction_type.signed(self.amount_cents)
    }

    pub fn into_transaction(self, id: DebtTransactionId, balance_after: Cents) -> DebtTransaction {
        DebtTransaction {
            id,
            client_id: self.client_id,
            client_name: self.client_name,
            amount_cents: self.amount_cents,
            transaction_type: self.transaction_type,
            balance_after,
            date: self.date,
            notes: self.notes,
        }
    }
}

/// Notes stored on a debt entry: explicit notes win, otherwise the branch.
pub fn debt_notes(notes: Option<String>, branch: Option<&str>) -> Option<String> {
    match notes.filter(|n| !n.trim().is_empty()) {
        Some(notes) => Some(notes),
        None => branch
            .filter(|b| !b.trim().is_empty())
            .map(|b| format!("Branch: {}", b.trim())),
    }
}
