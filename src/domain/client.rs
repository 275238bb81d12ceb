use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, Coins};

pub type ClientId = i64;

/// A shop client. Both balances are caches of their ledgers:
/// `coin_balance` is the sum of the coin log, `debt_balance` the signed sum
/// of the debt log (positive means the client owes money).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    /// Digits only. Natural key for notifications and point-of-sale lookups.
    pub phone: Option<String>,
    pub coin_balance: Coins,
    pub debt_balance: Cents,
    pub observations: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn owes(&self) -> bool {
        self.debt_balance > 0
    }
}

/// Data needed to register a client. Balances always start at zero.
#[derive(Debug, Clone, Default)]
pub struct NewClient {
    pub name: String,
    pub phone: Option<String>,
    pub observations: Option<String>,
}

impl NewClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_observations(mut self, observations: impl Into<String>) -> Self {
        self.observations = Some(observations.into());
        self
    }
}

/// Partial update of a client record.
#[derive(Debug, Clone, Default)]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub observations: Option<String>,
    /// Target coin balance. Applied as a ledger adjustment, never written directly.
    pub coin_balance: Option<Coins>,
    /// Target debt balance. Applied as a ledger adjustment, never written directly.
    pub debt_balance: Option<Cents>,
}

impl ClientUpdate {
    pub fn touches_profile(&self) -> bool {
        self.name.is_some() || self.phone.is_some() || self.observations.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientSort {
    /// Most coins first
    Coins,
    /// Highest debt first
    Debt,
    /// Newest clients first
    #[default]
    Recent,
}

impl ClientSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientSort::Coins => "coins",
            ClientSort::Debt => "debt",
            ClientSort::Recent => "recent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "coins" => Some(ClientSort::Coins),
            "debt" => Some(ClientSort::Debt),
            "recent" => Some(ClientSort::Recent),
            _ => None,
        }
    }

    pub(crate) fn order_by(&self) -> &'static str {
        match self {
            ClientSort::Coins => "coin_balance DESC, id DESC",
            ClientSort::Debt => "debt_balance DESC, id DESC",
            ClientSort::Recent => "created_at DESC, id DESC",
        }
    }
}

/// Strip everything but digits. Returns None when nothing is left.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() { None } else { Some(digits) }
}

/// Name given to a client created implicitly at the point of sale.
pub fn placeholder_name(phone: &str) -> String {
    format!("Client {}", phone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(
            normalize_phone("+54 9 264 629-8880"),
            Some("5492646298880".to_string())
        );
        assert_eq!(normalize_phone("2646298880"), Some("2646298880".to_string()));
        assert_eq!(normalize_phone("n/a"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn test_client_sort_roundtrip() {
        for sort in [ClientSort::Coins, ClientSort::Debt, ClientSort::Recent] {
            assert_eq!(ClientSort::from_str(sort.as_str()), Some(sort));
        }
        assert_eq!(ClientSort::from_str("DEBT"), Some(ClientSort::Debt));
        assert_eq!(ClientSort::from_str("name"), None);
    }

    #[test]
    fn test_update_touches_profile() {
        let balance_only = ClientUpdate {
            coin_balance: Some(10),
            ..Default::default()
        };
        assert!(!balance_only.touches_profile());

        let rename = ClientUpdate {
            name: Some("Ana".into()),
            ..Default::default()
        };
        assert!(rename.touches_profile());
    }
}
