use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Cents, Client, ClientId, CoinTransaction, Coins, DebtTransaction};

/// Coin balance implied by a coin log: the sum of all deltas.
pub fn coin_balance_from_log(transactions: &[CoinTransaction]) -> Coins {
    transactions.iter().map(|t| t.coins_added).sum()
}

/// Debt balance implied by a debt log: charges minus payments.
pub fn debt_balance_from_log(transactions: &[DebtTransaction]) -> Cents {
    transactions.iter().map(|t| t.signed_amount()).sum()
}

/// Expected balances per client, computed from the logs alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedBalances {
    pub coins: HashMap<ClientId, Coins>,
    pub debt: HashMap<ClientId, Cents>,
}

impl DerivedBalances {
    pub fn from_logs(coins: &[CoinTransaction], debts: &[DebtTransaction]) -> Self {
        let mut derived = Self::default();
        for t in coins {
            *derived.coins.entry(t.client_id).or_insert(0) += t.coins_added;
        }
        for t in debts {
            *derived.debt.entry(t.client_id).or_insert(0) += t.signed_amount();
        }
        derived
    }

    pub fn coins_for(&self, client_id: ClientId) -> Coins {
        self.coins.get(&client_id).copied().unwrap_or(0)
    }

    pub fn debt_for(&self, client_id: ClientId) -> Cents {
        self.debt.get(&client_id).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Coins,
    Debt,
}

impl std::fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerKind::Coins => write!(f, "coins"),
            LedgerKind::Debt => write!(f, "debt"),
        }
    }
}

/// A cached balance that disagrees with its log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDrift {
    pub client_id: ClientId,
    pub client_name: String,
    pub ledger: LedgerKind,
    pub cached: i64,
    pub expected: i64,
}

impl BalanceDrift {
    pub fn difference(&self) -> i64 {
        self.cached - self.expected
    }
}

impl std::fmt::Display for BalanceDrift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "client {} ({}): cached {} balance {} but log sums to {}",
            self.client_id, self.client_name, self.ledger, self.cached, self.expected
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub client_count: usize,
    pub coin_transaction_count: usize,
    pub debt_transaction_count: usize,
    pub drifts: Vec<BalanceDrift>,
    /// Clients referenced by transactions but no longer present
    pub orphaned_client_ids: Vec<ClientId>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.drifts.is_empty() && self.orphaned_client_ids.is_empty()
    }
}

/// Compare every client's cached balances against its logs.
pub fn build_integrity_report(
    clients: &[Client],
    coins: &[CoinTransaction],
    debts: &[DebtTransaction],
) -> IntegrityReport {
    let derived = DerivedBalances::from_logs(coins, debts);
    let mut drifts = Vec::new();

    for client in clients {
        let expected_coins = derived.coins_for(client.id);
        if client.coin_balance != expected_coins {
            drifts.push(BalanceDrift {
                client_id: client.id,
                client_name: client.name.clone(),
                ledger: LedgerKind::Coins,
                cached: client.coin_balance,
                expected: expected_coins,
            });
        }

        let expected_debt = derived.debt_for(client.id);
        if client.debt_balance != expected_debt {
            drifts.push(BalanceDrift {
                client_id: client.id,
                client_name: client.name.clone(),
                ledger: LedgerKind::Debt,
                cached: client.debt_balance,
                expected: expected_debt,
            });
        }
    }

    let known: std::collections::HashSet<ClientId> = clients.iter().map(|c| c.id).collect();
    let mut orphaned: Vec<ClientId> = derived
        .coins
        .keys()
        .chain(derived.debt.keys())
        .filter(|id| !known.contains(id))
        .copied()
        .collect();
    orphaned.sort_unstable();
    orphaned.dedup();

    IntegrityReport {
        client_count: clients.len(),
        coin_transaction_count: coins.len(),
        debt_transaction_count: debts.len(),
        drifts,
        orphaned_client_ids: orphaned,
    }
}

/// Check that each entry's `balance_after` follows from the previous one.
/// Only meaningful for an unreversed log in posting order.
pub fn balance_chain_is_consistent(transactions: &[DebtTransaction]) -> bool {
    let mut running: Cents = 0;
    for t in transactions {
        running += t.signed_amount();
        if t.balance_after != running {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::DebtTransactionType;

    fn client(id: ClientId, coins: Coins, debt: Cents) -> Client {
        let now = Utc::now();
        Client {
            id,
            name: format!("client-{}", id),
            phone: None,
            coin_balance: coins,
            debt_balance: debt,
            observations: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn coin(id: i64, client_id: ClientId, coins_added: Coins) -> CoinTransaction {
        CoinTransaction {
            id,
            client_id,
            client_name: String::new(),
            amount_cents: coins_added * 100_000,
            coins_added,
            date: Utc::now(),
        }
    }

    fn debt(
        id: i64,
        client_id: ClientId,
        kind: DebtTransactionType,
        amount: Cents,
        balance_after: Cents,
    ) -> DebtTransaction {
        DebtTransaction {
            id,
            client_id,
            client_name: String::new(),
            amount_cents: amount,
            transaction_type: kind,
            balance_after,
            date: Utc::now(),
            notes: None,
        }
    }

    #[test]
    fn test_balances_from_logs() {
        let coins = vec![coin(1, 1, 3), coin(2, 1, 2), coin(3, 1, -1)];
        assert_eq!(coin_balance_from_log(&coins), 4);

        let debts = vec![
            debt(1, 1, DebtTransactionType::Charge, 1000, 1000),
            debt(2, 1, DebtTransactionType::Charge, 500, 1500),
            debt(3, 1, DebtTransactionType::Payment, 2000, -500),
        ];
        assert_eq!(debt_balance_from_log(&debts), -500);
        assert!(balance_chain_is_consistent(&debts));
    }

    #[test]
    fn test_broken_chain_detected() {
        let debts = vec![
            debt(1, 1, DebtTransactionType::Charge, 100, 100),
            debt(2, 1, DebtTransactionType::Charge, 100, 100),
        ];
        assert!(!balance_chain_is_consistent(&debts));
    }

    #[test]
    fn test_consistent_ledger_is_healthy() {
        let clients = vec![client(1, 5, 1500), client(2, 0, 0)];
        let coins = vec![coin(1, 1, 5)];
        let debts = vec![debt(1, 1, DebtTransactionType::Charge, 1500, 1500)];

        let report = build_integrity_report(&clients, &coins, &debts);
        assert!(report.is_healthy());
        assert_eq!(report.client_count, 2);
        assert_eq!(report.coin_transaction_count, 1);
        assert_eq!(report.debt_transaction_count, 1);
    }

    #[test]
    fn test_drift_reported_per_ledger() {
        let clients = vec![client(1, 7, 900)];
        let coins = vec![coin(1, 1, 5)];
        let debts = vec![debt(1, 1, DebtTransactionType::Charge, 1000, 1000)];

        let report = build_integrity_report(&clients, &coins, &debts);
        assert_eq!(report.drifts.len(), 2);

        let coin_drift = &report.drifts[0];
        assert_eq!(coin_drift.ledger, LedgerKind::Coins);
        assert_eq!(coin_drift.difference(), 2);

        let debt_drift = &report.drifts[1];
        assert_eq!(debt_drift.ledger, LedgerKind::Debt);
        assert_eq!(debt_drift.cached, 900);
        assert_eq!(debt_drift.expected, 1000);
    }

    #[test]
    fn test_orphaned_transactions_reported_once() {
        let clients = vec![client(1, 0, 0)];
        let coins = vec![coin(1, 9, 1)];
        let debts = vec![debt(1, 9, DebtTransactionType::Charge, 10, 10)];

        let report = build_integrity_report(&clients, &coins, &debts);
        assert_eq!(report.orphaned_client_ids, vec![9]);
        assert!(!report.is_healthy());
    }
}
