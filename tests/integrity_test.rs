mod common;

use anyhow::Result;
use common::{create_client, raw_pool, test_service};
use mostrador::domain::{
    balance_chain_is_consistent, debt_balance_from_log, DebtTransactionType, LedgerKind,
};

#[tokio::test]
async fn test_fresh_ledgers_are_healthy() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = create_client(&service, "Ana", "111").await?;
    let bruno = create_client(&service, "Bruno", "222").await?;

    service.post_coin_transaction(ana.id, None, 500_000).await?;
    service
        .post_debt_transaction(ana.id, None, 80_000, DebtTransactionType::Charge, None, None)
        .await?;
    service
        .post_debt_transaction(bruno.id, None, 30_000, DebtTransactionType::Payment, None, None)
        .await?;

    let report = service.check_integrity().await?;
    assert!(report.is_healthy());
    assert_eq!(report.client_count, 2);
    assert_eq!(report.coin_transaction_count, 1);
    assert_eq!(report.debt_transaction_count, 2);

    let ana_log: Vec<_> = service
        .list_all_debt_transactions()
        .await?
        .into_iter()
        .filter(|t| t.client_id == ana.id)
        .collect();
    assert!(balance_chain_is_consistent(&ana_log));
    assert_eq!(
        debt_balance_from_log(&ana_log),
        service.get_client(ana.id).await?.debt_balance
    );
    Ok(())
}

#[tokio::test]
async fn test_drift_is_reported_and_repaired() -> Result<()> {
    let (service, temp) = test_service().await?;
    let client = create_client(&service, "Ana", "2646298880").await?;
    service
        .post_coin_transaction(client.id, None, 300_000)
        .await?;
    service
        .post_debt_transaction(client.id, None, 40_000, DebtTransactionType::Charge, None, None)
        .await?;

    // Simulate a lost write on the cached balances
    let pool = raw_pool(&temp).await?;
    sqlx::query("UPDATE clients SET coin_balance = 99, debt_balance = 0 WHERE id = ?")
        .bind(client.id)
        .execute(&pool)
        .await?;

    let report = service.check_integrity().await?;
    assert!(!report.is_healthy());
    assert_eq!(report.drifts.len(), 2);

    let coin_drift = report
        .drifts
        .iter()
        .find(|d| d.ledger == LedgerKind::Coins)
        .unwrap();
    assert_eq!(coin_drift.cached, 99);
    assert_eq!(coin_drift.expected, 3);

    let debt_drift = report
        .drifts
        .iter()
        .find(|d| d.ledger == LedgerKind::Debt)
        .unwrap();
    assert_eq!(debt_drift.expected, 40_000);

    let repaired = service.rebuild_balances().await?;
    assert_eq!(repaired, 1);

    let client = service.get_client(client.id).await?;
    assert_eq!(client.coin_balance, 3);
    assert_eq!(client.debt_balance, 40_000);
    assert!(service.check_integrity().await?.is_healthy());

    // Nothing left to repair
    assert_eq!(service.rebuild_balances().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_orphaned_transactions_are_reported() -> Result<()> {
    let (service, temp) = test_service().await?;
    create_client(&service, "Ana", "111").await?;

    let pool = raw_pool(&temp).await?;
    sqlx::query(
        "INSERT INTO coin_transactions (client_id, client_name, amount_cents, coins_added, date)
         VALUES (42, 'Ghost', 100000, 1, '2024-01-01T00:00:00+00:00')",
    )
    .execute(&pool)
    .await?;

    let report = service.check_integrity().await?;
    assert!(!report.is_healthy());
    assert_eq!(report.orphaned_client_ids, vec![42]);
    assert!(report.drifts.is_empty());
    Ok(())
}
