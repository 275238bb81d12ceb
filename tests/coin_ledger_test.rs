mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{create_client, recording_service, test_service};
use mostrador::application::{AppError, LedgerService};
use mostrador::domain::coin_balance_from_log;

#[tokio::test]
async fn test_coins_earned_at_thousand_boundaries() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let client = create_client(&service, "Ana", "2646298880").await?;

    // $999 earns nothing
    let result = service
        .post_coin_transaction(client.id, None, 99_900)
        .await?;
    assert_eq!(result.transaction.coins_added, 0);
    assert_eq!(result.new_balance, 0);

    // $1,999 earns one
    let result = service
        .post_coin_transaction(client.id, None, 199_900)
        .await?;
    assert_eq!(result.transaction.coins_added, 1);
    assert_eq!(result.new_balance, 1);

    // $2,000 earns two
    let result = service
        .post_coin_transaction(client.id, None, 200_000)
        .await?;
    assert_eq!(result.transaction.coins_added, 2);
    assert_eq!(result.new_balance, 3);

    let client = service.get_client(client.id).await?;
    assert_eq!(client.coin_balance, 3);

    // Every posting is logged, even the one that earned nothing
    let log = service.list_coin_transactions(Some(client.id), None).await?;
    assert_eq!(log.len(), 3);
    assert_eq!(coin_balance_from_log(&log), client.coin_balance);

    Ok(())
}

#[tokio::test]
async fn test_blank_name_falls_back_to_stored_name() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let client = create_client(&service, "Ana Pérez", "2646298880").await?;

    let result = service
        .post_coin_transaction(client.id, Some("   ".to_string()), 100_000)
        .await?;
    assert_eq!(result.transaction.client_name, "Ana Pérez");

    let result = service
        .post_coin_transaction(client.id, Some("Ana P.".to_string()), 100_000)
        .await?;
    assert_eq!(result.transaction.client_name, "Ana P.");

    Ok(())
}

#[tokio::test]
async fn test_rejects_non_positive_amounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let client = create_client(&service, "Ana", "2646298880").await?;

    let err = service
        .post_coin_transaction(client.id, None, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    let err = service
        .post_coin_transaction(client.id, None, -100_000)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    assert!(service
        .list_coin_transactions(Some(client.id), None)
        .await?
        .is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_client_writes_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .post_coin_transaction(999, None, 100_000)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ClientNotFound(999)));
    assert!(service.list_coin_transactions(None, None).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_reversal_restores_balance_once() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let client = create_client(&service, "Ana", "2646298880").await?;

    service
        .post_coin_transaction(client.id, None, 300_000)
        .await?;
    let second = service
        .post_coin_transaction(client.id, None, 500_000)
        .await?;
    assert_eq!(second.new_balance, 8);

    let reversal = service
        .reverse_coin_transaction(second.transaction.id)
        .await?;
    assert_eq!(reversal.new_balance, 3);
    assert_eq!(reversal.transaction.coins_added, 5);

    // Second reversal of the same entry must not touch the balance
    let err = service
        .reverse_coin_transaction(second.transaction.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CoinTransactionNotFound(_)));

    let client = service.get_client(client.id).await?;
    assert_eq!(client.coin_balance, 3);
    assert_eq!(
        service
            .list_coin_transactions(Some(client.id), None)
            .await?
            .len(),
        1
    );

    Ok(())
}

#[tokio::test]
async fn test_purchase_notifies_client_with_total() -> Result<()> {
    let (service, notifier, _temp) = recording_service().await?;
    let client = service
        .create_client(
            "Ana".to_string(),
            Some("+54 9 264 629-8880".to_string()),
            None,
        )
        .await?;

    service
        .post_coin_transaction(client.id, None, 250_000)
        .await?;

    let sent = notifier.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].phone, "5492646298880");
    assert!(sent[0].content.contains("*$2,500*"));
    assert!(sent[0].content.contains("*2 coins*"));

    Ok(())
}

#[tokio::test]
async fn test_client_without_phone_is_not_notified() -> Result<()> {
    let (service, notifier, _temp) = recording_service().await?;
    let client = service.create_client("Walk-in".to_string(), None, None).await?;

    service
        .post_coin_transaction(client.id, None, 100_000)
        .await?;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(notifier.sent().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_postings_are_not_lost() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service: Arc<LedgerService> = Arc::new(service);
    let client = create_client(&service, "Ana", "2646298880").await?;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.post_coin_transaction(client.id, None, 100_000).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let client = service.get_client(client.id).await?;
    assert_eq!(client.coin_balance, 10);
    Ok(())
}
