mod common;

use anyhow::Result;
use common::{create_client, parse_date, test_service};
use mostrador::application::{AppError, ExpenseDraft, LedgerService, SaleDraft};
use mostrador::domain::{DebtTransactionType, ExpenseUpdate, SaleUpdate};

async fn seed_quarter(service: &LedgerService) -> Result<()> {
    // 2025-01-06 and 2025-03-03 are Mondays, 2025-02-04 is a Tuesday
    service
        .record_sale(100_000, Some(parse_date("2025-01-06")), Some("Rawson".into()), None)
        .await?;
    service
        .record_sale(200_000, Some(parse_date("2025-02-04")), None, None)
        .await?;
    service
        .record_sale(
            300_000,
            Some(parse_date("2025-03-03")),
            Some("Rivadavia".into()),
            Some("supplements".into()),
        )
        .await?;

    service
        .record_expense(50_000, Some(parse_date("2025-01-10")), Some("Rent".into()), None, None)
        .await?;
    service
        .record_expense(20_000, Some(parse_date("2025-03-10")), Some("Stock".into()), None, None)
        .await?;
    service
        .record_expense(30_000, Some(parse_date("2025-03-12")), Some("Rent".into()), None, None)
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_empty_store_has_empty_report() -> Result<()> {
    let (service, _temp) = test_service().await?;

    // Expenses alone do not produce a dashboard
    service
        .record_expense(10_000, None, Some("Rent".into()), None, None)
        .await?;

    let report = service.analytics().await?;
    assert!(report.timeline.is_empty());
    assert!(report.forecast.is_empty());
    assert!(report.weekday_stats.is_empty());
    assert!(report.branch_comparison.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_monthly_timeline_and_categories() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_quarter(&service).await?;

    let report = service.analytics().await?;

    let months: Vec<(&str, i64, i64)> = report
        .timeline
        .iter()
        .map(|m| (m.month.as_str(), m.sales, m.expenses))
        .collect();
    assert_eq!(
        months,
        vec![
            ("2025-01", 100_000, 50_000),
            ("2025-02", 200_000, 0),
            ("2025-03", 300_000, 50_000),
        ]
    );

    let categories: Vec<(&str, i64)> = report
        .expense_categories
        .iter()
        .map(|c| (c.name.as_str(), c.value))
        .collect();
    assert_eq!(categories, vec![("Rent", 80_000), ("Stock", 20_000)]);
    Ok(())
}

#[tokio::test]
async fn test_forecast_follows_linear_trend() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_quarter(&service).await?;

    let report = service.analytics().await?;
    let forecast: Vec<(&str, i64)> = report
        .forecast
        .iter()
        .map(|p| (p.month.as_str(), p.amount))
        .collect();
    assert_eq!(
        forecast,
        vec![
            ("2025-04", 400_000),
            ("2025-05", 500_000),
            ("2025-06", 600_000),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_single_month_has_no_forecast() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service
        .record_sale(100_000, Some(parse_date("2025-01-06")), None, None)
        .await?;

    let report = service.analytics().await?;
    assert_eq!(report.timeline.len(), 1);
    assert!(report.forecast.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_weekday_and_branch_breakdown() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_quarter(&service).await?;

    let report = service.analytics().await?;

    assert_eq!(report.weekday_stats.len(), 7);
    assert_eq!(report.weekday_stats[0].day, "Monday");
    assert_eq!(report.weekday_stats[0].sales, 400_000);
    assert_eq!(report.weekday_stats[1].day, "Tuesday");
    assert_eq!(report.weekday_stats[1].sales, 200_000);
    assert_eq!(report.weekday_stats[6].day, "Sunday");
    assert_eq!(report.weekday_stats[6].sales, 0);

    assert_eq!(report.branch_comparison.len(), 3);
    let march = &report.branch_comparison[2];
    assert_eq!(march.month, "2025-03");
    let branches: Vec<(&str, i64, i64)> = march
        .branches
        .iter()
        .map(|b| (b.branch.as_str(), b.sales, b.expenses))
        .collect();
    // Expenses without a branch are booked at the default branch
    assert_eq!(
        branches,
        vec![("Rawson", 0, 50_000), ("Rivadavia", 300_000, 0)]
    );
    Ok(())
}

#[tokio::test]
async fn test_branch_comparison_keeps_recent_months() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_quarter(&service).await?;
    service
        .record_sale(50_000, Some(parse_date("2024-12-20")), None, None)
        .await?;

    let report = service.analytics().await?;
    assert_eq!(report.timeline.len(), 4);
    let months: Vec<&str> = report
        .branch_comparison
        .iter()
        .map(|m| m.month.as_str())
        .collect();
    assert_eq!(months, vec!["2025-01", "2025-02", "2025-03"]);
    Ok(())
}

#[tokio::test]
async fn test_sales_and_expenses_crud() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_quarter(&service).await?;

    let sales = service.list_sales(Some(2)).await?;
    assert_eq!(sales.len(), 2);
    // Newest first
    assert_eq!(sales[0].amount_cents, 300_000);
    assert_eq!(sales[0].month_number, 3);
    assert_eq!(sales[1].branch.as_deref(), Some("Rawson"));

    service.delete_sale(sales[0].id).await?;
    assert_eq!(service.list_sales(None).await?.len(), 2);
    assert!(matches!(
        service.delete_sale(sales[0].id).await.unwrap_err(),
        AppError::SaleNotFound(_)
    ));

    let expenses = service.list_expenses(None).await?;
    assert_eq!(expenses.len(), 3);
    service.delete_expense(expenses[0].id).await?;
    assert!(matches!(
        service.delete_expense(expenses[0].id).await.unwrap_err(),
        AppError::ExpenseNotFound(_)
    ));

    assert!(matches!(
        service.record_sale(0, None, None, None).await.unwrap_err(),
        AppError::InvalidAmount(_)
    ));
    Ok(())
}

#[tokio::test]
async fn test_batch_sales_are_all_or_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let sales = service
        .record_sales(vec![
            SaleDraft {
                amount_cents: 100_000,
                date: Some(parse_date("2025-01-06")),
                ..Default::default()
            },
            SaleDraft {
                amount_cents: 250_000,
                date: Some(parse_date("2025-02-04")),
                branch: Some("Rivadavia".into()),
                observations: Some("  ".into()),
            },
        ])
        .await?;
    assert_eq!(sales.len(), 2);
    assert_eq!(sales[0].branch.as_deref(), Some("Rawson"));
    assert_eq!(sales[1].month_number, 2);
    assert_eq!(sales[1].observations, None);

    // One bad entry rejects the whole batch
    let err = service
        .record_sales(vec![
            SaleDraft {
                amount_cents: 100_000,
                ..Default::default()
            },
            SaleDraft::default(),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));
    assert_eq!(service.list_sales(None).await?.len(), 2);

    assert!(service.record_sales(Vec::new()).await?.is_empty());

    let expenses = service
        .record_expenses(vec![
            ExpenseDraft {
                amount_cents: 10_000,
                category: Some("Rent".into()),
                ..Default::default()
            },
            ExpenseDraft {
                amount_cents: 20_000,
                category: Some("Stock".into()),
                ..Default::default()
            },
        ])
        .await?;
    assert_eq!(expenses.len(), 2);
    assert_eq!(service.list_expenses(None).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_update_sale_and_expense() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_quarter(&service).await?;

    let march = service.list_sales(Some(1)).await?.remove(0);
    let moved = service
        .update_sale(
            march.id,
            SaleUpdate {
                amount_cents: Some(350_000),
                date: Some(parse_date("2025-04-07")),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(moved.amount_cents, 350_000);
    assert_eq!(moved.month_number, 4);
    assert_eq!(moved.branch.as_deref(), Some("Rivadavia"));
    assert_eq!(moved.observations.as_deref(), Some("supplements"));

    // An empty update returns the stored row
    let same = service.update_sale(march.id, SaleUpdate::default()).await?;
    assert_eq!(same, moved);

    let report = service.analytics().await?;
    assert_eq!(report.timeline.last().unwrap().month, "2025-04");

    let rent = service.list_expenses(None).await?.remove(0);
    let relabeled = service
        .update_expense(
            rent.id,
            ExpenseUpdate {
                category: Some("Utilities".into()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(relabeled.category.as_deref(), Some("Utilities"));
    assert_eq!(relabeled.amount_cents, rent.amount_cents);

    assert!(matches!(
        service
            .update_sale(999, SaleUpdate::default())
            .await
            .unwrap_err(),
        AppError::SaleNotFound(999)
    ));
    assert!(matches!(
        service
            .update_expense(
                999,
                ExpenseUpdate {
                    amount_cents: Some(1),
                    ..Default::default()
                }
            )
            .await
            .unwrap_err(),
        AppError::ExpenseNotFound(999)
    ));
    assert!(matches!(
        service
            .update_sale(
                march.id,
                SaleUpdate {
                    amount_cents: Some(0),
                    ..Default::default()
                }
            )
            .await
            .unwrap_err(),
        AppError::InvalidAmount(_)
    ));
    Ok(())
}

#[tokio::test]
async fn test_mirrored_sale_amount_belongs_to_payment() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let client = create_client(&service, "Ana", "2646298880").await?;

    let payment = service
        .post_debt_transaction(
            client.id,
            None,
            40_000,
            DebtTransactionType::Payment,
            None,
            None,
        )
        .await?;
    let sale = payment.mirrored_sale.unwrap();

    let err = service
        .update_sale(
            sale.id,
            SaleUpdate {
                amount_cents: Some(1_000),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MirroredSale { .. }));

    // Moving it to another branch is fine
    let moved = service
        .update_sale(
            sale.id,
            SaleUpdate {
                branch: Some("Rivadavia".into()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(moved.branch.as_deref(), Some("Rivadavia"));
    assert_eq!(moved.amount_cents, 40_000);
    assert_eq!(moved.debt_transaction_id, Some(payment.transaction.id));
    Ok(())
}
