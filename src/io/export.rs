use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{format_cents, Client, CoinTransaction, DebtTransaction, Expense, Sale};

/// Database snapshot for a full JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub clients: Vec<Client>,
    pub coin_transactions: Vec<CoinTransaction>,
    pub debt_transactions: Vec<DebtTransaction>,
    pub sales: Vec<Sale>,
    pub expenses: Vec<Expense>,
}

/// Exporter for converting ledger data to CSV or JSON
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export clients with their cached balances to CSV format
    pub async fn export_clients_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let clients = self.service.list_all_clients().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "name",
            "phone",
            "coin_balance",
            "debt_balance",
            "observations",
            "created_at",
        ])?;

        for client in &clients {
            csv_writer.write_record([
                client.id.to_string(),
                client.name.clone(),
                client.phone.clone().unwrap_or_default(),
                client.coin_balance.to_string(),
                format_cents(client.debt_balance),
                client.observations.clone().unwrap_or_default(),
                client.created_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(clients.len())
    }

    /// Export the coin ledger to CSV format
    pub async fn export_coins_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let transactions = self.service.list_all_coin_transactions().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "date", "client_id", "client_name", "amount", "coins_added"])?;

        for tx in &transactions {
            csv_writer.write_record([
                tx.id.to_string(),
                tx.date.to_rfc3339(),
                tx.client_id.to_string(),
                tx.client_name.clone(),
                format_cents(tx.amount_cents),
                tx.coins_added.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transactions.len())
    }

    /// Export the debt ledger to CSV format
    pub async fn export_debts_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let transactions = self.service.list_all_debt_transactions().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "date",
            "client_id",
            "client_name",
            "type",
            "amount",
            "balance_after",
            "notes",
        ])?;

        for tx in &transactions {
            csv_writer.write_record([
                tx.id.to_string(),
                tx.date.to_rfc3339(),
                tx.client_id.to_string(),
                tx.client_name.clone(),
                tx.transaction_type.as_str().to_string(),
                format_cents(tx.amount_cents),
                format_cents(tx.balance_after),
                tx.notes.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transactions.len())
    }

    /// Export sales to CSV format
    pub async fn export_sales_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let sales = self.service.list_sales(None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "date",
            "amount",
            "branch",
            "month",
            "observations",
            "debt_transaction_id",
        ])?;

        for sale in &sales {
            csv_writer.write_record([
                sale.id.to_string(),
                sale.date.to_rfc3339(),
                format_cents(sale.amount_cents),
                sale.branch.clone().unwrap_or_default(),
                sale.month_number.to_string(),
                sale.observations.clone().unwrap_or_default(),
                sale.debt_transaction_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(sales.len())
    }

    /// Export expenses to CSV format
    pub async fn export_expenses_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let expenses = self.service.list_expenses(None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "date", "amount", "category", "branch", "observations"])?;

        for expense in &expenses {
            csv_writer.write_record([
                expense.id.to_string(),
                expense.date.to_rfc3339(),
                format_cents(expense.amount_cents),
                expense.category.clone().unwrap_or_default(),
                expense.branch.clone().unwrap_or_default(),
                expense.observations.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(expenses.len())
    }

    /// Export the full database as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            clients: self.service.list_all_clients().await?,
            coin_transactions: self.service.list_all_coin_transactions().await?,
            debt_transactions: self.service.list_all_debt_transactions().await?,
            sales: self.service.list_sales(None).await?,
            expenses: self.service.list_expenses(None).await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
