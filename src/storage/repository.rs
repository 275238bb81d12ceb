use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::domain::{
    Cents, Client, ClientId, ClientSort, ClientUpdate, CoinPosting, CoinTransaction,
    CoinTransactionId, Coins, DebtPosting, DebtTransaction, DebtTransactionId,
    DebtTransactionType, Expense, ExpenseId, ExpenseUpdate, NewClient, NewExpense, NewSale, Sale,
    SaleId, SaleUpdate,
};

use super::MIGRATION_001_INITIAL;

const CLIENT_COLUMNS: &str =
    "id, name, phone, coin_balance, debt_balance, observations, created_at, updated_at";
const COIN_COLUMNS: &str = "id, client_id, client_name, amount_cents, coins_added, date";
const DEBT_COLUMNS: &str =
    "id, client_id, client_name, amount_cents, transaction_type, balance_after, date, notes";
const SALE_COLUMNS: &str =
    "id, date, amount_cents, branch, observations, month_number, debt_transaction_id";
const EXPENSE_COLUMNS: &str = "id, date, amount_cents, category, branch, observations";

/// Outcome of a compensating delete of a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReversalOutcome {
    /// Balance compensated and row deleted in one store transaction
    Reversed {
        new_balance: i64,
        removed_sales: u64,
    },
    /// The entry was already gone; nothing was written
    TransactionMissing,
    /// The owning client is gone; nothing was written
    ClientMissing,
}

/// Outcome of moving a cached balance to a target through the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum Adjustment<T> {
    /// Balance already at target
    Unchanged,
    Posted(T),
}

/// Repository for persisting and querying clients and their ledgers.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run on an existing database.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Client operations
    // ========================

    /// Insert a client with zero balances.
    pub async fn insert_client(&self, client: &NewClient, now: DateTime<Utc>) -> Result<Client> {
        let row = sqlx::query(&format!(
            "INSERT INTO clients (name, phone, coin_balance, debt_balance, observations, created_at, updated_at)
             VALUES (?, ?, 0, 0, ?, ?, ?)
             RETURNING {CLIENT_COLUMNS}"
        ))
        .bind(&client.name)
        .bind(&client.phone)
        .bind(&client.observations)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .context("Failed to save client")?;

        Self::row_to_client(&row)
    }

    /// Get a client by ID.
    pub async fn get_client(&self, id: ClientId) -> Result<Option<Client>> {
        let row = sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch client")?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    /// Get a client by normalized phone number.
    pub async fn get_client_by_phone(&self, phone: &str) -> Result<Option<Client>> {
        let row = sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE phone = ?"))
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch client by phone")?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    /// List clients, optionally filtered by a case-insensitive name fragment.
    pub async fn list_clients(
        &self,
        search: Option<&str>,
        sort: ClientSort,
        limit: Option<usize>,
    ) -> Result<Vec<Client>> {
        let mut query = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE 1=1");
        let pattern = search.map(|s| format!("%{}%", s.to_lowercase()));

        if pattern.is_some() {
            query.push_str(" AND LOWER(name) LIKE ?");
        }
        query.push_str(" ORDER BY ");
        query.push_str(sort.order_by());
        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query);
        if let Some(ref p) = pattern {
            sql_query = sql_query.bind(p);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list clients")?;

        rows.iter().map(Self::row_to_client).collect()
    }

    /// Write the profile fields of a client. Balances are never touched here.
    /// Returns the updated client, or None if it does not exist.
    pub async fn update_client_profile(
        &self,
        id: ClientId,
        update: &ClientUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Client>> {
        let mut query = String::from("UPDATE clients SET updated_at = ?");
        if update.name.is_some() {
            query.push_str(", name = ?");
        }
        if update.phone.is_some() {
            query.push_str(", phone = ?");
        }
        if update.observations.is_some() {
            query.push_str(", observations = ?");
        }
        query.push_str(&format!(" WHERE id = ? RETURNING {CLIENT_COLUMNS}"));

        let mut sql_query = sqlx::query(&query).bind(now.to_rfc3339());
        if let Some(ref name) = update.name {
            sql_query = sql_query.bind(name);
        }
        if let Some(ref phone) = update.phone {
            sql_query = sql_query.bind(phone);
        }
        if let Some(ref observations) = update.observations {
            sql_query = sql_query.bind(observations);
        }

        let row = sql_query
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update client")?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    /// Delete a client together with its coin and debt history.
    /// Sales are kept. Returns false if the client did not exist.
    pub async fn delete_client(&self, id: ClientId) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let deleted = sqlx::query("DELETE FROM clients WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete client")?
            .rows_affected();
        if deleted == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM coin_transactions WHERE client_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete client coin transactions")?;
        sqlx::query("DELETE FROM debt_transactions WHERE client_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete client debt transactions")?;

        tx.commit().await.context("Failed to commit client deletion")?;
        Ok(true)
    }

    // ========================
    // Coin ledger
    // ========================

    /// Append a coin entry and move the client's balance by its delta, atomically.
    ///
    /// The balance update runs first so the write lock is taken before anything
    /// is read; the returned balance is the authoritative post-increment value.
    /// Returns None (and writes nothing) if the client does not exist.
    pub async fn post_coin_transaction(
        &self,
        posting: CoinPosting,
    ) -> Result<Option<(CoinTransaction, Coins)>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let row = sqlx::query(
            "UPDATE clients SET coin_balance = coin_balance + ?, updated_at = ?
             WHERE id = ?
             RETURNING coin_balance",
        )
        .bind(posting.coins_added)
        .bind(Utc::now().to_rfc3339())
        .bind(posting.client_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to update coin balance")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let new_balance: Coins = row
            .try_get("coin_balance")
            .context("Coin balance out of range")?;

        let id: CoinTransactionId = sqlx::query(
            "INSERT INTO coin_transactions (client_id, client_name, amount_cents, coins_added, date)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(posting.client_id)
        .bind(&posting.client_name)
        .bind(posting.amount_cents)
        .bind(posting.coins_added)
        .bind(posting.date.to_rfc3339())
        .fetch_one(&mut *tx)
        .await
        .context("Failed to save coin transaction")?
        .get("id");

        tx.commit().await.context("Failed to commit coin posting")?;
        Ok(Some((posting.into_transaction(id), new_balance)))
    }

    /// Get a coin transaction by ID.
    pub async fn get_coin_transaction(
        &self,
        id: CoinTransactionId,
    ) -> Result<Option<CoinTransaction>> {
        let row = sqlx::query(&format!(
            "SELECT {COIN_COLUMNS} FROM coin_transactions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch coin transaction")?;

        row.as_ref().map(Self::row_to_coin_transaction).transpose()
    }

    /// Subtract the entry's delta from the client's balance, then delete the entry.
    /// Both happen in one store transaction; if the entry is already gone the
    /// balance change is rolled back.
    pub async fn reverse_coin_transaction(
        &self,
        transaction: &CoinTransaction,
    ) -> Result<ReversalOutcome> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let row = sqlx::query(
            "UPDATE clients SET coin_balance = coin_balance - ?, updated_at = ?
             WHERE id = ?
             RETURNING coin_balance",
        )
        .bind(transaction.coins_added)
        .bind(Utc::now().to_rfc3339())
        .bind(transaction.client_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to compensate coin balance")?;

        let Some(row) = row else {
            return Ok(ReversalOutcome::ClientMissing);
        };
        let new_balance: Coins = row
            .try_get("coin_balance")
            .context("Coin balance out of range")?;

        let deleted = sqlx::query("DELETE FROM coin_transactions WHERE id = ?")
            .bind(transaction.id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete coin transaction")?
            .rows_affected();
        if deleted == 0 {
            // Dropping the transaction rolls back the compensation.
            return Ok(ReversalOutcome::TransactionMissing);
        }

        tx.commit().await.context("Failed to commit coin reversal")?;
        Ok(ReversalOutcome::Reversed {
            new_balance,
            removed_sales: 0,
        })
    }

    /// List coin transactions, newest first.
    pub async fn list_coin_transactions(
        &self,
        client_id: Option<ClientId>,
        limit: Option<usize>,
    ) -> Result<Vec<CoinTransaction>> {
        let mut query = format!("SELECT {COIN_COLUMNS} FROM coin_transactions WHERE 1=1");
        if client_id.is_some() {
            query.push_str(" AND client_id = ?");
        }
        query.push_str(" ORDER BY date DESC, id DESC");
        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query);
        if let Some(id) = client_id {
            sql_query = sql_query.bind(id);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list coin transactions")?;

        rows.iter().map(Self::row_to_coin_transaction).collect()
    }

    /// Move a client's coin balance to `target`, logging the difference as an entry.
    pub async fn adjust_coin_balance(
        &self,
        client_id: ClientId,
        target: Coins,
        now: DateTime<Utc>,
    ) -> Result<Option<Adjustment<(CoinTransaction, Coins)>>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        // Touch first to hold the write lock while reading the current balance.
        let row = sqlx::query(
            "UPDATE clients SET updated_at = ? WHERE id = ? RETURNING coin_balance, name",
        )
        .bind(now.to_rfc3339())
        .bind(client_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to read coin balance")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let current: Coins = row
            .try_get("coin_balance")
            .context("Coin balance out of range")?;
        let name: String = row
            .try_get("name")
            .context("Failed to read client name")?;
        let delta = target
            .checked_sub(current)
            .context("Coin adjustment out of range")?;
        if delta == 0 {
            tx.commit().await.context("Failed to commit coin adjustment")?;
            return Ok(Some(Adjustment::Unchanged));
        }

        let posting = CoinPosting::adjustment(client_id, name, delta, now);
        sqlx::query("UPDATE clients SET coin_balance = ? WHERE id = ?")
            .bind(target)
            .bind(client_id)
            .execute(&mut *tx)
            .await
            .context("Failed to adjust coin balance")?;

        let id: CoinTransactionId = sqlx::query(
            "INSERT INTO coin_transactions (client_id, client_name, amount_cents, coins_added, date)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(posting.client_id)
        .bind(&posting.client_name)
        .bind(posting.amount_cents)
        .bind(posting.coins_added)
        .bind(posting.date.to_rfc3339())
        .fetch_one(&mut *tx)
        .await
        .context("Failed to save coin adjustment")?
        .get("id");

        tx.commit().await.context("Failed to commit coin adjustment")?;
        Ok(Some(Adjustment::Posted((posting.into_transaction(id), target))))
    }

    // ========================
    // Debt ledger
    // ========================

    /// Apply a charge or payment to the client's debt balance and append the
    /// entry with the resulting `balance_after`, atomically.
    /// Returns None (and writes nothing) if the client does not exist.
    pub async fn post_debt_transaction(
        &self,
        posting: DebtPosting,
    ) -> Result<Option<(DebtTransaction, Cents)>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let row = sqlx::query(
            "UPDATE clients SET debt_balance = debt_balance + ?, updated_at = ?
             WHERE id = ?
             RETURNING debt_balance",
        )
        .bind(posting.signed_amount())
        .bind(Utc::now().to_rfc3339())
        .bind(posting.client_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to update debt balance")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let new_balance: Cents = row
            .try_get("debt_balance")
            .context("Debt balance out of range")?;

        let id = Self::insert_debt_row(&mut tx, &posting, new_balance).await?;

        tx.commit().await.context("Failed to commit debt posting")?;
        Ok(Some((posting.into_transaction(id, new_balance), new_balance)))
    }

    async fn insert_debt_row(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        posting: &DebtPosting,
        balance_after: Cents,
    ) -> Result<DebtTransactionId> {
        let row = sqlx::query(
            "INSERT INTO debt_transactions (client_id, client_name, amount_cents, transaction_type, balance_after, date, notes)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(posting.client_id)
        .bind(&posting.client_name)
        .bind(posting.amount_cents)
        .bind(posting.transaction_type.as_str())
        .bind(balance_after)
        .bind(posting.date.to_rfc3339())
        .bind(&posting.notes)
        .fetch_one(&mut **tx)
        .await
        .context("Failed to save debt transaction")?;

        Ok(row.get("id"))
    }

    /// Get a debt transaction by ID.
    pub async fn get_debt_transaction(
        &self,
        id: DebtTransactionId,
    ) -> Result<Option<DebtTransaction>> {
        let row = sqlx::query(&format!(
            "SELECT {DEBT_COLUMNS} FROM debt_transactions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch debt transaction")?;

        row.as_ref().map(Self::row_to_debt_transaction).transpose()
    }

    /// Apply the inverse of the entry to the client's debt balance, delete the
    /// entry, and remove the sale it mirrored, all in one store transaction.
    pub async fn reverse_debt_transaction(
        &self,
        transaction: &DebtTransaction,
    ) -> Result<ReversalOutcome> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let row = sqlx::query(
            "UPDATE clients SET debt_balance = debt_balance - ?, updated_at = ?
             WHERE id = ?
             RETURNING debt_balance",
        )
        .bind(transaction.signed_amount())
        .bind(Utc::now().to_rfc3339())
        .bind(transaction.client_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to compensate debt balance")?;

        let Some(row) = row else {
            return Ok(ReversalOutcome::ClientMissing);
        };
        let new_balance: Cents = row
            .try_get("debt_balance")
            .context("Debt balance out of range")?;

        let deleted = sqlx::query("DELETE FROM debt_transactions WHERE id = ?")
            .bind(transaction.id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete debt transaction")?
            .rows_affected();
        if deleted == 0 {
            return Ok(ReversalOutcome::TransactionMissing);
        }

        let removed_sales = sqlx::query("DELETE FROM sales WHERE debt_transaction_id = ?")
            .bind(transaction.id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete mirrored sale")?
            .rows_affected();

        tx.commit().await.context("Failed to commit debt reversal")?;
        Ok(ReversalOutcome::Reversed {
            new_balance,
            removed_sales,
        })
    }

    /// List debt transactions, newest first, with optional filters.
    /// `window` bounds are inclusive.
    pub async fn list_debt_transactions(
        &self,
        client_id: Option<ClientId>,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
        limit: Option<usize>,
    ) -> Result<Vec<DebtTransaction>> {
        let mut query = format!("SELECT {DEBT_COLUMNS} FROM debt_transactions WHERE 1=1");

        let window_strs = window.map(|(from, to)| (from.to_rfc3339(), to.to_rfc3339()));

        if client_id.is_some() {
            query.push_str(" AND client_id = ?");
        }
        if window.is_some() {
            query.push_str(" AND date >= ? AND date <= ?");
        }
        query.push_str(" ORDER BY date DESC, id DESC");
        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query);
        if let Some(id) = client_id {
            sql_query = sql_query.bind(id);
        }
        if let Some((ref from, ref to)) = window_strs {
            sql_query = sql_query.bind(from).bind(to);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list debt transactions")?;

        rows.iter().map(Self::row_to_debt_transaction).collect()
    }

    /// Move a client's debt balance to `target`, logging the difference as a
    /// charge or payment. No sale is mirrored.
    pub async fn adjust_debt_balance(
        &self,
        client_id: ClientId,
        target: Cents,
        now: DateTime<Utc>,
    ) -> Result<Option<Adjustment<(DebtTransaction, Cents)>>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let row = sqlx::query(
            "UPDATE clients SET updated_at = ? WHERE id = ? RETURNING debt_balance, name",
        )
        .bind(now.to_rfc3339())
        .bind(client_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to read debt balance")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let current: Cents = row
            .try_get("debt_balance")
            .context("Debt balance out of range")?;
        let name: String = row
            .try_get("name")
            .context("Failed to read client name")?;
        let delta = target
            .checked_sub(current)
            .context("Debt adjustment out of range")?;
        if delta == 0 {
            tx.commit().await.context("Failed to commit debt adjustment")?;
            return Ok(Some(Adjustment::Unchanged));
        }

        let posting = DebtPosting::adjustment(client_id, name, delta, now);
        sqlx::query("UPDATE clients SET debt_balance = ? WHERE id = ?")
            .bind(target)
            .bind(client_id)
            .execute(&mut *tx)
            .await
            .context("Failed to adjust debt balance")?;

        let id = Self::insert_debt_row(&mut tx, &posting, target).await?;

        tx.commit().await.context("Failed to commit debt adjustment")?;
        Ok(Some(Adjustment::Posted((
            posting.into_transaction(id, target),
            target,
        ))))
    }

    // ========================
    // Integrity
    // ========================

    /// Every coin transaction in posting order.
    pub async fn list_all_coin_transactions(&self) -> Result<Vec<CoinTransaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {COIN_COLUMNS} FROM coin_transactions ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list coin transactions")?;

        rows.iter().map(Self::row_to_coin_transaction).collect()
    }

    /// Every debt transaction in posting order.
    pub async fn list_all_debt_transactions(&self) -> Result<Vec<DebtTransaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {DEBT_COLUMNS} FROM debt_transactions ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list debt transactions")?;

        rows.iter().map(Self::row_to_debt_transaction).collect()
    }

    /// Recompute both cached balances of every client from the logs.
    /// Returns how many clients had drifted.
    pub async fn rebuild_balances(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE clients
            SET coin_balance = COALESCE((SELECT SUM(coins_added) FROM coin_transactions WHERE client_id = clients.id), 0),
                debt_balance = COALESCE((SELECT SUM(CASE WHEN transaction_type = 'charge' THEN amount_cents ELSE -amount_cents END)
                                         FROM debt_transactions WHERE client_id = clients.id), 0),
                updated_at = ?
            WHERE coin_balance != COALESCE((SELECT SUM(coins_added) FROM coin_transactions WHERE client_id = clients.id), 0)
               OR debt_balance != COALESCE((SELECT SUM(CASE WHEN transaction_type = 'charge' THEN amount_cents ELSE -amount_cents END)
                                            FROM debt_transactions WHERE client_id = clients.id), 0)
            "#,
        )
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to rebuild balances")?;

        Ok(result.rows_affected())
    }

    // ========================
    // Sales and expenses
    // ========================

    /// Save a sale.
    pub async fn insert_sale(&self, sale: NewSale) -> Result<Sale> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        let id = Self::insert_sale_row(&mut conn, &sale).await?;
        Ok(sale.into_sale(id))
    }

    /// Save a batch of sales in one store transaction. Either all are saved or none.
    pub async fn insert_sales(&self, sales: Vec<NewSale>) -> Result<Vec<Sale>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let mut saved = Vec::with_capacity(sales.len());
        for sale in sales {
            let id = Self::insert_sale_row(&mut tx, &sale).await?;
            saved.push(sale.into_sale(id));
        }

        tx.commit().await.context("Failed to commit sales")?;
        Ok(saved)
    }

    async fn insert_sale_row(conn: &mut SqliteConnection, sale: &NewSale) -> Result<SaleId> {
        let row = sqlx::query(
            "INSERT INTO sales (date, amount_cents, branch, observations, month_number, debt_transaction_id)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(sale.date.to_rfc3339())
        .bind(sale.amount_cents)
        .bind(&sale.branch)
        .bind(&sale.observations)
        .bind(i64::from(sale.month_number()))
        .bind(sale.debt_transaction_id)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to save sale")?;

        Ok(row.try_get("id")?)
    }

    /// Get a sale by ID.
    pub async fn get_sale(&self, id: SaleId) -> Result<Option<Sale>> {
        let row = sqlx::query(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch sale")?;

        row.as_ref().map(Self::row_to_sale).transpose()
    }

    /// Apply a partial update. Returns None if the sale does not exist.
    pub async fn update_sale(&self, id: SaleId, update: &SaleUpdate) -> Result<Option<Sale>> {
        let mut sets = Vec::new();
        if update.amount_cents.is_some() {
            sets.push("amount_cents = ?");
        }
        if update.date.is_some() {
            sets.push("date = ?");
            sets.push("month_number = ?");
        }
        if update.branch.is_some() {
            sets.push("branch = ?");
        }
        if update.observations.is_some() {
            sets.push("observations = ?");
        }
        if sets.is_empty() {
            return self.get_sale(id).await;
        }

        let query = format!(
            "UPDATE sales SET {} WHERE id = ? RETURNING {SALE_COLUMNS}",
            sets.join(", ")
        );
        let mut sql_query = sqlx::query(&query);
        if let Some(amount) = update.amount_cents {
            sql_query = sql_query.bind(amount);
        }
        if let Some(date) = update.date {
            sql_query = sql_query
                .bind(date.to_rfc3339())
                .bind(i64::from(date.month()));
        }
        if let Some(ref branch) = update.branch {
            sql_query = sql_query.bind(branch);
        }
        if let Some(ref observations) = update.observations {
            sql_query = sql_query.bind(observations);
        }

        let row = sql_query
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update sale")?;

        row.as_ref().map(Self::row_to_sale).transpose()
    }

    /// List sales, newest first.
    pub async fn list_sales(&self, limit: Option<usize>) -> Result<Vec<Sale>> {
        let mut query = format!("SELECT {SALE_COLUMNS} FROM sales ORDER BY date DESC, id DESC");
        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list sales")?;

        rows.iter().map(Self::row_to_sale).collect()
    }

    /// Delete a sale. Returns false if it did not exist.
    pub async fn delete_sale(&self, id: SaleId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sales WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete sale")?;
        Ok(result.rows_affected() > 0)
    }

    /// Save an expense.
    pub async fn insert_expense(&self, expense: NewExpense) -> Result<Expense> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        let id = Self::insert_expense_row(&mut conn, &expense).await?;
        Ok(expense.into_expense(id))
    }

    /// Save a batch of expenses in one store transaction. Either all are saved or none.
    pub async fn insert_expenses(&self, expenses: Vec<NewExpense>) -> Result<Vec<Expense>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let mut saved = Vec::with_capacity(expenses.len());
        for expense in expenses {
            let id = Self::insert_expense_row(&mut tx, &expense).await?;
            saved.push(expense.into_expense(id));
        }

        tx.commit().await.context("Failed to commit expenses")?;
        Ok(saved)
    }

    async fn insert_expense_row(
        conn: &mut SqliteConnection,
        expense: &NewExpense,
    ) -> Result<ExpenseId> {
        let row = sqlx::query(
            "INSERT INTO expenses (date, amount_cents, category, branch, observations)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(expense.date.to_rfc3339())
        .bind(expense.amount_cents)
        .bind(&expense.category)
        .bind(&expense.branch)
        .bind(&expense.observations)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to save expense")?;

        Ok(row.try_get("id")?)
    }

    /// Get an expense by ID.
    pub async fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        let row = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch expense")?;

        row.as_ref().map(Self::row_to_expense).transpose()
    }

    /// Apply a partial update. Returns None if the expense does not exist.
    pub async fn update_expense(
        &self,
        id: ExpenseId,
        update: &ExpenseUpdate,
    ) -> Result<Option<Expense>> {
        let mut sets = Vec::new();
        if update.amount_cents.is_some() {
            sets.push("amount_cents = ?");
        }
        if update.date.is_some() {
            sets.push("date = ?");
        }
        if update.category.is_some() {
            sets.push("category = ?");
        }
        if update.branch.is_some() {
            sets.push("branch = ?");
        }
        if update.observations.is_some() {
            sets.push("observations = ?");
        }
        if sets.is_empty() {
            return self.get_expense(id).await;
        }

        let query = format!(
            "UPDATE expenses SET {} WHERE id = ? RETURNING {EXPENSE_COLUMNS}",
            sets.join(", ")
        );
        let mut sql_query = sqlx::query(&query);
        if let Some(amount) = update.amount_cents {
            sql_query = sql_query.bind(amount);
        }
        if let Some(date) = update.date {
            sql_query = sql_query.bind(date.to_rfc3339());
        }
        if let Some(ref category) = update.category {
            sql_query = sql_query.bind(category);
        }
        if let Some(ref branch) = update.branch {
            sql_query = sql_query.bind(branch);
        }
        if let Some(ref observations) = update.observations {
            sql_query = sql_query.bind(observations);
        }

        let row = sql_query
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update expense")?;

        row.as_ref().map(Self::row_to_expense).transpose()
    }

    /// List expenses, newest first.
    pub async fn list_expenses(&self, limit: Option<usize>) -> Result<Vec<Expense>> {
        let mut query =
            format!("SELECT {EXPENSE_COLUMNS} FROM expenses ORDER BY date DESC, id DESC");
        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    /// Delete an expense. Returns false if it did not exist.
    pub async fn delete_expense(&self, id: ExpenseId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete expense")?;
        Ok(result.rows_affected() > 0)
    }

    // ========================
    // Row mapping
    // ========================

    fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(value)
            .with_context(|| format!("Invalid {} timestamp", field))?
            .with_timezone(&Utc))
    }

    fn row_to_client(row: &SqliteRow) -> Result<Client> {
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Client {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            coin_balance: row.try_get("coin_balance")?,
            debt_balance: row.try_get("debt_balance")?,
            observations: row.try_get("observations")?,
            created_at: Self::parse_timestamp(&created_at, "created_at")?,
            updated_at: Self::parse_timestamp(&updated_at, "updated_at")?,
        })
    }

    fn row_to_coin_transaction(row: &SqliteRow) -> Result<CoinTransaction> {
        let date: String = row.try_get("date")?;

        Ok(CoinTransaction {
            id: row.try_get("id")?,
            client_id: row.try_get("client_id")?,
            client_name: row.try_get("client_name")?,
            amount_cents: row.try_get("amount_cents")?,
            coins_added: row.try_get("coins_added")?,
            date: Self::parse_timestamp(&date, "date")?,
        })
    }

    fn row_to_debt_transaction(row: &SqliteRow) -> Result<DebtTransaction> {
        let date: String = row.try_get("date")?;
        let type_str: String = row.try_get("transaction_type")?;

        Ok(DebtTransaction {
            id: row.try_get("id")?,
            client_id: row.try_get("client_id")?,
            client_name: row.try_get("client_name")?,
            amount_cents: row.try_get("amount_cents")?,
            transaction_type: DebtTransactionType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction type: {}", type_str))?,
            balance_after: row.try_get("balance_after")?,
            date: Self::parse_timestamp(&date, "date")?,
            notes: row.try_get("notes")?,
        })
    }

    fn row_to_sale(row: &SqliteRow) -> Result<Sale> {
        let date: String = row.try_get("date")?;
        let month_number: i64 = row.try_get("month_number")?;

        Ok(Sale {
            id: row.try_get("id")?,
            date: Self::parse_timestamp(&date, "date")?,
            amount_cents: row.try_get("amount_cents")?,
            branch: row.try_get("branch")?,
            observations: row.try_get("observations")?,
            month_number: u32::try_from(month_number).context("Invalid month number")?,
            debt_transaction_id: row.try_get("debt_transaction_id")?,
        })
    }

    fn row_to_expense(row: &SqliteRow) -> Result<Expense> {
        let date: String = row.try_get("date")?;

        Ok(Expense {
            id: row.try_get("id")?,
            date: Self::parse_timestamp(&date, "date")?,
            amount_cents: row.try_get("amount_cents")?,
            category: row.try_get("category")?,
            branch: row.try_get("branch")?,
            observations: row.try_get("observations")?,
        })
    }
}
