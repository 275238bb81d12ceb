use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use tracing::{debug, info, warn};

use crate::config::{Config, DEFAULT_BRANCH};
use crate::domain::{
    build_integrity_report, coin_purchase_message, debt_message, debt_notes, month_window,
    normalize_phone, placeholder_name, pos_sale_message, Cents, Client, ClientId, ClientSort,
    ClientUpdate, CoinPosting, CoinTransaction, CoinTransactionId, Coins, DebtPosting,
    DebtTransaction, DebtTransactionId, DebtTransactionType, Expense, ExpenseId, ExpenseUpdate,
    IntegrityReport, MAX_AMOUNT_CENTS, NewClient, NewExpense, NewSale, Notification, Sale, SaleId,
    SaleUpdate,
};
use crate::storage::{Adjustment, Repository, ReversalOutcome};

use super::notifier::{dispatch, DisabledNotifier, Notifier, WebhookNotifier};
use super::reporting::{build_analytics, AnalyticsReport};
use super::{AppError, ClientLocks};

/// Page size for client listings.
pub const DEFAULT_CLIENT_LIMIT: usize = 50;

/// Page size for ledger listings.
pub const DEFAULT_TRANSACTION_LIMIT: usize = 100;

/// Notes on the debt charge booked by a point-of-sale credit purchase.
pub const POS_CREDIT_NOTE: &str = "Point of sale purchase on credit";

/// Application service providing the ledger operations.
/// This is the primary interface for the CLI and the HTTP API.
pub struct LedgerService {
    repo: Repository,
    notifier: Arc<dyn Notifier>,
    locks: ClientLocks,
    default_branch: String,
}

/// Result of posting coins for a purchase
#[derive(Debug, Clone)]
pub struct CoinPostingResult {
    pub transaction: CoinTransaction,
    pub new_balance: Coins,
}

/// Result of reversing a coin transaction
#[derive(Debug, Clone)]
pub struct CoinReversalResult {
    pub transaction: CoinTransaction,
    pub new_balance: Coins,
}

/// Result of posting a debt charge or payment
#[derive(Debug, Clone)]
pub struct DebtPostingResult {
    pub transaction: DebtTransaction,
    pub new_balance: Cents,
    /// Income booked for a payment. None for charges, or if the write failed.
    pub mirrored_sale: Option<Sale>,
}

/// Result of reversing a debt transaction
#[derive(Debug, Clone)]
pub struct DebtReversalResult {
    pub transaction: DebtTransaction,
    pub new_balance: Cents,
    pub removed_sales: u64,
}

/// Result of a point-of-sale registration
#[derive(Debug, Clone)]
pub struct PosSaleResult {
    /// The client after both postings
    pub client: Client,
    pub created_client: bool,
    pub coins_earned: Coins,
    pub coin_transaction: CoinTransaction,
    pub debt_transaction: Option<DebtTransaction>,
}

/// A sale to record. Unset fields take their defaults.
#[derive(Debug, Clone, Default)]
pub struct SaleDraft {
    pub amount_cents: Cents,
    pub date: Option<DateTime<Utc>>,
    pub branch: Option<String>,
    pub observations: Option<String>,
}

/// An expense to record. Unset fields take their defaults.
#[derive(Debug, Clone, Default)]
pub struct ExpenseDraft {
    pub amount_cents: Cents,
    pub date: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub branch: Option<String>,
    pub observations: Option<String>,
}

/// Parse a wire-level transaction type. Anything but "charge" or "payment" is rejected.
pub fn parse_transaction_type(value: &str) -> Result<DebtTransactionType, AppError> {
    DebtTransactionType::from_str(value)
        .ok_or_else(|| AppError::InvalidTransactionType(value.to_string()))
}

fn require_positive(amount_cents: Cents) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    require_in_range(amount_cents)
}

fn require_in_range(value: i64) -> Result<(), AppError> {
    if value.unsigned_abs() > MAX_AMOUNT_CENTS.unsigned_abs() {
        return Err(AppError::InvalidAmount("amount out of range".to_string()));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    /// Notifications are disabled until a notifier is attached.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            notifier: Arc::new(DisabledNotifier),
            locks: ClientLocks::new(),
            default_branch: DEFAULT_BRANCH.to_string(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Open (and migrate) the configured database and wire the notifier.
    pub async fn from_config(config: &Config) -> Result<Self, AppError> {
        let repo = Repository::init(&config.database_url()).await?;

        let notifier: Arc<dyn Notifier> = match &config.webhook {
            Some(webhook) => {
                info!(url = %webhook.url, "Webhook notifications enabled");
                Arc::new(
                    WebhookNotifier::new(webhook.clone())
                        .context("Failed to build webhook client")?,
                )
            }
            None => {
                info!("Webhook not configured, notifications disabled");
                Arc::new(DisabledNotifier)
            }
        };

        Ok(Self::new(repo)
            .with_notifier(notifier)
            .with_default_branch(config.default_branch.clone()))
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    fn notify(&self, client: &Client, content: String) {
        match &client.phone {
            Some(phone) => dispatch(&self.notifier, Notification::new(phone.clone(), content)),
            None => debug!(client_id = client.id, "Client has no phone, notification skipped"),
        }
    }

    fn branch_or_default(&self, branch: Option<String>) -> String {
        non_blank(branch).unwrap_or_else(|| self.default_branch.clone())
    }

    // ========================
    // Client operations
    // ========================

    /// Register a client with zero balances.
    pub async fn create_client(
        &self,
        name: String,
        phone: Option<String>,
        observations: Option<String>,
    ) -> Result<Client, AppError> {
        let name = non_blank(Some(name)).ok_or(AppError::MissingField("name"))?;

        let mut new_client = NewClient::new(name);
        if let Some(phone) = self.checked_phone(phone, None).await? {
            new_client = new_client.with_phone(phone);
        }
        if let Some(observations) = non_blank(observations) {
            new_client = new_client.with_observations(observations);
        }

        let client = self.repo.insert_client(&new_client, Utc::now()).await?;
        info!(client_id = client.id, name = %client.name, "Client created");
        Ok(client)
    }

    /// Normalize a phone and make sure no other client holds it.
    async fn checked_phone(
        &self,
        phone: Option<String>,
        owner: Option<ClientId>,
    ) -> Result<Option<String>, AppError> {
        let Some(raw) = non_blank(phone) else {
            return Ok(None);
        };
        let phone = normalize_phone(&raw).ok_or(AppError::InvalidPhone(raw))?;

        if let Some(existing) = self.repo.get_client_by_phone(&phone).await? {
            if Some(existing.id) != owner {
                return Err(AppError::PhoneAlreadyRegistered {
                    phone,
                    client_id: existing.id,
                });
            }
        }
        Ok(Some(phone))
    }

    /// Get a client by ID.
    pub async fn get_client(&self, id: ClientId) -> Result<Client, AppError> {
        self.repo
            .get_client(id)
            .await?
            .ok_or(AppError::ClientNotFound(id))
    }

    /// Find a client by phone, in any formatting.
    pub async fn find_client_by_phone(&self, phone: &str) -> Result<Client, AppError> {
        let normalized =
            normalize_phone(phone).ok_or_else(|| AppError::InvalidPhone(phone.to_string()))?;
        self.repo
            .get_client_by_phone(&normalized)
            .await?
            .ok_or(AppError::ClientPhoneNotFound(normalized))
    }

    /// List clients. `limit` defaults to [`DEFAULT_CLIENT_LIMIT`].
    pub async fn list_clients(
        &self,
        search: Option<&str>,
        sort: ClientSort,
        limit: Option<usize>,
    ) -> Result<Vec<Client>, AppError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        Ok(self
            .repo
            .list_clients(search, sort, Some(limit.unwrap_or(DEFAULT_CLIENT_LIMIT)))
            .await?)
    }

    /// Update a client. Requested balances are reached through ledger
    /// adjustment entries, so the cached balances keep matching the logs.
    pub async fn update_client(
        &self,
        id: ClientId,
        mut update: ClientUpdate,
    ) -> Result<Client, AppError> {
        if let Some(name) = update.name.take() {
            update.name = Some(non_blank(Some(name)).ok_or(AppError::MissingField("name"))?);
        }
        if update.phone.is_some() {
            update.phone = self.checked_phone(update.phone.take(), Some(id)).await?;
        }
        for target in [update.coin_balance, update.debt_balance].into_iter().flatten() {
            require_in_range(target)?;
        }

        let _guard = self.locks.lock(id).await;

        if update.touches_profile() {
            self.repo
                .update_client_profile(id, &update, Utc::now())
                .await?
                .ok_or(AppError::ClientNotFound(id))?;
        } else {
            self.get_client(id).await?;
        }

        if let Some(target) = update.coin_balance {
            match self.repo.adjust_coin_balance(id, target, Utc::now()).await? {
                None => return Err(AppError::ClientNotFound(id)),
                Some(Adjustment::Posted((entry, balance))) => info!(
                    client_id = id,
                    transaction_id = entry.id,
                    delta = entry.coins_added,
                    balance,
                    "Coin balance adjusted"
                ),
                Some(Adjustment::Unchanged) => {}
            }
        }

        if let Some(target) = update.debt_balance {
            match self.repo.adjust_debt_balance(id, target, Utc::now()).await? {
                None => return Err(AppError::ClientNotFound(id)),
                Some(Adjustment::Posted((entry, balance))) => info!(
                    client_id = id,
                    transaction_id = entry.id,
                    delta = entry.signed_amount(),
                    balance,
                    "Debt balance adjusted"
                ),
                Some(Adjustment::Unchanged) => {}
            }
        }

        self.get_client(id).await
    }

    /// Delete a client together with its coin and debt history.
    pub async fn delete_client(&self, id: ClientId) -> Result<Client, AppError> {
        let guard = self.locks.lock(id).await;
        let client = self.get_client(id).await?;

        if !self.repo.delete_client(id).await? {
            return Err(AppError::ClientNotFound(id));
        }
        drop(guard);
        self.locks.forget(id);

        info!(client_id = id, name = %client.name, "Client deleted");
        Ok(client)
    }

    // ========================
    // Coin ledger
    // ========================

    /// Earn coins for a purchase and notify the client.
    ///
    /// A blank `client_name` falls back to the stored name.
    pub async fn post_coin_transaction(
        &self,
        client_id: ClientId,
        client_name: Option<String>,
        amount_cents: Cents,
    ) -> Result<CoinPostingResult, AppError> {
        require_positive(amount_cents)?;

        let guard = self.locks.lock(client_id).await;
        let client = self.get_client(client_id).await?;
        let name = non_blank(client_name).unwrap_or_else(|| client.name.clone());
        let (transaction, new_balance) = self.post_coins_locked(&client, name, amount_cents).await?;
        drop(guard);

        self.notify(
            &client,
            coin_purchase_message(&client.name, amount_cents, new_balance),
        );

        Ok(CoinPostingResult {
            transaction,
            new_balance,
        })
    }

    /// Caller must hold the client's lock.
    async fn post_coins_locked(
        &self,
        client: &Client,
        client_name: String,
        amount_cents: Cents,
    ) -> Result<(CoinTransaction, Coins), AppError> {
        let posting = CoinPosting::purchase(client.id, client_name, amount_cents, Utc::now());
        let (transaction, new_balance) = self
            .repo
            .post_coin_transaction(posting)
            .await?
            .ok_or(AppError::ClientNotFound(client.id))?;

        info!(
            client_id = client.id,
            transaction_id = transaction.id,
            coins_added = transaction.coins_added,
            new_balance,
            "Coins posted"
        );
        Ok((transaction, new_balance))
    }

    /// Undo a coin posting: compensate the balance, then delete the entry.
    /// A second reversal of the same entry fails with not found.
    pub async fn reverse_coin_transaction(
        &self,
        id: CoinTransactionId,
    ) -> Result<CoinReversalResult, AppError> {
        let transaction = self
            .repo
            .get_coin_transaction(id)
            .await?
            .ok_or(AppError::CoinTransactionNotFound(id))?;

        let _guard = self.locks.lock(transaction.client_id).await;
        match self.repo.reverse_coin_transaction(&transaction).await? {
            ReversalOutcome::Reversed { new_balance, .. } => {
                info!(
                    client_id = transaction.client_id,
                    transaction_id = id,
                    coins_removed = transaction.coins_added,
                    new_balance,
                    "Coin transaction reversed"
                );
                Ok(CoinReversalResult {
                    transaction,
                    new_balance,
                })
            }
            ReversalOutcome::TransactionMissing => Err(AppError::CoinTransactionNotFound(id)),
            ReversalOutcome::ClientMissing => Err(AppError::ClientNotFound(transaction.client_id)),
        }
    }

    /// List coin transactions, newest first.
    pub async fn list_coin_transactions(
        &self,
        client_id: Option<ClientId>,
        limit: Option<usize>,
    ) -> Result<Vec<CoinTransaction>, AppError> {
        Ok(self
            .repo
            .list_coin_transactions(client_id, Some(limit.unwrap_or(DEFAULT_TRANSACTION_LIMIT)))
            .await?)
    }

    // ========================
    // Debt ledger
    // ========================

    /// Post a charge or payment.
    ///
    /// Payments are mirrored into the sales ledger at `branch` (or the default
    /// branch). The mirror write and the notification never fail the posting.
    pub async fn post_debt_transaction(
        &self,
        client_id: ClientId,
        client_name: Option<String>,
        amount_cents: Cents,
        transaction_type: DebtTransactionType,
        notes: Option<String>,
        branch: Option<String>,
    ) -> Result<DebtPostingResult, AppError> {
        require_positive(amount_cents)?;

        let guard = self.locks.lock(client_id).await;
        let client = self.get_client(client_id).await?;
        let name = non_blank(client_name).unwrap_or_else(|| client.name.clone());
        let branch = non_blank(branch);

        let posting = DebtPosting::new(client_id, name, amount_cents, transaction_type, Utc::now())
            .with_notes(debt_notes(notes, branch.as_deref()));
        let (transaction, new_balance) = self.post_debt_locked(posting).await?;

        // Reversals take the same lock, so they see the mirrored sale.
        let mirrored_sale = if transaction.is_payment() {
            self.mirror_payment(&transaction, self.branch_or_default(branch))
                .await
        } else {
            None
        };
        drop(guard);

        self.notify(
            &client,
            debt_message(&client.name, amount_cents, new_balance, transaction_type),
        );

        Ok(DebtPostingResult {
            transaction,
            new_balance,
            mirrored_sale,
        })
    }

    /// Caller must hold the client's lock.
    async fn post_debt_locked(
        &self,
        posting: DebtPosting,
    ) -> Result<(DebtTransaction, Cents), AppError> {
        let client_id = posting.client_id;
        let (transaction, new_balance) = self
            .repo
            .post_debt_transaction(posting)
            .await?
            .ok_or(AppError::ClientNotFound(client_id))?;

        info!(
            client_id,
            transaction_id = transaction.id,
            transaction_type = %transaction.transaction_type,
            amount = transaction.amount_cents,
            new_balance,
            "Debt transaction posted"
        );
        Ok((transaction, new_balance))
    }

    async fn mirror_payment(&self, payment: &DebtTransaction, branch: String) -> Option<Sale> {
        match self
            .repo
            .insert_sale(NewSale::mirrored_payment(payment, &branch))
            .await
        {
            Ok(sale) => {
                info!(
                    sale_id = sale.id,
                    debt_transaction_id = payment.id,
                    branch = %branch,
                    "Debt payment mirrored as sale"
                );
                Some(sale)
            }
            Err(e) => {
                warn!(
                    debt_transaction_id = payment.id,
                    error = %e,
                    "Failed to mirror debt payment as sale"
                );
                None
            }
        }
    }

    /// Undo a debt posting: apply the inverse to the balance, delete the entry,
    /// and remove the sale a payment mirrored, as one unit.
    pub async fn reverse_debt_transaction(
        &self,
        id: DebtTransactionId,
    ) -> Result<DebtReversalResult, AppError> {
        let transaction = self
            .repo
            .get_debt_transaction(id)
            .await?
            .ok_or(AppError::DebtTransactionNotFound(id))?;

        let _guard = self.locks.lock(transaction.client_id).await;
        match self.repo.reverse_debt_transaction(&transaction).await? {
            ReversalOutcome::Reversed {
                new_balance,
                removed_sales,
            } => {
                info!(
                    client_id = transaction.client_id,
                    transaction_id = id,
                    transaction_type = %transaction.transaction_type,
                    new_balance,
                    removed_sales,
                    "Debt transaction reversed"
                );
                Ok(DebtReversalResult {
                    transaction,
                    new_balance,
                    removed_sales,
                })
            }
            ReversalOutcome::TransactionMissing => Err(AppError::DebtTransactionNotFound(id)),
            ReversalOutcome::ClientMissing => Err(AppError::ClientNotFound(transaction.client_id)),
        }
    }

    /// List debt transactions, newest first.
    ///
    /// With `current_month` the listing is bounded by the current local
    /// calendar month instead of `limit`.
    pub async fn list_debt_transactions(
        &self,
        client_id: Option<ClientId>,
        current_month: bool,
        limit: Option<usize>,
    ) -> Result<Vec<DebtTransaction>, AppError> {
        if current_month {
            let window = month_window(&Local::now())
                .context("Failed to compute current month window")?;
            return Ok(self
                .repo
                .list_debt_transactions(client_id, Some(window), None)
                .await?);
        }

        Ok(self
            .repo
            .list_debt_transactions(
                client_id,
                None,
                Some(limit.unwrap_or(DEFAULT_TRANSACTION_LIMIT)),
            )
            .await?)
    }

    // ========================
    // Point of sale
    // ========================

    /// Register a purchase by phone: find or create the client, earn coins,
    /// optionally charge the amount to the account, and send one message.
    pub async fn register_pos_sale(
        &self,
        phone: &str,
        amount_cents: Cents,
        is_credit: bool,
        client_name: Option<String>,
    ) -> Result<PosSaleResult, AppError> {
        require_positive(amount_cents)?;
        let phone = normalize_phone(phone).ok_or_else(|| AppError::InvalidPhone(phone.to_string()))?;

        let (client, created_client) = match self.repo.get_client_by_phone(&phone).await? {
            Some(client) => (client, false),
            None => {
                let name = non_blank(client_name).unwrap_or_else(|| placeholder_name(&phone));
                let new_client = NewClient::new(name).with_phone(phone.clone());
                match self.repo.insert_client(&new_client, Utc::now()).await {
                    Ok(client) => {
                        info!(client_id = client.id, phone = %phone, "Client created at point of sale");
                        (client, true)
                    }
                    // Lost a race with a concurrent registration of the same phone.
                    Err(e) => match self.repo.get_client_by_phone(&phone).await? {
                        Some(client) => (client, false),
                        None => return Err(e.into()),
                    },
                }
            }
        };

        let guard = self.locks.lock(client.id).await;
        let (coin_transaction, coin_total) = self
            .post_coins_locked(&client, client.name.clone(), amount_cents)
            .await?;

        let debt = if is_credit {
            let posting = DebtPosting::new(
                client.id,
                client.name.clone(),
                amount_cents,
                DebtTransactionType::Charge,
                Utc::now(),
            )
            .with_notes(Some(POS_CREDIT_NOTE.to_string()));
            Some(self.post_debt_locked(posting).await?)
        } else {
            None
        };
        drop(guard);

        let client = self.get_client(client.id).await?;
        let coins_earned = coin_transaction.coins_added;

        self.notify(
            &client,
            pos_sale_message(
                &client.name,
                amount_cents,
                coins_earned,
                coin_total,
                debt.as_ref().map(|(_, balance)| *balance),
            ),
        );

        Ok(PosSaleResult {
            client,
            created_client,
            coins_earned,
            coin_transaction,
            debt_transaction: debt.map(|(transaction, _)| transaction),
        })
    }

    // ========================
    // Sales and expenses
    // ========================

    /// Record a sale. `date` defaults to now, `branch` to the default branch.
    pub async fn record_sale(
        &self,
        amount_cents: Cents,
        date: Option<DateTime<Utc>>,
        branch: Option<String>,
        observations: Option<String>,
    ) -> Result<Sale, AppError> {
        let sale = self.prepare_sale(SaleDraft {
            amount_cents,
            date,
            branch,
            observations,
        })?;

        let sale = self.repo.insert_sale(sale).await?;
        info!(sale_id = sale.id, amount = sale.amount_cents, "Sale recorded");
        Ok(sale)
    }

    /// Record several sales at once. Every draft is validated before anything
    /// is written, and the batch is saved in one store transaction.
    pub async fn record_sales(&self, drafts: Vec<SaleDraft>) -> Result<Vec<Sale>, AppError> {
        let sales = drafts
            .into_iter()
            .map(|draft| self.prepare_sale(draft))
            .collect::<Result<Vec<_>, _>>()?;
        if sales.is_empty() {
            return Ok(Vec::new());
        }

        let sales = self.repo.insert_sales(sales).await?;
        info!(count = sales.len(), "Sales recorded");
        Ok(sales)
    }

    fn prepare_sale(&self, draft: SaleDraft) -> Result<NewSale, AppError> {
        require_positive(draft.amount_cents)?;

        let mut sale = NewSale::new(draft.amount_cents, draft.date.unwrap_or_else(Utc::now))
            .with_branch(self.branch_or_default(draft.branch));
        if let Some(observations) = non_blank(draft.observations) {
            sale = sale.with_observations(observations);
        }
        Ok(sale)
    }

    /// Edit a sale. Amount and date of a sale mirroring a debt payment belong
    /// to the payment and cannot be edited here.
    pub async fn update_sale(&self, id: SaleId, mut update: SaleUpdate) -> Result<Sale, AppError> {
        if let Some(amount) = update.amount_cents {
            require_positive(amount)?;
        }
        if update.branch.is_some() {
            update.branch = Some(self.branch_or_default(update.branch.take()));
        }

        let current = self
            .repo
            .get_sale(id)
            .await?
            .ok_or(AppError::SaleNotFound(id))?;
        if let Some(payment_id) = current.debt_transaction_id {
            if update.touches_money() {
                return Err(AppError::MirroredSale { id, payment_id });
            }
        }

        let sale = self
            .repo
            .update_sale(id, &update)
            .await?
            .ok_or(AppError::SaleNotFound(id))?;
        info!(sale_id = id, amount = sale.amount_cents, "Sale updated");
        Ok(sale)
    }

    pub async fn list_sales(&self, limit: Option<usize>) -> Result<Vec<Sale>, AppError> {
        Ok(self.repo.list_sales(limit).await?)
    }

    pub async fn delete_sale(&self, id: SaleId) -> Result<(), AppError> {
        if !self.repo.delete_sale(id).await? {
            return Err(AppError::SaleNotFound(id));
        }
        info!(sale_id = id, "Sale deleted");
        Ok(())
    }

    /// Record an expense. `date` defaults to now, `branch` to the default branch.
    pub async fn record_expense(
        &self,
        amount_cents: Cents,
        date: Option<DateTime<Utc>>,
        category: Option<String>,
        branch: Option<String>,
        observations: Option<String>,
    ) -> Result<Expense, AppError> {
        let expense = self.prepare_expense(ExpenseDraft {
            amount_cents,
            date,
            category,
            branch,
            observations,
        })?;

        let expense = self.repo.insert_expense(expense).await?;
        info!(expense_id = expense.id, amount = expense.amount_cents, "Expense recorded");
        Ok(expense)
    }

    /// Record several expenses at once, all or nothing.
    pub async fn record_expenses(
        &self,
        drafts: Vec<ExpenseDraft>,
    ) -> Result<Vec<Expense>, AppError> {
        let expenses = drafts
            .into_iter()
            .map(|draft| self.prepare_expense(draft))
            .collect::<Result<Vec<_>, _>>()?;
        if expenses.is_empty() {
            return Ok(Vec::new());
        }

        let expenses = self.repo.insert_expenses(expenses).await?;
        info!(count = expenses.len(), "Expenses recorded");
        Ok(expenses)
    }

    fn prepare_expense(&self, draft: ExpenseDraft) -> Result<NewExpense, AppError> {
        require_positive(draft.amount_cents)?;

        let mut expense =
            NewExpense::new(draft.amount_cents, draft.date.unwrap_or_else(Utc::now))
                .with_branch(self.branch_or_default(draft.branch));
        if let Some(category) = non_blank(draft.category) {
            expense = expense.with_category(category);
        }
        if let Some(observations) = non_blank(draft.observations) {
            expense = expense.with_observations(observations);
        }
        Ok(expense)
    }

    pub async fn update_expense(
        &self,
        id: ExpenseId,
        mut update: ExpenseUpdate,
    ) -> Result<Expense, AppError> {
        if let Some(amount) = update.amount_cents {
            require_positive(amount)?;
        }
        if update.branch.is_some() {
            update.branch = Some(self.branch_or_default(update.branch.take()));
        }

        let expense = self
            .repo
            .update_expense(id, &update)
            .await?
            .ok_or(AppError::ExpenseNotFound(id))?;
        info!(expense_id = id, amount = expense.amount_cents, "Expense updated");
        Ok(expense)
    }

    pub async fn list_expenses(&self, limit: Option<usize>) -> Result<Vec<Expense>, AppError> {
        Ok(self.repo.list_expenses(limit).await?)
    }

    pub async fn delete_expense(&self, id: ExpenseId) -> Result<(), AppError> {
        if !self.repo.delete_expense(id).await? {
            return Err(AppError::ExpenseNotFound(id));
        }
        info!(expense_id = id, "Expense deleted");
        Ok(())
    }

    /// Dashboard aggregates over every sale and expense.
    pub async fn analytics(&self) -> Result<AnalyticsReport, AppError> {
        let sales = self.repo.list_sales(None).await?;
        let expenses = self.repo.list_expenses(None).await?;
        Ok(build_analytics(&sales, &expenses))
    }

    // ========================
    // Full listings
    // ========================

    /// Every client, newest first.
    pub async fn list_all_clients(&self) -> Result<Vec<Client>, AppError> {
        Ok(self
            .repo
            .list_clients(None, ClientSort::Recent, None)
            .await?)
    }

    /// Every coin transaction in posting order.
    pub async fn list_all_coin_transactions(&self) -> Result<Vec<CoinTransaction>, AppError> {
        Ok(self.repo.list_all_coin_transactions().await?)
    }

    /// Every debt transaction in posting order.
    pub async fn list_all_debt_transactions(&self) -> Result<Vec<DebtTransaction>, AppError> {
        Ok(self.repo.list_all_debt_transactions().await?)
    }

    // ========================
    // Integrity operations
    // ========================

    /// Compare every cached balance with its log.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let clients = self.list_all_clients().await?;
        let coins = self.list_all_coin_transactions().await?;
        let debts = self.list_all_debt_transactions().await?;

        let report = build_integrity_report(&clients, &coins, &debts);
        if !report.is_healthy() {
            warn!(
                drifts = report.drifts.len(),
                orphaned = report.orphaned_client_ids.len(),
                "Ledger integrity check found problems"
            );
        }
        Ok(report)
    }

    /// Recompute every cached balance from the logs.
    /// Returns how many clients were repaired.
    pub async fn rebuild_balances(&self) -> Result<u64, AppError> {
        let repaired = self.repo.rebuild_balances(Utc::now()).await?;
        info!(repaired, "Balances rebuilt from ledgers");
        Ok(repaired)
    }
}
