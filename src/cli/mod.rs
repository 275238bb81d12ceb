use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::application::{AnalyticsReport, LedgerService};
use crate::config::{Config, DEFAULT_BRANCH};
use crate::domain::{
    format_cents, parse_booking_date, parse_cents, Client, ClientId, ClientSort, ClientUpdate,
    DebtTransactionType, ExpenseUpdate, SaleUpdate,
};

/// Mostrador - shop back office: client coins, running debts, sales and expenses
#[derive(Parser)]
#[command(name = "mostrador")]
#[command(about = "Back office for a retail shop: loyalty coins, client debts, sales and expenses")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "MOSTRADOR_DATABASE", default_value = "mostrador.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Chat-bot webhook URL used to message clients
    #[arg(long, env = "MOSTRADOR_WEBHOOK_URL", global = true)]
    pub webhook_url: Option<String>,

    /// API key sent in the x-api-builderbot header
    #[arg(long, env = "MOSTRADOR_WEBHOOK_API_KEY", global = true, hide_env_values = true)]
    pub webhook_api_key: Option<String>,

    /// Image attached to every message
    #[arg(long, env = "MOSTRADOR_WEBHOOK_MEDIA_URL", global = true)]
    pub webhook_media_url: Option<String>,

    /// Branch credited when none is given
    #[arg(long, env = "MOSTRADOR_DEFAULT_BRANCH", default_value = DEFAULT_BRANCH, global = true)]
    pub default_branch: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Run the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "MOSTRADOR_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },

    /// Client management commands
    #[command(subcommand)]
    Client(ClientCommands),

    /// Loyalty coin ledger commands
    #[command(subcommand)]
    Coins(CoinCommands),

    /// Client debt ledger commands
    #[command(subcommand)]
    Debt(DebtCommands),

    /// Register a point-of-sale purchase by phone
    Sale {
        /// Client phone number (any formatting)
        phone: String,

        /// Purchase amount (e.g., "3500" or "3500.50")
        amount: String,

        /// Charge the purchase to the client's account
        #[arg(long)]
        credit: bool,

        /// Name for a client created by this sale
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Sales ledger commands
    #[command(subcommand)]
    Sales(SalesCommands),

    /// Expense ledger commands
    #[command(subcommand)]
    Expenses(ExpenseCommands),

    /// Show sales analytics and forecast
    Report {
        /// Output format: table, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Verify that cached balances match the ledgers
    Check,

    /// Recompute cached balances from the ledgers
    Repair,

    /// Export data to CSV or JSON
    Export {
        /// What to export: clients, coins, debts, sales, expenses, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ClientCommands {
    /// Register a new client
    Create {
        /// Client name
        name: String,

        /// Phone number (must be unique)
        #[arg(short, long)]
        phone: Option<String>,

        /// Free-text observations
        #[arg(short, long)]
        observations: Option<String>,
    },

    /// List clients
    List {
        /// Case-insensitive name fragment
        #[arg(short, long)]
        search: Option<String>,

        /// Sort order: coins, debt, recent
        #[arg(long, default_value = "recent")]
        sort: String,

        /// Maximum number of clients to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a client and recent ledger activity
    Show {
        /// Client ID
        id: ClientId,
    },

    /// Update a client; balances are adjusted through the ledgers
    Update {
        /// Client ID
        id: ClientId,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        observations: Option<String>,

        /// Target coin balance
        #[arg(long)]
        coins: Option<i64>,

        /// Target debt balance (e.g., "1500.00")
        #[arg(long, allow_hyphen_values = true)]
        debt: Option<String>,
    },

    /// Delete a client and its coin and debt history
    Delete {
        /// Client ID
        id: ClientId,
    },
}

#[derive(Subcommand)]
pub enum CoinCommands {
    /// Earn coins for a purchase
    Add {
        /// Client ID
        client_id: ClientId,

        /// Purchase amount (e.g., "2500")
        amount: String,

        /// Name recorded on the entry (defaults to the client's name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Reverse a coin transaction
    Reverse {
        /// Coin transaction ID
        id: i64,
    },

    /// List coin transactions
    List {
        /// Filter by client ID
        #[arg(short, long)]
        client: Option<ClientId>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum DebtCommands {
    /// Record a purchase on account
    Charge {
        /// Client ID
        client_id: ClientId,

        /// Amount (e.g., "1500.00")
        amount: String,

        #[arg(short, long)]
        notes: Option<String>,

        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Record a payment; it is also booked as a sale
    Pay {
        /// Client ID
        client_id: ClientId,

        /// Amount (e.g., "1500.00")
        amount: String,

        #[arg(short, long)]
        notes: Option<String>,

        /// Branch that collected the payment
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Reverse a debt transaction
    Reverse {
        /// Debt transaction ID
        id: i64,
    },

    /// List debt transactions
    List {
        /// Filter by client ID
        #[arg(short, long)]
        client: Option<ClientId>,

        /// Only the current calendar month
        #[arg(long)]
        current_month: bool,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum SalesCommands {
    /// Record a sale
    Record {
        /// Amount (e.g., "1500.00")
        amount: String,

        /// Date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,

        #[arg(short, long)]
        branch: Option<String>,

        #[arg(short, long)]
        observations: Option<String>,
    },

    /// List sales
    List {
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Edit a sale; unset options keep their value
    Update {
        /// Sale ID
        id: i64,

        #[arg(long)]
        amount: Option<String>,

        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        #[arg(short, long)]
        branch: Option<String>,

        #[arg(short, long)]
        observations: Option<String>,
    },

    /// Delete a sale
    Delete {
        /// Sale ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense
    Record {
        /// Amount (e.g., "1500.00")
        amount: String,

        /// Date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        branch: Option<String>,

        #[arg(short, long)]
        observations: Option<String>,
    },

    /// List expenses
    List {
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Edit an expense; unset options keep their value
    Update {
        /// Expense ID
        id: i64,

        #[arg(long)]
        amount: Option<String>,

        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        branch: Option<String>,

        #[arg(short, long)]
        observations: Option<String>,
    },

    /// Delete an expense
    Delete {
        /// Expense ID
        id: i64,
    },
}

/// Install the global subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

impl Cli {
    fn config(&self) -> Config {
        Config::new(self.database.clone())
            .with_webhook(
                self.webhook_url.clone(),
                self.webhook_api_key.clone(),
                self.webhook_media_url.clone(),
            )
            .with_default_branch(self.default_branch.clone())
    }

    pub async fn run(self) -> Result<()> {
        init_tracing(self.verbose);

        let mut config = self.config();

        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Serve { bind } => {
                config = config.with_bind(bind);
                let service = LedgerService::from_config(&config).await?;
                crate::http::serve(Arc::new(service), config.bind).await?;
            }

            Commands::Client(cmd) => {
                let service = LedgerService::from_config(&config).await?;
                run_client_command(&service, cmd).await?;
            }

            Commands::Coins(cmd) => {
                let service = LedgerService::from_config(&config).await?;
                run_coin_command(&service, cmd).await?;
            }

            Commands::Debt(cmd) => {
                let service = LedgerService::from_config(&config).await?;
                run_debt_command(&service, cmd).await?;
            }

            Commands::Sale {
                phone,
                amount,
                credit,
                name,
            } => {
                let service = LedgerService::from_config(&config).await?;
                let amount_cents = parse_amount(&amount)?;

                let result = service
                    .register_pos_sale(&phone, amount_cents, credit, name)
                    .await?;

                if result.created_client {
                    println!(
                        "New client: {} ({})",
                        result.client.name, result.client.id
                    );
                }
                println!(
                    "Sale of {} for {}: +{} coins (total {})",
                    format_cents(amount_cents),
                    result.client.name,
                    result.coins_earned,
                    result.client.coin_balance
                );
                if result.debt_transaction.is_some() {
                    println!(
                        "Charged to account, balance: {}",
                        format_cents(result.client.debt_balance)
                    );
                }
            }

            Commands::Sales(cmd) => {
                let service = LedgerService::from_config(&config).await?;
                run_sales_command(&service, cmd).await?;
            }

            Commands::Expenses(cmd) => {
                let service = LedgerService::from_config(&config).await?;
                run_expense_command(&service, cmd).await?;
            }

            Commands::Report { format } => {
                let service = LedgerService::from_config(&config).await?;
                let report = service.analytics().await?;
                run_report_command(&report, &format)?;
            }

            Commands::Check => {
                let service = LedgerService::from_config(&config).await?;
                run_check_command(&service).await?;
            }

            Commands::Repair => {
                let service = LedgerService::from_config(&config).await?;
                let repaired = service.rebuild_balances().await?;
                if repaired == 0 {
                    println!("All balances already match their ledgers.");
                } else {
                    println!("Repaired balances of {} client(s).", repaired);
                }
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = LedgerService::from_config(&config).await?;
                run_export_command(&service, &export_type, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

fn parse_amount(amount: &str) -> Result<i64> {
    parse_cents(amount).context("Invalid amount format. Use '1500.00' or '1500'")
}

fn parse_date(date: Option<String>) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    date.map(|d| {
        parse_booking_date(&d)
            .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", d))
    })
    .transpose()
}

async fn run_client_command(service: &LedgerService, cmd: ClientCommands) -> Result<()> {
    match cmd {
        ClientCommands::Create {
            name,
            phone,
            observations,
        } => {
            let client = service.create_client(name, phone, observations).await?;
            println!("Created client: {} ({})", client.name, client.id);
        }

        ClientCommands::List {
            search,
            sort,
            limit,
        } => {
            let sort = ClientSort::from_str(&sort).ok_or_else(|| {
                anyhow::anyhow!("Invalid sort '{}'. Valid: coins, debt, recent", sort)
            })?;
            let clients = service.list_clients(search.as_deref(), sort, limit).await?;
            print_clients(&clients);
        }

        ClientCommands::Show { id } => {
            let client = service.get_client(id).await?;
            println!("Client: {}", client.name);
            println!("  ID:           {}", client.id);
            if let Some(phone) = &client.phone {
                println!("  Phone:        {}", phone);
            }
            println!("  Coins:        {}", client.coin_balance);
            let standing = if client.owes() {
                " (owed)"
            } else if client.debt_balance < 0 {
                " (credit)"
            } else {
                ""
            };
            println!(
                "  Debt:         {}{}",
                format_cents(client.debt_balance),
                standing
            );
            if let Some(obs) = &client.observations {
                println!("  Observations: {}", obs);
            }
            println!(
                "  Created:      {}",
                client.created_at.format("%Y-%m-%d %H:%M:%S")
            );

            let debts = service.list_debt_transactions(Some(id), false, Some(5)).await?;
            if !debts.is_empty() {
                println!();
                println!("  Recent debt activity:");
                for tx in &debts {
                    println!(
                        "    {} {:<8} {:>12} -> {:>12}",
                        tx.date.format("%Y-%m-%d"),
                        tx.transaction_type,
                        format_cents(tx.amount_cents),
                        format_cents(tx.balance_after)
                    );
                }
            }
        }

        ClientCommands::Update {
            id,
            name,
            phone,
            observations,
            coins,
            debt,
        } => {
            let debt_balance = debt.as_deref().map(parse_amount).transpose()?;
            let update = ClientUpdate {
                name,
                phone,
                observations,
                coin_balance: coins,
                debt_balance,
            };
            let client = service.update_client(id, update).await?;
            println!(
                "Updated client: {} (coins {}, debt {})",
                client.name,
                client.coin_balance,
                format_cents(client.debt_balance)
            );
        }

        ClientCommands::Delete { id } => {
            let client = service.delete_client(id).await?;
            println!("Deleted client: {} ({})", client.name, client.id);
        }
    }
    Ok(())
}

fn print_clients(clients: &[Client]) {
    if clients.is_empty() {
        println!("No clients found.");
        return;
    }
    println!(
        "{:<6} {:<24} {:<14} {:>8} {:>12}",
        "ID", "NAME", "PHONE", "COINS", "DEBT"
    );
    println!("{}", "-".repeat(68));
    for client in clients {
        println!(
            "{:<6} {:<24} {:<14} {:>8} {:>12}",
            client.id,
            truncate(&client.name, 24),
            client.phone.as_deref().unwrap_or("-"),
            client.coin_balance,
            format_cents(client.debt_balance)
        );
    }
}

async fn run_coin_command(service: &LedgerService, cmd: CoinCommands) -> Result<()> {
    match cmd {
        CoinCommands::Add {
            client_id,
            amount,
            name,
        } => {
            let amount_cents = parse_amount(&amount)?;
            let result = service
                .post_coin_transaction(client_id, name, amount_cents)
                .await?;
            println!(
                "Posted {} coins for {} ({}), balance: {}",
                result.transaction.coins_added,
                format_cents(amount_cents),
                result.transaction.id,
                result.new_balance
            );
        }

        CoinCommands::Reverse { id } => {
            let result = service.reverse_coin_transaction(id).await?;
            println!(
                "Reversed coin transaction {}: -{} coins, balance: {}",
                id, result.transaction.coins_added, result.new_balance
            );
        }

        CoinCommands::List { client, limit } => {
            let transactions = service.list_coin_transactions(client, limit).await?;
            if transactions.is_empty() {
                println!("No coin transactions found.");
                return Ok(());
            }
            println!(
                "{:<6} {:<12} {:<24} {:>12} {:>8}",
                "ID", "DATE", "CLIENT", "AMOUNT", "COINS"
            );
            println!("{}", "-".repeat(66));
            for tx in &transactions {
                println!(
                    "{:<6} {:<12} {:<24} {:>12} {:>8}",
                    tx.id,
                    tx.date.format("%Y-%m-%d"),
                    truncate(&tx.client_name, 24),
                    format_cents(tx.amount_cents),
                    tx.coins_added
                );
            }
        }
    }
    Ok(())
}

async fn run_debt_command(service: &LedgerService, cmd: DebtCommands) -> Result<()> {
    match cmd {
        DebtCommands::Charge {
            client_id,
            amount,
            notes,
            branch,
        } => {
            post_debt(service, client_id, &amount, DebtTransactionType::Charge, notes, branch)
                .await?;
        }

        DebtCommands::Pay {
            client_id,
            amount,
            notes,
            branch,
        } => {
            post_debt(service, client_id, &amount, DebtTransactionType::Payment, notes, branch)
                .await?;
        }

        DebtCommands::Reverse { id } => {
            let result = service.reverse_debt_transaction(id).await?;
            println!(
                "Reversed {} of {} ({}), balance: {}",
                result.transaction.transaction_type,
                format_cents(result.transaction.amount_cents),
                id,
                format_cents(result.new_balance)
            );
            if result.removed_sales > 0 {
                println!("Removed {} mirrored sale(s)", result.removed_sales);
            }
        }

        DebtCommands::List {
            client,
            current_month,
            limit,
        } => {
            let transactions = service
                .list_debt_transactions(client, current_month, limit)
                .await?;
            if transactions.is_empty() {
                println!("No debt transactions found.");
                return Ok(());
            }
            println!(
                "{:<6} {:<12} {:<20} {:<8} {:>12} {:>12}  NOTES",
                "ID", "DATE", "CLIENT", "TYPE", "AMOUNT", "BALANCE"
            );
            println!("{}", "-".repeat(82));
            for tx in &transactions {
                println!(
                    "{:<6} {:<12} {:<20} {:<8} {:>12} {:>12}  {}",
                    tx.id,
                    tx.date.format("%Y-%m-%d"),
                    truncate(&tx.client_name, 20),
                    tx.transaction_type,
                    format_cents(tx.amount_cents),
                    format_cents(tx.balance_after),
                    tx.notes.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

async fn post_debt(
    service: &LedgerService,
    client_id: ClientId,
    amount: &str,
    transaction_type: DebtTransactionType,
    notes: Option<String>,
    branch: Option<String>,
) -> Result<()> {
    let amount_cents = parse_amount(amount)?;

    let result = service
        .post_debt_transaction(client_id, None, amount_cents, transaction_type, notes, branch)
        .await?;

    println!(
        "Recorded {} of {} for {} ({}), balance: {}",
        result.transaction.transaction_type,
        format_cents(amount_cents),
        result.transaction.client_name,
        result.transaction.id,
        format_cents(result.new_balance)
    );
    if let Some(sale) = result.mirrored_sale {
        println!(
            "Booked as sale {} at {}",
            sale.id,
            sale.branch.as_deref().unwrap_or(service.default_branch())
        );
    }
    Ok(())
}

async fn run_sales_command(service: &LedgerService, cmd: SalesCommands) -> Result<()> {
    match cmd {
        SalesCommands::Record {
            amount,
            date,
            branch,
            observations,
        } => {
            let sale = service
                .record_sale(parse_amount(&amount)?, parse_date(date)?, branch, observations)
                .await?;
            println!(
                "Recorded sale: {} at {} ({})",
                format_cents(sale.amount_cents),
                sale.branch.as_deref().unwrap_or("-"),
                sale.id
            );
        }

        SalesCommands::List { limit } => {
            let sales = service.list_sales(Some(limit)).await?;
            if sales.is_empty() {
                println!("No sales found.");
                return Ok(());
            }
            println!(
                "{:<6} {:<12} {:<14} {:>12}  OBSERVATIONS",
                "ID", "DATE", "BRANCH", "AMOUNT"
            );
            println!("{}", "-".repeat(70));
            for sale in &sales {
                println!(
                    "{:<6} {:<12} {:<14} {:>12}  {}",
                    sale.id,
                    sale.date.format("%Y-%m-%d"),
                    truncate(sale.branch.as_deref().unwrap_or("-"), 14),
                    format_cents(sale.amount_cents),
                    sale.observations.as_deref().unwrap_or("")
                );
            }
        }

        SalesCommands::Update {
            id,
            amount,
            date,
            branch,
            observations,
        } => {
            let update = SaleUpdate {
                amount_cents: amount.as_deref().map(parse_amount).transpose()?,
                date: parse_date(date)?,
                branch,
                observations,
            };
            let sale = service.update_sale(id, update).await?;
            println!(
                "Updated sale {}: {} at {}",
                sale.id,
                format_cents(sale.amount_cents),
                sale.branch.as_deref().unwrap_or("-")
            );
        }

        SalesCommands::Delete { id } => {
            service.delete_sale(id).await?;
            println!("Deleted sale {}", id);
        }
    }
    Ok(())
}

async fn run_expense_command(service: &LedgerService, cmd: ExpenseCommands) -> Result<()> {
    match cmd {
        ExpenseCommands::Record {
            amount,
            date,
            category,
            branch,
            observations,
        } => {
            let expense = service
                .record_expense(
                    parse_amount(&amount)?,
                    parse_date(date)?,
                    category,
                    branch,
                    observations,
                )
                .await?;
            println!(
                "Recorded expense: {} {} ({})",
                format_cents(expense.amount_cents),
                expense.category.as_deref().unwrap_or("uncategorized"),
                expense.id
            );
        }

        ExpenseCommands::List { limit } => {
            let expenses = service.list_expenses(Some(limit)).await?;
            if expenses.is_empty() {
                println!("No expenses found.");
                return Ok(());
            }
            println!(
                "{:<6} {:<12} {:<16} {:<14} {:>12}",
                "ID", "DATE", "CATEGORY", "BRANCH", "AMOUNT"
            );
            println!("{}", "-".repeat(64));
            for expense in &expenses {
                println!(
                    "{:<6} {:<12} {:<16} {:<14} {:>12}",
                    expense.id,
                    expense.date.format("%Y-%m-%d"),
                    truncate(expense.category.as_deref().unwrap_or("-"), 16),
                    truncate(expense.branch.as_deref().unwrap_or("-"), 14),
                    format_cents(expense.amount_cents)
                );
            }
        }

        ExpenseCommands::Update {
            id,
            amount,
            date,
            category,
            branch,
            observations,
        } => {
            let update = ExpenseUpdate {
                amount_cents: amount.as_deref().map(parse_amount).transpose()?,
                date: parse_date(date)?,
                category,
                branch,
                observations,
            };
            let expense = service.update_expense(id, update).await?;
            println!(
                "Updated expense {}: {} {}",
                expense.id,
                format_cents(expense.amount_cents),
                expense.category.as_deref().unwrap_or("uncategorized")
            );
        }

        ExpenseCommands::Delete { id } => {
            service.delete_expense(id).await?;
            println!("Deleted expense {}", id);
        }
    }
    Ok(())
}

fn run_report_command(report: &AnalyticsReport, format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        "table" => {
            if report.timeline.is_empty() {
                println!("No sales recorded yet.");
                return Ok(());
            }

            println!("Monthly Totals");
            println!("{:<8} {:>14} {:>14} {:>14}", "MONTH", "SALES", "EXPENSES", "NET");
            println!("{}", "-".repeat(53));
            for month in &report.timeline {
                println!(
                    "{:<8} {:>14} {:>14} {:>14}",
                    month.month,
                    format_cents(month.sales),
                    format_cents(month.expenses),
                    format_cents(month.sales - month.expenses)
                );
            }

            if !report.forecast.is_empty() {
                println!();
                println!("Sales Forecast");
                for point in &report.forecast {
                    println!("  {:<8} {:>14}", point.month, format_cents(point.amount));
                }
            }

            if !report.expense_categories.is_empty() {
                println!();
                println!("Expenses by Category");
                for (i, cat) in report.expense_categories.iter().take(10).enumerate() {
                    println!(
                        "  {}. {:<18} {:>12}",
                        i + 1,
                        truncate(&cat.name, 18),
                        format_cents(cat.value)
                    );
                }
            }

            println!();
            println!("Sales by Weekday");
            for day in &report.weekday_stats {
                println!("  {:<10} {:>14}", day.day, format_cents(day.sales));
            }

            if !report.branch_comparison.is_empty() {
                println!();
                println!("Branches (last {} months)", report.branch_comparison.len());
                for month in &report.branch_comparison {
                    println!("  {}", month.month);
                    for branch in &month.branches {
                        println!(
                            "    {:<14} sales {:>12}  expenses {:>12}",
                            truncate(&branch.branch, 14),
                            format_cents(branch.sales),
                            format_cents(branch.expenses)
                        );
                    }
                }
            }
        }
        _ => anyhow::bail!("Invalid format '{}'. Valid: table, json", format),
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Clients:           {}", report.client_count);
    println!("Coin transactions: {}", report.coin_transaction_count);
    println!("Debt transactions: {}", report.debt_transaction_count);
    println!();

    if report.is_healthy() {
        println!("All balances match their ledgers.");
        return Ok(());
    }

    println!("Issues found:");
    for drift in &report.drifts {
        println!("  - {} (off by {})", drift, drift.difference());
    }
    for client_id in &report.orphaned_client_ids {
        println!("  - transactions reference missing client {}", client_id);
    }
    println!();
    println!("Run `mostrador repair` to recompute balances from the ledgers.");
    anyhow::bail!("Ledger integrity check failed");
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    let (count, what) = match export_type {
        "clients" => (exporter.export_clients_csv(writer).await?, "clients"),
        "coins" => (exporter.export_coins_csv(writer).await?, "coin transactions"),
        "debts" => (exporter.export_debts_csv(writer).await?, "debt transactions"),
        "sales" => (exporter.export_sales_csv(writer).await?, "sales"),
        "expenses" => (exporter.export_expenses_csv(writer).await?, "expenses"),
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full database: {} clients, {} coin transactions, {} debt transactions, {} sales, {} expenses",
                    snapshot.clients.len(),
                    snapshot.coin_transactions.len(),
                    snapshot.debt_transactions.len(),
                    snapshot.sales.len(),
                    snapshot.expenses.len()
                );
            }
            return Ok(());
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: clients, coins, debts, sales, expenses, full",
                export_type
            );
        }
    };

    if output.is_some() {
        eprintln!("Exported {} {}", count, what);
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
