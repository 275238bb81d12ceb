use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::application::{AppError, ExpenseDraft, SaleDraft};
use crate::domain::{
    cents_from_f64, parse_booking_date, parse_cents, Cents, ClientId, ExpenseId, ExpenseUpdate,
    SaleId, SaleUpdate,
};

/// An amount as browsers send it: a JSON number or a decimal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    pub fn to_cents(&self) -> Result<Cents, AppError> {
        match self {
            AmountInput::Number(value) => cents_from_f64(*value),
            AmountInput::Text(text) => parse_cents(text.trim()),
        }
        .map_err(|e| AppError::InvalidAmount(e.to_string()))
    }
}

/// Unwrap a required field, reporting its name when absent.
pub fn required<T>(value: Option<T>, field: &'static str) -> Result<T, AppError> {
    value.ok_or(AppError::MissingField(field))
}

pub fn required_amount(value: Option<AmountInput>) -> Result<Cents, AppError> {
    required(value, "amount")?.to_cents()
}

pub fn optional_date(value: Option<String>) -> Result<Option<DateTime<Utc>>, AppError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_booking_date(raw)
            .map(Some)
            .ok_or_else(|| AppError::InvalidDate(raw.to_string())),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    pub id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientQuery {
    pub id: Option<ClientId>,
    pub phone: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub observations: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClientRequest {
    pub id: Option<ClientId>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub observations: Option<String>,
    pub coin_balance: Option<i64>,
    pub debt_balance: Option<AmountInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    pub client_id: Option<ClientId>,
    #[serde(default)]
    pub current_month: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CoinTransactionRequest {
    pub client_id: Option<ClientId>,
    pub client_name: Option<String>,
    pub amount: Option<AmountInput>,
}

#[derive(Debug, Deserialize)]
pub struct DebtTransactionRequest {
    pub client_id: Option<ClientId>,
    pub client_name: Option<String>,
    pub amount: Option<AmountInput>,
    pub transaction_type: Option<String>,
    pub notes: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// A body holding either a single item or an array of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SaleRequest {
    pub amount: Option<AmountInput>,
    pub date: Option<String>,
    pub branch: Option<String>,
    pub observations: Option<String>,
}

impl SaleRequest {
    pub fn into_draft(self) -> Result<SaleDraft, AppError> {
        Ok(SaleDraft {
            amount_cents: required_amount(self.amount)?,
            date: optional_date(self.date)?,
            branch: self.branch,
            observations: self.observations,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateSaleRequest {
    pub id: Option<SaleId>,
    pub amount: Option<AmountInput>,
    pub date: Option<String>,
    pub branch: Option<String>,
    pub observations: Option<String>,
}

impl UpdateSaleRequest {
    pub fn into_update(self) -> Result<(SaleId, SaleUpdate), AppError> {
        let id = required(self.id, "id")?;
        Ok((
            id,
            SaleUpdate {
                amount_cents: self.amount.map(|a| a.to_cents()).transpose()?,
                date: optional_date(self.date)?,
                branch: self.branch,
                observations: self.observations,
            },
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct ExpenseRequest {
    pub amount: Option<AmountInput>,
    pub date: Option<String>,
    pub category: Option<String>,
    pub branch: Option<String>,
    pub observations: Option<String>,
}

impl ExpenseRequest {
    pub fn into_draft(self) -> Result<ExpenseDraft, AppError> {
        Ok(ExpenseDraft {
            amount_cents: required_amount(self.amount)?,
            date: optional_date(self.date)?,
            category: self.category,
            branch: self.branch,
            observations: self.observations,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateExpenseRequest {
    pub id: Option<ExpenseId>,
    pub amount: Option<AmountInput>,
    pub date: Option<String>,
    pub category: Option<String>,
    pub branch: Option<String>,
    pub observations: Option<String>,
}

impl UpdateExpenseRequest {
    pub fn into_update(self) -> Result<(ExpenseId, ExpenseUpdate), AppError> {
        let id = required(self.id, "id")?;
        Ok((
            id,
            ExpenseUpdate {
                amount_cents: self.amount.map(|a| a.to_cents()).transpose()?,
                date: optional_date(self.date)?,
                category: self.category,
                branch: self.branch,
                observations: self.observations,
            },
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct PosSaleRequest {
    #[serde(alias = "whatsapp")]
    pub phone: Option<String>,
    pub amount: Option<AmountInput>,
    #[serde(default, alias = "isCredit")]
    pub is_credit: bool,
    #[serde(alias = "clientName")]
    pub client_name: Option<String>,
}
