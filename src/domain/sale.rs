use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, DebtTransaction, DebtTransactionId};

pub type SaleId = i64;
pub type ExpenseId = i64;

/// Fiat inflow at a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub date: DateTime<Utc>,
    pub amount_cents: Cents,
    pub branch: Option<String>,
    pub observations: Option<String>,
    /// 1-12, derived from `date`
    pub month_number: u32,
    /// Set when this sale mirrors a debt payment
    pub debt_transaction_id: Option<DebtTransactionId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSale {
    pub date: DateTime<Utc>,
    pub amount_cents: Cents,
    pub branch: Option<String>,
    pub observations: Option<String>,
    pub debt_transaction_id: Option<DebtTransactionId>,
}

impl NewSale {
    pub fn new(amount_cents: Cents, date: DateTime<Utc>) -> Self {
        Self {
            date,
            amount_cents,
            branch: None,
            observations: None,
            debt_transaction_id: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_observations(mut self, observations: impl Into<String>) -> Self {
        self.observations = Some(observations.into());
        self
    }

    /// Cash collected on a debt payment, booked as income at `branch`.
    pub fn mirrored_payment(payment: &DebtTransaction, branch: &str) -> Self {
        let notes = payment.notes.as_deref().unwrap_or("");
        let observations = format!("DEBT PAYMENT - {} - {}", payment.client_name, notes)
            .trim()
            .trim_end_matches('-')
            .trim()
            .to_string();
        Self {
            date: payment.date,
            amount_cents: payment.amount_cents,
            branch: Some(branch.to_string()),
            observations: Some(observations),
            debt_transaction_id: Some(payment.id),
        }
    }

    pub fn month_number(&self) -> u32 {
        self.date.month()
    }

    pub fn into_sale(self, id: SaleId) -> Sale {
        let month_number = self.month_number();
        Sale {
            id,
            date: self.date,
            amount_cents: self.amount_cents,
            branch: self.branch,
            observations: self.observations,
            month_number,
            debt_transaction_id: self.debt_transaction_id,
        }
    }
}

/// Fiat outflow at a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub date: DateTime<Utc>,
    pub amount_cents: Cents,
    pub category: Option<String>,
    pub branch: Option<String>,
    pub observations: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub date: DateTime<Utc>,
    pub amount_cents: Cents,
    pub category: Option<String>,
    pub branch: Option<String>,
    pub observations: Option<String>,
}

impl NewExpense {
    pub fn new(amount_cents: Cents, date: DateTime<Utc>) -> Self {
        Self {
            date,
            amount_cents,
            category: None,
            branch: None,
            observations: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_observations(mut self, observations: impl Into<String>) -> Self {
        self.observations = Some(observations.into());
        self
    }

    pub fn into_expense(self, id: ExpenseId) -> Expense {
        Expense {
            id,
            date: self.date,
            amount_cents: self.amount_cents,
            category: self.category,
            branch: self.branch,
            observations: self.observations,
        }
    }
}

/// Partial update of a sale. Unset fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct SaleUpdate {
    pub amount_cents: Option<Cents>,
    /// Also moves `month_number`
    pub date: Option<DateTime<Utc>>,
    pub branch: Option<String>,
    pub observations: Option<String>,
}

impl SaleUpdate {
    pub fn is_empty(&self) -> bool {
        self.amount_cents.is_none()
            && self.date.is_none()
            && self.branch.is_none()
            && self.observations.is_none()
    }

    /// Whether the update touches what a mirrored debt payment owns.
    pub fn touches_money(&self) -> bool {
        self.amount_cents.is_some() || self.date.is_some()
    }
}

/// Partial update of an expense. Unset fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct ExpenseUpdate {
    pub amount_cents: Option<Cents>,
    pub date: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub branch: Option<String>,
    pub observations: Option<String>,
}

impl ExpenseUpdate {
    pub fn is_empty(&self) -> bool {
        self.amount_cents.is_none()
            && self.date.is_none()
            && self.category.is_none()
            && self.branch.is_none()
            && self.observations.is_none()
    }
}

/// Parse a booking date: RFC 3339, or a bare `YYYY-MM-DD` taken as midnight UTC.
pub fn parse_booking_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}
