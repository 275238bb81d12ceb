use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::{Cents, Expense, LinearTrend, Sale, YearMonth};

/// Months predicted past the last month with sales.
pub const FORECAST_MONTHS: u32 = 3;

/// Months shown in the branch comparison.
pub const BRANCH_COMPARISON_MONTHS: usize = 3;

const UNKNOWN_BRANCH: &str = "Unknown";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub timeline: Vec<MonthlyTotals>,
    pub expense_categories: Vec<CategoryTotal>,
    pub forecast: Vec<ForecastPoint>,
    pub weekday_stats: Vec<WeekdayTotal>,
    pub branch_comparison: Vec<BranchMonth>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotals {
    /// "YYYY-MM"
    pub month: String,
    pub sales: Cents,
    pub expenses: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub name: String,
    pub value: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub month: String,
    pub amount: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayTotal {
    pub day: String,
    pub sales: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchMonth {
    pub month: String,
    pub branches: Vec<BranchTotals>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchTotals {
    pub branch: String,
    pub sales: Cents,
    pub expenses: Cents,
}

#[derive(Default, Clone, Copy)]
struct Flow {
    sales: Cents,
    expenses: Cents,
}

fn branch_key(branch: Option<&str>) -> String {
    match branch.map(str::trim) {
        Some(b) if !b.is_empty() => b.to_string(),
        _ => UNKNOWN_BRANCH.to_string(),
    }
}

/// Aggregate sales and expenses into the dashboard report.
pub fn build_analytics(sales: &[Sale], expenses: &[Expense]) -> AnalyticsReport {
    if sales.is_empty() {
        return AnalyticsReport::default();
    }

    let mut monthly: BTreeMap<YearMonth, Flow> = BTreeMap::new();
    let mut by_branch: BTreeMap<YearMonth, BTreeMap<String, Flow>> = BTreeMap::new();
    let mut categories: HashMap<String, Cents> = HashMap::new();
    let mut weekdays = [0 as Cents; 7];

    for sale in sales {
        let month = YearMonth::of(&sale.date);
        monthly.entry(month).or_default().sales += sale.amount_cents;
        weekdays[sale.date.weekday().num_days_from_monday() as usize] += sale.amount_cents;
        by_branch
            .entry(month)
            .or_default()
            .entry(branch_key(sale.branch.as_deref()))
            .or_default()
            .sales += sale.amount_cents;
    }

    for expense in expenses {
        let month = YearMonth::of(&expense.date);
        monthly.entry(month).or_default().expenses += expense.amount_cents;
        if let Some(category) = expense.category.as_deref().filter(|c| !c.is_empty()) {
            *categories.entry(category.to_string()).or_insert(0) += expense.amount_cents;
        }
        by_branch
            .entry(month)
            .or_default()
            .entry(branch_key(expense.branch.as_deref()))
            .or_default()
            .expenses += expense.amount_cents;
    }

    let timeline = monthly
        .iter()
        .map(|(month, flow)| MonthlyTotals {
            month: month.to_string(),
            sales: flow.sales,
            expenses: flow.expenses,
        })
        .collect();

    let mut expense_categories: Vec<CategoryTotal> = categories
        .into_iter()
        .map(|(name, value)| CategoryTotal { name, value })
        .collect();
    expense_categories.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));

    let weekday_stats = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
    .iter()
    .map(|day| WeekdayTotal {
        day: weekday_name(*day).to_string(),
        sales: weekdays[day.num_days_from_monday() as usize],
    })
    .collect();

    let skip = by_branch.len().saturating_sub(BRANCH_COMPARISON_MONTHS);
    let branch_comparison = by_branch
        .into_iter()
        .skip(skip)
        .map(|(month, branches)| BranchMonth {
            month: month.to_string(),
            branches: branches
                .into_iter()
                .map(|(branch, flow)| BranchTotals {
                    branch,
                    sales: flow.sales,
                    expenses: flow.expenses,
                })
                .collect(),
        })
        .collect();

    AnalyticsReport {
        timeline,
        expense_categories,
        forecast: forecast_sales(&monthly),
        weekday_stats,
        branch_comparison,
    }
}

/// Project monthly sales forward with a least-squares line.
fn forecast_sales(monthly: &BTreeMap<YearMonth, Flow>) -> Vec<ForecastPoint> {
    let (Some(first), Some(last)) = (monthly.keys().next(), monthly.keys().next_back()) else {
        return Vec::new();
    };

    let points: Vec<(f64, f64)> = monthly
        .iter()
        .map(|(month, flow)| (first.months_until(*month) as f64, flow.sales as f64))
        .collect();

    let Some(trend) = LinearTrend::fit(&points) else {
        return Vec::new();
    };

    let last_x = first.months_until(*last);
    (1..=FORECAST_MONTHS)
        .map(|i| {
            let predicted = trend.predict((last_x + i as i64) as f64);
            ForecastPoint {
                month: last.add_months(i).to_string(),
                amount: predicted.max(0.0).round() as Cents,
            }
        })
        .collect()
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
