use std::fmt;

/// Fiat amounts and debt balances are integer cents.
/// 1 peso = 100 cents, so $1,500.00 = 150000 cents.
pub type Cents = i64;

/// Loyalty coins are whole units.
pub type Coins = i64;

/// Fiat spend that earns one coin, in cents ($1,000).
pub const CENTS_PER_COIN: Cents = 100_000;

/// Largest amount or balance accepted from callers, in cents ($10 trillion).
pub const MAX_AMOUNT_CENTS: Cents = 1_000_000_000_000_000;

/// Coins earned by a purchase: floor(amount / 1000) in whole currency units.
/// A $999 purchase earns nothing; the threshold is intentional.
pub fn coins_for_amount(amount_cents: Cents) -> Coins {
    if amount_cents <= 0 {
        return 0;
    }
    amount_cents / CENTS_PER_COIN
}

/// Format cents as a plain decimal string.
/// Example: 150050 -> "1500.50", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Format cents for people: thousands separators, decimals only when present.
/// Example: 150000 -> "$1,500", 150050 -> "$1,500.50", -50000 -> "-$500"
pub fn format_amount(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let units = group_thousands(abs / 100);
    match abs % 100 {
        0 => format!("{}${}", sign, units),
        rest => format!("{}${}.{:02}", sign, units, rest),
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Parse a decimal string into cents. Extra decimal places are truncated.
/// Example: "1500.50" -> 150050, "12.5" -> 1250, "100" -> 10000
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, body) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    if body.is_empty() {
        return Err(ParseCentsError::InvalidFormat);
    }

    let (units_str, decimals_str) = match body.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (body, ""),
    };
    if !decimals_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        parse_digits(units_str)?
    };
    let decimals: i64 = match decimals_str.len() {
        0 => 0,
        1 => parse_digits(decimals_str)? * 10,
        _ => parse_digits(&decimals_str[..2])?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimals))
        .ok_or(ParseCentsError::Overflow)?;
    Ok(if negative { -cents } else { cents })
}

fn parse_digits(s: &str) -> Result<i64, ParseCentsError> {
    if !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseCentsError::InvalidFormat);
    }
    s.parse().map_err(|_| ParseCentsError::Overflow)
}

/// Convert a floating-point amount (as sent by browser forms) into cents.
pub fn cents_from_f64(value: f64) -> Result<Cents, ParseCentsError> {
    if !value.is_finite() {
        return Err(ParseCentsError::InvalidFormat);
    }
    let cents = (value * 100.0).round();
    if cents.abs() > i64::MAX as f64 {
        return Err(ParseCentsError::Overflow);
    }
    Ok(cents as Cents)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    Overflow,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::Overflow => write!(f, "amount out of range"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
