use serde::{Deserialize, Serialize};

use super::{format_amount, Cents, Coins, DebtTransactionType};

/// An outbound message to a client's phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Digits only
    pub phone: String,
    pub content: String,
}

impl Notification {
    pub fn new(phone: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            content: content.into(),
        }
    }
}

/// Sent after coins are posted for a purchase.
pub fn coin_purchase_message(client_name: &str, amount: Cents, coin_total: Coins) -> String {
    format!(
        "Hi {}! You made a purchase of *{}*.\n\
         You now have *{} coins*.\n\n\
         Redeem them in store for supplements, accessories or exclusive combos.",
        client_name,
        format_amount(amount),
        coin_total
    )
}

/// Sent after a debt charge or payment.
pub fn debt_message(
    client_name: &str,
    amount: Cents,
    new_balance: Cents,
    transaction_type: DebtTransactionType,
) -> String {
    match transaction_type {
        DebtTransactionType::Charge => format!(
            "Hi {}! A purchase on account of *{}* was recorded.\n\
             Your current balance is *{}*.",
            client_name,
            format_amount(amount),
            format_amount(new_balance)
        ),
        DebtTransactionType::Payment if new_balance <= 0 => {
            let credit = if new_balance < 0 {
                format!(
                    "\nYou have a credit of *{}* for your next purchase.",
                    format_amount(-new_balance)
                )
            } else {
                String::new()
            };
            format!(
                "Hi {}! We received your payment of *{}*.\n\
                 Your account is fully paid. Thank you!{}",
                client_name,
                format_amount(amount),
                credit
            )
        }
        DebtTransactionType::Payment => format!(
            "Hi {}! We received your payment of *{}*.\n\
             Remaining balance: *{}*.",
            client_name,
            format_amount(amount),
            format_amount(new_balance)
        ),
    }
}

/// Sent once per point-of-sale registration.
pub fn pos_sale_message(
    client_name: &str,
    amount: Cents,
    coins_earned: Coins,
    coin_total: Coins,
    debt_balance: Option<Cents>,
) -> String {
    let mut message = format!(
        "Hi {}! Purchase recorded.\n\
         Amount: *{}*\n\
         Coins earned: *{}*\n\
         Total coins: *{}*",
        client_name,
        format_amount(amount),
        coins_earned,
        coin_total
    );
    if let Some(balance) = debt_balance {
        message.push_str(&format!("\nAccount balance: *{}*", format_amount(balance)));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_message_mentions_total() {
        let msg = coin_purchase_message("Ana", 250_000, 12);
        assert!(msg.contains("Hi Ana!"));
        assert!(msg.contains("*$2,500*"));
        assert!(msg.contains("*12 coins*"));
    }

    #[test]
    fn test_charge_message() {
        let msg = debt_message("Ana", 50_000, 150_000, DebtTransactionType::Charge);
        assert!(msg.contains("purchase on account of *$500*"));
        assert!(msg.contains("balance is *$1,500*"));
    }

    #[test]
    fn test_payment_still_owes() {
        let msg = debt_message("Ana", 40_000, 60_000, DebtTransactionType::Payment);
        assert!(msg.contains("Remaining balance: *$600*"));
        assert!(!msg.contains("fully paid"));
    }

    #[test]
    fn test_payment_fully_paid() {
        let msg = debt_message("Ana", 100_000, 0, DebtTransactionType::Payment);
        assert!(msg.contains("fully paid"));
        assert!(!msg.contains("credit"));
    }

    #[test]
    fn test_overpayment_mentions_credit() {
        let msg = debt_message("Ana", 150_000, -50_000, DebtTransactionType::Payment);
        assert!(msg.contains("fully paid"));
        assert!(msg.contains("credit of *$500*"));
    }

    #[test]
    fn test_pos_message_debt_line_only_on_credit() {
        let cash = pos_sale_message("Ana", 300_000, 3, 10, None);
        assert!(!cash.contains("Account balance"));

        let credit = pos_sale_message("Ana", 300_000, 3, 10, Some(300_000));
        assert!(credit.contains("Account balance: *$3,000*"));
    }
}
