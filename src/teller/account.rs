//! Balance reads, withdrawals and transfers.

use tracing::{debug, info};

use super::{
    error::{Error, Result},
    store::{KeyKind, UserRecord, UserStore},
    user::SessionUser,
};

/// Condition a sender's balance must satisfy before money leaves it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FundsGuard {
    /// `amount <= balance`
    Sufficient,
    /// `amount >= balance`, kept for parity with the legacy deployment.
    Inverted,
}

impl FundsGuard {
    #[must_use]
    pub const fn allows(self, amount: i64, balance: i64) -> bool {
        match self {
            Self::Sufficient => amount <= balance,
            Self::Inverted => amount >= balance,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    InsufficientFunds,
    InvalidRecipient,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub outcome: Outcome,
    pub balance: i64,
    pub recipient_balance: Option<i64>,
}

/// Parse a whole-number form field.
///
/// # Errors
/// Returns [`Error::MalformedInput`] when the field is missing or not an integer.
pub fn parse_integer(field: &str, raw: Option<&str>) -> Result<i64> {
    let raw = raw.ok_or_else(|| Error::MalformedInput(format!("missing {field}")))?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::MalformedInput(format!("{field} must be an integer")))
}

/// Current balance of the caller.
///
/// # Errors
/// Returns [`Error::Unauthenticated`] if the caller's record no longer exists.
pub async fn view_balance(store: &UserStore, user: &dyn SessionUser) -> Result<i64> {
    store
        .find(&user.id())
        .await
        .map(|record| record.balance)
        .ok_or(Error::Unauthenticated)
}

/// Take `amount` out of the caller's account when the guard allows it.
///
/// # Errors
/// Returns [`Error::Unauthenticated`] for a vanished caller and
/// [`Error::MalformedInput`] when the subtraction overflows.
pub async fn withdraw(
    store: &UserStore,
    user: &dyn SessionUser,
    amount: i64,
    guard: FundsGuard,
) -> Result<Receipt> {
    let key = user.id();
    store
        .with_users_mut(|kind, users| {
            let record = users
                .iter_mut()
                .find(|record| kind.matches(record, &key))
                .ok_or(Error::Unauthenticated)?;
            apply_withdrawal(record, amount, guard)
        })
        .await
}

/// Move `amount` from the caller to the user addressed by `recipient`.
///
/// Either both balances change or neither does.
///
/// # Errors
/// Returns [`Error::Unauthenticated`] for a vanished caller and
/// [`Error::MalformedInput`] when the arithmetic overflows.
pub async fn transfer(
    store: &UserStore,
    user: &dyn SessionUser,
    recipient: &str,
    amount: i64,
    guard: FundsGuard,
) -> Result<Receipt> {
    let key = user.id();
    store
        .with_users_mut(|kind, users| apply_transfer(kind, users, &key, recipient, amount, guard))
        .await
}

fn apply_withdrawal(record: &mut UserRecord, amount: i64, guard: FundsGuard) -> Result<Receipt> {
    if !guard.allows(amount, record.balance) {
        debug!(
            "withdrawal of {amount} refused for {} (balance {})",
            record.username, record.balance
        );
        return Ok(Receipt {
            outcome: Outcome::InsufficientFunds,
            balance: record.balance,
            recipient_balance: None,
        });
    }

    record.balance = record
        .balance
        .checked_sub(amount)
        .ok_or_else(|| Error::MalformedInput("amount out of range".to_string()))?;

    info!("{} withdrew {amount}", record.username);

    Ok(Receipt {
        outcome: Outcome::Applied,
        balance: record.balance,
        recipient_balance: None,
    })
}

fn apply_transfer(
    kind: KeyKind,
    users: &mut [UserRecord],
    sender_key: &str,
    recipient_key: &str,
    amount: i64,
    guard: FundsGuard,
) -> Result<Receipt> {
    let sender = users
        .iter()
        .position(|record| kind.matches(record, sender_key))
        .ok_or(Error::Unauthenticated)?;
    let balance = users[sender].balance;

    if !guard.allows(amount, balance) {
        return Ok(Receipt {
            outcome: Outcome::InsufficientFunds,
            balance,
            recipient_balance: None,
        });
    }

    let Some(recipient) = users
        .iter()
        .position(|record| kind.matches(record, recipient_key))
    else {
        debug!("transfer to unknown account {recipient_key} ignored");
        return Ok(Receipt {
            outcome: Outcome::InvalidRecipient,
            balance,
            recipient_balance: None,
        });
    };

    // Sending to oneself nets out to no change.
    if recipient == sender {
        return Ok(Receipt {
            outcome: Outcome::Applied,
            balance,
            recipient_balance: Some(balance),
        });
    }

    let out_of_range = || Error::MalformedInput("amount out of range".to_string());
    let new_sender = balance.checked_sub(amount).ok_or_else(out_of_range)?;
    let new_recipient = users[recipient]
        .balance
        .checked_add(amount)
        .ok_or_else(out_of_range)?;

    users[sender].balance = new_sender;
    users[recipient].balance = new_recipient;

    info!(
        "{} transferred {amount} to {}",
        users[sender].username, users[recipient].username
    );

    Ok(Receipt {
        outcome: Outcome::Applied,
        balance: new_sender,
        recipient_balance: Some(new_recipient),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teller::{state::Variant, user::from_record};

    fn store(variant: Variant) -> UserStore {
        UserStore::new(variant.key_kind(), UserStore::seed(variant)).expect("seed is valid")
    }

    async fn caller(store: &UserStore, username: &str) -> crate::teller::user::CurrentUser {
        let record = store
            .find_by_username(username)
            .await
            .expect("user exists");
        from_record(store.key_kind(), &record)
    }

    #[test]
    fn guard_directions() {
        assert!(FundsGuard::Sufficient.allows(500, 2000));
        assert!(FundsGuard::Sufficient.allows(2000, 2000));
        assert!(!FundsGuard::Sufficient.allows(5000, 2000));
        assert!(FundsGuard::Inverted.allows(5000, 2000));
        assert!(FundsGuard::Inverted.allows(2000, 2000));
        assert!(!FundsGuard::Inverted.allows(500, 2000));
    }

    #[test]
    fn parse_integer_rejects_garbage() {
        assert_eq!(parse_integer("amount", Some(" 42 ")).ok(), Some(42));
        assert_eq!(parse_integer("amount", Some("-3")).ok(), Some(-3));
        assert!(matches!(
            parse_integer("amount", Some("12abc")),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            parse_integer("amount", Some("")),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            parse_integer("amount", None),
            Err(Error::MalformedInput(msg)) if msg == "missing amount"
        ));
    }

    #[tokio::test]
    async fn withdraw_scenario() {
        let store = store(Variant::Basic);
        let user = caller(&store, "test").await;

        assert_eq!(view_balance(&store, user.as_ref()).await.ok(), Some(2000));

        let receipt = withdraw(&store, user.as_ref(), 500, FundsGuard::Sufficient)
            .await
            .expect("withdrawal");
        assert_eq!(receipt.outcome, Outcome::Applied);
        assert_eq!(receipt.balance, 1500);

        let receipt = withdraw(&store, user.as_ref(), 5000, FundsGuard::Sufficient)
            .await
            .expect("withdrawal");
        assert_eq!(receipt.outcome, Outcome::InsufficientFunds);
        assert_eq!(view_balance(&store, user.as_ref()).await.ok(), Some(1500));
    }

    #[tokio::test]
    async fn inverted_guard_blocks_small_withdrawals() {
        let store = store(Variant::Basic);
        let user = caller(&store, "test").await;

        let receipt = withdraw(&store, user.as_ref(), 500, FundsGuard::Inverted)
            .await
            .expect("withdrawal");
        assert_eq!(receipt.outcome, Outcome::InsufficientFunds);
        assert_eq!(receipt.balance, 2000);

        let receipt = withdraw(&store, user.as_ref(), 2500, FundsGuard::Inverted)
            .await
            .expect("withdrawal");
        assert_eq!(receipt.outcome, Outcome::Applied);
        assert_eq!(receipt.balance, -500);
    }

    #[tokio::test]
    async fn withdraw_overflow_is_malformed() {
        let store = store(Variant::Basic);
        let user = caller(&store, "test").await;
        let result = withdraw(&store, user.as_ref(), i64::MIN, FundsGuard::Sufficient).await;
        assert!(matches!(result, Err(Error::MalformedInput(_))));
        assert_eq!(view_balance(&store, user.as_ref()).await.ok(), Some(2000));
    }

    #[tokio::test]
    async fn transfer_preserves_total() {
        let store = store(Variant::Loader);
        let user = caller(&store, "test").await;

        let receipt = transfer(&store, user.as_ref(), "2", 700, FundsGuard::Sufficient)
            .await
            .expect("transfer");
        assert_eq!(receipt.outcome, Outcome::Applied);
        assert_eq!(receipt.balance, 1300);
        assert_eq!(receipt.recipient_balance, Some(1700));
        assert_eq!(
            receipt.balance + receipt.recipient_balance.unwrap_or_default(),
            3000
        );
        assert_eq!(store.find("2").await.map(|r| r.balance), Some(1700));
    }

    #[tokio::test]
    async fn transfer_to_unknown_recipient_changes_nothing() {
        let store = store(Variant::Loader);
        let user = caller(&store, "test").await;

        let receipt = transfer(&store, user.as_ref(), "99", 100, FundsGuard::Sufficient)
            .await
            .expect("transfer");
        assert_eq!(receipt.outcome, Outcome::InvalidRecipient);
        assert_eq!(store.find("1").await.map(|r| r.balance), Some(2000));
        assert_eq!(store.find("2").await.map(|r| r.balance), Some(1000));
    }

    #[tokio::test]
    async fn transfer_beyond_balance_changes_nothing() {
        let store = store(Variant::Loader);
        let user = caller(&store, "alice").await;

        let receipt = transfer(&store, user.as_ref(), "1", 1001, FundsGuard::Sufficient)
            .await
            .expect("transfer");
        assert_eq!(receipt.outcome, Outcome::InsufficientFunds);
        assert_eq!(store.find("1").await.map(|r| r.balance), Some(2000));
        assert_eq!(store.find("2").await.map(|r| r.balance), Some(1000));
    }

    #[tokio::test]
    async fn transfer_to_self_is_neutral() {
        let store = store(Variant::Loader);
        let user = caller(&store, "test").await;

        let receipt = transfer(&store, user.as_ref(), "1", 100, FundsGuard::Sufficient)
            .await
            .expect("transfer");
        assert_eq!(receipt.outcome, Outcome::Applied);
        assert_eq!(store.find("1").await.map(|r| r.balance), Some(2000));
    }

    #[tokio::test]
    async fn concurrent_withdrawals_never_double_spend() {
        let store = std::sync::Arc::new(store(Variant::Basic));
        let user = caller(&store, "test").await;

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            let user = user.clone();
            tasks.push(tokio::spawn(async move {
                withdraw(&store, user.as_ref(), 300, FundsGuard::Sufficient).await
            }));
        }

        let mut applied = 0;
        for task in tasks {
            if let Ok(Ok(receipt)) = task.await {
                if receipt.outcome == Outcome::Applied {
                    applied += 1;
                }
            }
        }

        assert_eq!(applied, 6);
        assert_eq!(view_balance(&store, user.as_ref()).await.ok(), Some(200));
    }
}
