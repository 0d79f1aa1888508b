//! Turso-backed ledger store.
//!
//! Amounts are stored as integer minor units (hundredths of a point) so all
//! balance arithmetic in SQL is exact. Every read-modify-write runs inside a
//! `BEGIN IMMEDIATE` transaction, and debits are guarded in the `UPDATE`
//! itself (`WHERE balance >= ?`), so the database, not the caller, decides
//! whether a withdrawal fits.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Mutex;
use turso::{Builder, Connection, Database, Row, Value};

use crate::application::ports::{LedgerStore, PendingOrderKey, StoreError};
use crate::domain::balance_ledger::{Account, Withdrawal};
use crate::domain::order_lifecycle::{LoyaltyOrder, OrderStatus};
use crate::domain::shared::{OrderNumber, Points, Timestamp, UserId, WithdrawalId};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        balance INTEGER NOT NULL DEFAULT 0,
        withdrawn INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS orders (
        number TEXT PRIMARY KEY,
        owner TEXT NOT NULL,
        status TEXT NOT NULL,
        accrual INTEGER NOT NULL DEFAULT 0,
        uploaded_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS withdrawals (
        id TEXT PRIMARY KEY,
        owner TEXT NOT NULL,
        order_number TEXT NOT NULL,
        amount INTEGER NOT NULL,
        processed_at TEXT NOT NULL
    )",
];

/// Attempts to acquire the write lock before giving up.
const BEGIN_RETRIES: u32 = 20;

/// Delay between lock attempts; doubled each time up to `MAX_BEGIN_BACKOFF`,
/// plus up to this much random jitter.
const BEGIN_BACKOFF: Duration = Duration::from_millis(5);

const MAX_BEGIN_BACKOFF: Duration = Duration::from_millis(200);

/// `LedgerStore` backed by a local Turso database file.
pub struct TursoLedgerStore {
    db: Database,
    /// Serializes this process's writers so they queue here instead of
    /// spinning on a busy database lock.
    write_gate: Mutex<()>,
}

impl std::fmt::Debug for TursoLedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TursoLedgerStore").finish_non_exhaustive()
    }
}

impl TursoLedgerStore {
    /// Open (or create) the database at `path` and apply the schema.
    ///
    /// `":memory:"` gives a throwaway database.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(connection_error)?;
        let store = Self {
            db,
            write_gate: Mutex::new(()),
        };
        store.migrate().await?;
        tracing::info!(path, "Ledger database ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.connect()?;
        for statement in SCHEMA {
            conn.execute(statement, ()).await.map_err(query_error)?;
        }
        Ok(())
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        self.db.connect().map_err(connection_error)
    }
}

// =============================================================================
// Transactions
// =============================================================================

async fn begin(conn: &Connection) -> Result<(), StoreError> {
    let mut delay = BEGIN_BACKOFF;
    let mut attempt = 0;
    loop {
        match conn.execute("BEGIN IMMEDIATE", ()).await {
            Ok(_) => return Ok(()),
            Err(e) if is_busy(&e) && attempt + 1 < BEGIN_RETRIES => {
                attempt += 1;
                let jitter_ms = rand::rng().random_range(0..=BEGIN_BACKOFF.as_millis() as u64);
                let jitter = Duration::from_millis(jitter_ms);
                tracing::debug!(
                    attempt,
                    delay_ms = (delay + jitter).as_millis() as u64,
                    "Ledger database busy, retrying"
                );
                tokio::time::sleep(delay + jitter).await;
                delay = (delay * 2).min(MAX_BEGIN_BACKOFF);
            }
            Err(e) => return Err(query_error(e)),
        }
    }
}

/// Commit on success, roll back on failure.
async fn finish<T>(conn: &Connection, result: Result<T, StoreError>) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            conn.execute("COMMIT", ()).await.map_err(query_error)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute("ROLLBACK", ()).await {
                tracing::warn!(error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}

fn is_busy(error: &turso::Error) -> bool {
    let message = error.to_string().to_ascii_lowercase();
    message.contains("busy") || message.contains("locked")
}

fn connection_error(error: turso::Error) -> StoreError {
    StoreError::Connection {
        message: error.to_string(),
    }
}

fn query_error(error: turso::Error) -> StoreError {
    StoreError::Query {
        message: error.to_string(),
    }
}

// =============================================================================
// Encoding
// =============================================================================

fn minor_units(points: Points) -> Result<i64, StoreError> {
    points.to_minor_units().map_err(|e| StoreError::Query {
        message: e.to_string(),
    })
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn corrupt(message: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        message: message.into(),
    }
}

fn column_text(row: &Row, idx: usize) -> Result<String, StoreError> {
    match row.get_value(idx).map_err(query_error)? {
        Value::Text(s) => Ok(s),
        other => Err(corrupt(format!("column {idx}: expected text, got {other:?}"))),
    }
}

fn column_integer(row: &Row, idx: usize) -> Result<i64, StoreError> {
    match row.get_value(idx).map_err(query_error)? {
        Value::Integer(i) => Ok(i),
        other => Err(corrupt(format!(
            "column {idx}: expected integer, got {other:?}"
        ))),
    }
}

fn column_timestamp(row: &Row, idx: usize) -> Result<Timestamp, StoreError> {
    let raw = column_text(row, idx)?;
    Timestamp::parse(&raw).map_err(|e| corrupt(format!("column {idx}: {e}")))
}

fn column_order_number(row: &Row, idx: usize) -> Result<OrderNumber, StoreError> {
    let raw = column_text(row, idx)?;
    OrderNumber::parse(&raw).map_err(|e| corrupt(e.to_string()))
}

fn column_status(row: &Row, idx: usize) -> Result<OrderStatus, StoreError> {
    let raw = column_text(row, idx)?;
    OrderStatus::from_str(&raw).map_err(|e| corrupt(e.to_string()))
}

const ACCOUNT_COLUMNS: &str = "id, balance, withdrawn, created_at";

fn decode_account(row: &Row) -> Result<Account, StoreError> {
    Ok(Account::restore(
        UserId::new(column_text(row, 0)?),
        Points::from_minor_units(column_integer(row, 1)?),
        Points::from_minor_units(column_integer(row, 2)?),
        column_timestamp(row, 3)?,
    ))
}

const ORDER_COLUMNS: &str = "number, owner, status, accrual, uploaded_at";

fn decode_order(row: &Row) -> Result<LoyaltyOrder, StoreError> {
    LoyaltyOrder::restore(
        column_order_number(row, 0)?,
        UserId::new(column_text(row, 1)?),
        column_status(row, 2)?,
        Points::from_minor_units(column_integer(row, 3)?),
        column_timestamp(row, 4)?,
    )
    .map_err(|e| corrupt(e.to_string()))
}

const WITHDRAWAL_COLUMNS: &str = "id, owner, order_number, amount, processed_at";

fn decode_withdrawal(row: &Row) -> Result<Withdrawal, StoreError> {
    Ok(Withdrawal::restore(
        WithdrawalId::new(column_text(row, 0)?),
        UserId::new(column_text(row, 1)?),
        column_order_number(row, 2)?,
        Points::from_minor_units(column_integer(row, 3)?),
        column_timestamp(row, 4)?,
    ))
}

fn decode_pending_key(row: &Row) -> Result<PendingOrderKey, StoreError> {
    Ok(PendingOrderKey {
        number: column_order_number(row, 0)?,
        uploaded_at: column_timestamp(row, 1)?,
    })
}

// =============================================================================
// Queries shared by several operations
// =============================================================================

async fn fetch_one<T>(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
    decode: fn(&Row) -> Result<T, StoreError>,
) -> Result<Option<T>, StoreError> {
    let mut rows = conn.query(sql, params).await.map_err(query_error)?;
    match rows.next().await.map_err(query_error)? {
        Some(row) => decode(&row).map(Some),
        None => Ok(None),
    }
}

async fn fetch_all<T>(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
    decode: fn(&Row) -> Result<T, StoreError>,
) -> Result<Vec<T>, StoreError> {
    let mut rows = conn.query(sql, params).await.map_err(query_error)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await.map_err(query_error)? {
        out.push(decode(&row)?);
    }
    Ok(out)
}

fn decode_balance(row: &Row) -> Result<Points, StoreError> {
    Ok(Points::from_minor_units(column_integer(row, 0)?))
}

async fn current_balance(conn: &Connection, user_id: &UserId) -> Result<Option<Points>, StoreError> {
    fetch_one(
        conn,
        "SELECT balance FROM users WHERE id = ?",
        vec![text(user_id.as_str())],
        decode_balance,
    )
    .await
}

async fn order_exists(conn: &Connection, number: &OrderNumber) -> Result<bool, StoreError> {
    Ok(fetch_one(
        conn,
        "SELECT number FROM orders WHERE number = ?",
        vec![text(number.as_str())],
        |row| column_text(row, 0),
    )
    .await?
    .is_some())
}

async fn load_order(
    conn: &Connection,
    number: &OrderNumber,
) -> Result<Option<LoyaltyOrder>, StoreError> {
    fetch_one(
        conn,
        &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE number = ?"),
        vec![text(number.as_str())],
        decode_order,
    )
    .await
}

#[async_trait]
impl LedgerStore for TursoLedgerStore {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<Account>, StoreError> {
        let conn = self.connect()?;
        fetch_one(
            &conn,
            &format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = ?"),
            vec![text(user_id.as_str())],
            decode_account,
        )
        .await
    }

    async fn create_user(&self, account: &Account) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        let conn = self.connect()?;
        begin(&conn).await?;
        let result = async {
            if current_balance(&conn, account.id()).await?.is_some() {
                return Err(StoreError::DuplicateUser {
                    user_id: account.id().to_string(),
                });
            }
            conn.execute(
                "INSERT INTO users (id, balance, withdrawn, created_at) VALUES (?, ?, ?, ?)",
                vec![
                    text(account.id().as_str()),
                    Value::Integer(minor_units(account.balance())?),
                    Value::Integer(minor_units(account.withdrawn())?),
                    Value::Text(account.created_at().to_rfc3339()),
                ],
            )
            .await
            .map_err(query_error)?;
            Ok(())
        }
        .await;
        finish(&conn, result).await
    }

    async fn get_order_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<Option<LoyaltyOrder>, StoreError> {
        let conn = self.connect()?;
        load_order(&conn, number).await
    }

    async fn create_order(&self, order: &LoyaltyOrder) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        let conn = self.connect()?;
        begin(&conn).await?;
        let result = async {
            if order_exists(&conn, order.number()).await? {
                return Err(StoreError::DuplicateOrder {
                    number: order.number().to_string(),
                });
            }
            conn.execute(
                "INSERT INTO orders (number, owner, status, accrual, uploaded_at) VALUES (?, ?, ?, ?, ?)",
                vec![
                    text(order.number().as_str()),
                    text(order.owner().as_str()),
                    text(order.status().as_str()),
                    Value::Integer(minor_units(order.accrual())?),
                    Value::Text(order.uploaded_at().to_rfc3339()),
                ],
            )
            .await
            .map_err(query_error)?;
            Ok(())
        }
        .await;
        finish(&conn, result).await
    }

    async fn update_order_status(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<bool, StoreError> {
        if status.is_terminal() {
            return Err(StoreError::Query {
                message: format!("terminal status {status} must go through finalize_order"),
            });
        }
        let _gate = self.write_gate.lock().await;
        let conn = self.connect()?;
        begin(&conn).await?;
        let result = async {
            let mut order = load_order(&conn, number)
                .await?
                .ok_or_else(|| StoreError::OrderNotFound {
                    number: number.to_string(),
                })?;
            if order.status().is_terminal() {
                return Ok(false);
            }
            let from = order.status();
            order
                .transition(status, accrual)
                .map_err(|_| StoreError::InvalidTransition {
                    number: number.to_string(),
                    from,
                    to: status,
                })?;
            conn.execute(
                "UPDATE orders SET status = ?, accrual = ? WHERE number = ? AND status IN ('NEW', 'PROCESSING')",
                vec![
                    text(status.as_str()),
                    Value::Integer(minor_units(accrual)?),
                    text(number.as_str()),
                ],
            )
            .await
            .map_err(query_error)
            .map(|changed| changed == 1)
        }
        .await;
        finish(&conn, result).await
    }

    async fn finalize_order(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<bool, StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::Query {
                message: format!("finalize_order requires a terminal status, got {status}"),
            });
        }
        let _gate = self.write_gate.lock().await;
        let conn = self.connect()?;
        begin(&conn).await?;
        let result = async {
            let mut order = load_order(&conn, number)
                .await?
                .ok_or_else(|| StoreError::OrderNotFound {
                    number: number.to_string(),
                })?;
            if order.status().is_terminal() {
                return Ok(false);
            }
            let from = order.status();
            order
                .transition(status, accrual)
                .map_err(|_| StoreError::InvalidTransition {
                    number: number.to_string(),
                    from,
                    to: status,
                })?;

            let accrual_minor = minor_units(accrual)?;
            let changed = conn
                .execute(
                    "UPDATE orders SET status = ?, accrual = ? WHERE number = ? AND status IN ('NEW', 'PROCESSING')",
                    vec![
                        text(status.as_str()),
                        Value::Integer(accrual_minor),
                        text(number.as_str()),
                    ],
                )
                .await
                .map_err(query_error)?;
            if changed == 0 {
                return Ok(false);
            }

            let credited = conn
                .execute(
                    "UPDATE users SET balance = balance + ? WHERE id = ?",
                    vec![Value::Integer(accrual_minor), text(order.owner().as_str())],
                )
                .await
                .map_err(query_error)?;
            if credited == 0 {
                return Err(StoreError::UserNotFound {
                    user_id: order.owner().to_string(),
                });
            }
            Ok(true)
        }
        .await;
        finish(&conn, result).await
    }

    async fn update_balance(&self, user_id: &UserId, delta: Points) -> Result<Points, StoreError> {
        let delta_minor = minor_units(delta)?;
        let _gate = self.write_gate.lock().await;
        let conn = self.connect()?;
        begin(&conn).await?;
        let result = async {
            let changed = conn
                .execute(
                    "UPDATE users SET balance = balance + ? WHERE id = ? AND balance + ? >= 0",
                    vec![
                        Value::Integer(delta_minor),
                        text(user_id.as_str()),
                        Value::Integer(delta_minor),
                    ],
                )
                .await
                .map_err(query_error)?;
            let balance = current_balance(&conn, user_id).await?;
            match (changed, balance) {
                (_, None) => Err(StoreError::UserNotFound {
                    user_id: user_id.to_string(),
                }),
                (0, Some(_)) => Err(StoreError::InsufficientFunds {
                    user_id: user_id.to_string(),
                }),
                (_, Some(balance)) => Ok(balance),
            }
        }
        .await;
        finish(&conn, result).await
    }

    async fn create_withdrawal(&self, withdrawal: &Withdrawal) -> Result<Points, StoreError> {
        let sum_minor = minor_units(withdrawal.sum())?;
        let owner = withdrawal.owner();
        let _gate = self.write_gate.lock().await;
        let conn = self.connect()?;
        begin(&conn).await?;
        let result = async {
            let debited = conn
                .execute(
                    "UPDATE users SET balance = balance - ?, withdrawn = withdrawn + ? WHERE id = ? AND balance >= ?",
                    vec![
                        Value::Integer(sum_minor),
                        Value::Integer(sum_minor),
                        text(owner.as_str()),
                        Value::Integer(sum_minor),
                    ],
                )
                .await
                .map_err(query_error)?;
            if debited == 0 {
                return Err(match current_balance(&conn, owner).await? {
                    None => StoreError::UserNotFound {
                        user_id: owner.to_string(),
                    },
                    Some(_) => StoreError::InsufficientFunds {
                        user_id: owner.to_string(),
                    },
                });
            }

            conn.execute(
                "INSERT INTO withdrawals (id, owner, order_number, amount, processed_at) VALUES (?, ?, ?, ?, ?)",
                vec![
                    text(withdrawal.id().as_str()),
                    text(owner.as_str()),
                    text(withdrawal.order().as_str()),
                    Value::Integer(sum_minor),
                    Value::Text(withdrawal.processed_at().to_rfc3339()),
                ],
            )
            .await
            .map_err(query_error)?;

            current_balance(&conn, owner)
                .await?
                .ok_or_else(|| StoreError::UserNotFound {
                    user_id: owner.to_string(),
                })
        }
        .await;
        finish(&conn, result).await
    }

    async fn get_user_orders(&self, user_id: &UserId) -> Result<Vec<LoyaltyOrder>, StoreError> {
        let conn = self.connect()?;
        fetch_all(
            &conn,
            &format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE owner = ? ORDER BY uploaded_at DESC"
            ),
            vec![text(user_id.as_str())],
            decode_order,
        )
        .await
    }

    async fn get_user_withdrawals(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Withdrawal>, StoreError> {
        let conn = self.connect()?;
        fetch_all(
            &conn,
            &format!(
                "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE owner = ? ORDER BY processed_at DESC"
            ),
            vec![text(user_id.as_str())],
            decode_withdrawal,
        )
        .await
    }

    async fn find_pending_orders(
        &self,
        after: Option<&PendingOrderKey>,
        limit: usize,
    ) -> Result<Vec<PendingOrderKey>, StoreError> {
        let conn = self.connect()?;
        let limit = Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX));
        // uploaded_at is fixed-width RFC3339, so text order is time order.
        let (sql, params) = match after {
            None => (
                "SELECT number, uploaded_at FROM orders
                 WHERE status IN ('NEW', 'PROCESSING')
                 ORDER BY uploaded_at ASC, number ASC LIMIT ?",
                vec![limit],
            ),
            Some(after) => {
                let uploaded_at = after.uploaded_at.to_rfc3339();
                (
                    "SELECT number, uploaded_at FROM orders
                     WHERE status IN ('NEW', 'PROCESSING')
                       AND (uploaded_at > ? OR (uploaded_at = ? AND number > ?))
                     ORDER BY uploaded_at ASC, number ASC LIMIT ?",
                    vec![
                        text(&uploaded_at),
                        text(&uploaded_at),
                        text(after.number.as_str()),
                        limit,
                    ],
                )
            }
        };
        fetch_all(&conn, sql, params, decode_pending_key).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn number(n: &str) -> OrderNumber {
        OrderNumber::parse(n).unwrap()
    }

    async fn open_store() -> (tempfile::TempDir, TursoLedgerStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let store = TursoLedgerStore::open(path.to_str().unwrap()).await.unwrap();
        (dir, store)
    }

    async fn with_user(store: &TursoLedgerStore, user: &str, balance: i64) {
        store
            .create_user(&Account::open(UserId::new(user)))
            .await
            .unwrap();
        if balance > 0 {
            store
                .update_balance(&UserId::new(user), Points::whole(balance))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn account_round_trip_and_duplicate() {
        let (_dir, store) = open_store().await;
        with_user(&store, "u", 0).await;

        let account = store.get_user(&UserId::new("u")).await.unwrap().unwrap();
        assert!(account.balance().is_zero());
        assert!(store.get_user(&UserId::new("v")).await.unwrap().is_none());

        let err = store
            .create_user(&Account::open(UserId::new("u")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUser { .. }));
    }

    #[tokio::test]
    async fn order_insert_and_duplicate() {
        let (_dir, store) = open_store().await;
        with_user(&store, "u", 0).await;
        let order = LoyaltyOrder::new(number("12345678903"), UserId::new("u"));

        store.create_order(&order).await.unwrap();
        let err = store.create_order(&order).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateOrder { .. }));

        let loaded = store
            .get_order_by_number(&number("12345678903"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, order);
    }

    #[tokio::test]
    async fn finalize_is_atomic_and_idempotent() {
        let (_dir, store) = open_store().await;
        with_user(&store, "u", 0).await;
        store
            .create_order(&LoyaltyOrder::new(number("18"), UserId::new("u")))
            .await
            .unwrap();

        let accrual = Points::from_minor_units(72_998);
        assert!(
            store
                .finalize_order(&number("18"), OrderStatus::Processed, accrual)
                .await
                .unwrap()
        );
        assert!(
            !store
                .finalize_order(&number("18"), OrderStatus::Processed, accrual)
                .await
                .unwrap()
        );

        let order = store.get_order_by_number(&number("18")).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Processed);
        assert_eq!(order.accrual(), accrual);
        let account = store.get_user(&UserId::new("u")).await.unwrap().unwrap();
        assert_eq!(account.balance(), accrual);
    }

    #[tokio::test]
    async fn finalize_rolls_back_when_owner_missing() {
        let (_dir, store) = open_store().await;
        store
            .create_order(&LoyaltyOrder::new(number("18"), UserId::new("ghost")))
            .await
            .unwrap();

        let err = store
            .finalize_order(&number("18"), OrderStatus::Processed, Points::whole(5))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound { .. }));
        let order = store.get_order_by_number(&number("18")).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::New);
    }

    #[tokio::test]
    async fn withdrawal_is_guarded_by_balance() {
        let (_dir, store) = open_store().await;
        with_user(&store, "u", 500).await;
        let user = UserId::new("u");

        let first = Withdrawal::new(user.clone(), number("2377225624"), Points::whole(400)).unwrap();
        assert_eq!(
            store.create_withdrawal(&first).await.unwrap(),
            Points::whole(100)
        );

        let second = Withdrawal::new(user.clone(), number("2377225624"), Points::whole(400)).unwrap();
        let err = store.create_withdrawal(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds { .. }));

        let account = store.get_user(&user).await.unwrap().unwrap();
        assert_eq!(account.balance(), Points::whole(100));
        assert_eq!(account.withdrawn(), Points::whole(400));
        assert_eq!(store.get_user_withdrawals(&user).await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn withdrawal_for_unknown_user() {
        let (_dir, store) = open_store().await;
        let w = Withdrawal::new(UserId::new("ghost"), number("18"), Points::whole(1)).unwrap();
        let err = store.create_withdrawal(&w).await.unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound { .. }));
    }

    #[tokio::test]
    async fn lists_are_ordered() {
        let (_dir, store) = open_store().await;
        with_user(&store, "u", 0).await;
        let base = Timestamp::now().as_datetime();
        for (i, n) in ["34", "26", "18"].iter().enumerate() {
            let at = Timestamp::new(base + chrono::Duration::seconds(i as i64));
            store
                .create_order(&LoyaltyOrder::with_upload_time(number(n), UserId::new("u"), at))
                .await
                .unwrap();
        }
        store
            .update_order_status(&number("34"), OrderStatus::Processing, Points::ZERO)
            .await
            .unwrap();
        store
            .finalize_order(&number("26"), OrderStatus::Invalid, Points::ZERO)
            .await
            .unwrap();

        let newest_first: Vec<String> = store
            .get_user_orders(&UserId::new("u"))
            .await
            .unwrap()
            .iter()
            .map(|o| o.number().to_string())
            .collect();
        assert_eq!(newest_first, vec!["18", "26", "34"]);

        let pending: Vec<OrderNumber> = store
            .find_pending_orders(None, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|key| key.number)
            .collect();
        assert_eq!(pending, vec![number("34"), number("18")]);
    }

    #[tokio::test]
    async fn pending_scan_resumes_after_key() {
        let (_dir, store) = open_store().await;
        with_user(&store, "u", 0).await;
        let base = Timestamp::now();
        let later = Timestamp::new(base.as_datetime() + chrono::Duration::seconds(1));
        for (n, at) in [("26", base), ("18", base), ("34", later)] {
            store
                .create_order(&LoyaltyOrder::with_upload_time(number(n), UserId::new("u"), at))
                .await
                .unwrap();
        }

        let first = store.find_pending_orders(None, 1).await.unwrap();
        assert_eq!(first[0].number, number("18"));
        assert_eq!(first[0].uploaded_at, base);

        let rest: Vec<OrderNumber> = store
            .find_pending_orders(first.last(), 10)
            .await
            .unwrap()
            .into_iter()
            .map(|key| key.number)
            .collect();
        assert_eq!(rest, vec![number("26"), number("34")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_withdrawals_never_overdraw() {
        let (_dir, store) = open_store().await;
        with_user(&store, "u", 500).await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let w = Withdrawal::new(UserId::new("u"), number("2377225624"), Points::whole(400))
                    .unwrap();
                store.create_withdrawal(&w).await
            }));
        }

        let mut committed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(StoreError::InsufficientFunds { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(committed, 1);
        let account = store.get_user(&UserId::new("u")).await.unwrap().unwrap();
        assert_eq!(account.balance(), Points::whole(100));
    }
}
