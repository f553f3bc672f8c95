//! SQLite-backed order store whose writes retry through the retry executor.
//!
//! `create_order` runs one transaction per attempt: insert the order as
//! `pending`, debit the customer balance, commit. A dropped transaction rolls
//! back, so a failed attempt leaves no partial order behind.

use crate::retry::{
    run, run_with_notify, AttemptError, Cancellation, Classify, ErrorKind, RetryError, RetryPolicy,
};
use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// SQLite primary result codes that mean "try again later".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Error from a single order transaction.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("unknown customer '{0}'")]
    UnknownCustomer(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl Classify for OrderError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            OrderError::Db(e) => e.error_kind(),
            OrderError::UnknownCustomer(_) => ErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer_id: String,
    pub amount: f64,
    pub status: String,
    pub created_at: i64,
}

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Busy/locked database errors are marked retryable; everything else is left
/// to the transport classification of `sqlx::Error`.
fn tag_db_error(e: sqlx::Error) -> AttemptError<OrderError> {
    let busy = match &e {
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
            .unwrap_or(false),
        _ => false,
    };
    if busy {
        AttemptError::Retryable(OrderError::Db(e))
    } else {
        AttemptError::Failed(OrderError::Db(e))
    }
}

#[derive(Clone)]
pub struct OrderStore {
    pool: Pool<Sqlite>,
    policy: RetryPolicy,
}

impl OrderStore {
    /// Open (or create) the store at `path`. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>, policy: RetryPolicy) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new().max_connections(4).connect(&uri).await?;
        let store = OrderStore { pool, policy };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store on a single connection (demos and tests).
    pub async fn open_memory(policy: RetryPolicy) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = OrderStore { pool, policy };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS customers (
                id TEXT PRIMARY KEY,
                balance REAL NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                customer_id TEXT NOT NULL,
                amount REAL NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_customer(&self, id: &str, balance: f64) -> Result<()> {
        sqlx::query("INSERT INTO customers (id, balance, updated_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(balance)
            .bind(unix_timestamp())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn balance(&self, id: &str) -> Result<Option<f64>> {
        let row = sqlx::query("SELECT balance FROM customers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<f64, _>("balance")))
    }

    pub async fn orders_for(&self, customer_id: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT id, customer_id, amount, status, created_at FROM orders WHERE customer_id = ? ORDER BY id",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Order {
                id: r.get("id"),
                customer_id: r.get("customer_id"),
                amount: r.get("amount"),
                status: r.get("status"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    /// Create an order and debit the customer, retrying transient database failures.
    /// Returns the new order id.
    pub async fn create_order(
        &self,
        cancel: &Cancellation,
        customer_id: &str,
        amount: f64,
    ) -> Result<i64, RetryError<OrderError>> {
        run(cancel, &self.policy, || self.insert_order(cancel, customer_id, amount)).await
    }

    /// Like [`create_order`](Self::create_order), logging each retry.
    pub async fn create_order_with_notify(
        &self,
        cancel: &Cancellation,
        customer_id: &str,
        amount: f64,
    ) -> Result<i64, RetryError<OrderError>> {
        run_with_notify(
            cancel,
            &self.policy,
            || self.insert_order(cancel, customer_id, amount),
            |err, wait| {
                tracing::warn!(customer = customer_id, error = %err, ?wait, "retrying order transaction");
            },
        )
        .await
    }

    async fn insert_order(
        &self,
        cancel: &Cancellation,
        customer_id: &str,
        amount: f64,
    ) -> Result<i64, AttemptError<OrderError>> {
        if let Some(cause) = cancel.cause() {
            return Err(AttemptError::Cancelled(cause));
        }
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await.map_err(tag_db_error)?;

        let order_id = sqlx::query(
            "INSERT INTO orders (customer_id, amount, status, created_at) VALUES (?, ?, 'pending', ?)",
        )
        .bind(customer_id)
        .bind(amount)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(tag_db_error)?
        .last_insert_rowid();

        let updated = sqlx::query("UPDATE customers SET balance = balance - ?, updated_at = ? WHERE id = ?")
            .bind(amount)
            .bind(now)
            .bind(customer_id)
            .execute(&mut *tx)
            .await
            .map_err(tag_db_error)?;
        if updated.rows_affected() == 0 {
            return Err(AttemptError::Failed(OrderError::UnknownCustomer(customer_id.to_string())));
        }

        tx.commit().await.map_err(tag_db_error)?;
        tracing::debug!(order_id, customer = customer_id, amount, "order created");
        Ok(order_id)
    }
}
