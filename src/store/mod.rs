//! Persistence gateway.
//!
//! Every multi-step mutation in the services goes through
//! [`Gateway::run_in_transaction`], which opens a serializable transaction on
//! the configured backend, commits when the closure returns `Ok` and rolls
//! back otherwise. Serialization failures are retried a bounded number of
//! times, which is why the closures must be `Clone`.

pub mod memory;
pub mod postgres;

use crate::db_models::{
    Account, Dish, DishCombo, DishSnapshot, Guest, Order, OrderDetail, OrderStatus, RefreshToken,
    SocketBinding, Table, Transaction,
};
use crate::errors::custom::CustomError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub use memory::MemoryStore;

/// Attempts per unit of work when the backend reports a serialization failure.
pub const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 20;
pub use postgres::PgStore;

#[derive(Debug, Clone, Copy)]
pub struct TxOptions {
    /// Upper bound on lock acquisition and statement execution.
    pub timeout: Duration,
}

/// Filter for order lookups. `None` fields are not constrained.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub ids: Option<Vec<Uuid>>,
    pub guest_id: Option<Uuid>,
    pub table_number: Option<String>,
    pub token: Option<String>,
    pub statuses: Option<Vec<OrderStatus>>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl OrderFilter {
    /// Orders of the table's current seating.
    pub fn current_session(table: &Table) -> Self {
        Self {
            table_number: Some(table.number.clone()),
            token: Some(table.token.clone()),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[OrderStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.ids.as_ref().map_or(true, |ids| ids.contains(&order.id))
            && self.guest_id.map_or(true, |id| order.guest_id == Some(id))
            && self
                .table_number
                .as_ref()
                .map_or(true, |n| order.table_number.as_ref() == Some(n))
            && self.token.as_ref().map_or(true, |t| &order.token == t)
            && self
                .statuses
                .as_ref()
                .map_or(true, |s| s.contains(&order.status))
            && self.created_from.map_or(true, |from| order.created_at >= from)
            && self.created_to.map_or(true, |to| order.created_at <= to)
    }
}

/// Bulk status change applied by settlement paths.
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub ids: Vec<Uuid>,
    /// Only rows currently in one of these statuses are touched.
    pub from: Vec<OrderStatus>,
    pub to: OrderStatus,
    /// `Some` overwrites the handler, `None` leaves it as is.
    pub handler_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait Persistence: Send + Sync {
    async fn begin(&self, options: TxOptions) -> Result<Box<dyn StoreTx>, CustomError>;
}

/// Operations available inside one storage transaction.
#[async_trait]
pub trait StoreTx: Send {
    // tables
    async fn insert_table(&mut self, table: &Table) -> Result<(), CustomError>;
    async fn find_table(&mut self, id: Uuid) -> Result<Option<Table>, CustomError>;
    async fn find_table_by_number(&mut self, number: &str) -> Result<Option<Table>, CustomError>;
    async fn list_tables(&mut self) -> Result<Vec<Table>, CustomError>;
    async fn save_table(&mut self, table: &Table) -> Result<(), CustomError>;
    async fn delete_table(&mut self, id: Uuid) -> Result<(), CustomError>;

    // guests
    async fn insert_guest(&mut self, guest: &Guest) -> Result<(), CustomError>;
    async fn find_guest(&mut self, id: Uuid) -> Result<Option<Guest>, CustomError>;
    async fn save_guest(&mut self, guest: &Guest) -> Result<(), CustomError>;
    /// Newest first; `None` bounds are open.
    async fn find_guests(
        &mut self,
        created_from: Option<DateTime<Utc>>,
        created_to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Guest>, CustomError>;
    /// Clears refresh state of every guest logged in under `table_token`.
    async fn clear_guest_sessions(
        &mut self,
        table_number: &str,
        table_token: &str,
    ) -> Result<u64, CustomError>;
    async fn clear_expired_guest_sessions(&mut self, now: DateTime<Utc>) -> Result<u64, CustomError>;
    /// Deletes guests whose token is no longer current (or whose table is
    /// gone), that hold no refresh state and were created before `before`.
    async fn delete_stale_guests(&mut self, before: DateTime<Utc>) -> Result<u64, CustomError>;

    // catalog
    async fn insert_dish(&mut self, dish: &Dish) -> Result<(), CustomError>;
    async fn find_dish(&mut self, id: Uuid) -> Result<Option<Dish>, CustomError>;
    async fn list_dishes(&mut self) -> Result<Vec<Dish>, CustomError>;
    async fn save_dish(&mut self, dish: &Dish) -> Result<(), CustomError>;
    async fn insert_dish_combo(&mut self, combo: &DishCombo) -> Result<(), CustomError>;
    async fn list_dish_combos(&mut self, combo_id: Uuid) -> Result<Vec<DishCombo>, CustomError>;
    async fn insert_snapshot(&mut self, snapshot: &DishSnapshot) -> Result<(), CustomError>;
    async fn find_snapshot(&mut self, id: Uuid) -> Result<Option<DishSnapshot>, CustomError>;
    async fn delete_snapshot(&mut self, id: Uuid) -> Result<(), CustomError>;

    // orders
    async fn insert_order(&mut self, order: &Order) -> Result<(), CustomError>;
    async fn find_order(&mut self, id: Uuid) -> Result<Option<OrderDetail>, CustomError>;
    async fn save_order(&mut self, order: &Order) -> Result<(), CustomError>;
    /// Newest first.
    async fn find_orders(&mut self, filter: &OrderFilter) -> Result<Vec<OrderDetail>, CustomError>;
    async fn transition_orders(&mut self, change: &StatusTransition) -> Result<u64, CustomError>;

    // payment ledger
    async fn find_transaction_by_external_id(
        &mut self,
        external_id: i64,
    ) -> Result<Option<Transaction>, CustomError>;
    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), CustomError>;

    // staff
    async fn insert_account(&mut self, account: &Account) -> Result<(), CustomError>;
    async fn find_account(&mut self, id: Uuid) -> Result<Option<Account>, CustomError>;
    async fn find_account_by_email(&mut self, email: &str) -> Result<Option<Account>, CustomError>;
    async fn insert_refresh_token(&mut self, token: &RefreshToken) -> Result<(), CustomError>;
    async fn find_refresh_token(&mut self, token: &str) -> Result<Option<RefreshToken>, CustomError>;
    async fn delete_refresh_token(&mut self, token: &str) -> Result<u64, CustomError>;
    async fn delete_expired_refresh_tokens(&mut self, now: DateTime<Utc>) -> Result<u64, CustomError>;

    // realtime connections
    /// One binding per guest or account; a reconnect replaces the socket id.
    async fn upsert_socket(&mut self, binding: &SocketBinding) -> Result<(), CustomError>;
    async fn delete_socket(&mut self, socket_id: &str) -> Result<(), CustomError>;
    async fn find_guest_socket(&mut self, guest_id: Uuid) -> Result<Option<String>, CustomError>;
    /// Sockets of guests seated under the table's given token.
    async fn find_table_sockets(
        &mut self,
        table_number: &str,
        table_token: &str,
    ) -> Result<Vec<String>, CustomError>;

    async fn commit(self: Box<Self>) -> Result<(), CustomError>;
    async fn rollback(self: Box<Self>) -> Result<(), CustomError>;
}

/// Storage handle injected into every service.
#[derive(Clone)]
pub struct Gateway {
    backend: Arc<dyn Persistence>,
    options: TxOptions,
}

impl Gateway {
    pub fn new(backend: Arc<dyn Persistence>, timeout: Duration) -> Self {
        Self {
            backend,
            options: TxOptions { timeout },
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Duration::from_secs(5))
    }

    /// Runs `f` in one transaction. A serialization failure replays the whole
    /// closure on a fresh transaction, at most [`MAX_ATTEMPTS`] times and
    /// never past the configured timeout.
    pub async fn run_in_transaction<R, F>(&self, f: F) -> Result<R, CustomError>
    where
        R: Send,
        F: for<'c> FnOnce(&'c mut dyn StoreTx) -> BoxFuture<'c, Result<R, CustomError>>
            + Clone
            + Send,
    {
        let deadline = Instant::now() + self.options.timeout;
        let mut attempt = 1;
        loop {
            match self.run_once(f.clone()).await {
                Err(err) if err.is_serialization_failure() && attempt < MAX_ATTEMPTS => {
                    let backoff = retry_backoff(attempt);
                    if Instant::now() + backoff >= deadline {
                        return Err(err);
                    }
                    tracing::warn!(attempt, error = %err, "serialization failure, retrying transaction");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn run_once<R, F>(&self, f: F) -> Result<R, CustomError>
    where
        R: Send,
        F: for<'c> FnOnce(&'c mut dyn StoreTx) -> BoxFuture<'c, Result<R, CustomError>> + Send,
    {
        let mut tx = self.backend.begin(self.options).await?;
        let outcome = f(tx.as_mut()).await;
        match outcome {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "failed to roll back transaction");
                }
                Err(err)
            }
        }
    }
}

/// Linear backoff with jitter so racing writers do not collide again.
fn retry_backoff(attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..RETRY_BASE_DELAY_MS);
    Duration::from_millis(RETRY_BASE_DELAY_MS * u64::from(attempt) + jitter)
}
