//! Table lifecycle: availability, buffet mode, payment status and the
//! rotating access token that scopes guest sessions.

use crate::auth_jwt::auth::generate_table_token;
use crate::db_models::{DishCategory, OrderStatus, PaymentStatus, Table, TableStatus};
use crate::errors::custom::CustomError;
use crate::services::guest::{load_session, GuestScope};
use crate::store::{Gateway, OrderFilter, StoreTx};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewTable {
    pub number: String,
    pub capacity: i32,
    pub status: TableStatus,
}

#[derive(Debug, Clone)]
pub struct TableUpdate {
    pub number: String,
    pub capacity: i32,
    pub status: TableStatus,
    pub rotate_token: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    CallStaff,
    RequestPayment,
}

/// Result of a buffet-mode change: the table and the sockets seated at it.
#[derive(Debug, Clone)]
pub struct BuffetChange {
    pub table: Table,
    pub sockets: Vec<String>,
}

pub(crate) async fn load_table_by_number(
    tx: &mut dyn StoreTx,
    number: &str,
) -> Result<Table, CustomError> {
    tx.find_table_by_number(number)
        .await?
        .ok_or_else(|| CustomError::not_found("Table"))
}

/// Gives the table a fresh token and drops refresh state of every guest
/// seated under the previous one.
async fn rotate_token(tx: &mut dyn StoreTx, table: &mut Table) -> Result<(), CustomError> {
    let cleared = tx.clear_guest_sessions(&table.number, &table.token).await?;
    tracing::info!(table = %table.number, cleared, "rotated table token");
    table.token = generate_table_token();
    Ok(())
}

#[instrument(name = "Create table", skip(gateway))]
pub async fn create_table(gateway: &Gateway, input: NewTable) -> Result<Table, CustomError> {
    let now = Utc::now();
    let table = Table {
        id: Uuid::new_v4(),
        number: input.number,
        capacity: input.capacity,
        status: input.status,
        token: generate_table_token(),
        dish_buffet_id: None,
        payment_status: PaymentStatus::Unpaid,
        call_staff: false,
        request_payment: false,
        created_at: now,
        updated_at: now,
    };
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                if tx.find_table_by_number(&table.number).await?.is_some() {
                    return Err(CustomError::conflict("number", "Table number already exists"));
                }
                tx.insert_table(&table).await?;
                Ok(table)
            })
        })
        .await
}

#[instrument(name = "Update table", skip(gateway))]
pub async fn update_table(
    gateway: &Gateway,
    id: Uuid,
    update: TableUpdate,
) -> Result<Table, CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let mut table = tx
                    .find_table(id)
                    .await?
                    .ok_or_else(|| CustomError::not_found("Table"))?;
                if update.number != table.number
                    && tx.find_table_by_number(&update.number).await?.is_some()
                {
                    return Err(CustomError::conflict("number", "Table number already exists"));
                }
                if update.rotate_token {
                    rotate_token(tx, &mut table).await?;
                }
                table.number = update.number;
                table.capacity = update.capacity;
                table.status = update.status;
                table.updated_at = Utc::now();
                tx.save_table(&table).await?;
                Ok(table)
            })
        })
        .await
}

/// Sets (or clears with `None`) the active buffet combo of a table.
#[instrument(name = "Set buffet mode", skip(gateway))]
pub async fn set_buffet_mode(
    gateway: &Gateway,
    table_number: String,
    dish_buffet_id: Option<Uuid>,
) -> Result<BuffetChange, CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let mut table = load_table_by_number(tx, &table_number).await?;
                if let Some(dish_id) = dish_buffet_id {
                    let dish = tx
                        .find_dish(dish_id)
                        .await?
                        .ok_or_else(|| CustomError::not_found("Dish"))?;
                    if dish.category != DishCategory::ComboBuffet {
                        return Err(CustomError::domain(format!(
                            "{} is not a buffet combo",
                            dish.name
                        )));
                    }
                }
                table.dish_buffet_id = dish_buffet_id;
                table.updated_at = Utc::now();
                tx.save_table(&table).await?;
                let sockets = tx.find_table_sockets(&table.number, &table.token).await?;
                Ok(BuffetChange { table, sockets })
            })
        })
        .await
}

/// Recycles a table for the next seating.
#[instrument(name = "Reset table", skip(gateway))]
pub async fn reset_table(gateway: &Gateway, table_number: String) -> Result<Table, CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let mut table = load_table_by_number(tx, &table_number).await?;
                rotate_token(tx, &mut table).await?;
                table.dish_buffet_id = None;
                table.payment_status = PaymentStatus::Unpaid;
                table.call_staff = false;
                table.request_payment = false;
                table.updated_at = Utc::now();
                tx.save_table(&table).await?;
                Ok(table)
            })
        })
        .await
}

/// Raises a signal flag on the table of the guest's current seating. The
/// session check and the write share one transaction.
#[instrument(name = "Record table signal", skip(gateway, scope), fields(guest_id = %scope.guest_id))]
pub async fn record_signal(
    gateway: &Gateway,
    scope: &GuestScope,
    signal: Signal,
) -> Result<Table, CustomError> {
    let scope = scope.clone();
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let (_, mut table) = load_session(tx, &scope).await?;
                match signal {
                    Signal::CallStaff => table.call_staff = true,
                    Signal::RequestPayment => table.request_payment = true,
                }
                table.updated_at = Utc::now();
                tx.save_table(&table).await?;
                Ok(table)
            })
        })
        .await
}

pub async fn list_tables(gateway: &Gateway) -> Result<Vec<Table>, CustomError> {
    gateway
        .run_in_transaction(|tx| Box::pin(async move { tx.list_tables().await }))
        .await
}

pub async fn get_table_by_number(gateway: &Gateway, number: String) -> Result<Table, CustomError> {
    gateway
        .run_in_transaction(move |tx| Box::pin(async move { load_table_by_number(tx, &number).await }))
        .await
}

/// Refuses while the current seating still has open orders. Guests and past
/// orders keep their rows with the table reference cleared.
#[instrument(name = "Delete table", skip(gateway))]
pub async fn delete_table(gateway: &Gateway, id: Uuid) -> Result<Table, CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let table = tx
                    .find_table(id)
                    .await?
                    .ok_or_else(|| CustomError::not_found("Table"))?;
                let active = tx
                    .find_orders(&OrderFilter::current_session(&table).with_statuses(&OrderStatus::OPEN))
                    .await?;
                if !active.is_empty() {
                    return Err(CustomError::domain("Table still has active orders"));
                }
                tx.delete_table(table.id).await?;
                Ok(table)
            })
        })
        .await
}
