//! Order placement against dish snapshots, status updates and manual
//! settlement.

use crate::db_models::{
    DishSnapshot, DishStatus, Order, OrderDetail, OrderStatus, PaymentStatus, Table,
};
use crate::errors::custom::CustomError;
use crate::services::guest::{load_session, GuestScope};
use crate::services::table::load_table_by_number;
use crate::store::{Gateway, OrderFilter, StatusTransition, StoreTx};
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OrderLine {
    pub dish_id: Uuid,
    pub quantity: i32,
    pub options: String,
}

#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub status: OrderStatus,
    pub dish_id: Uuid,
    pub quantity: i32,
    pub options: String,
}

/// Orders created in one batch plus the sockets seated at the table.
#[derive(Debug, Clone)]
pub struct PlacedOrders {
    pub orders: Vec<OrderDetail>,
    pub sockets: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SettledTab {
    pub table_number: String,
    pub orders: Vec<OrderDetail>,
    pub sockets: Vec<String>,
}

fn ensure_table_open(table: &Table) -> Result<(), CustomError> {
    if table.accepts_guests() {
        Ok(())
    } else {
        Err(CustomError::ForbiddenError(format!(
            "Table {} is not accepting orders",
            table.number
        )))
    }
}

async fn place_line(
    tx: &mut dyn StoreTx,
    table: &Table,
    guest_id: Option<Uuid>,
    handler_id: Option<Uuid>,
    line: OrderLine,
    now: DateTime<Utc>,
) -> Result<OrderDetail, CustomError> {
    let dish = tx
        .find_dish(line.dish_id)
        .await?
        .ok_or_else(|| CustomError::not_found("Dish"))?;
    match dish.status {
        DishStatus::Unavailable => {
            return Err(CustomError::domain(format!("{} is out of stock", dish.name)))
        }
        DishStatus::Hidden => {
            return Err(CustomError::domain(format!("{} cannot be ordered", dish.name)))
        }
        DishStatus::Available => {}
    }

    let dish_snapshot = DishSnapshot::of(&dish, now);
    tx.insert_snapshot(&dish_snapshot).await?;
    let order = Order {
        id: Uuid::new_v4(),
        guest_id,
        table_number: Some(table.number.clone()),
        token: table.token.clone(),
        dish_snapshot_id: dish_snapshot.id,
        quantity: line.quantity,
        order_handler_id: handler_id,
        status: OrderStatus::Pending,
        options: line.options,
        created_at: now,
        updated_at: now,
    };
    tx.insert_order(&order).await?;
    Ok(OrderDetail {
        order,
        dish_snapshot,
    })
}

async fn place_lines(
    tx: &mut dyn StoreTx,
    table: &Table,
    guest_id: Option<Uuid>,
    handler_id: Option<Uuid>,
    lines: Vec<OrderLine>,
) -> Result<PlacedOrders, CustomError> {
    if lines.is_empty() {
        return Err(CustomError::ValidationError("At least one dish is required".to_string()));
    }
    let now = Utc::now();
    let mut orders = Vec::with_capacity(lines.len());
    for line in lines {
        orders.push(place_line(tx, table, guest_id, handler_id, line, now).await?);
    }
    let sockets = tx.find_table_sockets(&table.number, &table.token).await?;
    Ok(PlacedOrders { orders, sockets })
}

/// All lines are placed or none are.
#[instrument(name = "Guest create orders", skip(gateway, lines), fields(guest_id = %scope.guest_id))]
pub async fn guest_create_orders(
    gateway: &Gateway,
    scope: &GuestScope,
    lines: Vec<OrderLine>,
) -> Result<PlacedOrders, CustomError> {
    let scope = scope.clone();
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let (guest, table) = load_session(tx, &scope).await?;
                ensure_table_open(&table)?;
                place_lines(tx, &table, Some(guest.id), None, lines).await
            })
        })
        .await
}

#[instrument(name = "Staff create orders", skip(gateway, lines))]
pub async fn staff_create_orders(
    gateway: &Gateway,
    staff_id: Uuid,
    table_number: String,
    lines: Vec<OrderLine>,
) -> Result<PlacedOrders, CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let table = load_table_by_number(tx, &table_number).await?;
                ensure_table_open(&table)?;
                place_lines(tx, &table, None, Some(staff_id), lines).await
            })
        })
        .await
}

pub async fn list_by_period(
    gateway: &Gateway,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<Vec<OrderDetail>, CustomError> {
    let filter = OrderFilter {
        created_from: from,
        created_to: to,
        ..Default::default()
    };
    gateway
        .run_in_transaction(move |tx| Box::pin(async move { tx.find_orders(&filter).await }))
        .await
}

/// Orders of the table's current seating only.
pub async fn list_by_table(
    gateway: &Gateway,
    table_number: String,
) -> Result<Vec<OrderDetail>, CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let table = load_table_by_number(tx, &table_number).await?;
                tx.find_orders(&OrderFilter::current_session(&table)).await
            })
        })
        .await
}

pub async fn list_for_guest(
    gateway: &Gateway,
    scope: &GuestScope,
) -> Result<Vec<OrderDetail>, CustomError> {
    let scope = scope.clone();
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let (guest, table) = load_session(tx, &scope).await?;
                let filter = OrderFilter {
                    guest_id: Some(guest.id),
                    ..OrderFilter::current_session(&table)
                };
                tx.find_orders(&filter).await
            })
        })
        .await
}

pub async fn get_order(gateway: &Gateway, id: Uuid) -> Result<OrderDetail, CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                tx.find_order(id)
                    .await?
                    .ok_or_else(|| CustomError::not_found("Order"))
            })
        })
        .await
}

/// Switching to another dish bills the new dish at its current price; the
/// previous snapshot is dropped.
#[instrument(name = "Update order", skip(gateway))]
pub async fn update_order(
    gateway: &Gateway,
    id: Uuid,
    update: OrderUpdate,
    actor_id: Uuid,
) -> Result<OrderDetail, CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let OrderDetail {
                    mut order,
                    dish_snapshot,
                } = tx
                    .find_order(id)
                    .await?
                    .ok_or_else(|| CustomError::not_found("Order"))?;
                let now = Utc::now();
                let mut replaced = None;
                let dish_snapshot = if dish_snapshot.dish_id == Some(update.dish_id) {
                    dish_snapshot
                } else {
                    let dish = tx
                        .find_dish(update.dish_id)
                        .await?
                        .ok_or_else(|| CustomError::not_found("Dish"))?;
                    let fresh = DishSnapshot::of(&dish, now);
                    tx.insert_snapshot(&fresh).await?;
                    replaced = Some(dish_snapshot.id);
                    fresh
                };

                order.dish_snapshot_id = dish_snapshot.id;
                order.status = update.status;
                order.quantity = update.quantity;
                order.options = update.options;
                order.order_handler_id = Some(actor_id);
                order.updated_at = now;
                tx.save_order(&order).await?;
                if let Some(previous) = replaced {
                    tx.delete_snapshot(previous).await?;
                }
                Ok(OrderDetail {
                    order,
                    dish_snapshot,
                })
            })
        })
        .await
}

/// Manual settlement of every open order of the current seating.
#[instrument(name = "Pay for table", skip(gateway))]
pub async fn pay_for_table(
    gateway: &Gateway,
    table_number: String,
    staff_id: Uuid,
) -> Result<SettledTab, CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let mut table = load_table_by_number(tx, &table_number).await?;
                let open = tx
                    .find_orders(&OrderFilter::current_session(&table).with_statuses(&OrderStatus::OPEN))
                    .await?;
                if open.is_empty() {
                    return Err(CustomError::domain("Nothing to pay"));
                }
                let ids: Vec<Uuid> = open.iter().map(|detail| detail.order.id).collect();
                let now = Utc::now();
                tx.transition_orders(&StatusTransition {
                    ids: ids.clone(),
                    from: OrderStatus::OPEN.to_vec(),
                    to: OrderStatus::Paid,
                    handler_id: Some(staff_id),
                    at: now,
                })
                .await?;
                table.payment_status = PaymentStatus::Paid;
                table.updated_at = now;
                tx.save_table(&table).await?;

                let orders = tx
                    .find_orders(&OrderFilter {
                        ids: Some(ids),
                        ..Default::default()
                    })
                    .await?;
                let sockets = tx.find_table_sockets(&table.number, &table.token).await?;
                Ok(SettledTab {
                    table_number: table.number,
                    orders,
                    sockets,
                })
            })
        })
        .await
}
