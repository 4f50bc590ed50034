use crate::schema::{
    accounts, dish_combos, dish_snapshots, dishes, guests, orders, refresh_tokens,
    restaurant_tables, sockets, transactions,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/******************************************/
// Enums
/******************************************/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::schema::sql_types::AccountRole"]
pub enum AccountRole {
    Owner,
    Employee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::schema::sql_types::TableStatus"]
pub enum TableStatus {
    Available,
    Hidden,
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::schema::sql_types::PaymentStatus"]
pub enum PaymentStatus {
    Paid,
    Unpaid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::schema::sql_types::DishCategory"]
pub enum DishCategory {
    Buffet,
    Paid,
    ComboBuffet,
    ComboPaid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::schema::sql_types::DishStatus"]
pub enum DishStatus {
    Available,
    Unavailable,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::schema::sql_types::OrderStatus"]
pub enum OrderStatus {
    Pending,
    Processing,
    Delivered,
    Paid,
    Rejected,
}

impl OrderStatus {
    /// Statuses that still belong to the table's open tab.
    pub const OPEN: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Delivered,
    ];

    pub fn is_open(self) -> bool {
        Self::OPEN.contains(&self)
    }
}

/******************************************/
// Tables
/******************************************/
#[derive(
    Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable, AsChangeset, Identifiable,
)]
#[diesel(table_name = restaurant_tables, check_for_backend(diesel::pg::Pg), treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: Uuid,
    pub number: String,
    pub capacity: i32,
    pub status: TableStatus,
    pub token: String,
    pub dish_buffet_id: Option<Uuid>,
    pub payment_status: PaymentStatus,
    pub call_staff: bool,
    pub request_payment: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Table {
    pub fn accepts_guests(&self) -> bool {
        self.status == TableStatus::Available
    }
}

/******************************************/
// Guests
/******************************************/
#[derive(
    Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable, AsChangeset, Identifiable,
)]
#[diesel(table_name = guests, check_for_backend(diesel::pg::Pg), treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    pub id: Uuid,
    pub table_number: Option<String>,
    #[serde(skip_serializing)]
    pub table_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/******************************************/
// Catalog
/******************************************/
#[derive(
    Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable, AsChangeset, Identifiable,
)]
#[diesel(table_name = dishes, check_for_backend(diesel::pg::Pg), treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Dish {
    pub id: Uuid,
    pub name: String,
    pub price: Option<i64>,
    pub description: String,
    pub category: DishCategory,
    pub status: DishStatus,
    pub group_id: Option<Uuid>,
    pub options: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = dish_combos, check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct DishCombo {
    pub combo_id: Uuid,
    pub dish_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = dish_snapshots, check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct DishSnapshot {
    pub id: Uuid,
    pub dish_id: Option<Uuid>,
    pub name: String,
    pub price: Option<i64>,
    pub description: String,
    pub category: DishCategory,
    pub status: DishStatus,
    pub options: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DishSnapshot {
    pub fn of(dish: &Dish, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            dish_id: Some(dish.id),
            name: dish.name.clone(),
            price: dish.price,
            description: dish.description.clone(),
            category: dish.category,
            status: dish.status,
            options: dish.options.clone(),
            image: dish.image.clone(),
            created_at: now,
        }
    }

    /// Amount this line contributes to a bank transfer. Buffet items and
    /// combo-only items (no own price) are not billed per line.
    pub fn billable_total(&self, quantity: i32) -> i64 {
        match (self.category, self.price) {
            (DishCategory::Buffet, _) | (_, None) => 0,
            (_, Some(price)) => price * i64::from(quantity),
        }
    }
}

/******************************************/
// Orders
/******************************************/
#[derive(
    Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable, AsChangeset, Identifiable,
)]
#[diesel(table_name = orders, check_for_backend(diesel::pg::Pg), treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub guest_id: Option<Uuid>,
    pub table_number: Option<String>,
    #[serde(skip_serializing)]
    pub token: String,
    pub dish_snapshot_id: Uuid,
    pub quantity: i32,
    pub order_handler_id: Option<Uuid>,
    pub status: OrderStatus,
    pub options: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order joined with the snapshot it is billed against.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub dish_snapshot: DishSnapshot,
}

/******************************************/
// Payment ledger
/******************************************/
#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = transactions, check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub external_id: i64,
    pub gateway: String,
    pub transaction_date: DateTime<Utc>,
    pub account_number: Option<String>,
    pub sub_account: Option<String>,
    pub amount_in: i64,
    pub amount_out: i64,
    pub accumulated: i64,
    pub code: Option<String>,
    pub content: Option<String>,
    pub reference_number: Option<String>,
    pub body: Option<String>,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/******************************************/
// Staff
/******************************************/
#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = accounts, check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: AccountRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = refresh_tokens, check_for_backend(diesel::pg::Pg))]
pub struct RefreshToken {
    pub token: String,
    pub account_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/******************************************/
// Realtime connections
/******************************************/
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = sockets, check_for_backend(diesel::pg::Pg))]
pub struct SocketBinding {
    pub socket_id: String,
    pub guest_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
