use super::{OrderFilter, Persistence, StatusTransition, StoreTx, TxOptions};
use crate::db_models::{
    Account, Dish, DishCombo, DishSnapshot, Guest, Order, OrderDetail, RefreshToken,
    SocketBinding, Table, Transaction,
};
use crate::errors::custom::{CustomError, DbError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tables: HashMap<Uuid, Table>,
    guests: HashMap<Uuid, Guest>,
    dishes: HashMap<Uuid, Dish>,
    dish_combos: Vec<DishCombo>,
    snapshots: HashMap<Uuid, DishSnapshot>,
    orders: HashMap<Uuid, Order>,
    transactions: HashMap<i64, Transaction>,
    accounts: HashMap<Uuid, Account>,
    refresh_tokens: HashMap<String, RefreshToken>,
    sockets: HashMap<String, SocketBinding>,
}

/// Process-local backend. A single lock serializes transactions; each one
/// works on a copy that replaces the shared state on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn begin(&self, options: TxOptions) -> Result<Box<dyn StoreTx>, CustomError> {
        let guard = tokio::time::timeout(options.timeout, self.state.clone().lock_owned())
            .await
            .map_err(|_| {
                DbError::Timeout(format!(
                    "lock not acquired within {}ms",
                    options.timeout.as_millis()
                ))
            })?;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

impl MemoryTx {
    fn detail(&self, order: &Order) -> Result<OrderDetail, CustomError> {
        let snapshot = self
            .work
            .snapshots
            .get(&order.dish_snapshot_id)
            .cloned()
            .ok_or_else(|| {
                DbError::Other(format!("order {} references a missing snapshot", order.id))
            })?;
        Ok(OrderDetail {
            order: order.clone(),
            dish_snapshot: snapshot,
        })
    }

    fn number_taken(&self, number: &str, except: Option<Uuid>) -> bool {
        self.work
            .tables
            .values()
            .any(|t| t.number == number && Some(t.id) != except)
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_table(&mut self, table: &Table) -> Result<(), CustomError> {
        if self.number_taken(&table.number, None) {
            return Err(CustomError::conflict("number", "Table number already exists"));
        }
        self.work.tables.insert(table.id, table.clone());
        Ok(())
    }

    async fn find_table(&mut self, id: Uuid) -> Result<Option<Table>, CustomError> {
        Ok(self.work.tables.get(&id).cloned())
    }

    async fn find_table_by_number(&mut self, number: &str) -> Result<Option<Table>, CustomError> {
        Ok(self.work.tables.values().find(|t| t.number == number).cloned())
    }

    async fn list_tables(&mut self) -> Result<Vec<Table>, CustomError> {
        let mut tables: Vec<Table> = self.work.tables.values().cloned().collect();
        tables.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tables)
    }

    async fn save_table(&mut self, table: &Table) -> Result<(), CustomError> {
        if self.number_taken(&table.number, Some(table.id)) {
            return Err(CustomError::conflict("number", "Table number already exists"));
        }
        let previous = self
            .work
            .tables
            .insert(table.id, table.clone())
            .ok_or_else(|| DbError::UpdationError(format!("table {} does not exist", table.id)))?;
        // ON UPDATE CASCADE
        if previous.number != table.number {
            for guest in self.work.guests.values_mut() {
                if guest.table_number.as_deref() == Some(previous.number.as_str()) {
                    guest.table_number = Some(table.number.clone());
                }
            }
            for order in self.work.orders.values_mut() {
                if order.table_number.as_deref() == Some(previous.number.as_str()) {
                    order.table_number = Some(table.number.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete_table(&mut self, id: Uuid) -> Result<(), CustomError> {
        let Some(table) = self.work.tables.remove(&id) else {
            return Ok(());
        };
        // ON DELETE SET NULL
        for guest in self.work.guests.values_mut() {
            if guest.table_number.as_deref() == Some(table.number.as_str()) {
                guest.table_number = None;
            }
        }
        for order in self.work.orders.values_mut() {
            if order.table_number.as_deref() == Some(table.number.as_str()) {
                order.table_number = None;
            }
        }
        Ok(())
    }

    async fn insert_guest(&mut self, guest: &Guest) -> Result<(), CustomError> {
        self.work.guests.insert(guest.id, guest.clone());
        Ok(())
    }

    async fn find_guest(&mut self, id: Uuid) -> Result<Option<Guest>, CustomError> {
        Ok(self.work.guests.get(&id).cloned())
    }

    async fn find_guests(
        &mut self,
        created_from: Option<DateTime<Utc>>,
        created_to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Guest>, CustomError> {
        let mut guests: Vec<Guest> = self
            .work
            .guests
            .values()
            .filter(|g| created_from.map_or(true, |from| g.created_at >= from))
            .filter(|g| created_to.map_or(true, |to| g.created_at <= to))
            .cloned()
            .collect();
        guests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(guests)
    }

    async fn save_guest(&mut self, guest: &Guest) -> Result<(), CustomError> {
        match self.work.guests.get_mut(&guest.id) {
            Some(stored) => {
                *stored = guest.clone();
                Ok(())
            }
            None => Err(DbError::UpdationError(format!("guest {} does not exist", guest.id)).into()),
        }
    }

    async fn clear_guest_sessions(
        &mut self,
        table_number: &str,
        table_token: &str,
    ) -> Result<u64, CustomError> {
        let now = Utc::now();
        let mut cleared = 0;
        for guest in self.work.guests.values_mut() {
            if guest.table_number.as_deref() == Some(table_number) && guest.table_token == table_token
            {
                guest.refresh_token = None;
                guest.refresh_token_expires_at = None;
                guest.updated_at = now;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn clear_expired_guest_sessions(&mut self, now: DateTime<Utc>) -> Result<u64, CustomError> {
        let mut cleared = 0;
        for guest in self.work.guests.values_mut() {
            if guest.refresh_token_expires_at.map_or(false, |at| at < now) {
                guest.refresh_token = None;
                guest.refresh_token_expires_at = None;
                guest.updated_at = now;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn delete_stale_guests(&mut self, before: DateTime<Utc>) -> Result<u64, CustomError> {
        let tables = &self.work.tables;
        let stale: Vec<Uuid> = self
            .work
            .guests
            .values()
            .filter(|g| g.refresh_token.is_none() && g.created_at < before)
            .filter(|g| {
                let current = g
                    .table_number
                    .as_ref()
                    .and_then(|n| tables.values().find(|t| &t.number == n));
                current.map_or(true, |t| t.token != g.table_token)
            })
            .map(|g| g.id)
            .collect();
        for id in &stale {
            self.work.guests.remove(id);
            for order in self.work.orders.values_mut() {
                if order.guest_id == Some(*id) {
                    order.guest_id = None;
                }
            }
            self.work.sockets.retain(|_, s| s.guest_id != Some(*id));
        }
        Ok(stale.len() as u64)
    }

    async fn insert_dish(&mut self, dish: &Dish) -> Result<(), CustomError> {
        self.work.dishes.insert(dish.id, dish.clone());
        Ok(())
    }

    async fn find_dish(&mut self, id: Uuid) -> Result<Option<Dish>, CustomError> {
        Ok(self.work.dishes.get(&id).cloned())
    }

    async fn list_dishes(&mut self) -> Result<Vec<Dish>, CustomError> {
        let mut dishes: Vec<Dish> = self.work.dishes.values().cloned().collect();
        dishes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(dishes)
    }

    async fn save_dish(&mut self, dish: &Dish) -> Result<(), CustomError> {
        match self.work.dishes.get_mut(&dish.id) {
            Some(stored) => {
                *stored = dish.clone();
                Ok(())
            }
            None => Err(DbError::UpdationError(format!("dish {} does not exist", dish.id)).into()),
        }
    }

    async fn insert_dish_combo(&mut self, combo: &DishCombo) -> Result<(), CustomError> {
        if self
            .work
            .dish_combos
            .iter()
            .any(|c| c.combo_id == combo.combo_id && c.dish_id == combo.dish_id)
        {
            return Err(CustomError::conflict("dishId", "Dish already belongs to this combo"));
        }
        self.work.dish_combos.push(combo.clone());
        Ok(())
    }

    async fn list_dish_combos(&mut self, combo_id: Uuid) -> Result<Vec<DishCombo>, CustomError> {
        Ok(self
            .work
            .dish_combos
            .iter()
            .filter(|c| c.combo_id == combo_id)
            .cloned()
            .collect())
    }

    async fn insert_snapshot(&mut self, snapshot: &DishSnapshot) -> Result<(), CustomError> {
        self.work.snapshots.insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn find_snapshot(&mut self, id: Uuid) -> Result<Option<DishSnapshot>, CustomError> {
        Ok(self.work.snapshots.get(&id).cloned())
    }

    async fn delete_snapshot(&mut self, id: Uuid) -> Result<(), CustomError> {
        if self.work.orders.values().any(|o| o.dish_snapshot_id == id) {
            return Err(DbError::Other(format!("snapshot {} is still referenced", id)).into());
        }
        self.work.snapshots.remove(&id);
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), CustomError> {
        if !self.work.snapshots.contains_key(&order.dish_snapshot_id) {
            return Err(DbError::InsertionError(format!(
                "snapshot {} does not exist",
                order.dish_snapshot_id
            ))
            .into());
        }
        self.work.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<OrderDetail>, CustomError> {
        match self.work.orders.get(&id) {
            Some(order) => Ok(Some(self.detail(order)?)),
            None => Ok(None),
        }
    }

    async fn save_order(&mut self, order: &Order) -> Result<(), CustomError> {
        if !self.work.orders.contains_key(&order.id) {
            return Err(DbError::UpdationError(format!("order {} does not exist", order.id)).into());
        }
        self.work.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_orders(&mut self, filter: &OrderFilter) -> Result<Vec<OrderDetail>, CustomError> {
        let mut matched: Vec<&Order> = self
            .work
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.into_iter().map(|o| self.detail(o)).collect()
    }

    async fn transition_orders(&mut self, change: &StatusTransition) -> Result<u64, CustomError> {
        let mut updated = 0;
        for id in &change.ids {
            if let Some(order) = self.work.orders.get_mut(id) {
                if change.from.contains(&order.status) {
                    order.status = change.to;
                    if let Some(handler) = change.handler_id {
                        order.order_handler_id = Some(handler);
                    }
                    order.updated_at = change.at;
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    async fn find_transaction_by_external_id(
        &mut self,
        external_id: i64,
    ) -> Result<Option<Transaction>, CustomError> {
        Ok(self.work.transactions.get(&external_id).cloned())
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), CustomError> {
        if self.work.transactions.contains_key(&transaction.external_id) {
            return Err(CustomError::conflict("externalId", "Transaction already recorded"));
        }
        self.work
            .transactions
            .insert(transaction.external_id, transaction.clone());
        Ok(())
    }

    async fn insert_account(&mut self, account: &Account) -> Result<(), CustomError> {
        if self.work.accounts.values().any(|a| a.email == account.email) {
            return Err(CustomError::conflict("email", "Email already exists"));
        }
        self.work.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_account(&mut self, id: Uuid) -> Result<Option<Account>, CustomError> {
        Ok(self.work.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&mut self, email: &str) -> Result<Option<Account>, CustomError> {
        Ok(self.work.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn insert_refresh_token(&mut self, token: &RefreshToken) -> Result<(), CustomError> {
        self.work
            .refresh_tokens
            .insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find_refresh_token(&mut self, token: &str) -> Result<Option<RefreshToken>, CustomError> {
        Ok(self.work.refresh_tokens.get(token).cloned())
    }

    async fn delete_refresh_token(&mut self, token: &str) -> Result<u64, CustomError> {
        Ok(self.work.refresh_tokens.remove(token).map_or(0, |_| 1))
    }

    async fn delete_expired_refresh_tokens(&mut self, now: DateTime<Utc>) -> Result<u64, CustomError> {
        let before = self.work.refresh_tokens.len();
        self.work.refresh_tokens.retain(|_, t| t.expires_at >= now);
        Ok((before - self.work.refresh_tokens.len()) as u64)
    }

    async fn upsert_socket(&mut self, binding: &SocketBinding) -> Result<(), CustomError> {
        self.work.sockets.retain(|_, s| {
            let same_guest = binding.guest_id.is_some() && s.guest_id == binding.guest_id;
            let same_account = binding.account_id.is_some() && s.account_id == binding.account_id;
            !(same_guest || same_account)
        });
        self.work
            .sockets
            .insert(binding.socket_id.clone(), binding.clone());
        Ok(())
    }

    async fn delete_socket(&mut self, socket_id: &str) -> Result<(), CustomError> {
        self.work.sockets.remove(socket_id);
        Ok(())
    }

    async fn find_guest_socket(&mut self, guest_id: Uuid) -> Result<Option<String>, CustomError> {
        Ok(self
            .work
            .sockets
            .values()
            .find(|s| s.guest_id == Some(guest_id))
            .map(|s| s.socket_id.clone()))
    }

    async fn find_table_sockets(
        &mut self,
        table_number: &str,
        table_token: &str,
    ) -> Result<Vec<String>, CustomError> {
        let guests = &self.work.guests;
        let mut sockets: Vec<String> = self
            .work
            .sockets
            .values()
            .filter(|s| {
                s.guest_id.and_then(|id| guests.get(&id)).map_or(false, |g| {
                    g.table_number.as_deref() == Some(table_number) && g.table_token == table_token
                })
            })
            .map(|s| s.socket_id.clone())
            .collect();
        sockets.sort();
        Ok(sockets)
    }

    async fn commit(self: Box<Self>) -> Result<(), CustomError> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), CustomError> {
        Ok(())
    }
}
