use super::{OrderFilter, Persistence, StatusTransition, StoreTx, TxOptions};
use crate::db::{PgConnectionObject, PgPool};
use crate::db_models::{
    Account, Dish, DishCombo, DishSnapshot, Guest, Order, OrderDetail, RefreshToken,
    SocketBinding, Table, Transaction,
};
use crate::errors::custom::{CustomError, DbError};
use crate::schema::{
    accounts, dish_combos, dish_snapshots, dishes, guests, orders, refresh_tokens,
    restaurant_tables, sockets, transactions,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::Timestamptz;
use diesel_async::{AnsiTransactionManager, RunQueryDsl, TransactionManager};
use uuid::Uuid;

/// PostgreSQL backend. Every transaction runs at SERIALIZABLE with
/// `lock_timeout` and `statement_timeout` bounded by [`TxOptions::timeout`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(err: DieselError) -> CustomError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
            DbError::SerializationFailure(info.message().to_string()).into()
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            match info.constraint_name() {
                Some("restaurant_tables_number_key") => {
                    CustomError::conflict("number", "Table number already exists")
                }
                Some("transactions_external_id_key") => {
                    CustomError::conflict("externalId", "Transaction already recorded")
                }
                Some("accounts_email_key") => CustomError::conflict("email", "Email already exists"),
                _ => CustomError::conflict("id", info.message()),
            }
        }
        // 55P03 lock_not_available / 57014 query_canceled
        DieselError::DatabaseError(_, info) if info.message().contains("timeout") => {
            DbError::Timeout(info.message().to_string()).into()
        }
        DieselError::DatabaseError(_, info) => DbError::QueryBuilderError(info.message().to_string()).into(),
        other => DbError::Other(other.to_string()).into(),
    }
}

#[async_trait]
impl Persistence for PgStore {
    async fn begin(&self, options: TxOptions) -> Result<Box<dyn StoreTx>, CustomError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| DbError::ConnectionError(err.to_string()))?;
        AnsiTransactionManager::begin_transaction(&mut *conn)
            .await
            .map_err(db_error)?;

        let timeout_ms = options.timeout.as_millis();
        let setup = [
            "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE".to_string(),
            format!("SET LOCAL lock_timeout = '{}ms'", timeout_ms),
            format!("SET LOCAL statement_timeout = '{}ms'", timeout_ms),
        ];
        for statement in setup {
            if let Err(err) = diesel::sql_query(statement).execute(&mut *conn).await {
                let _ = AnsiTransactionManager::rollback_transaction(&mut *conn).await;
                return Err(db_error(err));
            }
        }
        Ok(Box::new(PgTx { conn }))
    }
}

struct PgTx {
    conn: PgConnectionObject,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn insert_table(&mut self, table: &Table) -> Result<(), CustomError> {
        diesel::insert_into(restaurant_tables::table)
            .values(table)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_table(&mut self, id: Uuid) -> Result<Option<Table>, CustomError> {
        restaurant_tables::table
            .find(id)
            .select(Table::as_select())
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(db_error)
    }

    async fn find_table_by_number(&mut self, number: &str) -> Result<Option<Table>, CustomError> {
        restaurant_tables::table
            .filter(restaurant_tables::number.eq(number))
            .select(Table::as_select())
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(db_error)
    }

    async fn list_tables(&mut self) -> Result<Vec<Table>, CustomError> {
        restaurant_tables::table
            .order(restaurant_tables::created_at.desc())
            .select(Table::as_select())
            .load(&mut *self.conn)
            .await
            .map_err(db_error)
    }

    async fn save_table(&mut self, table: &Table) -> Result<(), CustomError> {
        let updated = diesel::update(restaurant_tables::table.find(table.id))
            .set(table)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        if updated == 0 {
            return Err(DbError::UpdationError(format!("table {} does not exist", table.id)).into());
        }
        Ok(())
    }

    async fn delete_table(&mut self, id: Uuid) -> Result<(), CustomError> {
        diesel::delete(restaurant_tables::table.find(id))
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn insert_guest(&mut self, guest: &Guest) -> Result<(), CustomError> {
        diesel::insert_into(guests::table)
            .values(guest)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_guest(&mut self, id: Uuid) -> Result<Option<Guest>, CustomError> {
        guests::table
            .find(id)
            .select(Guest::as_select())
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(db_error)
    }

    async fn find_guests(
        &mut self,
        created_from: Option<DateTime<Utc>>,
        created_to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Guest>, CustomError> {
        let mut query = guests::table
            .select(Guest::as_select())
            .order(guests::created_at.desc())
            .into_boxed();
        if let Some(from) = created_from {
            query = query.filter(guests::created_at.ge(from));
        }
        if let Some(to) = created_to {
            query = query.filter(guests::created_at.le(to));
        }
        query.load(&mut *self.conn).await.map_err(db_error)
    }

    async fn save_guest(&mut self, guest: &Guest) -> Result<(), CustomError> {
        let updated = diesel::update(guests::table.find(guest.id))
            .set(guest)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        if updated == 0 {
            return Err(DbError::UpdationError(format!("guest {} does not exist", guest.id)).into());
        }
        Ok(())
    }

    async fn clear_guest_sessions(
        &mut self,
        table_number: &str,
        table_token: &str,
    ) -> Result<u64, CustomError> {
        let cleared = diesel::update(
            guests::table
                .filter(guests::table_number.eq(table_number))
                .filter(guests::table_token.eq(table_token)),
        )
        .set((
            guests::refresh_token.eq(None::<String>),
            guests::refresh_token_expires_at.eq(None::<DateTime<Utc>>),
            guests::updated_at.eq(Utc::now()),
        ))
        .execute(&mut *self.conn)
        .await
        .map_err(db_error)?;
        Ok(cleared as u64)
    }

    async fn clear_expired_guest_sessions(&mut self, now: DateTime<Utc>) -> Result<u64, CustomError> {
        let cleared = diesel::update(guests::table.filter(guests::refresh_token_expires_at.lt(now)))
            .set((
                guests::refresh_token.eq(None::<String>),
                guests::refresh_token_expires_at.eq(None::<DateTime<Utc>>),
                guests::updated_at.eq(now),
            ))
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(cleared as u64)
    }

    async fn delete_stale_guests(&mut self, before: DateTime<Utc>) -> Result<u64, CustomError> {
        let deleted = diesel::sql_query(
            r#"
            DELETE FROM guests g
            WHERE g.refresh_token IS NULL
              AND g.created_at < $1
              AND NOT EXISTS (
                  SELECT 1 FROM restaurant_tables t
                  WHERE t.number = g.table_number AND t.token = g.table_token
              )
            "#,
        )
        .bind::<Timestamptz, _>(before)
        .execute(&mut *self.conn)
        .await
        .map_err(db_error)?;
        Ok(deleted as u64)
    }

    async fn insert_dish(&mut self, dish: &Dish) -> Result<(), CustomError> {
        diesel::insert_into(dishes::table)
            .values(dish)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_dish(&mut self, id: Uuid) -> Result<Option<Dish>, CustomError> {
        dishes::table
            .find(id)
            .select(Dish::as_select())
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(db_error)
    }

    async fn list_dishes(&mut self) -> Result<Vec<Dish>, CustomError> {
        dishes::table
            .order(dishes::created_at.desc())
            .select(Dish::as_select())
            .load(&mut *self.conn)
            .await
            .map_err(db_error)
    }

    async fn save_dish(&mut self, dish: &Dish) -> Result<(), CustomError> {
        let updated = diesel::update(dishes::table.find(dish.id))
            .set(dish)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        if updated == 0 {
            return Err(DbError::UpdationError(format!("dish {} does not exist", dish.id)).into());
        }
        Ok(())
    }

    async fn insert_dish_combo(&mut self, combo: &DishCombo) -> Result<(), CustomError> {
        diesel::insert_into(dish_combos::table)
            .values(combo)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn list_dish_combos(&mut self, combo_id: Uuid) -> Result<Vec<DishCombo>, CustomError> {
        dish_combos::table
            .filter(dish_combos::combo_id.eq(combo_id))
            .select(DishCombo::as_select())
            .load(&mut *self.conn)
            .await
            .map_err(db_error)
    }

    async fn insert_snapshot(&mut self, snapshot: &DishSnapshot) -> Result<(), CustomError> {
        diesel::insert_into(dish_snapshots::table)
            .values(snapshot)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_snapshot(&mut self, id: Uuid) -> Result<Option<DishSnapshot>, CustomError> {
        dish_snapshots::table
            .find(id)
            .select(DishSnapshot::as_select())
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(db_error)
    }

    async fn delete_snapshot(&mut self, id: Uuid) -> Result<(), CustomError> {
        diesel::delete(dish_snapshots::table.find(id))
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), CustomError> {
        diesel::insert_into(orders::table)
            .values(order)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<OrderDetail>, CustomError> {
        let row: Option<(Order, DishSnapshot)> = orders::table
            .inner_join(dish_snapshots::table)
            .filter(orders::id.eq(id))
            .select((Order::as_select(), DishSnapshot::as_select()))
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(db_error)?;
        Ok(row.map(|(order, dish_snapshot)| OrderDetail {
            order,
            dish_snapshot,
        }))
    }

    async fn save_order(&mut self, order: &Order) -> Result<(), CustomError> {
        let updated = diesel::update(orders::table.find(order.id))
            .set(order)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        if updated == 0 {
            return Err(DbError::UpdationError(format!("order {} does not exist", order.id)).into());
        }
        Ok(())
    }

    async fn find_orders(&mut self, filter: &OrderFilter) -> Result<Vec<OrderDetail>, CustomError> {
        let mut query = orders::table
            .inner_join(dish_snapshots::table)
            .select((Order::as_select(), DishSnapshot::as_select()))
            .order(orders::created_at.desc())
            .into_boxed();
        if let Some(ids) = &filter.ids {
            query = query.filter(orders::id.eq_any(ids.clone()));
        }
        if let Some(guest_id) = filter.guest_id {
            query = query.filter(orders::guest_id.eq(guest_id));
        }
        if let Some(number) = &filter.table_number {
            query = query.filter(orders::table_number.eq(number.clone()));
        }
        if let Some(token) = &filter.token {
            query = query.filter(orders::token.eq(token.clone()));
        }
        if let Some(statuses) = &filter.statuses {
            query = query.filter(orders::status.eq_any(statuses.clone()));
        }
        if let Some(from) = filter.created_from {
            query = query.filter(orders::created_at.ge(from));
        }
        if let Some(to) = filter.created_to {
            query = query.filter(orders::created_at.le(to));
        }
        let rows: Vec<(Order, DishSnapshot)> =
            query.load(&mut *self.conn).await.map_err(db_error)?;
        Ok(rows
            .into_iter()
            .map(|(order, dish_snapshot)| OrderDetail {
                order,
                dish_snapshot,
            })
            .collect())
    }

    async fn transition_orders(&mut self, change: &StatusTransition) -> Result<u64, CustomError> {
        let target = orders::table
            .filter(orders::id.eq_any(change.ids.clone()))
            .filter(orders::status.eq_any(change.from.clone()));
        let updated = match change.handler_id {
            Some(handler_id) => {
                diesel::update(target)
                    .set((
                        orders::status.eq(change.to),
                        orders::order_handler_id.eq(Some(handler_id)),
                        orders::updated_at.eq(change.at),
                    ))
                    .execute(&mut *self.conn)
                    .await
            }
            None => {
                diesel::update(target)
                    .set((orders::status.eq(change.to), orders::updated_at.eq(change.at)))
                    .execute(&mut *self.conn)
                    .await
            }
        }
        .map_err(db_error)?;
        Ok(updated as u64)
    }

    async fn find_transaction_by_external_id(
        &mut self,
        external_id: i64,
    ) -> Result<Option<Transaction>, CustomError> {
        transactions::table
            .filter(transactions::external_id.eq(external_id))
            .select(Transaction::as_select())
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(db_error)
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), CustomError> {
        diesel::insert_into(transactions::table)
            .values(transaction)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn insert_account(&mut self, account: &Account) -> Result<(), CustomError> {
        diesel::insert_into(accounts::table)
            .values(account)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_account(&mut self, id: Uuid) -> Result<Option<Account>, CustomError> {
        accounts::table
            .find(id)
            .select(Account::as_select())
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(db_error)
    }

    async fn find_account_by_email(&mut self, email: &str) -> Result<Option<Account>, CustomError> {
        accounts::table
            .filter(accounts::email.eq(email))
            .select(Account::as_select())
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(db_error)
    }

    async fn insert_refresh_token(&mut self, token: &RefreshToken) -> Result<(), CustomError> {
        diesel::insert_into(refresh_tokens::table)
            .values(token)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_refresh_token(&mut self, token: &str) -> Result<Option<RefreshToken>, CustomError> {
        refresh_tokens::table
            .find(token)
            .select(RefreshToken::as_select())
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(db_error)
    }

    async fn delete_refresh_token(&mut self, token: &str) -> Result<u64, CustomError> {
        let deleted = diesel::delete(refresh_tokens::table.find(token))
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(deleted as u64)
    }

    async fn delete_expired_refresh_tokens(&mut self, now: DateTime<Utc>) -> Result<u64, CustomError> {
        let deleted = diesel::delete(refresh_tokens::table.filter(refresh_tokens::expires_at.lt(now)))
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(deleted as u64)
    }

    async fn upsert_socket(&mut self, binding: &SocketBinding) -> Result<(), CustomError> {
        if let Some(guest_id) = binding.guest_id {
            diesel::delete(sockets::table.filter(sockets::guest_id.eq(guest_id)))
                .execute(&mut *self.conn)
                .await
                .map_err(db_error)?;
        }
        if let Some(account_id) = binding.account_id {
            diesel::delete(sockets::table.filter(sockets::account_id.eq(account_id)))
                .execute(&mut *self.conn)
                .await
                .map_err(db_error)?;
        }
        diesel::delete(sockets::table.find(&binding.socket_id))
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        diesel::insert_into(sockets::table)
            .values(binding)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn delete_socket(&mut self, socket_id: &str) -> Result<(), CustomError> {
        diesel::delete(sockets::table.find(socket_id))
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_guest_socket(&mut self, guest_id: Uuid) -> Result<Option<String>, CustomError> {
        sockets::table
            .filter(sockets::guest_id.eq(guest_id))
            .select(sockets::socket_id)
            .first::<String>(&mut *self.conn)
            .await
            .optional()
            .map_err(db_error)
    }

    async fn find_table_sockets(
        &mut self,
        table_number: &str,
        table_token: &str,
    ) -> Result<Vec<String>, CustomError> {
        sockets::table
            .inner_join(guests::table.on(sockets::guest_id.eq(guests::id.nullable())))
            .filter(guests::table_number.eq(table_number))
            .filter(guests::table_token.eq(table_token))
            .select(sockets::socket_id)
            .order(sockets::socket_id.asc())
            .load::<String>(&mut *self.conn)
            .await
            .map_err(db_error)
    }

    async fn commit(self: Box<Self>) -> Result<(), CustomError> {
        let mut this = *self;
        AnsiTransactionManager::commit_transaction(&mut *this.conn)
            .await
            .map_err(db_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), CustomError> {
        let mut this = *self;
        AnsiTransactionManager::rollback_transaction(&mut *this.conn)
            .await
            .map_err(db_error)
    }
}
