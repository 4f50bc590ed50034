use crate::auth_jwt::auth::TokenService;
use crate::config::configuration::{DatabaseSettings, JwtSettings};
use crate::db::create_database;
use crate::db_models::{Dish, DishCategory, DishStatus, Table, TableStatus};
use crate::services::dish::{create_dish, DishInput};
use crate::services::order::OrderLine;
use crate::services::table::{create_table, NewTable};
use crate::store::Gateway;
use uuid::Uuid;

pub fn gateway() -> Gateway {
    Gateway::in_memory()
}

/// Gateway over a fresh Postgres database, or `None` when
/// `DATABASE_TEST_URL` (server url without a database name) is not set.
pub async fn pg_gateway() -> Option<Gateway> {
    dotenv::dotenv().ok();
    let server_url = std::env::var("DATABASE_TEST_URL").ok()?;
    let database_name = Uuid::new_v4().to_string();
    create_database(&server_url, &database_name)
        .await
        .expect("Failed to create test database");
    let settings = DatabaseSettings {
        url: format!("{}/{}", server_url, database_name),
        in_memory: false,
        max_connections: 10,
        transaction_timeout_ms: 5_000,
    };
    Some(
        crate::startup::build_gateway(&settings)
            .await
            .expect("Failed to connect to test database"),
    )
}

pub fn tokens() -> TokenService {
    TokenService::new(JwtSettings {
        access_secret: "test-access-secret".to_string(),
        refresh_secret: "test-refresh-secret".to_string(),
        access_ttl_secs: 900,
        refresh_ttl_secs: 3600,
        guest_access_ttl_secs: 300,
        guest_refresh_ttl_secs: 1800,
    })
}

pub async fn seed_table(gateway: &Gateway, number: &str, status: TableStatus) -> Table {
    create_table(
        gateway,
        NewTable {
            number: number.to_string(),
            capacity: 4,
            status,
        },
    )
    .await
    .expect("Failed to seed table")
}

pub async fn seed_dish(
    gateway: &Gateway,
    name: &str,
    price: Option<i64>,
    category: DishCategory,
    status: DishStatus,
) -> Dish {
    let input = DishInput {
        name: name.to_string(),
        price,
        description: String::new(),
        category,
        status,
        group_id: None,
        options: String::new(),
        image: None,
    };
    create_dish(gateway, input, Vec::new())
        .await
        .expect("Failed to seed dish")
        .dish
}

pub fn line(dish_id: Uuid, quantity: i32) -> OrderLine {
    OrderLine {
        dish_id,
        quantity,
        options: String::new(),
    }
}
