use crate::config::configuration::DatabaseSettings;
use crate::errors::custom::{CustomError, DbError};
use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use diesel_async_migrations::{embed_migrations, EmbeddedMigrations};

pub type PgPool = Pool<AsyncPgConnection>;
pub type PgConnectionObject = Object<AsyncPgConnection>;

static MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

/******************************************/
// Establishing Db Connection
/******************************************/
pub fn establish_connection(settings: &DatabaseSettings) -> Result<PgPool, CustomError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&settings.url);
    Pool::builder(manager)
        .max_size(settings.max_connections)
        .wait_timeout(Some(settings.transaction_timeout()))
        .runtime(deadpool::Runtime::Tokio1)
        .build()
        .map_err(|err| DbError::ConnectionError(err.to_string()).into())
}

/******************************************/
// Running embedded migrations
/******************************************/
#[tracing::instrument(name = "Running migrations", skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), CustomError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|err| DbError::ConnectionError(err.to_string()))?;
    MIGRATIONS
        .run_pending_migrations(&mut *conn)
        .await
        .map_err(|err| DbError::Other(err.to_string()))?;
    tracing::info!("Migrations are up to date");
    Ok(())
}

async fn connect_server(server_url: &str) -> Result<AsyncPgConnection, CustomError> {
    AsyncPgConnection::establish(server_url)
        .await
        .map_err(|err| DbError::ConnectionError(err.to_string()).into())
}

/******************************************/
// Creating new db for tests
/******************************************/
pub async fn create_database(server_url: &str, database_name: &str) -> Result<(), CustomError> {
    let mut connection = connect_server(server_url).await?;
    diesel::sql_query(format!(r#"CREATE DATABASE "{}";"#, database_name))
        .execute(&mut connection)
        .await
        .map_err(|err| DbError::QueryBuilderError(err.to_string()))?;
    tracing::info!(database = database_name, "test database created");
    Ok(())
}
