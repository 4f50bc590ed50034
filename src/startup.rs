use crate::auth_jwt::auth::TokenService;
use crate::config::configuration::{DatabaseSettings, Settings};
use crate::db::{establish_connection, run_migrations};
use crate::errors::custom::CustomError;
use crate::middleware::{jwt_auth_middleware, webhook_auth_middleware};
use crate::realtime::{BroadcastNotifier, Notifier};
use crate::routes::{
    auth::auth, dish::dish, guest::guest, health_check::health_check, order::order,
    socket::socket, table::table, transaction::transaction,
};
use crate::store::{Gateway, MemoryStore, PgStore};
use actix_web::{dev::Server, web, App, HttpServer};
use actix_web_lab::middleware::from_fn;
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

/******************************************/
// Choosing the storage backend
/******************************************/
pub async fn build_gateway(settings: &DatabaseSettings) -> Result<Gateway, CustomError> {
    if settings.in_memory {
        tracing::warn!("running on the in-memory store, data is lost on exit");
        return Ok(Gateway::new(
            Arc::new(MemoryStore::new()),
            settings.transaction_timeout(),
        ));
    }
    let pool = establish_connection(settings)?;
    run_migrations(&pool).await?;
    Ok(Gateway::new(
        Arc::new(PgStore::new(pool)),
        settings.transaction_timeout(),
    ))
}

/**************************************************************/
// Application State re reuse the same code in main and tests
/***************************************************************/
pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(
        settings: Settings,
        gateway: Gateway,
        notifier: BroadcastNotifier,
    ) -> Result<Self, std::io::Error> {
        let address = format!("{}:{}", settings.application.host, settings.application.port);
        let listener = TcpListener::bind(&address)?;
        let actual_port = listener.local_addr()?.port();

        let server = run_server(listener, settings, gateway, notifier)?;
        Ok(Self {
            port: actual_port,
            server,
        })
    }
    pub fn port(&self) -> u16 {
        self.port
    }
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

/******************************************/
// Running Server
/******************************************/
pub fn run_server(
    listener: TcpListener,
    settings: Settings,
    gateway: Gateway,
    notifier: BroadcastNotifier,
) -> Result<Server, std::io::Error> {
    let gateway = web::Data::new(gateway);
    let tokens = web::Data::new(TokenService::new(settings.jwt));
    let payment = web::Data::new(settings.payment);
    let bus = web::Data::new(notifier.clone());
    let notifier: web::Data<dyn Notifier> = web::Data::from(Arc::new(notifier) as Arc<dyn Notifier>);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(gateway.clone())
            .app_data(tokens.clone())
            .app_data(payment.clone())
            .app_data(notifier.clone())
            .app_data(bus.clone())
            .route("/health_check", web::get().to(health_check))
            .route("/socket", web::get().to(socket::connect))
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(auth::login))
                    .route("/logout", web::post().to(auth::logout))
                    .route("/refresh-token", web::post().to(auth::refresh_token)),
            )
            .service(
                web::scope("/guest/auth")
                    .route("/login", web::post().to(guest::login))
                    .route("/refresh-token", web::post().to(guest::refresh_token))
                    .service(
                        web::resource("/logout")
                            .wrap(from_fn(jwt_auth_middleware))
                            .route(web::post().to(guest::logout)),
                    ),
            )
            .service(
                web::scope("/guest")
                    .wrap(from_fn(jwt_auth_middleware))
                    .route("/orders", web::post().to(guest::create_orders))
                    .route("/orders", web::get().to(guest::list_orders))
                    .route("/call-staff", web::post().to(guest::call_staff))
                    .route("/request-payment", web::post().to(guest::request_payment)),
            )
            .service(
                web::scope("/guests")
                    .wrap(from_fn(jwt_auth_middleware))
                    .route("", web::get().to(guest::list_guests))
                    .route("", web::post().to(guest::create_guest)),
            )
            .service(
                web::scope("/tables")
                    .wrap(from_fn(jwt_auth_middleware))
                    .route("", web::get().to(table::list_tables))
                    .route("", web::post().to(table::create_table))
                    .route("/buffet-mode", web::put().to(table::set_buffet_mode))
                    .route("/{number}/reset", web::post().to(table::reset_table))
                    .route("/{number}", web::get().to(table::get_table))
                    .route("/{id}", web::put().to(table::update_table))
                    .route("/{id}", web::delete().to(table::delete_table)),
            )
            .service(
                web::scope("/dishes")
                    .wrap(from_fn(jwt_auth_middleware))
                    .route("", web::get().to(dish::list_dishes))
                    .route("", web::post().to(dish::create_dish))
                    .route("/{id}", web::get().to(dish::get_dish))
                    .route("/{id}", web::put().to(dish::update_dish)),
            )
            .service(
                web::scope("/orders")
                    .wrap(from_fn(jwt_auth_middleware))
                    .route("", web::get().to(order::list_orders))
                    .route("", web::post().to(order::create_orders))
                    .route("/pay", web::post().to(order::pay_for_table))
                    .route("/table/{number}", web::get().to(order::list_table_orders))
                    .route("/{id}", web::get().to(order::get_order))
                    .route("/{id}", web::put().to(order::update_order)),
            )
            .service(
                web::scope("/transactions")
                    .wrap(from_fn(webhook_auth_middleware))
                    .route("/webhook", web::post().to(transaction::receive_webhook)),
            )
    })
    .listen(listener)?
    .run();
    Ok(server)
}
