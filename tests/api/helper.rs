use dotenv::dotenv;
use once_cell::sync::Lazy;
use restaurant::config::configuration::{ReferenceMode, Settings};
use restaurant::realtime::BroadcastNotifier;
use restaurant::services::account::ensure_owner;
use restaurant::db::create_database;
use restaurant::startup::{build_gateway, Application};
use restaurant::telemetry::{get_subscriber, init_subscriber};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

static TRACING: Lazy<()> = Lazy::new(|| {
    dotenv().ok();
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    // The sink is part of the subscriber type, so each branch builds its own.
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    };
});

pub const OWNER_EMAIL: &str = "owner@restaurant.test";
pub const OWNER_PASSWORD: &str = "owner-password";
pub const WEBHOOK_KEY: &str = "test-webhook-key";

pub struct TestApp {
    pub port: u16,
    pub address: String,
    pub notifier: BroadcastNotifier,
    pub api_client: reqwest::Client,
}

pub async fn spawn_app() -> TestApp {
    // To Ensure that the tracing stack is only initialized once
    Lazy::force(&TRACING);

    let mut settings: Settings = {
        let mut s = Settings::new().expect("Failed to load configurations");
        s.application.host = "127.0.0.1".to_string();
        s.application.port = 0;
        s.payment.api_key = WEBHOOK_KEY.to_string();
        s.payment.reference_mode = ReferenceMode::Composite;
        s.payment.reject_unmatched_orders = true;
        s.owner.email = OWNER_EMAIL.to_string();
        s.owner.password = OWNER_PASSWORD.to_string();
        s
    };

    // Postgres when a test server is configured, the in-memory store otherwise
    match std::env::var("DATABASE_TEST_URL") {
        Ok(server_url) => {
            let database_name = Uuid::new_v4().to_string();
            create_database(&server_url, &database_name)
                .await
                .expect("Failed to create test database");
            settings.database.url = format!("{}/{}", server_url, database_name);
            settings.database.in_memory = false;
        }
        Err(_) => settings.database.in_memory = true,
    }
    let gateway = build_gateway(&settings.database)
        .await
        .expect("Failed to connect to the store");
    ensure_owner(&gateway, &settings.owner)
        .await
        .expect("Failed to create owner account");
    let notifier = BroadcastNotifier::default();

    let application = Application::build(settings, gateway, notifier.clone())
        .await
        .expect("Failed to build application");
    let application_port = application.port();
    let address = format!("http://127.0.0.1:{}", application_port);
    let _ = tokio::spawn(application.run_until_stopped());

    TestApp {
        port: application_port,
        address,
        notifier,
        api_client: reqwest::Client::new(),
    }
}

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

impl TestApp {
    /// Opens the realtime socket with the token in the query string.
    pub async fn connect_socket(&self, token: &str) -> Socket {
        let url = format!("ws://127.0.0.1:{}/socket?token={}", self.port, token);
        let (socket, _) = connect_async(url).await.expect("Failed to open socket");
        socket
    }

    pub async fn post_json(&self, path: &str, token: Option<&str>, body: &Value) -> reqwest::Response {
        let mut request = self
            .api_client
            .post(&format!("{}{}", &self.address, path))
            .json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn put_json(&self, path: &str, token: &str, body: &Value) -> reqwest::Response {
        self.api_client
            .put(&format!("{}{}", &self.address, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}{}", &self.address, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Access token of the bootstrap owner.
    pub async fn owner_token(&self) -> String {
        let response = self
            .post_json(
                "/auth/login",
                None,
                &json!({ "email": OWNER_EMAIL, "password": OWNER_PASSWORD }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        body["data"]["accessToken"]
            .as_str()
            .expect("Token not found")
            .to_string()
    }

    /// Creates an available table and returns it.
    pub async fn create_table(&self, staff_token: &str, number: &str) -> Value {
        let response = self
            .post_json(
                "/tables",
                Some(staff_token),
                &json!({ "number": number, "capacity": 4, "status": "Available" }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        body["data"].clone()
    }

    pub async fn create_dish(&self, staff_token: &str, name: &str, price: i64, category: &str) -> Value {
        let response = self
            .post_json(
                "/dishes",
                Some(staff_token),
                &json!({
                    "name": name,
                    "price": price,
                    "category": category,
                    "status": "Available",
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        body["data"].clone()
    }

    pub async fn guest_login(&self, number: &str, table_token: &str) -> reqwest::Response {
        self.post_json(
            "/guest/auth/login",
            None,
            &json!({ "tableNumber": number, "token": table_token }),
        )
        .await
    }

    /// Logs a guest in and returns the access token.
    pub async fn guest_token(&self, number: &str, table_token: &str) -> String {
        let response = self.guest_login(number, table_token).await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        body["data"]["accessToken"]
            .as_str()
            .expect("Token not found")
            .to_string()
    }

    pub async fn post_webhook(&self, api_key: Option<&str>, body: &Value) -> reqwest::Response {
        let mut request = self
            .api_client
            .post(&format!("{}/transactions/webhook", &self.address))
            .json(body);
        if let Some(key) = api_key {
            request = request.header("Authorization", format!("Apikey {}", key));
        }
        request.send().await.expect("Failed to execute request.")
    }
}

pub fn transfer(id: i64, content: &str, amount: i64) -> Value {
    json!({
        "id": id,
        "gateway": "TestBank",
        "transactionDate": "2024-10-01 12:30:00",
        "accountNumber": "0123456789",
        "code": null,
        "content": content,
        "transferType": "in",
        "transferAmount": amount,
        "accumulated": amount,
        "subAccount": null,
        "referenceCode": "FT24275000001",
        "description": content,
    })
}
