use crate::helper::{spawn_app, Socket};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

async fn next_event(socket: &mut Socket) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("No event within 5 seconds")
            .expect("Socket was closed")
            .expect("Socket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).expect("Event is not JSON");
        }
    }
}

async fn assert_silent(socket: &mut Socket) {
    let received = tokio::time::timeout(Duration::from_millis(300), socket.next()).await;
    assert!(received.is_err(), "unexpected frame: {:?}", received);
}

#[tokio::test]
async fn staff_and_seated_guests_receive_new_orders() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let table = app.create_table(&staff, "T1").await;
    let dish = app.create_dish(&staff, "Pho", 50000, "Paid").await;
    let guest = app.guest_token("T1", table["token"].as_str().unwrap()).await;
    let mut staff_socket = app.connect_socket(&staff).await;
    let mut guest_socket = app.connect_socket(&guest).await;

    let response = app
        .post_json(
            "/guest/orders",
            Some(&guest),
            &json!([{ "dishId": dish["id"], "quantity": 2 }]),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let event = next_event(&mut staff_socket).await;
    assert_eq!(event["event"], "new-order");
    assert_eq!(event["data"][0]["quantity"], 2);
    let event = next_event(&mut guest_socket).await;
    assert_eq!(event["event"], "new-order");
    assert_eq!(event["data"][0]["dishSnapshot"]["name"], "Pho");
}

#[tokio::test]
async fn guests_only_hear_about_their_own_table() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let first = app.create_table(&staff, "T1").await;
    let second = app.create_table(&staff, "T2").await;
    let dish = app.create_dish(&staff, "Pho", 50000, "Paid").await;
    let ordering = app.guest_token("T1", first["token"].as_str().unwrap()).await;
    let neighbour = app.guest_token("T2", second["token"].as_str().unwrap()).await;
    let mut ordering_socket = app.connect_socket(&ordering).await;
    let mut neighbour_socket = app.connect_socket(&neighbour).await;

    let response = app
        .post_json(
            "/guest/orders",
            Some(&ordering),
            &json!([{ "dishId": dish["id"], "quantity": 1 }]),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let order_id = body["data"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(next_event(&mut ordering_socket).await["event"], "new-order");
    assert_silent(&mut neighbour_socket).await;

    // staff updates reach the guest who placed the order
    let response = app
        .put_json(
            &format!("/orders/{}", order_id),
            &staff,
            &json!({ "status": "Processing", "dishId": dish["id"], "quantity": 1 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let event = next_event(&mut ordering_socket).await;
    assert_eq!(event["event"], "order-updated");
    assert_eq!(event["data"]["status"], "Processing");
    assert_silent(&mut neighbour_socket).await;
}

#[tokio::test]
async fn sockets_answer_pings() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let mut socket = app.connect_socket(&staff).await;

    socket
        .send(Message::Ping(b"alive".to_vec().into()))
        .await
        .expect("Failed to send ping");
    let reply = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("No pong within 5 seconds")
        .expect("Socket was closed")
        .expect("Socket error");
    assert!(matches!(reply, Message::Pong(_)));
}

#[tokio::test]
async fn closed_guest_sockets_are_released() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let table = app.create_table(&staff, "T1").await;
    let dish = app.create_dish(&staff, "Pho", 50000, "Paid").await;
    let guest = app.guest_token("T1", table["token"].as_str().unwrap()).await;
    let mut socket = app.connect_socket(&guest).await;

    let response = app
        .post_json(
            "/guest/orders",
            Some(&guest),
            &json!([{ "dishId": dish["id"], "quantity": 1 }]),
        )
        .await;
    let body: Value = response.json().await.unwrap();
    let order_id = body["data"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(next_event(&mut socket).await["event"], "new-order");

    socket.close(None).await.expect("Failed to close socket");
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut events = app.notifier.subscribe();
    let response = app
        .put_json(
            &format!("/orders/{}", order_id),
            &staff,
            &json!({ "status": "Processing", "dishId": dish["id"], "quantity": 1 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    // staff still hear about it, the released guest socket does not
    let staff_event = events.recv().await.expect("No notification was sent");
    assert_eq!(staff_event.target, restaurant::realtime::Target::Staff);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn invalid_tokens_cannot_open_a_socket() {
    let app = spawn_app().await;
    let url = format!("ws://127.0.0.1:{}/socket?token=garbage", app.port);
    assert!(connect_async(url).await.is_err());

    let url = format!("ws://127.0.0.1:{}/socket", app.port);
    assert!(connect_async(url).await.is_err());
}
