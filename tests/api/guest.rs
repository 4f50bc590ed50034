use crate::helper::spawn_app;
use restaurant::realtime::{Event, Target};
use serde_json::{json, Value};

#[tokio::test]
async fn wrong_table_token_and_unknown_table_look_the_same() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    app.create_table(&staff, "T1").await;

    let wrong_token = app.guest_login("T1", "0000").await;
    let unknown_table = app.guest_login("T404", "0000").await;
    assert_eq!(wrong_token.status().as_u16(), 401);
    assert_eq!(unknown_table.status().as_u16(), 401);
    let wrong_token: Value = wrong_token.json().await.unwrap();
    let unknown_table: Value = unknown_table.json().await.unwrap();
    assert_eq!(wrong_token, unknown_table);
}

#[tokio::test]
async fn hidden_tables_refuse_guests() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let table = app.create_table(&staff, "T1").await;
    let response = app
        .put_json(
            &format!("/tables/{}", table["id"].as_str().unwrap()),
            &staff,
            &json!({ "number": "T1", "capacity": 4, "status": "Hidden" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app.guest_login("T1", table["token"].as_str().unwrap()).await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn guests_order_and_see_only_their_own_orders() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let table = app.create_table(&staff, "T1").await;
    let dish = app.create_dish(&staff, "Pho", 50000, "Paid").await;
    let table_token = table["token"].as_str().unwrap();
    let alice = app.guest_token("T1", table_token).await;
    let bob = app.guest_token("T1", table_token).await;
    let mut events = app.notifier.subscribe();

    let response = app
        .post_json(
            "/guest/orders",
            Some(&alice),
            &json!([
                { "dishId": dish["id"], "quantity": 2, "options": "no onion" },
                { "dishId": dish["id"], "quantity": 1 }
            ]),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["dishSnapshot"]["price"], 50000);

    let notification = events.recv().await.expect("No notification was sent");
    assert_eq!(notification.target, Target::Staff);
    assert_eq!(notification.event, Event::NewOrder);

    let response = app.get("/guest/orders", &alice).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let response = app.get("/guest/orders", &bob).await;
    let body: Value = response.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn guest_orders_are_all_or_nothing() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let table = app.create_table(&staff, "T1").await;
    let dish = app.create_dish(&staff, "Pho", 50000, "Paid").await;
    let guest = app.guest_token("T1", table["token"].as_str().unwrap()).await;

    let response = app
        .post_json(
            "/guest/orders",
            Some(&guest),
            &json!([
                { "dishId": dish["id"], "quantity": 1 },
                { "dishId": "5fcd7d83-7adf-4d4d-931a-68b9678009db", "quantity": 1 }
            ]),
        )
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app.get("/orders/table/T1", &staff).await;
    let body: Value = response.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn guest_signals_raise_table_flags() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let table = app.create_table(&staff, "T1").await;
    let guest = app.guest_token("T1", table["token"].as_str().unwrap()).await;
    let mut events = app.notifier.subscribe();

    let response = app.post_json("/guest/call-staff", Some(&guest), &json!({})).await;
    assert_eq!(response.status().as_u16(), 200);
    let notification = events.recv().await.expect("No notification was sent");
    assert_eq!(notification.event, Event::StaffCallRequested);

    let response = app.post_json("/guest/request-payment", Some(&guest), &json!({})).await;
    assert_eq!(response.status().as_u16(), 200);
    let notification = events.recv().await.expect("No notification was sent");
    assert_eq!(notification.event, Event::PaymentRequested);

    let response = app.get("/tables/T1", &staff).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["callStaff"], true);
    assert_eq!(body["data"]["requestPayment"], true);
}

#[tokio::test]
async fn guest_tokens_cannot_reach_staff_routes() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let table = app.create_table(&staff, "T1").await;
    let guest = app.guest_token("T1", table["token"].as_str().unwrap()).await;

    let response = app.get("/tables", &guest).await;
    assert_eq!(response.status().as_u16(), 403);
    let response = app.get("/guest/orders", &staff).await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn guest_refresh_and_logout() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let table = app.create_table(&staff, "T1").await;
    let response = app.guest_login("T1", table["token"].as_str().unwrap()).await;
    let body: Value = response.json().await.unwrap();
    let access = body["data"]["accessToken"].as_str().unwrap().to_string();
    let refresh = body["data"]["refreshToken"].as_str().unwrap().to_string();

    let response = app
        .post_json("/guest/auth/refresh-token", None, &json!({ "refreshToken": refresh }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let refreshed = body["data"]["refreshToken"].as_str().unwrap().to_string();

    let response = app.post_json("/guest/auth/logout", Some(&access), &json!({})).await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .post_json("/guest/auth/refresh-token", None, &json!({ "refreshToken": refreshed }))
        .await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn staff_seat_guests_and_list_them_by_period() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let table = app.create_table(&staff, "T1").await;

    let response = app
        .post_json("/guests", Some(&staff), &json!({ "tableNumber": "T1" }))
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["tableNumber"], "T1");
    assert!(body["data"].get("tableToken").is_none());
    let seated_id = body["data"]["id"].clone();

    let response = app.get("/guests", &staff).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["id"], seated_id);

    let response = app
        .get("/guests?fromDate=2030-01-02T00:00:00Z&toDate=2030-01-01T00:00:00Z", &staff)
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let response = app.get("/guests?fromDate=2999-01-01T00:00:00Z", &staff).await;
    let body: Value = response.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());

    // hidden tables cannot be seated
    let response = app
        .put_json(
            &format!("/tables/{}", table["id"].as_str().unwrap()),
            &staff,
            &json!({ "number": "T1", "capacity": 4, "status": "Hidden" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let response = app
        .post_json("/guests", Some(&staff), &json!({ "tableNumber": "T1" }))
        .await;
    assert_eq!(response.status().as_u16(), 403);
    let response = app
        .post_json("/guests", Some(&staff), &json!({ "tableNumber": "T404" }))
        .await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn guests_cannot_use_the_staff_guest_routes() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let table = app.create_table(&staff, "T1").await;
    let guest = app.guest_token("T1", table["token"].as_str().unwrap()).await;

    let response = app.get("/guests", &guest).await;
    assert_eq!(response.status().as_u16(), 403);
    let response = app
        .post_json("/guests", Some(&guest), &json!({ "tableNumber": "T1" }))
        .await;
    assert_eq!(response.status().as_u16(), 403);
}
