use crate::helper::spawn_app;
use serde_json::{json, Value};

#[tokio::test]
async fn tables_can_be_created_listed_and_fetched() {
    let app = spawn_app().await;
    let token = app.owner_token().await;
    let table = app.create_table(&token, "T1").await;
    assert_eq!(table["number"], "T1");
    assert_eq!(table["paymentStatus"], "Unpaid");
    assert_eq!(table["token"].as_str().unwrap().len(), 32);

    let response = app.get("/tables", &token).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let response = app.get("/tables/T1", &token).await;
    assert_eq!(response.status().as_u16(), 200);
    let response = app.get("/tables/T9", &token).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn duplicate_table_numbers_conflict() {
    let app = spawn_app().await;
    let token = app.owner_token().await;
    app.create_table(&token, "T1").await;

    let response = app
        .post_json(
            "/tables",
            Some(&token),
            &json!({ "number": "T1", "capacity": 2, "status": "Available" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["errors"][0]["field"], "number");
}

#[tokio::test]
async fn invalid_table_input_is_rejected() {
    let app = spawn_app().await;
    let token = app.owner_token().await;
    let cases = vec![
        (json!({ "number": "T 1", "capacity": 4, "status": "Available" }), "number with a space"),
        (json!({ "number": "T1", "capacity": 0, "status": "Available" }), "zero capacity"),
        (json!({ "number": "", "capacity": 4, "status": "Available" }), "empty number"),
    ];
    for (body, description) in cases {
        let response = app.post_json("/tables", Some(&token), &body).await;
        assert_eq!(
            response.status().as_u16(),
            400,
            "The API did not fail with 400 Bad Request when the payload had {}.",
            description
        );
    }
}

#[tokio::test]
async fn rotating_the_token_ends_guest_sessions() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let table = app.create_table(&staff, "T1").await;
    let dish = app.create_dish(&staff, "Coke", 20000, "Paid").await;
    let guest = app.guest_token("T1", table["token"].as_str().unwrap()).await;

    let response = app
        .put_json(
            &format!("/tables/{}", table["id"].as_str().unwrap()),
            &staff,
            &json!({ "number": "T1", "capacity": 6, "status": "Available", "changeToken": true }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_ne!(body["data"]["token"], table["token"]);

    let response = app
        .post_json(
            "/guest/orders",
            Some(&guest),
            &json!([{ "dishId": dish["id"], "quantity": 1 }]),
        )
        .await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn buffet_mode_requires_a_buffet_combo() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    app.create_table(&staff, "T1").await;
    let coke = app.create_dish(&staff, "Coke", 20000, "Paid").await;
    let buffet = app.create_dish(&staff, "Buffet", 299000, "ComboBuffet").await;
    let mut events = app.notifier.subscribe();

    let response = app
        .put_json(
            "/tables/buffet-mode",
            &staff,
            &json!({ "tableNumber": "T1", "dishBuffetId": coke["id"] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let response = app
        .put_json(
            "/tables/buffet-mode",
            &staff,
            &json!({ "tableNumber": "T1", "dishBuffetId": buffet["id"] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["dishBuffetId"], buffet["id"]);

    let notification = events.recv().await.expect("No notification was sent");
    assert_eq!(notification.payload["tableNumber"], "T1");
}

#[tokio::test]
async fn tables_with_open_orders_cannot_be_deleted() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    let table = app.create_table(&staff, "T1").await;
    let dish = app.create_dish(&staff, "Coke", 20000, "Paid").await;
    let response = app
        .post_json(
            "/orders",
            Some(&staff),
            &json!({ "tableNumber": "T1", "orders": [{ "dishId": dish["id"], "quantity": 1 }] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let path = format!("{}/tables/{}", &app.address, table["id"].as_str().unwrap());
    let response = app
        .api_client
        .delete(&path)
        .bearer_auth(&staff)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(response.status().as_u16(), 422);

    let response = app
        .post_json("/orders/pay", Some(&staff), &json!({ "tableNumber": "T1" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let response = app
        .api_client
        .delete(&path)
        .bearer_auth(&staff)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(response.status().as_u16(), 200);
}
