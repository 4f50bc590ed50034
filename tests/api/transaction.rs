use crate::helper::{spawn_app, transfer, TestApp, WEBHOOK_KEY};
use serde_json::{json, Value};

/// Table T1 with one delivered 50000 order. Returns the staff token and the table token.
async fn delivered_tab(app: &TestApp) -> (String, String) {
    let staff = app.owner_token().await;
    let table = app.create_table(&staff, "T1").await;
    let dish = app.create_dish(&staff, "Pho", 50000, "Paid").await;
    let response = app
        .post_json(
            "/orders",
            Some(&staff),
            &json!({ "tableNumber": "T1", "orders": [{ "dishId": dish["id"], "quantity": 1 }] }),
        )
        .await;
    let body: Value = response.json().await.unwrap();
    let response = app
        .put_json(
            &format!("/orders/{}", body["data"][0]["id"].as_str().unwrap()),
            &staff,
            &json!({ "status": "Delivered", "dishId": dish["id"], "quantity": 1 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    (staff, table["token"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn webhook_requires_the_api_key() {
    let app = spawn_app().await;
    let event = transfer(1, "SEVQRT1BHTABC", 1000);

    let response = app.post_webhook(None, &event).await;
    assert_eq!(response.status().as_u16(), 401);
    let response = app.post_webhook(Some("wrong-key"), &event).await;
    assert_eq!(response.status().as_u16(), 401);
    // same length, last byte differs
    let response = app.post_webhook(Some("test-webhook-kez"), &event).await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn concurrent_duplicate_deliveries_settle_once() {
    let app = spawn_app().await;
    let (_, token) = delivered_tab(&app).await;
    let event = transfer(1010, &format!("SEVQRT1BHT{}", token), 50000);

    let (first, second) = tokio::join!(
        app.post_webhook(Some(WEBHOOK_KEY), &event),
        app.post_webhook(Some(WEBHOOK_KEY), &event)
    );
    let mut messages = Vec::new();
    for response in [first, second] {
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], true);
        messages.push(body["message"].as_str().unwrap().to_string());
    }
    messages.sort();
    assert_eq!(
        messages,
        vec!["Payment processed successfully", "Transaction already processed"]
    );
}

#[tokio::test]
async fn matching_transfer_settles_the_table_once() {
    let app = spawn_app().await;
    let (staff, token) = delivered_tab(&app).await;
    let event = transfer(1001, &format!("SEVQRT1BHT{} chuyen tien", token), 50000);

    let response = app.post_webhook(Some(WEBHOOK_KEY), &event).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);

    let response = app.get("/tables/T1", &staff).await;
    let table: Value = response.json().await.unwrap();
    assert_eq!(table["data"]["paymentStatus"], "Paid");
    let response = app.get("/orders/table/T1", &staff).await;
    let orders: Value = response.json().await.unwrap();
    assert_eq!(orders["data"][0]["status"], "Paid");

    // replaying the same delivery is acknowledged without side effects
    let response = app.post_webhook(Some(WEBHOOK_KEY), &event).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn mismatched_amount_changes_nothing() {
    let app = spawn_app().await;
    let (staff, token) = delivered_tab(&app).await;
    let event = transfer(1002, &format!("SEVQRT1BHT{}", token), 49999);

    let response = app.post_webhook(Some(WEBHOOK_KEY), &event).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body.get("reason").is_none());

    let response = app.get("/tables/T1", &staff).await;
    let table: Value = response.json().await.unwrap();
    assert_eq!(table["data"]["paymentStatus"], "Unpaid");
    let response = app.get("/orders/table/T1", &staff).await;
    let orders: Value = response.json().await.unwrap();
    assert_eq!(orders["data"][0]["status"], "Delivered");
}

#[tokio::test]
async fn unparseable_reference_is_a_soft_failure() {
    let app = spawn_app().await;
    delivered_tab(&app).await;
    let response = app
        .post_webhook(Some(WEBHOOK_KEY), &transfer(1003, "lunch money", 50000))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn malformed_transaction_date_is_a_bad_request() {
    let app = spawn_app().await;
    let (_, token) = delivered_tab(&app).await;
    let mut event = transfer(1004, &format!("SEVQRT1BHT{}", token), 50000);
    event["transactionDate"] = json!("yesterday");
    let response = app.post_webhook(Some(WEBHOOK_KEY), &event).await;
    assert_eq!(response.status().as_u16(), 400);
}
