use crate::helper::spawn_app;
use serde_json::{json, Value};

async fn place_order(app: &crate::helper::TestApp, staff: &str, dish: &Value, quantity: i32) -> Value {
    let response = app
        .post_json(
            "/orders",
            Some(staff),
            &json!({ "tableNumber": "T1", "orders": [{ "dishId": dish["id"], "quantity": quantity }] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    body["data"][0].clone()
}

#[tokio::test]
async fn staff_orders_keep_the_price_they_were_placed_at() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    app.create_table(&staff, "T1").await;
    let dish = app.create_dish(&staff, "Pho", 50000, "Paid").await;
    let order = place_order(&app, &staff, &dish, 2).await;

    let response = app
        .put_json(
            &format!("/dishes/{}", dish["id"].as_str().unwrap()),
            &staff,
            &json!({ "name": "Pho", "price": 65000, "category": "Paid", "status": "Available" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .get(&format!("/orders/{}", order["id"].as_str().unwrap()), &staff)
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["dishSnapshot"]["price"], 50000);
    assert_eq!(body["data"]["status"], "Pending");
}

#[tokio::test]
async fn updating_an_order_records_the_handler() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    app.create_table(&staff, "T1").await;
    let pho = app.create_dish(&staff, "Pho", 50000, "Paid").await;
    let bun = app.create_dish(&staff, "Bun", 40000, "Paid").await;
    let order = place_order(&app, &staff, &pho, 1).await;

    let response = app
        .put_json(
            &format!("/orders/{}", order["id"].as_str().unwrap()),
            &staff,
            &json!({ "status": "Delivered", "dishId": bun["id"], "quantity": 3 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], "Delivered");
    assert_eq!(body["data"]["quantity"], 3);
    assert_eq!(body["data"]["dishSnapshot"]["name"], "Bun");
    assert!(body["data"]["orderHandlerId"].is_string());
}

#[tokio::test]
async fn out_of_range_quantities_are_rejected() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    app.create_table(&staff, "T1").await;
    let dish = app.create_dish(&staff, "Pho", 50000, "Paid").await;
    for quantity in [0, -1, 101] {
        let response = app
            .post_json(
                "/orders",
                Some(&staff),
                &json!({ "tableNumber": "T1", "orders": [{ "dishId": dish["id"], "quantity": quantity }] }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 400, "quantity {} was accepted", quantity);
    }
}

#[tokio::test]
async fn paying_twice_fails_the_second_time() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    app.create_table(&staff, "T1").await;
    let dish = app.create_dish(&staff, "Pho", 50000, "Paid").await;
    place_order(&app, &staff, &dish, 1).await;

    let response = app
        .post_json("/orders/pay", Some(&staff), &json!({ "tableNumber": "T1" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"][0]["status"], "Paid");

    let response = app
        .post_json("/orders/pay", Some(&staff), &json!({ "tableNumber": "T1" }))
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let response = app.get("/tables/T1", &staff).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["paymentStatus"], "Paid");
}

#[tokio::test]
async fn orders_are_listed_by_table_and_period() {
    let app = spawn_app().await;
    let staff = app.owner_token().await;
    app.create_table(&staff, "T1").await;
    let dish = app.create_dish(&staff, "Pho", 50000, "Paid").await;
    place_order(&app, &staff, &dish, 1).await;
    place_order(&app, &staff, &dish, 2).await;

    let response = app.get("/orders/table/T1", &staff).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let response = app
        .get("/orders?fromDate=2000-01-01T00:00:00Z&toDate=2999-01-01T00:00:00Z", &staff)
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let response = app.get("/orders?fromDate=2999-01-01T00:00:00Z", &staff).await;
    let body: Value = response.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());

    let response = app
        .get("/orders?fromDate=2999-01-01T00:00:00Z&toDate=2000-01-01T00:00:00Z", &staff)
        .await;
    assert_eq!(response.status().as_u16(), 400);

    // a new seating starts with an empty tab
    let response = app.post_json("/tables/T1/reset", Some(&staff), &json!({})).await;
    assert_eq!(response.status().as_u16(), 200);
    let response = app.get("/orders/table/T1", &staff).await;
    let body: Value = response.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());
}
