use crate::db_models::OrderStatus;
use crate::errors::custom::CustomError;
use crate::middleware::StaffUser;
use crate::realtime::{self, Event, Notifier, Target};
use crate::services::order::{self, OrderLine, OrderUpdate};
use crate::store::Gateway;
use crate::validations::table::{validate_quantity, TableNumber};
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineBody {
    pub dish_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub options: String,
}

impl OrderLineBody {
    pub fn validate(self) -> Result<OrderLine, String> {
        Ok(OrderLine {
            dish_id: self.dish_id,
            quantity: validate_quantity(self.quantity)?,
            options: self.options,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrdersBody {
    pub table_number: String,
    pub orders: Vec<OrderLineBody>,
}

impl CreateOrdersBody {
    pub fn validate(self) -> Result<(TableNumber, Vec<OrderLine>), String> {
        let number = TableNumber::parse(self.table_number)?;
        let lines = self
            .orders
            .into_iter()
            .map(OrderLineBody::validate)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((number, lines))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderBody {
    pub status: OrderStatus,
    pub dish_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub options: String,
}

impl UpdateOrderBody {
    pub fn validate(self) -> Result<OrderUpdate, String> {
        Ok(OrderUpdate {
            status: self.status,
            dish_id: self.dish_id,
            quantity: validate_quantity(self.quantity)?,
            options: self.options,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodQuery {
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

impl PeriodQuery {
    pub fn validate(self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), String> {
        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            if from > to {
                return Err("fromDate must not be after toDate.".to_string());
            }
        }
        Ok((self.from_date, self.to_date))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayBody {
    pub table_number: String,
}

/******************************************/
// Listing orders by period route
/******************************************/
/**
 * @route   GET /orders?fromDate=&toDate=
 * @access  Staff
 */
#[instrument(name = "List orders", skip(gateway, query, _user))]
pub async fn list_orders(
    gateway: web::Data<Gateway>,
    query: web::Query<PeriodQuery>,
    _user: StaffUser,
) -> Result<HttpResponse, CustomError> {
    let (from_date, to_date) = query.into_inner().validate().map_err(CustomError::ValidationError)?;
    let orders = order::list_by_period(&gateway, from_date, to_date).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Get orders successfully",
        "data": orders,
    })))
}

/******************************************/
// Staff order creation route
/******************************************/
/**
 * @route   POST /orders
 * @access  Staff
 */
#[instrument(name = "Staff create orders", skip(req_body, gateway, notifier, user))]
pub async fn create_orders(
    gateway: web::Data<Gateway>,
    notifier: web::Data<dyn Notifier>,
    user: StaffUser,
    req_body: web::Json<CreateOrdersBody>,
) -> Result<HttpResponse, CustomError> {
    let (number, lines) = req_body
        .into_inner()
        .validate()
        .map_err(CustomError::ValidationError)?;
    let table_number: String = number.into();
    let placed =
        order::staff_create_orders(&gateway, user.account_id, table_number.clone(), lines).await?;
    let payload = json!({ "tableNumber": table_number, "orders": placed.orders });
    notifier.emit(Target::Staff, Event::NewOrder, payload.clone());
    notifier.emit(Target::Sockets(placed.sockets), Event::NewOrder, payload);
    Ok(HttpResponse::Ok().json(json!({
        "message": "Orders created successfully",
        "data": placed.orders,
    })))
}

/******************************************/
// Listing orders of a table route
/******************************************/
/**
 * @route   GET /orders/table/{number}
 * @access  Staff
 */
#[instrument(name = "List table orders", skip(gateway, _user))]
pub async fn list_table_orders(
    gateway: web::Data<Gateway>,
    number: web::Path<String>,
    _user: StaffUser,
) -> Result<HttpResponse, CustomError> {
    let orders = order::list_by_table(&gateway, number.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Get table orders successfully",
        "data": orders,
    })))
}

/******************************************/
// Reteriving order using id
/******************************************/
/**
 * @route   GET /orders/{id}
 * @access  Staff
 */
#[instrument(name = "Get order", skip(gateway, _user))]
pub async fn get_order(
    gateway: web::Data<Gateway>,
    order_id: web::Path<Uuid>,
    _user: StaffUser,
) -> Result<HttpResponse, CustomError> {
    let detail = order::get_order(&gateway, order_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Get order successfully",
        "data": detail,
    })))
}

/******************************************/
// Updating order route
/******************************************/
/**
 * @route   PUT /orders/{id}
 * @access  Staff
 */
#[instrument(name = "Update order", skip(req_body, gateway, notifier, user))]
pub async fn update_order(
    gateway: web::Data<Gateway>,
    notifier: web::Data<dyn Notifier>,
    order_id: web::Path<Uuid>,
    user: StaffUser,
    req_body: web::Json<UpdateOrderBody>,
) -> Result<HttpResponse, CustomError> {
    let update = req_body
        .into_inner()
        .validate()
        .map_err(CustomError::ValidationError)?;
    let detail = order::update_order(&gateway, order_id.into_inner(), update, user.account_id).await?;
    let payload = json!(detail);
    notifier.emit(Target::Staff, Event::OrderUpdated, payload.clone());
    if let Some(guest_id) = detail.order.guest_id {
        realtime::notify_guest(&gateway, notifier.get_ref(), guest_id, Event::OrderUpdated, payload).await;
    }
    Ok(HttpResponse::Ok().json(json!({
        "message": "Order updated successfully",
        "data": detail,
    })))
}

/******************************************/
// Manual table settlement route
/******************************************/
/**
 * @route   POST /orders/pay
 * @access  Staff
 */
#[instrument(name = "Pay for table", skip(req_body, gateway, notifier, user))]
pub async fn pay_for_table(
    gateway: web::Data<Gateway>,
    notifier: web::Data<dyn Notifier>,
    user: StaffUser,
    req_body: web::Json<PayBody>,
) -> Result<HttpResponse, CustomError> {
    let number = TableNumber::parse(req_body.into_inner().table_number)
        .map_err(CustomError::ValidationError)?;
    let settled = order::pay_for_table(&gateway, number.into(), user.account_id).await?;
    let payload = json!({ "tableNumber": settled.table_number, "orders": settled.orders });
    notifier.emit(Target::Staff, Event::PaymentSettled, payload.clone());
    notifier.emit(Target::Sockets(settled.sockets), Event::PaymentSettled, payload);
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Table {} has been paid", settled.table_number),
        "data": settled.orders,
    })))
}
