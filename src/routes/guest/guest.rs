use crate::auth_jwt::auth::TokenService;
use crate::errors::custom::{AuthError, CustomError};
use crate::middleware::{GuestUser, StaffUser};
use crate::realtime::{Event, Notifier, Target};
use crate::routes::order::order::{OrderLineBody, PeriodQuery};
use crate::services::table::{record_signal, Signal};
use crate::services::{guest, order};
use crate::store::Gateway;
use crate::validations::table::TableNumber;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestLoginBody {
    pub table_number: String,
    pub token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestRefreshBody {
    pub refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuestBody {
    pub table_number: String,
}

/******************************************/
// Guest login route
/******************************************/
/**
 * @route   POST /guest/auth/login
 * @access  Public
 */
#[instrument(name = "Login guest", skip(req_login, gateway, tokens), fields(table_number = %req_login.table_number))]
pub async fn login(
    gateway: web::Data<Gateway>,
    tokens: web::Data<TokenService>,
    req_login: web::Json<GuestLoginBody>,
) -> Result<HttpResponse, CustomError> {
    let body = req_login.into_inner();
    let number = TableNumber::parse(body.table_number).map_err(CustomError::ValidationError)?;
    // a wrong token and an unknown table get the same answer
    let session = guest::login(&gateway, &tokens, number.into(), body.token)
        .await
        .map_err(|err| match err {
            CustomError::NotFoundError(_) => {
                AuthError::InvalidCredentials("Invalid table credentials".to_string()).into()
            }
            other => other,
        })?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Login successfully",
        "data": {
            "guest": session.guest,
            "accessToken": session.access_token,
            "refreshToken": session.refresh_token,
        }
    })))
}

/******************************************/
// Guest logout route
/******************************************/
/**
 * @route   POST /guest/auth/logout
 * @access  Guest session
 */
#[instrument(name = "Logout guest", skip(gateway, user))]
pub async fn logout(gateway: web::Data<Gateway>, user: GuestUser) -> Result<HttpResponse, CustomError> {
    guest::logout(&gateway, user.0.guest_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Logout successfully" })))
}

/******************************************/
// Guest refresh token route
/******************************************/
/**
 * @route   POST /guest/auth/refresh-token
 * @access  Public
 */
#[instrument(name = "Refresh guest token", skip(req_body, gateway, tokens))]
pub async fn refresh_token(
    gateway: web::Data<Gateway>,
    tokens: web::Data<TokenService>,
    req_body: web::Json<GuestRefreshBody>,
) -> Result<HttpResponse, CustomError> {
    let session = guest::refresh(&gateway, &tokens, req_body.into_inner().refresh_token).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Refresh token successfully",
        "data": {
            "accessToken": session.access_token,
            "refreshToken": session.refresh_token,
        }
    })))
}

/******************************************/
// Guest order placement route
/******************************************/
/**
 * @route   POST /guest/orders
 * @access  Guest session
 */
#[instrument(name = "Guest create orders", skip(req_lines, gateway, notifier, user))]
pub async fn create_orders(
    gateway: web::Data<Gateway>,
    notifier: web::Data<dyn Notifier>,
    user: GuestUser,
    req_lines: web::Json<Vec<OrderLineBody>>,
) -> Result<HttpResponse, CustomError> {
    let lines = req_lines
        .into_inner()
        .into_iter()
        .map(OrderLineBody::validate)
        .collect::<Result<Vec<_>, _>>()
        .map_err(CustomError::ValidationError)?;
    let placed = order::guest_create_orders(&gateway, &user.0, lines).await?;
    let payload = json!({ "tableNumber": user.0.table_number, "orders": placed.orders });
    notifier.emit(Target::Staff, Event::NewOrder, payload.clone());
    notifier.emit(Target::Sockets(placed.sockets), Event::NewOrder, payload);
    Ok(HttpResponse::Ok().json(json!({
        "message": "Orders created successfully",
        "data": placed.orders,
    })))
}

/******************************************/
// Guest order listing route
/******************************************/
/**
 * @route   GET /guest/orders
 * @access  Guest session
 */
#[instrument(name = "Guest list orders", skip(gateway, user))]
pub async fn list_orders(gateway: web::Data<Gateway>, user: GuestUser) -> Result<HttpResponse, CustomError> {
    let orders = order::list_for_guest(&gateway, &user.0).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Get orders successfully",
        "data": orders,
    })))
}

async fn signal(
    gateway: &Gateway,
    notifier: &dyn Notifier,
    user: GuestUser,
    kind: Signal,
    event: Event,
) -> Result<HttpResponse, CustomError> {
    let table = record_signal(gateway, &user.0, kind).await?;
    notifier.emit(
        Target::Staff,
        event,
        json!({ "tableNumber": table.number, "guestId": user.0.guest_id }),
    );
    Ok(HttpResponse::Ok().json(json!({
        "message": "Staff has been notified",
        "data": table,
    })))
}

/******************************************/
// Guest call staff route
/******************************************/
/**
 * @route   POST /guest/call-staff
 * @access  Guest session
 */
#[instrument(name = "Guest call staff", skip(gateway, notifier, user))]
pub async fn call_staff(
    gateway: web::Data<Gateway>,
    notifier: web::Data<dyn Notifier>,
    user: GuestUser,
) -> Result<HttpResponse, CustomError> {
    signal(&gateway, notifier.get_ref(), user, Signal::CallStaff, Event::StaffCallRequested).await
}

/******************************************/
// Guest request payment route
/******************************************/
/**
 * @route   POST /guest/request-payment
 * @access  Guest session
 */
#[instrument(name = "Guest request payment", skip(gateway, notifier, user))]
pub async fn request_payment(
    gateway: web::Data<Gateway>,
    notifier: web::Data<dyn Notifier>,
    user: GuestUser,
) -> Result<HttpResponse, CustomError> {
    signal(&gateway, notifier.get_ref(), user, Signal::RequestPayment, Event::PaymentRequested).await
}

/******************************************/
// Listing guests by period route
/******************************************/
/**
 * @route   GET /guests?fromDate=&toDate=
 * @access  Staff
 */
#[instrument(name = "List guests", skip(gateway, query, _user))]
pub async fn list_guests(
    gateway: web::Data<Gateway>,
    query: web::Query<PeriodQuery>,
    _user: StaffUser,
) -> Result<HttpResponse, CustomError> {
    let (from_date, to_date) = query.into_inner().validate().map_err(CustomError::ValidationError)?;
    let guests = guest::list_guests_by_period(&gateway, from_date, to_date).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Get guests successfully",
        "data": guests,
    })))
}

/******************************************/
// Staff guest creation route
/******************************************/
/**
 * @route   POST /guests
 * @access  Staff
 */
#[instrument(name = "Create guest", skip(gateway, req_guest, user), fields(staff_id = %user.account_id))]
pub async fn create_guest(
    gateway: web::Data<Gateway>,
    req_guest: web::Json<CreateGuestBody>,
    user: StaffUser,
) -> Result<HttpResponse, CustomError> {
    let number = TableNumber::parse(req_guest.into_inner().table_number)
        .map_err(CustomError::ValidationError)?;
    let created = guest::staff_create_guest(&gateway, number.into()).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Guest created successfully",
        "data": created,
    })))
}
