use crate::db_models::TableStatus;
use crate::errors::custom::CustomError;
use crate::middleware::StaffUser;
use crate::realtime::{Event, Notifier, Target};
use crate::services::table::{self, NewTable, TableUpdate};
use crate::store::Gateway;
use crate::validations::table::{validate_capacity, TableNumber};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableBody {
    pub number: String,
    pub capacity: i32,
    pub status: TableStatus,
}

impl CreateTableBody {
    pub fn validate(self) -> Result<NewTable, String> {
        Ok(NewTable {
            number: TableNumber::parse(self.number)?.into(),
            capacity: validate_capacity(self.capacity)?,
            status: self.status,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTableBody {
    pub number: String,
    pub capacity: i32,
    pub status: TableStatus,
    #[serde(default)]
    pub change_token: bool,
}

impl UpdateTableBody {
    pub fn validate(self) -> Result<TableUpdate, String> {
        Ok(TableUpdate {
            number: TableNumber::parse(self.number)?.into(),
            capacity: validate_capacity(self.capacity)?,
            status: self.status,
            rotate_token: self.change_token,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuffetModeBody {
    pub table_number: String,
    pub dish_buffet_id: Option<Uuid>,
}

/******************************************/
// Listing tables route
/******************************************/
/**
 * @route   GET /tables
 * @access  Staff
 */
#[instrument(name = "List tables", skip(gateway, _user))]
pub async fn list_tables(gateway: web::Data<Gateway>, _user: StaffUser) -> Result<HttpResponse, CustomError> {
    let tables = table::list_tables(&gateway).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Get tables successfully",
        "data": tables,
    })))
}

/******************************************/
// Reteriving table by number route
/******************************************/
/**
 * @route   GET /tables/{number}
 * @access  Staff
 */
#[instrument(name = "Get table", skip(gateway, _user))]
pub async fn get_table(
    gateway: web::Data<Gateway>,
    number: web::Path<String>,
    _user: StaffUser,
) -> Result<HttpResponse, CustomError> {
    let table = table::get_table_by_number(&gateway, number.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Get table successfully",
        "data": table,
    })))
}

/******************************************/
// Table creation route
/******************************************/
/**
 * @route   POST /tables
 * @access  Staff
 */
#[instrument(name = "Create table", skip(req_body, gateway, _user))]
pub async fn create_table(
    gateway: web::Data<Gateway>,
    _user: StaffUser,
    req_body: web::Json<CreateTableBody>,
) -> Result<HttpResponse, CustomError> {
    let input = req_body
        .into_inner()
        .validate()
        .map_err(CustomError::ValidationError)?;
    let table = table::create_table(&gateway, input).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Table created successfully",
        "data": table,
    })))
}

/******************************************/
// Table update route
/******************************************/
/**
 * @route   PUT /tables/{id}
 * @access  Staff
 */
#[instrument(name = "Update table", skip(req_body, gateway, _user))]
pub async fn update_table(
    gateway: web::Data<Gateway>,
    table_id: web::Path<Uuid>,
    _user: StaffUser,
    req_body: web::Json<UpdateTableBody>,
) -> Result<HttpResponse, CustomError> {
    let update = req_body
        .into_inner()
        .validate()
        .map_err(CustomError::ValidationError)?;
    let table = table::update_table(&gateway, table_id.into_inner(), update).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Table updated successfully",
        "data": table,
    })))
}

/******************************************/
// Table deletion route
/******************************************/
/**
 * @route   DELETE /tables/{id}
 * @access  Staff
 */
#[instrument(name = "Delete table", skip(gateway, _user))]
pub async fn delete_table(
    gateway: web::Data<Gateway>,
    table_id: web::Path<Uuid>,
    _user: StaffUser,
) -> Result<HttpResponse, CustomError> {
    let table = table::delete_table(&gateway, table_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Table deleted successfully",
        "data": table,
    })))
}

/******************************************/
// Buffet mode route
/******************************************/
/**
 * @route   PUT /tables/buffet-mode
 * @access  Staff
 */
#[instrument(name = "Set buffet mode", skip(req_body, gateway, notifier, _user))]
pub async fn set_buffet_mode(
    gateway: web::Data<Gateway>,
    notifier: web::Data<dyn Notifier>,
    _user: StaffUser,
    req_body: web::Json<BuffetModeBody>,
) -> Result<HttpResponse, CustomError> {
    let body = req_body.into_inner();
    let number = TableNumber::parse(body.table_number).map_err(CustomError::ValidationError)?;
    let change = table::set_buffet_mode(&gateway, number.into(), body.dish_buffet_id).await?;
    let payload = json!({
        "tableNumber": change.table.number,
        "dishBuffetId": change.table.dish_buffet_id,
    });
    notifier.emit(Target::Staff, Event::BuffetModeChanged, payload.clone());
    notifier.emit(Target::Sockets(change.sockets), Event::BuffetModeChanged, payload);
    Ok(HttpResponse::Ok().json(json!({
        "message": "Buffet mode updated successfully",
        "data": change.table,
    })))
}

/******************************************/
// Table reset route
/******************************************/
/**
 * @route   POST /tables/{number}/reset
 * @access  Staff
 */
#[instrument(name = "Reset table", skip(gateway, _user))]
pub async fn reset_table(
    gateway: web::Data<Gateway>,
    number: web::Path<String>,
    _user: StaffUser,
) -> Result<HttpResponse, CustomError> {
    let table = table::reset_table(&gateway, number.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Table reset successfully",
        "data": table,
    })))
}
