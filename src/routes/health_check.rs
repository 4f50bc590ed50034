use crate::errors::custom::CustomError;
use crate::store::Gateway;
use actix_web::{web, HttpResponse};

/******************************************/
// Health check route
/******************************************/
/**
 * @route   GET /health_check
 * @access  Public
 *
 * Opens and commits an empty transaction so a dead store fails the probe.
 */
pub async fn health_check(gateway: web::Data<Gateway>) -> Result<HttpResponse, CustomError> {
    gateway
        .run_in_transaction(|_| Box::pin(async { Ok(()) }))
        .await?;
    Ok(HttpResponse::Ok().finish())
}
