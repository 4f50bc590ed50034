use crate::config::configuration::PaymentSettings;
use crate::errors::custom::CustomError;
use crate::realtime::{Event, Notifier, Target};
use crate::services::payment::{self, Reconciliation, WebhookEvent};
use crate::store::Gateway;
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::instrument;

/******************************************/
// Payment gateway webhook route
/******************************************/
/**
 * @route   POST /transactions/webhook
 * @access  Authorization: Apikey <key>
 *
 * Business rejections still answer 200 with `success: false`.
 */
#[instrument(name = "Payment webhook", skip(req_event, gateway, settings, notifier), fields(external_id = req_event.id))]
pub async fn receive_webhook(
    gateway: web::Data<Gateway>,
    settings: web::Data<PaymentSettings>,
    notifier: web::Data<dyn Notifier>,
    req_event: web::Json<WebhookEvent>,
) -> Result<HttpResponse, CustomError> {
    let outcome = payment::reconcile(&gateway, &settings, req_event.into_inner())
        .await
        .map_err(|err| {
            if err.is_retryable() {
                tracing::warn!(error = %err, "settlement hit a transient storage error");
            }
            err
        })?;
    let message = match &outcome {
        Reconciliation::Settled {
            table_number,
            paid_orders,
            rejected_orders,
            sockets,
        } => {
            let payload = json!({
                "tableNumber": table_number,
                "paidOrders": paid_orders,
                "rejectedOrders": rejected_orders,
            });
            notifier.emit(Target::Staff, Event::PaymentSettled, payload.clone());
            notifier.emit(Target::Sockets(sockets.clone()), Event::PaymentSettled, payload);
            "Payment processed successfully"
        }
        Reconciliation::AlreadyRecorded { .. } => "Transaction already processed",
        Reconciliation::Rejected { .. } => "Transaction was not processed",
    };
    Ok(HttpResponse::Ok().json(json!({
        "message": message,
        "success": outcome.success(),
    })))
}
