//! Bank-transfer reconciliation.
//!
//! A webhook event is matched to a table through its transfer reference,
//! checked against the table's delivered orders and settled in one
//! serializable transaction. Business rejections are returned as
//! [`Reconciliation::Rejected`] so the gateway always gets a deterministic
//! answer; only storage faults surface as errors.

use crate::config::configuration::{PaymentSettings, ReferenceMode};
use crate::db_models::{OrderStatus, PaymentStatus, Transaction};
use crate::errors::custom::CustomError;
use crate::store::{Gateway, OrderFilter, StatusTransition};
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

static COMPOSITE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"SEVQR(?P<number>[A-Za-z0-9]+?)BHT(?P<token>[A-Fa-f0-9]+)")
        .expect("valid composite reference pattern")
});

static PREFIXED_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"TAB(?P<number>[A-Za-z0-9]+)").expect("valid prefixed reference pattern"));

/// Payload posted by the payment gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub id: i64,
    pub gateway: String,
    pub transaction_date: String,
    pub account_number: Option<String>,
    pub code: Option<String>,
    pub content: Option<String>,
    pub transfer_type: String,
    pub transfer_amount: i64,
    pub accumulated: i64,
    pub sub_account: Option<String>,
    pub reference_code: Option<String>,
    pub description: Option<String>,
}

impl WebhookEvent {
    fn is_incoming(&self) -> bool {
        self.transfer_type.eq_ignore_ascii_case("in")
    }

    fn occurred_at(&self) -> Result<DateTime<Utc>, CustomError> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&self.transaction_date, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }
        DateTime::parse_from_rfc3339(&self.transaction_date)
            .map(|date| date.with_timezone(&Utc))
            .map_err(|_| {
                CustomError::ValidationError(format!(
                    "{} is not a valid transaction date.",
                    self.transaction_date
                ))
            })
    }
}

/// Table a transfer claims to pay for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    pub table_number: String,
    /// Only carried by composite references.
    pub table_token: Option<String>,
}

pub fn parse_reference(mode: ReferenceMode, event: &WebhookEvent) -> Option<TableReference> {
    match mode {
        ReferenceMode::Composite => {
            let content = event.content.as_deref()?;
            let captures = COMPOSITE_REFERENCE.captures(content)?;
            Some(TableReference {
                table_number: captures["number"].to_string(),
                table_token: Some(captures["token"].to_string()),
            })
        }
        ReferenceMode::Prefixed => [event.code.as_deref(), event.content.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|text| PREFIXED_REFERENCE.captures(text))
            .map(|captures| TableReference {
                table_number: captures["number"].to_string(),
                table_token: None,
            }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnknownReference,
    TableNotFound,
    OutgoingTransfer,
    AlreadyPaid,
    NothingDelivered,
    AmountMismatch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    Settled {
        table_number: String,
        paid_orders: Vec<Uuid>,
        rejected_orders: Vec<Uuid>,
        sockets: Vec<String>,
    },
    /// The external id was processed before; nothing was written.
    AlreadyRecorded { table_number: Option<String> },
    Rejected {
        table_number: Option<String>,
        reason: RejectReason,
    },
}

impl Reconciliation {
    pub fn success(&self) -> bool {
        !matches!(self, Reconciliation::Rejected { .. })
    }

    pub fn table_number(&self) -> Option<&str> {
        match self {
            Reconciliation::Settled { table_number, .. } => Some(table_number),
            Reconciliation::AlreadyRecorded { table_number }
            | Reconciliation::Rejected { table_number, .. } => table_number.as_deref(),
        }
    }
}

#[instrument(name = "Reconcile payment webhook", skip(gateway, settings, event), fields(external_id = event.id))]
pub async fn reconcile(
    gateway: &Gateway,
    settings: &PaymentSettings,
    event: WebhookEvent,
) -> Result<Reconciliation, CustomError> {
    let occurred_at = event.occurred_at()?;
    let reference = parse_reference(settings.reference_mode, &event);
    let reject_unmatched = settings.reject_unmatched_orders;

    let outcome = gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                if tx.find_transaction_by_external_id(event.id).await?.is_some() {
                    return Ok(Reconciliation::AlreadyRecorded {
                        table_number: reference.map(|r| r.table_number),
                    });
                }
                let reference = match reference {
                    Some(reference) => reference,
                    None => {
                        return Ok(Reconciliation::Rejected {
                            table_number: None,
                            reason: RejectReason::UnknownReference,
                        })
                    }
                };
                let rejected = |reason| {
                    Ok(Reconciliation::Rejected {
                        table_number: Some(reference.table_number.clone()),
                        reason,
                    })
                };

                let mut table = match tx.find_table_by_number(&reference.table_number).await? {
                    Some(table)
                        if reference
                            .table_token
                            .as_deref()
                            .map_or(true, |token| token.eq_ignore_ascii_case(&table.token)) =>
                    {
                        table
                    }
                    _ => return rejected(RejectReason::TableNotFound),
                };
                if !event.is_incoming() {
                    return rejected(RejectReason::OutgoingTransfer);
                }
                if table.payment_status == PaymentStatus::Paid {
                    return rejected(RejectReason::AlreadyPaid);
                }

                let session = OrderFilter::current_session(&table);
                let delivered = tx
                    .find_orders(&session.clone().with_statuses(&[OrderStatus::Delivered]))
                    .await?;
                if delivered.is_empty() {
                    return rejected(RejectReason::NothingDelivered);
                }
                let total: i64 = delivered
                    .iter()
                    .map(|detail| detail.dish_snapshot.billable_total(detail.order.quantity))
                    .sum();
                if total != event.transfer_amount {
                    tracing::warn!(
                        table = %table.number,
                        expected = total,
                        received = event.transfer_amount,
                        "transfer amount does not match delivered orders"
                    );
                    return rejected(RejectReason::AmountMismatch);
                }

                let now = Utc::now();
                tx.insert_transaction(&Transaction {
                    id: Uuid::new_v4(),
                    external_id: event.id,
                    gateway: event.gateway,
                    transaction_date: occurred_at,
                    account_number: event.account_number,
                    sub_account: event.sub_account,
                    amount_in: event.transfer_amount,
                    amount_out: 0,
                    accumulated: event.accumulated,
                    code: event.code,
                    content: event.content,
                    reference_number: event.reference_code,
                    body: event.description,
                    token: table.token.clone(),
                    created_at: now,
                })
                .await?;

                table.payment_status = PaymentStatus::Paid;
                table.updated_at = now;
                tx.save_table(&table).await?;

                let paid_orders: Vec<Uuid> = delivered.iter().map(|detail| detail.order.id).collect();
                tx.transition_orders(&StatusTransition {
                    ids: paid_orders.clone(),
                    from: vec![OrderStatus::Delivered],
                    to: OrderStatus::Paid,
                    handler_id: None,
                    at: now,
                })
                .await?;

                let mut rejected_orders = Vec::new();
                if reject_unmatched {
                    rejected_orders = tx
                        .find_orders(&session.with_statuses(&OrderStatus::OPEN))
                        .await?
                        .into_iter()
                        .map(|detail| detail.order.id)
                        .collect();
                    if !rejected_orders.is_empty() {
                        tx.transition_orders(&StatusTransition {
                            ids: rejected_orders.clone(),
                            from: OrderStatus::OPEN.to_vec(),
                            to: OrderStatus::Rejected,
                            handler_id: None,
                            at: now,
                        })
                        .await?;
                    }
                }

                let sockets = tx.find_table_sockets(&table.number, &table.token).await?;
                Ok(Reconciliation::Settled {
                    table_number: table.number,
                    paid_orders,
                    rejected_orders,
                    sockets,
                })
            })
        })
        .await?;

    match &outcome {
        Reconciliation::Settled { table_number, .. } => {
            tracing::info!(table = %table_number, "payment settled")
        }
        Reconciliation::AlreadyRecorded { .. } => tracing::info!("webhook already processed"),
        Reconciliation::Rejected { reason, .. } => {
            tracing::warn!(reason = ?reason, "payment webhook rejected")
        }
    }
    Ok(outcome)
}
