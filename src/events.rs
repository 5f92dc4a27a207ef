//! Order event publishing over NATS
//!
//! Best-effort: a missing broker or a failed publish is logged and never
//! fails the request that produced the event. Downstream consumers (email,
//! fulfillment) subscribe to `orders.*`.

use serde::Serialize;

pub const SUBJECT_ORDER_CREATED: &str = "orders.created";
pub const SUBJECT_ORDER_PAID: &str = "orders.paid";

#[derive(Clone)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub async fn connect(url: Option<&str>) -> Self {
        let nats = match url {
            Some(url) => match async_nats::connect(url).await {
                Ok(client) => {
                    tracing::info!(%url, "connected to NATS");
                    Some(client)
                }
                Err(err) => {
                    tracing::warn!(%url, error = %err, "NATS unavailable, events disabled");
                    None
                }
            },
            None => None,
        };
        Self { nats }
    }

    pub fn disabled() -> Self {
        Self { nats: None }
    }

    pub async fn publish<T: Serialize>(&self, subject: &'static str, event: &T) {
        let Some(client) = &self.nats else { return };
        let payload = match serde_json::to_vec(event) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(subject, error = %err, "event serialization failed");
                return;
            }
        };
        if let Err(err) = client.publish(subject, payload.into()).await {
            tracing::error!(subject, error = %err, "event publish failed");
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderCreatedEvent {
    pub order_number: String,
    pub total_incl_vat_cents: i64,
    pub item_count: usize,
}

#[derive(Debug, Serialize)]
pub struct OrderPaidEvent {
    pub order_number: String,
    pub channel: String,
    pub transaction_id: String,
    pub amount_cents: i64,
}
