//! HTTP client for the EuPago REST API
//!
//! Multibanco uses the legacy `rest_api` endpoint with the key in the body;
//! MB Way uses the v1.02 endpoint with an `Authorization: ApiKey` header.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use super::{cents_to_euros, clean_phone, EupagoError};
use crate::config::Config;

#[derive(Clone, Debug)]
pub struct MultibancoDetails {
    pub entity: String,
    pub reference: String,
    pub amount_cents: i64,
    pub deadline: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct MbwayDetails {
    pub reference: String,
    pub amount_cents: i64,
}

#[derive(Clone)]
pub struct EupagoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    webhook_url: String,
    site_url: String,
}

#[derive(Debug, Deserialize)]
struct MultibancoResponse {
    sucesso: bool,
    #[serde(default)]
    estado: Option<i64>,
    #[serde(default)]
    resposta: Option<String>,
    #[serde(default)]
    referencia: Option<String>,
    #[serde(default)]
    entidade: Option<String>,
    #[serde(default)]
    valor: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MbwayAmount {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct MbwayResponse {
    #[serde(rename = "transactionStatus", default)]
    transaction_status: Option<String>,
    #[serde(default)]
    sucesso: Option<bool>,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    referencia: Option<String>,
    #[serde(default)]
    amount: Option<MbwayAmount>,
    #[serde(default)]
    valor: Option<f64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    resposta: Option<String>,
}

impl EupagoClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.eupago_base_url.trim_end_matches('/').to_string(),
            api_key: config.eupago_api_key.clone(),
            webhook_url: config.webhook_url(),
            site_url: config.site_url.trim_end_matches('/').to_string(),
        }
    }

    fn api_key(&self) -> Result<&str, EupagoError> {
        self.api_key.as_deref().ok_or(EupagoError::MissingConfig)
    }

    /// Create a Multibanco reference valid for `deadline_hours`.
    pub async fn create_multibanco_reference(
        &self,
        order_number: &str,
        amount_cents: i64,
        deadline_hours: i64,
    ) -> Result<MultibancoDetails, EupagoError> {
        let api_key = self.api_key()?;
        let now = Utc::now();
        let deadline = now + Duration::hours(deadline_hours);

        let payload = json!({
            "chave": api_key,
            "valor": cents_to_euros(amount_cents),
            "id": order_number,
            // do not let the gateway issue duplicate references for one id
            "per_dup": 0,
            "data_inicio": now.format("%Y-%m-%d").to_string(),
            "data_fim": deadline.format("%Y-%m-%d").to_string(),
            "callback": self.webhook_url,
        });

        let response = self
            .http
            .post(format!("{}/clientes/rest_api/multibanco/create", self.base_url))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EupagoError::Upstream(response.status().as_u16()));
        }

        let body: MultibancoResponse = response
            .json()
            .await
            .map_err(|_| EupagoError::InvalidResponse)?;

        if !body.sucesso {
            let message = body
                .resposta
                .unwrap_or_else(|| "Erro ao gerar referência Multibanco".to_string());
            tracing::warn!(order_number, estado = ?body.estado, "multibanco rejected");
            return Err(EupagoError::Rejected(message));
        }

        let (reference, entity) = match (body.referencia, body.entidade) {
            (Some(r), Some(e)) => (r, e),
            _ => return Err(EupagoError::InvalidResponse),
        };

        Ok(MultibancoDetails {
            entity,
            reference,
            amount_cents: body.valor.map(super::euros_to_cents).unwrap_or(amount_cents),
            deadline,
        })
    }

    /// Push an MB Way payment request to the customer's phone.
    pub async fn create_mbway_payment(
        &self,
        order_number: &str,
        amount_cents: i64,
        phone_number: &str,
    ) -> Result<MbwayDetails, EupagoError> {
        let api_key = self.api_key()?;

        if !super::validate_phone_number(phone_number) {
            return Err(EupagoError::InvalidPhone);
        }
        let customer_phone = clean_phone(phone_number);

        let payload = json!({
            "payment": {
                "identifier": order_number,
                "amount": { "value": cents_to_euros(amount_cents), "currency": "EUR" },
                "customerPhone": customer_phone,
                "countryCode": "+351",
                "successUrl": format!("{}/checkout/sucesso", self.site_url),
                "failUrl": format!("{}/checkout", self.site_url),
                "backUrl": format!("{}/carrinho", self.site_url),
                "lang": "PT",
            },
            "customer": { "notify": true },
        });

        // v1.02 lives on a different host for sandbox accounts
        let endpoint = if self.base_url.contains("sandbox") {
            "https://sandbox.eupago.pt/api/v1.02/mbway/create".to_string()
        } else {
            "https://clientes.eupago.pt/api/v1.02/mbway/create".to_string()
        };

        let response = self
            .http
            .post(endpoint)
            .header("Authorization", format!("ApiKey {api_key}"))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body: MbwayResponse = response
            .json()
            .await
            .map_err(|_| EupagoError::InvalidResponse)?;

        let rejection_message = || {
            body.message
                .clone()
                .or_else(|| body.resposta.clone())
                .unwrap_or_else(|| "Erro ao iniciar pagamento MB Way".to_string())
        };

        if !status.is_success() {
            tracing::warn!(order_number, status = status.as_u16(), "mbway request failed");
            return Err(EupagoError::Rejected(rejection_message()));
        }

        let accepted = body.transaction_status.as_deref() == Some("Success")
            || body.sucesso == Some(true);
        if !accepted {
            tracing::warn!(order_number, "mbway payment rejected");
            return Err(EupagoError::Rejected(rejection_message()));
        }

        let reference = body
            .reference
            .clone()
            .or_else(|| body.referencia.clone())
            .unwrap_or_else(|| order_number.to_string());
        let amount_cents = body
            .amount
            .as_ref()
            .map(|a| super::euros_to_cents(a.value))
            .or_else(|| body.valor.map(super::euros_to_cents))
            .unwrap_or(amount_cents);

        Ok(MbwayDetails { reference, amount_cents })
    }
}
