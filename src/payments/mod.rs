//! EuPago payment integration
//!
//! Multibanco references and MB Way push payments, plus the asynchronous
//! callback the gateway posts to our webhook. Amounts cross the wire as euro
//! values with two decimals; internally everything is cents.

mod eupago;

pub use eupago::{EupagoClient, MbwayDetails, MultibancoDetails};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum EupagoError {
    #[error("Configuração de pagamento em falta")]
    MissingConfig,

    #[error("Erro ao processar pagamento. Tente novamente.")]
    Http(#[from] reqwest::Error),

    #[error("Resposta inválida do serviço de pagamento")]
    InvalidResponse,

    #[error("Erro ao comunicar com o serviço de pagamento")]
    Upstream(u16),

    /// Business rejection reported by the gateway itself.
    #[error("{0}")]
    Rejected(String),

    #[error("Número de telemóvel inválido. Use formato 9XXXXXXXX (91, 92, 93 ou 96)")]
    InvalidPhone,
}

impl From<EupagoError> for ApiError {
    fn from(err: EupagoError) -> Self {
        match err {
            EupagoError::MissingConfig => ApiError::Config("payment gateway credentials missing".into()),
            other => ApiError::Gateway(other.to_string()),
        }
    }
}

/// Callback body EuPago posts to the webhook.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EupagoCallback {
    pub identificador: String,
    pub transacao: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub valor: f64,
    pub canal: String,
    pub referencia: String,
    pub data: String,
    #[serde(default)]
    pub entidade: Option<String>,
    #[serde(default)]
    pub mp: Option<String>,
    #[serde(default)]
    pub chave_api: Option<String>,
}

/// The gateway is inconsistent about numeric encoding; accept both
/// `"valor": 12.5` and `"valor": "12.5"`.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Strip formatting and the optional 351 country code.
fn clean_phone(phone: &str) -> String {
    let mut digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.starts_with("351") && digits.len() > 9 {
        digits = digits[3..].to_string();
    }
    digits
}

/// Portuguese mobile: 9 digits, 91/92/93/96 prefix, optional 351 in front.
pub fn validate_phone_number(phone: &str) -> bool {
    let cleaned = clean_phone(phone);
    let bytes = cleaned.as_bytes();
    bytes.len() == 9
        && bytes[0] == b'9'
        && matches!(bytes[1], b'1' | b'2' | b'3' | b'6')
        && bytes.iter().all(|b| b.is_ascii_digit())
}

/// Gateway format: always with the 351 prefix.
pub fn format_phone_for_gateway(phone: &str) -> String {
    format!("351{}", clean_phone(phone))
}

/// Mask for echoing back to the client: 912345678 -> 912***678.
pub fn mask_phone_number(phone: &str) -> String {
    let cleaned = clean_phone(phone);
    if cleaned.len() < 9 {
        return phone.to_string();
    }
    format!("{}***{}", &cleaned[..3], &cleaned[cleaned.len() - 3..])
}

/// Display format for Multibanco references: 123456789 -> "123 456 789".
pub fn format_reference(reference: &str) -> String {
    let chunks: Vec<String> = reference
        .as_bytes()
        .chunks(3)
        .map(|c| String::from_utf8_lossy(c).to_string())
        .collect();
    chunks.join(" ")
}

/// Euro value with two decimals, as the gateway expects.
pub fn cents_to_euros(cents: i64) -> f64 {
    (cents as f64) / 100.0
}

/// Cents from a gateway-reported euro amount.
pub fn euros_to_cents(euros: f64) -> i64 {
    (euros * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone_number() {
        assert!(validate_phone_number("912345678"));
        assert!(validate_phone_number("962345678"));
        assert!(validate_phone_number("351912345678"));
        assert!(validate_phone_number("+351 912 345 678"));
        assert!(!validate_phone_number("812345678"));
        assert!(!validate_phone_number("942345678"));
        assert!(!validate_phone_number("91234567"));
        assert!(!validate_phone_number("9123456789"));
    }

    #[test]
    fn test_format_phone_for_gateway() {
        assert_eq!(format_phone_for_gateway("912345678"), "351912345678");
        // already-prefixed input is not double-prefixed
        assert_eq!(format_phone_for_gateway("351912345678"), "351912345678");
    }

    #[test]
    fn test_mask_phone_number() {
        assert_eq!(mask_phone_number("912345678"), "912***678");
        assert_eq!(mask_phone_number("351912345678"), "912***678");
        assert_eq!(mask_phone_number("12345"), "12345");
    }

    #[test]
    fn test_format_reference() {
        assert_eq!(format_reference("123456789"), "123 456 789");
        assert_eq!(format_reference("1234"), "123 4");
    }

    #[test]
    fn test_euro_cent_conversions() {
        assert_eq!(euros_to_cents(12.5), 1250);
        assert_eq!(euros_to_cents(0.1 + 0.2), 30);
        assert!((cents_to_euros(1250) - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_callback_accepts_string_amounts() {
        let json = r#"{
            "identificador": "ACX-1-ABCDEFGH",
            "transacao": "T123",
            "valor": "45.90",
            "canal": "loja",
            "referencia": "123456789",
            "data": "2024-05-01"
        }"#;
        let callback: EupagoCallback = serde_json::from_str(json).unwrap();
        assert!((callback.valor - 45.90).abs() < f64::EPSILON);
        assert!(callback.entidade.is_none());
    }
}
