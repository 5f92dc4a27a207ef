//! Environment-driven configuration

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub site_url: String,
    pub eupago_base_url: String,
    pub eupago_api_key: Option<String>,
    pub admin_emails: Vec<String>,
    pub nats_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8083".to_string())
            .parse()
            .context("PORT must be a number")?;
        let site_url = std::env::var("SITE_URL")
            .unwrap_or_else(|_| "https://loja.acrilux.pt".to_string());
        let eupago_base_url = std::env::var("EUPAGO_BASE_URL")
            .unwrap_or_else(|_| "https://clientes.eupago.pt".to_string());
        let eupago_api_key = std::env::var("EUPAGO_API_KEY").ok().filter(|k| !k.is_empty());
        let admin_emails = std::env::var("ADMIN_EMAILS")
            .map(|v| {
                v.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let nats_url = std::env::var("NATS_URL").ok();

        Ok(Self {
            database_url,
            port,
            site_url,
            eupago_base_url,
            eupago_api_key,
            admin_emails,
            nats_url,
        })
    }

    /// Callback URL the payment gateway posts confirmations to.
    pub fn webhook_url(&self) -> String {
        format!("{}/api/webhooks/eupago", self.site_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_url_strips_trailing_slash() {
        let config = Config {
            database_url: "postgres://localhost/test".into(),
            port: 8083,
            site_url: "https://loja.acrilux.pt/".into(),
            eupago_base_url: "https://clientes.eupago.pt".into(),
            eupago_api_key: None,
            admin_emails: vec![],
            nats_url: None,
        };
        assert_eq!(config.webhook_url(), "https://loja.acrilux.pt/api/webhooks/eupago");
    }
}
