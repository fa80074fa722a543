use super::RemoteCollector;
use crate::libs::activity::ActivityRecord;
use crate::libs::config::ServerConfig;
use crate::libs::error::SubmitError;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;

const ACTIVITY_URL: &str = "activity";
const USER_AGENT: &str = concat!("actrail/", env!("CARGO_PKG_VERSION"));

/// Posts records as JSON to `{api_url}/activity`.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: Client,
    endpoint: String,
}

impl HttpCollector {
    pub fn new(config: &ServerConfig) -> Result<Self, SubmitError> {
        let mut headers = HeaderMap::new();
        if !config.auth_token.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", config.auth_token))
                .map_err(|e| SubmitError::Unavailable(format!("invalid auth token: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/{}", config.api_url.trim_end_matches('/'), ACTIVITY_URL),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RemoteCollector for HttpCollector {
    async fn submit(&self, record: &ActivityRecord) -> Result<(), SubmitError> {
        let res = self.client.post(&self.endpoint).json(record).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(SubmitError::Status(status.as_u16()));
        }
        Ok(())
    }
}
