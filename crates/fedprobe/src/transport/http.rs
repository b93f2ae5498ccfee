//! reqwest backed [`Transport`].

use tracing::debug;

use super::{HttpRequest, HttpResponse, Method, Transport};
use crate::error::ProbeError;

/// Plain reqwest client. Wrap it in a [`super::Deadline`] to bound calls.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fedprobe/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ProbeError> {
        debug!("{:?} {}", request.method, request.url);

        let mut http_request = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        for (key, value) in &request.headers {
            http_request = http_request.header(key.as_str(), value.as_str());
        }

        if let Some(body) = &request.json {
            http_request = http_request.json(body);
        }

        let response = http_request.send().await?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;

        HttpResponse { status, url, headers, body }.error_for_status()
    }
}
