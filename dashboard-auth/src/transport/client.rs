use super::{RequestDescriptor, Transport, TransportResponse};
use crate::config::ApiSettings;
use crate::error::TransportError;
use async_trait::async_trait;
use dashboard_core::observability::inject_outbound_headers;
use reqwest::Client;

/// `reqwest`-backed transport for the dashboard API.
///
/// Relative request URLs are resolved against `api.base_url`. Each call
/// carries W3C trace context and an `x-request-id`.
pub struct ReqwestTransport {
    client: Client,
    settings: ApiSettings,
}

impl ReqwestTransport {
    pub fn new(settings: ApiSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self { client, settings })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: RequestDescriptor,
    ) -> Result<TransportResponse, TransportError> {
        let url = self.settings.url(request.url());

        let mut headers = request.headers().clone();
        let request_id = inject_outbound_headers(&mut headers);

        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .headers(headers);
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(url = %url, request_id = %request_id, "Failed to send request: {}", e);
            TransportError::from(e)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            tracing::error!(
                url = %url,
                request_id = %request_id,
                "Failed to read response body: {}",
                e
            );
            TransportError::from(e)
        })?;

        tracing::debug!(
            method = %request.method(),
            url = %url,
            request_id = %request_id,
            status = status.as_u16(),
            "Request completed"
        );

        Ok(TransportResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
