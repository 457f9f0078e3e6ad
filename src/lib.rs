#![cfg_attr(doc, doc = include_str!("../README.md"))]

#[cfg(feature = "api")]
pub mod api;
pub mod auth;
pub mod error;
#[cfg(feature = "ws")]
pub mod payments;
pub mod session;
pub mod types;
#[cfg(feature = "ws")]
pub mod ws;

#[cfg(feature = "api")]
use reqwest::{Request, header::HeaderMap};
#[cfg(feature = "api")]
use serde::de::DeserializeOwned;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Environment variable naming the payment notification endpoint.
pub const WS_URL_VAR: &str = "PAYVERGE_WS_URL";

/// Endpoint used when [`WS_URL_VAR`] is unset or blank.
pub const DEFAULT_WS_ENDPOINT: &str = "ws://localhost:8080/api/v1/ws";

/// Environment variable holding a hex private key, used by the demos.
pub const PRIVATE_KEY_VAR: &str = "PAYVERGE_PRIVATE_KEY";

/// The payment notification endpoint for this process.
///
/// Read at call time so that deployments can point the client elsewhere without a rebuild.
#[must_use]
pub fn ws_endpoint() -> String {
    endpoint_or_default(std::env::var(WS_URL_VAR).ok())
}

fn endpoint_or_default(configured: Option<String>) -> String {
    configured
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_WS_ENDPOINT.to_owned())
}

#[cfg(feature = "api")]
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        level = "debug",
        skip(client, request, headers),
        fields(
            method = %request.method(),
            path = request.url().path(),
            status_code
        )
    )
)]
async fn request<Response: DeserializeOwned>(
    client: &reqwest::Client,
    mut request: Request,
    headers: Option<HeaderMap>,
) -> Result<Response> {
    let method = request.method().clone();
    let path = request.url().path().to_owned();

    if let Some(h) = headers {
        request.headers_mut().extend(h);
    }

    let response = client.execute(request).await?;
    let status_code = response.status();

    #[cfg(feature = "tracing")]
    tracing::Span::current().record("status_code", status_code.as_u16());

    if !status_code.is_success() {
        let message = response.text().await.unwrap_or_default();

        #[cfg(feature = "tracing")]
        tracing::warn!(
            status = %status_code,
            method = %method,
            path = %path,
            message = %message,
            "API request failed"
        );

        return Err(Error::status(status_code, method, path, message));
    }

    // Endpoints that answer with an empty body deserialize into `()`
    let bytes = response.bytes().await?;
    let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };

    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_falls_back_to_default() {
        assert_eq!(endpoint_or_default(None), DEFAULT_WS_ENDPOINT);
        assert_eq!(endpoint_or_default(Some("  ".to_owned())), DEFAULT_WS_ENDPOINT);
    }

    #[test]
    fn configured_endpoint_wins() {
        assert_eq!(
            endpoint_or_default(Some("wss://pay.example.com/api/v1/ws\n".to_owned())),
            "wss://pay.example.com/api/v1/ws"
        );
    }
}
