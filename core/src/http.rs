use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::{Result, SyncError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .user_agent(format!("larder/{} (recipe manager)", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .build()?;
    Ok(client)
}

/// Send once and reject non-2xx statuses.
pub(crate) async fn send(method: &'static str, req: RequestBuilder) -> Result<Response> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SyncError::Status {
            method,
            url: resp.url().to_string(),
            status: status.as_u16(),
        });
    }
    Ok(resp)
}

/// Send once and decode the body as JSON.
///
/// The body is read in full before decoding so a malformed payload is a
/// `Decode` error rather than a transport one.
pub(crate) async fn send_json<T: DeserializeOwned>(
    method: &'static str,
    req: RequestBuilder,
) -> Result<T> {
    let body = send(method, req).await?.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
