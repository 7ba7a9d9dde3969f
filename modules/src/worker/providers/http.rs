use domain::RequestStatus;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{trace, warn};

/// Failure to obtain any answer from a provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request could not be sent or the body could not be read
    #[error("request to {provider} failed")]
    Transport {
        /// Name of the provider
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The body did not match the expected format
    #[error("unexpected response from {provider}: {reason}")]
    Format {
        /// Name of the provider
        provider: &'static str,
        /// Missing or malformed part of the response
        reason: String,
    },
    /// The provider requires a key which the request did not contain
    #[error("no credentials available for {provider}")]
    MissingCredentials {
        /// Name of the provider
        provider: &'static str,
    },
}

/// Issues a GET request and parses the JSON body
///
/// Returns the error status for non-success responses.
pub(super) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    provider: &'static str,
    url: &str,
) -> Result<Result<T, RequestStatus>, ProviderError> {
    trace!(provider, "Requesting remote data");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    let status = response.status();
    if !status.is_success() {
        if status == StatusCode::UNAUTHORIZED {
            warn!(provider, "Unauthorized access to provider");
        } else {
            warn!(provider, %status, "Provider request failed");
        }

        return Ok(Err(RequestStatus::http_error(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
        )));
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    serde_json::from_slice(&body)
        .map(Ok)
        .map_err(|e| ProviderError::Format {
            provider,
            reason: e.to_string(),
        })
}

pub(super) fn missing(provider: &'static str, reason: &str) -> ProviderError {
    ProviderError::Format {
        provider,
        reason: reason.to_owned(),
    }
}
