use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// Tri-state result of a remote request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum RequestStatusCode {
    /// The remote request failed
    Error,
    /// The remote request was not made, e.g. because inputs were missing
    HasNotBeenRequested,
    /// The remote request succeeded
    Ok,
}

impl Default for RequestStatusCode {
    fn default() -> Self {
        RequestStatusCode::HasNotBeenRequested
    }
}

impl From<RequestStatusCode> for i8 {
    fn from(code: RequestStatusCode) -> Self {
        match code {
            RequestStatusCode::Error => -1,
            RequestStatusCode::HasNotBeenRequested => 0,
            RequestStatusCode::Ok => 1,
        }
    }
}

/// Raised when decoding an unknown numeric status code
#[derive(Debug, thiserror::Error)]
#[error("unknown request status code {0}")]
pub struct UnknownStatusCode(i8);

impl TryFrom<i8> for RequestStatusCode {
    type Error = UnknownStatusCode;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(RequestStatusCode::Error),
            0 => Ok(RequestStatusCode::HasNotBeenRequested),
            1 => Ok(RequestStatusCode::Ok),
            other => Err(UnknownStatusCode(other)),
        }
    }
}

/// Status of the remote request that produced a facet
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatus {
    pub status_code: RequestStatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// HTTP status code of a failed remote call, `0` if not applicable
    #[serde(default)]
    pub error_code: u16,
}

impl RequestStatus {
    pub fn ok() -> Self {
        Self {
            status_code: RequestStatusCode::Ok,
            ..Default::default()
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            status_code: RequestStatusCode::Error,
            error_description: Some(description.into()),
            error_code: 0,
        }
    }

    /// Status of a remote call answered with a non-success HTTP status
    pub fn http_error(code: u16, reason: impl fmt::Display) -> Self {
        Self {
            status_code: RequestStatusCode::Error,
            error_description: Some(reason.to_string()),
            error_code: code,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == RequestStatusCode::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status_code == RequestStatusCode::Error
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn serialize_codes_as_numbers() {
        let status = RequestStatus::http_error(400, "Bad Request");

        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"statusCode": -1, "errorDescription": "Bad Request", "errorCode": 400})
        );
    }

    #[test]
    fn default_to_not_requested() {
        let status: RequestStatus = serde_json::from_value(json!({"statusCode": 0})).unwrap();
        assert_eq!(status, RequestStatus::default());
        assert!(serde_json::from_value::<RequestStatus>(json!({"statusCode": 7})).is_err());
    }
}
