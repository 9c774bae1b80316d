//! REST Transport Port (Driven Port)
//!
//! Interface the rebate services dispatch through. The implementation owns
//! the HTTP client, request signing and the API key header.

use std::collections::BTreeMap;

use async_trait::async_trait;

/// HTTP method of a REST call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

impl HttpMethod {
    /// Method name on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// Authentication an endpoint requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityType {
    /// No authentication.
    None,
    /// API key header only.
    ApiKey,
    /// API key header and signed query.
    Signed,
}

/// A REST call: method, path, security and query parameters.
///
/// Parameters are kept sorted so the query string is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Endpoint path, e.g. `/sapi/v1/broker/rebate/recentRecord`.
    pub endpoint: String,
    /// Required authentication.
    pub security: SecurityType,
    /// Query parameters.
    pub params: BTreeMap<String, String>,
}

impl RestRequest {
    /// Create a request with no parameters.
    #[must_use]
    pub fn new(method: HttpMethod, endpoint: impl Into<String>, security: SecurityType) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            security,
            params: BTreeMap::new(),
        }
    }

    /// Set a query parameter, replacing any previous value.
    pub fn set_param(&mut self, key: &str, value: impl ToString) {
        self.params.insert(key.to_string(), value.to_string());
    }

    /// Set a query parameter only when `value` is present.
    pub fn set_optional<T: ToString>(&mut self, key: &str, value: Option<T>) {
        if let Some(value) = value {
            self.set_param(key, value);
        }
    }

    /// Encode the parameters as a query string.
    #[must_use]
    pub fn query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// REST transport errors.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// The call could not be completed or returned a non-success status.
    #[error("REST call failed: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("unable to decode REST response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Dispatches REST calls and returns the raw response body.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RestTransport: Send + Sync {
    /// Execute `request`, returning the response body on success.
    async fn call_api(&self, request: RestRequest) -> Result<Vec<u8>, RestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_is_sorted() {
        let mut request = RestRequest::new(HttpMethod::Get, "/x", SecurityType::Signed);
        request.set_param("timestamp", 2);
        request.set_param("futuresType", 1);
        request.set_optional::<i64>("page", None);

        assert_eq!(request.query_string(), "futuresType=1&timestamp=2");
        assert_eq!(request.method.as_str(), "GET");
    }
}
