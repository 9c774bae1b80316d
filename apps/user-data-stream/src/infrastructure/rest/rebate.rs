//! Broker Commission Rebate Services
//!
//! Query recent broker rebate records for spot and futures. Each builder
//! accumulates optional parameters and only sends what was set, except
//! `timestamp` (and, for futures, the market and time range) which are
//! always sent.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::application::ports::{HttpMethod, RestError, RestRequest, RestTransport, SecurityType};
use crate::domain::rebate::{FuturesRebateRecord, FuturesType, RebateRecord};

const REBATE_ENDPOINT: &str = "/sapi/v1/broker/rebate/recentRecord";
const FUTURES_REBATE_ENDPOINT: &str = "/sapi/v1/broker/rebate/futures/recentRecord";

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

async fn call<T: DeserializeOwned>(
    transport: &dyn RestTransport,
    request: RestRequest,
) -> Result<Vec<T>, RestError> {
    tracing::debug!(
        method = request.method.as_str(),
        endpoint = %request.endpoint,
        "Dispatching REST request"
    );
    let body = transport.call_api(request).await?;
    Ok(serde_json::from_slice(&body)?)
}

// =============================================================================
// Spot
// =============================================================================

/// Recent spot commission rebate records.
pub struct BrokerRebateService {
    transport: Arc<dyn RestTransport>,
    sub_account_id: Option<String>,
    start_time: Option<i64>,
    end_time: Option<i64>,
    page: Option<u32>,
    size: Option<u32>,
    recv_window: Option<i64>,
    timestamp: i64,
}

impl BrokerRebateService {
    /// Create a query stamped with the current time.
    #[must_use]
    pub fn new(transport: Arc<dyn RestTransport>) -> Self {
        Self {
            transport,
            sub_account_id: None,
            start_time: None,
            end_time: None,
            page: None,
            size: None,
            recv_window: None,
            timestamp: now_millis(),
        }
    }

    /// Restrict to one sub-account.
    #[must_use]
    pub fn sub_account_id(mut self, sub_account_id: impl Into<String>) -> Self {
        self.sub_account_id = Some(sub_account_id.into());
        self
    }

    /// Start of the time range (ms).
    #[must_use]
    pub const fn start_time(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// End of the time range (ms).
    #[must_use]
    pub const fn end_time(mut self, end_time: i64) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// Page number.
    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Page size, up to [`REBATE_MAX_LIMIT`](crate::domain::rebate::REBATE_MAX_LIMIT).
    #[must_use]
    pub const fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Receive window (ms).
    #[must_use]
    pub const fn recv_window(mut self, recv_window: i64) -> Self {
        self.recv_window = Some(recv_window);
        self
    }

    /// Override the request timestamp (ms).
    #[must_use]
    pub const fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build the signed request without sending it.
    #[must_use]
    pub fn build_request(&self) -> RestRequest {
        let mut request = RestRequest::new(HttpMethod::Get, REBATE_ENDPOINT, SecurityType::Signed);
        request.set_param("timestamp", self.timestamp);
        request.set_optional("subAccountId", self.sub_account_id.as_deref());
        request.set_optional("startTime", self.start_time);
        request.set_optional("endTime", self.end_time);
        request.set_optional("page", self.page);
        request.set_optional("size", self.size);
        request.set_optional("recvWindow", self.recv_window);
        request
    }

    /// Send the query.
    ///
    /// # Errors
    ///
    /// Returns the transport's error, or [`RestError::Decode`] if the body is
    /// not a list of rebate records.
    pub async fn send(self) -> Result<Vec<RebateRecord>, RestError> {
        call(self.transport.as_ref(), self.build_request()).await
    }
}

// =============================================================================
// Futures
// =============================================================================

/// Recent futures commission rebate records.
///
/// Served from the spot API host even though it reports futures rebates.
pub struct BrokerFuturesRebateService {
    transport: Arc<dyn RestTransport>,
    futures_type: FuturesType,
    start_time: i64,
    end_time: i64,
    page: Option<u32>,
    size: Option<u32>,
    recv_window: Option<i64>,
    timestamp: i64,
}

impl BrokerFuturesRebateService {
    /// Create a USDⓈ-margined query stamped with the current time.
    #[must_use]
    pub fn new(transport: Arc<dyn RestTransport>) -> Self {
        Self {
            transport,
            futures_type: FuturesType::default(),
            start_time: 0,
            end_time: 0,
            page: None,
            size: None,
            recv_window: None,
            timestamp: now_millis(),
        }
    }

    /// Futures market.
    #[must_use]
    pub const fn futures_type(mut self, futures_type: FuturesType) -> Self {
        self.futures_type = futures_type;
        self
    }

    /// Start of the time range (ms).
    #[must_use]
    pub const fn start_time(mut self, start_time: i64) -> Self {
        self.start_time = start_time;
        self
    }

    /// End of the time range (ms).
    #[must_use]
    pub const fn end_time(mut self, end_time: i64) -> Self {
        self.end_time = end_time;
        self
    }

    /// Page number.
    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Page size, up to [`FUTURES_REBATE_MAX_LIMIT`](crate::domain::rebate::FUTURES_REBATE_MAX_LIMIT).
    #[must_use]
    pub const fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Receive window (ms).
    #[must_use]
    pub const fn recv_window(mut self, recv_window: i64) -> Self {
        self.recv_window = Some(recv_window);
        self
    }

    /// Override the request timestamp (ms).
    #[must_use]
    pub const fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build the signed request without sending it.
    #[must_use]
    pub fn build_request(&self) -> RestRequest {
        let mut request =
            RestRequest::new(HttpMethod::Get, FUTURES_REBATE_ENDPOINT, SecurityType::Signed);
        request.set_param("futuresType", self.futures_type.code());
        request.set_param("startTime", self.start_time);
        request.set_param("endTime", self.end_time);
        request.set_param("timestamp", self.timestamp);
        request.set_optional("page", self.page);
        request.set_optional("size", self.size);
        request.set_optional("recvWindow", self.recv_window);
        request
    }

    /// Send the query.
    ///
    /// # Errors
    ///
    /// Returns the transport's error, or [`RestError::Decode`] if the body is
    /// not a list of futures rebate records.
    pub async fn send(self) -> Result<Vec<FuturesRebateRecord>, RestError> {
        call(self.transport.as_ref(), self.build_request()).await
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::function;

    use super::*;
    use crate::application::ports::MockRestTransport;
    use crate::domain::rebate::RebateStatus;

    const RECORDS: &str = r#"[{
        "subaccountId": "367537027503425913",
        "income": "0.02063898",
        "asset": "BTC",
        "symbol": "ETHBTC",
        "tradeId": 123456,
        "time": 1544433328000,
        "status": 1
    }]"#;

    #[tokio::test]
    async fn spot_rebate_sends_only_set_params() {
        let mut transport = MockRestTransport::new();
        transport
            .expect_call_api()
            .with(function(|request: &RestRequest| {
                request.endpoint == REBATE_ENDPOINT
                    && request.security == SecurityType::Signed
                    && request.query_string() == "page=2&subAccountId=sub1&timestamp=1000"
            }))
            .times(1)
            .returning(|_| Ok(RECORDS.as_bytes().to_vec()));

        let records = BrokerRebateService::new(Arc::new(transport))
            .sub_account_id("sub1")
            .page(2)
            .timestamp(1000)
            .send()
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].trade_id, 123_456);
        assert_eq!(records[0].rebate_status(), Some(RebateStatus::Success));
    }

    #[tokio::test]
    async fn futures_rebate_always_sends_range_and_type() {
        let mut transport = MockRestTransport::new();
        transport
            .expect_call_api()
            .with(function(|request: &RestRequest| {
                request.endpoint == FUTURES_REBATE_ENDPOINT
                    && request.query_string()
                        == "endTime=0&futuresType=2&size=50&startTime=0&timestamp=5"
            }))
            .times(1)
            .returning(|_| Ok(b"[]".to_vec()));

        let records = BrokerFuturesRebateService::new(Arc::new(transport))
            .futures_type(FuturesType::Coin)
            .size(50)
            .timestamp(5)
            .send()
            .await
            .unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let mut transport = MockRestTransport::new();
        transport
            .expect_call_api()
            .returning(|_| Err(RestError::Transport("status 401".to_string())));

        let err = BrokerRebateService::new(Arc::new(transport))
            .send()
            .await
            .unwrap_err();
        assert!(matches!(err, RestError::Transport(_)));
    }

    #[tokio::test]
    async fn undecodable_body_is_decode_error() {
        let mut transport = MockRestTransport::new();
        transport
            .expect_call_api()
            .returning(|_| Ok(br#"{"code":-1}"#.to_vec()));

        let err = BrokerFuturesRebateService::new(Arc::new(transport))
            .send()
            .await
            .unwrap_err();
        assert!(matches!(err, RestError::Decode(_)));
    }
}
