//! Broker Rebate Records
//!
//! Commission rebate history returned by the broker rebate endpoints.

use serde::{Deserialize, Serialize};

/// Maximum page size accepted by the spot rebate endpoint.
pub const REBATE_MAX_LIMIT: u32 = 500;

/// Maximum page size accepted by the futures rebate endpoint.
pub const FUTURES_REBATE_MAX_LIMIT: u32 = 100;

/// Settlement status of a rebate record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebateStatus {
    /// Rebate not yet settled.
    Pending,
    /// Rebate credited.
    Success,
    /// Rebate failed.
    Failed,
}

impl RebateStatus {
    /// Map the numeric wire code to a status.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Success),
            2 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Numeric wire code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Pending => 0,
            Self::Success => 1,
            Self::Failed => 2,
        }
    }
}

/// Futures market a rebate query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FuturesType {
    /// USDⓈ-margined futures.
    #[default]
    Usdt,
    /// Coin-margined futures.
    Coin,
}

impl FuturesType {
    /// Numeric wire code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Usdt => 1,
            Self::Coin => 2,
        }
    }
}

/// A spot commission rebate record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebateRecord {
    /// Sub-account that generated the rebate.
    #[serde(rename = "subaccountId")]
    pub sub_account_id: String,
    /// Rebate income.
    pub income: String,
    /// Rebate asset.
    pub asset: String,
    /// Trading symbol.
    pub symbol: String,
    /// Trade ID.
    pub trade_id: i64,
    /// Record time (ms).
    pub time: i64,
    /// Raw status code, see [`RebateStatus`].
    pub status: i32,
}

impl RebateRecord {
    /// Decoded settlement status.
    #[must_use]
    pub const fn rebate_status(&self) -> Option<RebateStatus> {
        RebateStatus::from_code(self.status)
    }
}

/// A futures commission rebate record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesRebateRecord {
    /// Sub-account that generated the rebate.
    #[serde(rename = "subaccountId")]
    pub sub_account_id: String,
    /// Rebate income.
    pub income: String,
    /// Rebate asset.
    pub asset: String,
    /// Trading symbol.
    pub symbol: String,
    /// Trade ID.
    pub trade_id: i64,
    /// Record time (ms).
    pub time: i64,
    /// Raw status code, see [`RebateStatus`].
    pub status: i32,
}

impl FuturesRebateRecord {
    /// Decoded settlement status.
    #[must_use]
    pub const fn rebate_status(&self) -> Option<RebateStatus> {
        RebateStatus::from_code(self.status)
    }
}
