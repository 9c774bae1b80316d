//! Requested Snapshots
//!
//! Typed payloads returned in the `res` field of a `REQUEST` response.
//!
//! # Wire Format (JSON)
//! ```json
//! {"id":7,"result":[{"req":"<listenKey>@balance","res":{"accountAlias":"a","balances":[]}}]}
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Response to a `<listenKey>@position` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Open positions.
    #[serde(default)]
    pub positions: Vec<PositionInfo>,
}

/// One position in a [`PositionSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionInfo {
    /// Entry price.
    pub entry_price: Decimal,
    /// Margin type (`cross` / `isolated`).
    pub margin_type: String,
    /// Whether isolated margin is topped up automatically.
    #[serde(default)]
    pub is_auto_add_margin: bool,
    /// Isolated margin.
    pub isolated_margin: Decimal,
    /// Leverage.
    pub leverage: u32,
    /// Liquidation price.
    pub liquidation_price: Decimal,
    /// Mark price.
    pub mark_price: Decimal,
    /// Maximum quantity at the current leverage.
    pub max_qty: Decimal,
    /// Position amount.
    #[serde(rename = "positionAmt")]
    pub amount: Decimal,
    /// Symbol.
    pub symbol: String,
    /// Unrealized PnL.
    #[serde(rename = "unRealizedProfit")]
    pub unrealized_pnl: Decimal,
    /// Position side.
    #[serde(rename = "positionSide")]
    pub side: String,
}

/// Response to a `<listenKey>@balance` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    /// Account alias.
    pub account_alias: String,
    /// Per-asset balances.
    #[serde(default)]
    pub balances: Vec<AssetBalance>,
}

/// One asset in a [`BalanceSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBalance {
    /// Asset name.
    pub asset: String,
    /// Wallet balance.
    pub balance: Decimal,
    /// Cross wallet balance.
    pub cross_wallet_balance: Decimal,
    /// Unrealized PnL of crossed positions.
    pub cross_un_pnl: Decimal,
    /// Available balance.
    pub available_balance: Decimal,
    /// Maximum amount for transfer out.
    pub max_withdraw_amount: Decimal,
}

/// Response to a `<listenKey>@account` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInformation {
    /// Commission tier.
    pub fee_tier: i32,
    /// Whether trading is enabled.
    pub can_trade: bool,
    /// Whether deposits are enabled.
    pub can_deposit: bool,
    /// Whether withdrawals are enabled.
    pub can_withdraw: bool,
    /// Account alias.
    pub account_alias: String,
}
