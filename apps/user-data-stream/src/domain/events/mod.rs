//! User Data Stream Events
//!
//! Unsolicited push notifications delivered on the user data stream without
//! a preceding request. Every event object carries an `e` discriminator and
//! an `E` event time in epoch milliseconds.
//!
//! # Wire Format (JSON)
//! ```json
//! {"e":"ACCOUNT_UPDATE","E":1564745798939,"T":1564745798938,"a":{...}}
//! {"e":"listenKeyExpired","E":1576653824250,"listenKey":"WsCMN0a4..."}
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A push event received on the user data stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "e")]
pub enum UserDataEvent {
    /// Balance and position changes.
    #[serde(rename = "ACCOUNT_UPDATE")]
    AccountUpdate(AccountUpdateEvent),

    /// Order lifecycle update (new, fill, cancel, expiry).
    #[serde(rename = "ORDER_TRADE_UPDATE")]
    OrderTradeUpdate(Box<OrderTradeUpdateEvent>),

    /// Leverage or multi-assets mode change.
    #[serde(rename = "ACCOUNT_CONFIG_UPDATE")]
    AccountConfigUpdate(AccountConfigUpdateEvent),

    /// Positions approaching liquidation.
    #[serde(rename = "MARGIN_CALL")]
    MarginCall(MarginCallEvent),

    /// Condensed trade notification.
    #[serde(rename = "TRADE_LITE")]
    TradeLite(TradeLiteEvent),

    /// The listen key is no longer valid; the stream will be closed by the server.
    #[serde(rename = "listenKeyExpired")]
    ListenKeyExpired(ListenKeyExpiredEvent),

    /// Any event type this client does not model.
    #[serde(other)]
    Unknown,
}

impl UserDataEvent {
    /// Wire name of the event type.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::AccountUpdate(_) => "ACCOUNT_UPDATE",
            Self::OrderTradeUpdate(_) => "ORDER_TRADE_UPDATE",
            Self::AccountConfigUpdate(_) => "ACCOUNT_CONFIG_UPDATE",
            Self::MarginCall(_) => "MARGIN_CALL",
            Self::TradeLite(_) => "TRADE_LITE",
            Self::ListenKeyExpired(_) => "listenKeyExpired",
            Self::Unknown => "unknown",
        }
    }

    /// Event time in epoch milliseconds, if the event type is known.
    #[must_use]
    pub const fn event_time_ms(&self) -> Option<i64> {
        match self {
            Self::AccountUpdate(e) => Some(e.event_time),
            Self::OrderTradeUpdate(e) => Some(e.event_time),
            Self::AccountConfigUpdate(e) => Some(e.event_time),
            Self::MarginCall(e) => Some(e.event_time),
            Self::TradeLite(e) => Some(e.event_time),
            Self::ListenKeyExpired(e) => Some(e.event_time),
            Self::Unknown => None,
        }
    }

    /// Event time as a UTC timestamp.
    #[must_use]
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        self.event_time_ms().and_then(DateTime::from_timestamp_millis)
    }
}

// =============================================================================
// ACCOUNT_UPDATE
// =============================================================================

/// `ACCOUNT_UPDATE` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdateEvent {
    /// Event time (ms).
    #[serde(rename = "E")]
    pub event_time: i64,

    /// Transaction time (ms).
    #[serde(rename = "T")]
    pub transaction_time: i64,

    /// Update payload.
    #[serde(rename = "a")]
    pub update: AccountUpdate,
}

/// Payload of an `ACCOUNT_UPDATE` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    /// Reason for the update (`ORDER`, `FUNDING_FEE`, `DEPOSIT`, ...).
    #[serde(rename = "m")]
    pub reason: String,

    /// Changed balances.
    #[serde(rename = "B", default)]
    pub balances: Vec<BalanceUpdate>,

    /// Changed positions.
    #[serde(rename = "P", default)]
    pub positions: Vec<PositionUpdate>,
}

/// A single asset balance inside an `ACCOUNT_UPDATE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    /// Asset name.
    #[serde(rename = "a")]
    pub asset: String,

    /// Wallet balance.
    #[serde(rename = "wb")]
    pub wallet_balance: Decimal,

    /// Cross wallet balance.
    #[serde(rename = "cw")]
    pub cross_wallet_balance: Decimal,

    /// Balance change except PnL and commission.
    #[serde(rename = "bc", default)]
    pub balance_change: Decimal,
}

/// A single position inside an `ACCOUNT_UPDATE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    /// Symbol.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Position amount.
    #[serde(rename = "pa")]
    pub amount: Decimal,

    /// Entry price.
    #[serde(rename = "ep")]
    pub entry_price: Decimal,

    /// Breakeven price.
    #[serde(rename = "bep", default)]
    pub breakeven_price: Decimal,

    /// Pre-fee accumulated realized.
    #[serde(rename = "cr")]
    pub accumulated_realized: Decimal,

    /// Unrealized PnL.
    #[serde(rename = "up")]
    pub unrealized_pnl: Decimal,

    /// Margin type (`cross` or `isolated`).
    #[serde(rename = "mt")]
    pub margin_type: String,

    /// Isolated wallet (if isolated position).
    #[serde(rename = "iw")]
    pub isolated_wallet: Decimal,

    /// Position side (`BOTH`, `LONG`, `SHORT`).
    #[serde(rename = "ps")]
    pub side: String,
}

// =============================================================================
// ORDER_TRADE_UPDATE
// =============================================================================

/// `ORDER_TRADE_UPDATE` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTradeUpdateEvent {
    /// Event time (ms).
    #[serde(rename = "E")]
    pub event_time: i64,

    /// Transaction time (ms).
    #[serde(rename = "T")]
    pub transaction_time: i64,

    /// Order payload.
    #[serde(rename = "o")]
    pub order: OrderTradeUpdate,
}

/// Order state carried by an `ORDER_TRADE_UPDATE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTradeUpdate {
    /// Symbol.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Client order ID.
    #[serde(rename = "c")]
    pub client_order_id: String,

    /// Side (`BUY`/`SELL`).
    #[serde(rename = "S")]
    pub side: String,

    /// Order type.
    #[serde(rename = "o")]
    pub order_type: String,

    /// Time in force.
    #[serde(rename = "f")]
    pub time_in_force: String,

    /// Original quantity.
    #[serde(rename = "q")]
    pub original_qty: Decimal,

    /// Original price.
    #[serde(rename = "p")]
    pub original_price: Decimal,

    /// Average price.
    #[serde(rename = "ap")]
    pub average_price: Decimal,

    /// Stop price.
    #[serde(rename = "sp")]
    pub stop_price: Decimal,

    /// Execution type (`NEW`, `TRADE`, `CANCELED`, ...).
    #[serde(rename = "x")]
    pub execution_type: String,

    /// Order status.
    #[serde(rename = "X")]
    pub status: String,

    /// Exchange order ID.
    #[serde(rename = "i")]
    pub order_id: i64,

    /// Last filled quantity.
    #[serde(rename = "l")]
    pub last_filled_qty: Decimal,

    /// Accumulated filled quantity.
    #[serde(rename = "z")]
    pub accumulated_filled_qty: Decimal,

    /// Last filled price.
    #[serde(rename = "L")]
    pub last_filled_price: Decimal,

    /// Commission asset, absent when no commission was charged.
    #[serde(rename = "N", default)]
    pub commission_asset: Option<String>,

    /// Commission amount.
    #[serde(rename = "n", default)]
    pub commission: Option<Decimal>,

    /// Trade time (ms).
    #[serde(rename = "T")]
    pub trade_time: i64,

    /// Trade ID.
    #[serde(rename = "t")]
    pub trade_id: i64,

    /// Bids notional.
    #[serde(rename = "b", default)]
    pub bids_notional: Decimal,

    /// Asks notional.
    #[serde(rename = "a", default)]
    pub asks_notional: Decimal,

    /// Whether this trade is the maker side.
    #[serde(rename = "m")]
    pub is_maker: bool,

    /// Whether this is a reduce-only order.
    #[serde(rename = "R")]
    pub is_reduce_only: bool,

    /// Stop price working type.
    #[serde(rename = "wt")]
    pub working_type: String,

    /// Original order type.
    #[serde(rename = "ot")]
    pub original_type: String,

    /// Position side.
    #[serde(rename = "ps")]
    pub position_side: String,

    /// Whether the order closes all positions (conditional orders).
    #[serde(rename = "cp", default)]
    pub close_position: bool,

    /// Trailing stop activation price.
    #[serde(rename = "AP", default)]
    pub activation_price: Option<Decimal>,

    /// Trailing stop callback rate.
    #[serde(rename = "cr", default)]
    pub callback_rate: Option<Decimal>,

    /// Realized profit of the trade.
    #[serde(rename = "rp")]
    pub realized_pnl: Decimal,

    /// Self-trade prevention mode.
    #[serde(rename = "V", default)]
    pub stp_mode: Option<String>,

    /// Price match mode.
    #[serde(rename = "pm", default)]
    pub price_match: Option<String>,

    /// Good-till-date auto cancel time (ms).
    #[serde(rename = "gtd", default)]
    pub good_till_date: Option<i64>,
}

// =============================================================================
// ACCOUNT_CONFIG_UPDATE
// =============================================================================

/// `ACCOUNT_CONFIG_UPDATE` event.
///
/// Exactly one of `leverage` or `multi_assets` is normally present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfigUpdateEvent {
    /// Event time (ms).
    #[serde(rename = "E")]
    pub event_time: i64,

    /// Transaction time (ms).
    #[serde(rename = "T")]
    pub transaction_time: i64,

    /// Symbol leverage change.
    #[serde(rename = "ac", default)]
    pub leverage: Option<LeverageConfig>,

    /// Multi-assets mode change.
    #[serde(rename = "ai", default)]
    pub multi_assets: Option<MultiAssetsConfig>,
}

/// Leverage update for a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeverageConfig {
    /// Symbol.
    #[serde(rename = "s")]
    pub symbol: String,

    /// New leverage.
    #[serde(rename = "l")]
    pub leverage: u32,
}

/// Multi-assets mode update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiAssetsConfig {
    /// Whether multi-assets mode is enabled.
    #[serde(rename = "j")]
    pub enabled: bool,
}

// =============================================================================
// MARGIN_CALL
// =============================================================================

/// `MARGIN_CALL` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginCallEvent {
    /// Event time (ms).
    #[serde(rename = "E")]
    pub event_time: i64,

    /// Cross wallet balance, only pushed for crossed positions.
    #[serde(rename = "cw", default)]
    pub cross_wallet_balance: Option<Decimal>,

    /// Positions under margin call.
    #[serde(rename = "p", default)]
    pub positions: Vec<MarginCallPosition>,
}

/// A position included in a `MARGIN_CALL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginCallPosition {
    /// Symbol.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Position side.
    #[serde(rename = "ps")]
    pub side: String,

    /// Position amount.
    #[serde(rename = "pa")]
    pub amount: Decimal,

    /// Margin type.
    #[serde(rename = "mt")]
    pub margin_type: String,

    /// Isolated wallet (if isolated position).
    #[serde(rename = "iw", default)]
    pub isolated_wallet: Decimal,

    /// Mark price.
    #[serde(rename = "mp")]
    pub mark_price: Decimal,

    /// Unrealized PnL.
    #[serde(rename = "up")]
    pub unrealized_pnl: Decimal,

    /// Maintenance margin required.
    #[serde(rename = "mm")]
    pub maintenance_margin: Decimal,
}

// =============================================================================
// TRADE_LITE
// =============================================================================

/// `TRADE_LITE` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeLiteEvent {
    /// Event time (ms).
    #[serde(rename = "E")]
    pub event_time: i64,

    /// Transaction time (ms).
    #[serde(rename = "T")]
    pub transaction_time: i64,

    /// Symbol.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Original quantity.
    #[serde(rename = "q")]
    pub original_qty: Decimal,

    /// Original price.
    #[serde(rename = "p")]
    pub original_price: Decimal,

    /// Whether this trade is the maker side.
    #[serde(rename = "m")]
    pub is_maker: bool,

    /// Client order ID.
    #[serde(rename = "c")]
    pub client_order_id: String,

    /// Side.
    #[serde(rename = "S")]
    pub side: String,

    /// Last filled price.
    #[serde(rename = "L")]
    pub last_filled_price: Decimal,

    /// Last filled quantity.
    #[serde(rename = "l")]
    pub last_filled_qty: Decimal,

    /// Trade ID.
    #[serde(rename = "t")]
    pub trade_id: i64,

    /// Order ID.
    #[serde(rename = "i")]
    pub order_id: i64,
}

// =============================================================================
// listenKeyExpired
// =============================================================================

/// `listenKeyExpired` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenKeyExpiredEvent {
    /// Event time (ms).
    #[serde(rename = "E")]
    pub event_time: i64,

    /// The expired listen key.
    #[serde(rename = "listenKey", default)]
    pub listen_key: String,
}
