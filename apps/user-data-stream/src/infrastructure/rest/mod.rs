//! REST Services
//!
//! Parameter-accumulating request builders dispatched through a
//! [`RestTransport`](crate::application::ports::RestTransport).

mod rebate;

pub use rebate::{BrokerFuturesRebateService, BrokerRebateService};
