//! Port Interfaces
//!
//! ## Driven Ports (Outbound)
//!
//! - `RestTransport`: signs and dispatches REST calls for the rebate services

mod rest_port;

pub use rest_port::{HttpMethod, RestError, RestRequest, RestTransport, SecurityType};

#[cfg(test)]
pub use rest_port::MockRestTransport;
