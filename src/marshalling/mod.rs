//! Bidirectional codecs between value objects and their flat, storage-safe
//! representations. Composition is strictly bottom-up: token, then pool,
//! then route, then cached route, then cached routes. Marshalling is pure;
//! unmarshalling fails loudly on anything it does not recognize.

pub mod cached_route;
pub mod cached_routes;
pub mod pool;
pub mod route;
pub mod token;

use std::fmt;

use crate::models::routes::RouteError;

#[derive(Debug)]
pub enum MarshalError {
    /// A stored route carries a protocol tag this build does not know.
    /// New variants are added over time; dropping the row silently would
    /// lose data, so decoding refuses instead.
    UnknownProtocol(String),
    UnknownTradeType(String),
    InvalidNumber {
        field: &'static str,
        value: String,
    },
    InvalidRoute(RouteError),
    Json(serde_json::Error),
}

impl fmt::Display for MarshalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarshalError::UnknownProtocol(tag) => write!(f, "unknown protocol tag: {}", tag),
            MarshalError::UnknownTradeType(tag) => write!(f, "unknown trade type: {}", tag),
            MarshalError::InvalidNumber { field, value } => {
                write!(f, "field {} holds an unparseable number: {}", field, value)
            }
            MarshalError::InvalidRoute(err) => write!(f, "stored route is inconsistent: {}", err),
            MarshalError::Json(err) => write!(f, "malformed stored blob: {}", err),
        }
    }
}

impl std::error::Error for MarshalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MarshalError::InvalidRoute(err) => Some(err),
            MarshalError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RouteError> for MarshalError {
    fn from(err: RouteError) -> Self {
        MarshalError::InvalidRoute(err)
    }
}

impl From<serde_json::Error> for MarshalError {
    fn from(err: serde_json::Error) -> Self {
        MarshalError::Json(err)
    }
}
