//! Applications served by the stack
//!
//! - HTTP: single-line GET responder behind TCP port 80

pub mod http;

pub use http::{http_parse, http_reply, HttpHeader};
