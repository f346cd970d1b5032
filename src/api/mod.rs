//! HTTP API
//!
//! Plain-text and JSON endpoints over the metric repository:
//! - POST /update/{kind}/{name}/{value}
//! - POST /update (JSON record body)
//! - GET /value/{kind}/{name}
//! - GET / (all metrics)
//! - GET /stats (service counters)

mod handlers;
mod http;
mod server;

pub use handlers::{route, ApiState};
pub use http::{Request, Response, MAX_BODY_BYTES};
pub use server::{start_api_server, ApiServer};
