//! Live ranking connections.
//!
//! A client connects to one (competition, category) topic with an optional
//! identity. Authorized connections are registered with the
//! [`TopicHub`](crate::broadcast::TopicHub), receive `initial_ranking`
//! immediately, and then get every `ranking_update` pushed to the topic.
//! Denied connections are closed with code [`CLOSE_ACCESS_DENIED`].
//!
//! The transport (WebSocket framing, ping frames) belongs to the server; this
//! module only speaks the JSON message contract in [`messages`].

pub mod access;
pub mod gateway;
pub mod messages;
pub mod rate_limiter;

pub use access::{CLOSE_ACCESS_DENIED, can_view};
pub use gateway::{GatewayError, LiveConnection, LiveGateway, LiveSession};
pub use messages::{ClientMessage, ServerMessage};
pub use rate_limiter::{ConnectionLimiter, RateLimitExceeded, RateLimiter};
