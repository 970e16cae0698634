//! Command endpoint client.
//!
//! * [`CommandClient`]: async trait implemented by all transports.
//! * [`HttpCommandClient`]: JSON over HTTP POST via `reqwest`.
//! * [`AssistantReply`] / [`StructuredResponse`]: reply payloads.
//! * [`ClientError`]: error variants for submissions.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_chat::client::{CommandClient, HttpCommandClient};
//! use voice_chat::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let client = HttpCommandClient::from_config(&config.endpoint);
//!
//!     match client.send("what time is it").await {
//!         Ok(reply) => println!("{:?}", reply.content_text()),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! ```

pub mod http;
pub mod protocol;

pub use http::{ClientError, CommandClient, HttpCommandClient};
pub use protocol::{AssistantReply, CommandRequest, CommandResponse, ImageItem, StructuredResponse};
