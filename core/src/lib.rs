//! Blocking client for the Bassa download-management server.
//!
//! # Overview
//! Every server endpoint (user accounts, the download queue, file
//! compression) is a method on [`Bassa`]. A call validates its arguments,
//! builds a form-encoded request, sends it through a [`Transport`], and
//! classifies the status under a [`RetryPolicy`].
//!
//! # Design
//! - [`BassaApi`] is pure: `build_*` produces an [`HttpRequest`], `parse_*`
//!   consumes an [`HttpResponse`]. It can be used without any transport.
//! - [`Bassa`] holds no mutable state. The login token and server key live
//!   in a caller-held [`Session`].
//! - One retry loop serves every endpoint. Terminal statuses surface as
//!   [`BassaError::ServerRejected`]; retryable statuses that outlast the
//!   policy surface as [`BassaError::RetriesExhausted`].
//!
//! ```no_run
//! use bassa_core::{Bassa, ClientConfig};
//!
//! # fn main() -> Result<(), bassa_core::BassaError> {
//! let bassa = Bassa::connect(&ClientConfig::new("http://localhost:5000"))?;
//! let session = bassa.login("rand", "pass")?;
//! bassa.add_download(&session, "https://example.com/file.jpg")?;
//! let queued = bassa.downloads(&session, 1)?;
//! println!("{queued}");
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod retry;
pub mod session;
pub mod transport;
pub mod types;

pub use address::BaseUrl;
pub use api::BassaApi;
pub use client::Bassa;
pub use config::{ClientConfig, RetryConfig, RetryMode};
pub use error::BassaError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use retry::{Backoff, RetryOn, RetryPolicy};
pub use session::Session;
pub use transport::{Transport, UreqTransport};
pub use types::{AuthLevel, NewUser, UserUpdate};
