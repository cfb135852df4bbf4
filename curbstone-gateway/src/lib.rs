//! Curbstone Gateway: card authorization against the Curbstone payment provider
//!
//! A client library for the Curbstone DSI API and hosted payment portal. It
//! turns a provider-neutral [`AuthorizeRequest`](model::AuthorizeRequest)
//! into the provider's flat field-code payload, sends it with bounded
//! retries, and normalizes the reply into an
//! [`AuthorizeResponse`](model::AuthorizeResponse) or a typed
//! [`GatewayError`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   tenant    ┌────────────────┐
//! │ ConfigSource │────────────▶│ ConfigResolver │──▶ GatewayConfig
//! └──────────────┘             └────────────────┘         │
//!                                                         ▼
//! AuthorizeRequest ──▶ DsiMapper ──▶ WirePayload ──▶ DsiTransport ──▶ HttpExchange
//!                          ▲                          (retry loop)     (reqwest)
//! AuthorizeResponse ◀──────┴──────── ReplyMap ◀───────────┘
//! ```
//!
//! Every call resolves configuration afresh, so a host can change settings
//! between calls. Nothing is cached and no background task is spawned.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use curbstone_gateway::{
//!     Gateway, GatewayError, PaymentGateway,
//!     config::{ConfigResolver, TomlConfigSource},
//!     model::{AuthorizationStatus, AuthorizeRequest},
//!     transport::ReqwestExchange,
//! };
//!
//! # async fn example() -> curbstone_gateway::Result<()> {
//! let source = TomlConfigSource::from_toml(
//!     r#"
//!     [global]
//!     "Curbstone.config.enabled" = true
//!     "Curbstone.config.dsiKey" = "dsi-key"
//!     "Curbstone.config.customerId" = "00001"
//!     "Curbstone.config.merchantCode" = "99998"
//!     "#,
//! )?;
//! let gateway = Gateway::new(ConfigResolver::new(source), ReqwestExchange::new());
//!
//! let request = AuthorizeRequest::new(1234, "USD", "ORD-1")?;
//! match gateway.authorize(&request).await {
//!     Ok(response) if response.status() == AuthorizationStatus::Approved => {
//!         println!("approved, token {:?}", response.token());
//!     }
//!     Ok(response) => println!("{}: {:?}", response.status(), response.message()),
//!     Err(GatewayError::Http { status, .. }) => println!("provider answered HTTP {status}"),
//!     Err(e) => println!("authorization did not happen: {e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`config`]: configuration sources, layered resolution and endpoints
//! - [`model`]: request and response types
//! - [`mapper`]: field-code payloads and reply normalization
//! - [`transport`]: retrying POST engine over a pluggable HTTP exchange
//! - [`portal`]: hosted payment portal sessions
//! - [`settlement`]: portal return handling
//! - [`error`]: typed errors with structured context
//!
//! # Error Handling
//!
//! A returned [`GatewayError`] means authorization did not happen. A
//! provider decline or provider-side error is an `Ok` response with status
//! `DECLINED` or `ERROR`. Every error carries an
//! [`ErrorContext`](error::ErrorContext) with the request id and attempt
//! count where known.

#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest and wiremock"
)]

pub mod config;
pub mod error;
mod gateway;
pub mod mapper;
pub mod model;
pub mod portal;
pub mod settlement;
pub mod transport;

pub use error::{GatewayError, Result};
pub use gateway::{Gateway, PaymentGateway};
