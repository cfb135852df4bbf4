//! reqwest-backed [`HttpExchange`].

use std::sync::LazyLock;

use reqwest::Client;
use tracing::{debug, instrument};

use super::{
    ExchangeReply, ExchangeRequest, FaultKind, HttpExchange, TransportFault,
    config::{HttpConfig, HttpVersion},
};
use crate::error::{GatewayError, Result};

/// Shared client for [`ReqwestExchange::new`], so default exchanges share one pool.
static DEFAULT_HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    let config = HttpConfig::default();
    build_client(&config).unwrap_or_else(|_| Client::new())
});

fn build_client(config: &HttpConfig) -> std::result::Result<Client, reqwest::Error> {
    let builder = Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(config.user_agent.as_str());

    let builder = match config.http_version {
        HttpVersion::Http1 => builder.http1_only(),
        HttpVersion::Http2 => builder.http2_prior_knowledge(),
        HttpVersion::Auto => builder,
    };

    builder.build()
}

/// Classifies a reqwest error into a [`TransportFault`].
fn classify(error: reqwest::Error) -> TransportFault {
    let kind = if error.is_timeout() {
        FaultKind::Timeout
    } else if error.is_connect() {
        FaultKind::Connect
    } else if error.is_body() || error.is_decode() {
        FaultKind::Body
    } else if error.is_builder() || error.is_redirect() {
        FaultKind::Request
    } else if error.is_request() {
        // Failed mid-send, after the connection was up.
        FaultKind::Connect
    } else {
        FaultKind::Request
    };
    TransportFault::new(kind, error.to_string()).with_source(error)
}

/// Production exchange using reqwest.
///
/// # Examples
///
/// ```
/// use curbstone_gateway::transport::{HttpConfig, HttpExchange, HttpVersion, ReqwestExchange};
///
/// let config = HttpConfig { http_version: HttpVersion::Http1, ..HttpConfig::default() };
/// let exchange = ReqwestExchange::with_config(&config)?;
/// assert_eq!(exchange.protocol_name(), "http/1.1");
/// # Ok::<(), curbstone_gateway::GatewayError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestExchange {
    client: Client,
    http_version: HttpVersion,
}

impl Default for ReqwestExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestExchange {
    /// Creates an exchange on the shared default client.
    #[must_use]
    pub fn new() -> Self {
        Self { client: DEFAULT_HTTP_CLIENT.clone(), http_version: HttpVersion::Auto }
    }

    /// Creates an exchange with its own client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] if `config` is out of bounds or
    /// the client cannot be built.
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(config)
            .map_err(|e| GatewayError::configuration(format!("cannot build HTTP client: {e}"), None))?;
        Ok(Self { client, http_version: config.http_version })
    }
}

impl HttpExchange for ReqwestExchange {
    #[instrument(skip(self, request), fields(url = %request.url, bytes = request.body.len()))]
    async fn execute<'a>(&'a self, request: &'a ExchangeRequest) -> std::result::Result<ExchangeReply, TransportFault> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder.body(request.body.clone()).send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?.to_vec();

        debug!(status, bytes = body.len(), "exchange complete");
        Ok(ExchangeReply { status, body })
    }

    fn protocol_name(&self) -> &'static str {
        match self.http_version {
            HttpVersion::Http1 => "http/1.1",
            HttpVersion::Http2 => "http/2",
            HttpVersion::Auto => "http",
        }
    }
}
