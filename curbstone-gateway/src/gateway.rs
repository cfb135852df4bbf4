//! Authorization facade.
//!
//! [`Gateway`] wires the pipeline: resolve configuration for the request's
//! tenant, map the request, send it through the retry engine and map the
//! reply. Nothing is cached between calls.

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use tracing::{info, instrument};

use crate::{
    config::{ConfigResolver, ConfigSource, Endpoints, GatewayConfig},
    error::{GatewayError, Result},
    mapper::{AuthorizeMapper, DsiMapper},
    model::{AuthorizeRequest, AuthorizeResponse},
    portal::HostedPortal,
    transport::{BodyEncoding, DsiTransport, HttpExchange, RetryPolicy},
};

/// Resolves configuration and refuses disabled or incomplete tenants.
pub(crate) fn active_config<S: ConfigSource>(
    resolver: &ConfigResolver<S>,
    tenant: Option<&str>,
) -> Result<GatewayConfig> {
    let config = resolver.resolve(tenant)?;
    if !config.enabled() {
        return Err(GatewayError::configuration("gateway is disabled", tenant));
    }
    config.credentials().ensure_complete(tenant)?;
    Ok(config)
}

/// Card authorization seam.
///
/// Implemented by [`Gateway`]; hosts depend on this trait so tests can
/// substitute a double.
pub trait PaymentGateway: Send + Sync {
    /// Authorizes one payment.
    ///
    /// A decline is a successful call returning
    /// [`AuthorizationStatus::Declined`](crate::model::AuthorizationStatus::Declined).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when authorization did not happen:
    ///
    /// - [`GatewayError::Configuration`] if the tenant is disabled or any
    ///   credential is empty, before any network call
    /// - [`GatewayError::Transport`], [`GatewayError::Http`] or
    ///   [`GatewayError::Parse`] from the transport, after retries
    fn authorize<'a>(
        &'a self,
        request: &'a AuthorizeRequest,
    ) -> impl Future<Output = Result<AuthorizeResponse>> + Send + 'a;
}

/// The Curbstone gateway.
///
/// # Examples
///
/// ```rust,no_run
/// use curbstone_gateway::{
///     Gateway, PaymentGateway,
///     config::{ConfigResolver, MemoryConfigSource, keys},
///     model::AuthorizeRequest,
///     transport::ReqwestExchange,
/// };
///
/// # async fn example() -> curbstone_gateway::Result<()> {
/// let source = MemoryConfigSource::new()
///     .with_global(keys::ENABLED, true)
///     .with_global(keys::DSI_KEY, "dsi-key")
///     .with_global(keys::CUSTOMER_ID, "00001")
///     .with_global(keys::MERCHANT_CODE, "99998");
///
/// let gateway = Gateway::new(ConfigResolver::new(source), ReqwestExchange::new());
/// let response = gateway.authorize(&AuthorizeRequest::new(1234, "USD", "ORD-1")?).await?;
/// println!("{} {:?}", response.status(), response.token());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Gateway<S, E, M = DsiMapper> {
    resolver: ConfigResolver<S>,
    transport: DsiTransport<E>,
    mapper: M,
    endpoints: Endpoints,
}

impl<S: ConfigSource, E: HttpExchange> Gateway<S, E> {
    /// Creates a gateway with the default mapper and provider endpoints.
    pub fn new(resolver: ConfigResolver<S>, exchange: E) -> Self {
        Self { resolver, transport: DsiTransport::new(exchange), mapper: DsiMapper, endpoints: Endpoints::default() }
    }
}

impl<S: ConfigSource, E: HttpExchange, M: AuthorizeMapper> Gateway<S, E, M> {
    /// Replaces the provider endpoints.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Replaces the mapper.
    pub fn with_mapper<M2: AuthorizeMapper>(self, mapper: M2) -> Gateway<S, E, M2> {
        Gateway { resolver: self.resolver, transport: self.transport, mapper, endpoints: self.endpoints }
    }

    /// Configuration resolver.
    pub const fn resolver(&self) -> &ConfigResolver<S> {
        &self.resolver
    }

    /// Retry engine.
    pub const fn transport(&self) -> &DsiTransport<E> {
        &self.transport
    }

    /// Provider endpoints.
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Hosted payment portal bound to this gateway's configuration and transport.
    pub const fn portal(&self) -> HostedPortal<'_, S, E> {
        HostedPortal::new(&self.resolver, &self.transport, &self.endpoints)
    }

    #[instrument(
        skip(self, request),
        fields(order = request.order_number(), tenant = request.tenant_id().unwrap_or("-"))
    )]
    async fn authorize_inner(&self, request: &AuthorizeRequest) -> Result<AuthorizeResponse> {
        let config = active_config(&self.resolver, request.tenant_id())?;

        let payload = self.mapper.to_payload(request, config.credentials());
        let url = self.endpoints.dsi_base_url(config.sandbox());
        let policy = RetryPolicy::from_config(&config);

        let raw = self.transport.send(url, &payload, BodyEncoding::Json, &policy).await?;
        let response = self.mapper.from_response(raw);

        info!(
            status = %response.status(),
            has_token = response.token().is_some(),
            network_ref = response.network_ref(),
            "authorization complete"
        );
        Ok(response)
    }
}

impl<S, E, M> PaymentGateway for Gateway<S, E, M>
where
    S: ConfigSource,
    E: HttpExchange,
    M: AuthorizeMapper,
{
    fn authorize<'a>(
        &'a self,
        request: &'a AuthorizeRequest,
    ) -> impl Future<Output = Result<AuthorizeResponse>> + Send + 'a {
        self.authorize_inner(request)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{
        config::{MemoryConfigSource, keys},
        error::GatewayErrorKind,
        model::AuthorizationStatus,
        transport::{ExchangeReply, ExchangeRequest, TransportFault},
    };

    #[derive(Debug, Default)]
    struct RecordingExchange {
        calls: AtomicUsize,
        last_url: Mutex<Option<String>>,
        body: &'static str,
    }

    impl HttpExchange for RecordingExchange {
        async fn execute<'a>(&'a self, request: &'a ExchangeRequest) -> std::result::Result<ExchangeReply, TransportFault> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_url.lock().unwrap() = Some(request.url.clone());
            Ok(ExchangeReply::new(200, self.body))
        }

        fn protocol_name(&self) -> &'static str {
            "recording"
        }
    }

    fn source() -> MemoryConfigSource {
        MemoryConfigSource::new()
            .with_global(keys::ENABLED, true)
            .with_global(keys::DSI_KEY, "dsi-key")
            .with_global(keys::CUSTOMER_ID, "00001")
            .with_global(keys::MERCHANT_CODE, "99998")
    }

    fn exchange(body: &'static str) -> Arc<RecordingExchange> {
        Arc::new(RecordingExchange { body, ..RecordingExchange::default() })
    }

    #[tokio::test]
    async fn test_approved_round_trip_uses_sandbox_url() {
        let exchange = exchange(r#"{"MFRTRN":"UG","MFUKEY":"tok_1","MFRREF":"R-1"}"#);
        let gateway = Gateway::new(ConfigResolver::new(source()), Arc::clone(&exchange));

        let request = AuthorizeRequest::new(1234, "USD", "ORD-1").unwrap();
        let response = gateway.authorize(&request).await.unwrap();

        assert_eq!(response.status(), AuthorizationStatus::Approved);
        assert_eq!(response.token(), Some("tok_1"));
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
        assert_eq!(exchange.last_url.lock().unwrap().as_deref(), Some("https://c3sbx.net/dsi/"));
    }

    #[tokio::test]
    async fn test_production_url_when_sandbox_off() {
        let exchange = exchange(r#"{"MFRTRN":"UN"}"#);
        let gateway =
            Gateway::new(ConfigResolver::new(source().with_global(keys::SANDBOX, false)), Arc::clone(&exchange));

        let response = gateway.authorize(&AuthorizeRequest::new(1, "USD", "ORD-2").unwrap()).await.unwrap();
        assert_eq!(response.status(), AuthorizationStatus::Declined);
        assert_eq!(exchange.last_url.lock().unwrap().as_deref(), Some("https://c3dsi.net/dsi/"));
    }

    #[tokio::test]
    async fn test_disabled_gateway_makes_no_call() {
        let exchange = exchange("{}");
        let gateway =
            Gateway::new(ConfigResolver::new(source().with_global(keys::ENABLED, false)), Arc::clone(&exchange));

        let err = gateway.authorize(&AuthorizeRequest::new(1, "USD", "ORD-3").unwrap()).await.unwrap_err();
        assert_eq!(err.kind(), GatewayErrorKind::Configuration);
        assert!(err.to_string().contains("disabled"));
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_make_no_call() {
        let exchange = exchange("{}");
        let gateway =
            Gateway::new(ConfigResolver::new(source().with_global(keys::DSI_KEY, "")), Arc::clone(&exchange));

        let err = gateway.authorize(&AuthorizeRequest::new(1, "USD", "ORD-4").unwrap()).await.unwrap_err();
        assert_eq!(err.kind(), GatewayErrorKind::Configuration);
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tenant_config_is_used() {
        let source = source().with_tenant("eu", keys::SANDBOX, false);
        let exchange = exchange(r#"{"MFRTRN":"UG"}"#);
        let gateway = Gateway::new(ConfigResolver::new(source), Arc::clone(&exchange));

        let request = AuthorizeRequest::new(1, "EUR", "ORD-5").unwrap().with_tenant("eu");
        gateway.authorize(&request).await.unwrap();
        assert_eq!(exchange.last_url.lock().unwrap().as_deref(), Some("https://c3dsi.net/dsi/"));
    }

    #[tokio::test]
    async fn test_custom_endpoints() {
        let exchange = exchange(r#"{"MFRTRN":"UG"}"#);
        let endpoints = Endpoints { dsi_sandbox: "http://127.0.0.1:1/dsi/".to_owned(), ..Endpoints::default() };
        let gateway = Gateway::new(ConfigResolver::new(source()), Arc::clone(&exchange)).with_endpoints(endpoints);

        gateway.authorize(&AuthorizeRequest::new(1, "USD", "ORD-6").unwrap()).await.unwrap();
        assert_eq!(exchange.last_url.lock().unwrap().as_deref(), Some("http://127.0.0.1:1/dsi/"));
    }
}
