//! Hosted payment portal sessions.
//!
//! The portal collects card data on the provider's page. The shop opens a
//! session with a form-encoded `init` call, then embeds or redirects to the
//! returned portal URL. The shopper comes back through the return URL, see
//! [`settlement`](crate::settlement).

use tracing::{info, instrument};
use url::Url;

use crate::{
    config::{ConfigResolver, ConfigSource, Endpoints, PresentationMode},
    error::{ErrorContext, GatewayError, Result, keys},
    gateway::active_config,
    mapper::{
        NormalizedReply, WirePayload,
        fields::{limit, reply, request, value},
        format_amount, subtype,
    },
    model::{AvsAddress, Flow},
    transport::{BodyEncoding, DsiTransport, HttpExchange, RetryPolicy},
};

/// Input for [`HostedPortal::init_session`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortalSessionRequest {
    /// Tenant whose configuration applies.
    pub tenant_id: Option<String>,
    /// Shop order number (`MFORDR`).
    pub order_number: String,
    /// Shop transaction id, echoed back on return (`MFREFR`).
    pub transaction_id: String,
    /// Amount in minor units.
    pub amount_minor: u64,
    /// Flow override; the tenant's configured flow when `None`.
    pub flow: Option<Flow>,
    /// Billing address; `name` is not sent.
    pub billing: AvsAddress,
    /// Shipping zip (`MFDSTZ`); billing zip when `None` or empty.
    pub shipping_zip: Option<String>,
    /// Shopper email (`MFUSER`); `guest` when absent.
    pub customer_email: Option<String>,
    /// Shop customer number (`MPCUSF`).
    pub customer_number: Option<String>,
    /// Where the portal sends the shopper afterwards (`MPTRGT`).
    pub return_url: Option<String>,
    /// Customer id override.
    pub customer_code: Option<String>,
    /// Merchant code override.
    pub merchant_code: Option<String>,
}

/// An opened portal session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalSession {
    /// Provider session id (`MFSESS`).
    pub session_id: String,
    /// URL to embed or redirect to.
    pub portal_url: String,
    /// Presentation the URL was built for.
    pub presentation: PresentationMode,
    /// Flow the session was opened with.
    pub flow: Flow,
}

/// Portal client, borrowed from a [`Gateway`](crate::Gateway).
#[derive(Debug)]
pub struct HostedPortal<'g, S, E> {
    resolver: &'g ConfigResolver<S>,
    transport: &'g DsiTransport<E>,
    endpoints: &'g Endpoints,
}

impl<'g, S: ConfigSource, E: HttpExchange> HostedPortal<'g, S, E> {
    pub(crate) const fn new(
        resolver: &'g ConfigResolver<S>,
        transport: &'g DsiTransport<E>,
        endpoints: &'g Endpoints,
    ) -> Self {
        Self { resolver, transport, endpoints }
    }

    /// Opens a portal session.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] for a blank order number or transaction id
    /// - [`GatewayError::Configuration`] if the tenant is disabled or lacks credentials
    /// - [`GatewayError::Gateway`] if the reply has no session id
    /// - transport errors as for [`DsiTransport::send`]
    #[instrument(
        skip(self, session),
        fields(order = %session.order_number, tenant = session.tenant_id.as_deref().unwrap_or("-"))
    )]
    pub async fn init_session(&self, session: &PortalSessionRequest) -> Result<PortalSession> {
        if session.order_number.trim().is_empty() {
            return Err(GatewayError::invalid_request("order number must not be blank"));
        }
        if session.transaction_id.trim().is_empty() {
            return Err(GatewayError::invalid_request("transaction id must not be blank"));
        }

        let tenant = session.tenant_id.as_deref();
        let config = active_config(self.resolver, tenant)?;
        let flow = session.flow.unwrap_or_else(|| config.flow());
        let credentials = config.credentials();

        let customer = non_empty(session.customer_code.as_deref()).unwrap_or(credentials.customer_id.as_str());
        let merchant = non_empty(session.merchant_code.as_deref()).unwrap_or(credentials.merchant_code.as_str());

        let payload = init_payload(session, flow, customer, merchant);

        let base = self.endpoints.plp_base_url(config.sandbox());
        let init_url = portal_url(base, &[("action", "init")])?;
        let policy = RetryPolicy::from_config(&config);

        let raw = self.transport.send(init_url.as_str(), &payload, BodyEncoding::Form, &policy).await?;

        let view = NormalizedReply::new(&raw);
        let Some(session_id) = view.text(reply::SESSION).filter(|s| !s.trim().is_empty()) else {
            let code = view.text(reply::RESULT).filter(|c| !c.is_empty());
            let message = view.text(reply::TEXT).or_else(|| Some("portal init returned no session".to_owned()));
            return Err(GatewayError::gateway(
                code.unwrap_or_else(|| "NOSESS".to_owned()),
                message,
                &raw,
                ErrorContext::new().with(keys::TENANT, tenant.unwrap_or("-")),
            ));
        };

        let presentation = config.presentation();
        let portal_url =
            String::from(portal_url(base, &[("MFSESS", session_id.as_str()), ("mode", presentation.as_str())])?);

        info!(presentation = presentation.as_str(), flow = %flow, "portal session opened");
        Ok(PortalSession { session_id, portal_url, presentation, flow })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn init_payload(session: &PortalSessionRequest, flow: Flow, customer: &str, merchant: &str) -> WirePayload {
    let billing = &session.billing;
    let mut payload = WirePayload::new();

    payload.insert(request::CUSTOMER, customer);
    payload.insert(request::MERCHANT, merchant);
    payload.insert(request::TYPE, value::TYPE_RA);
    payload.insert(request::SUBTYPE, subtype(flow));
    payload.insert(request::METHOD, value::METHOD_PORTAL);
    payload.insert(request::ORDER, session.order_number.as_str());
    payload.insert(request::REFERENCE, session.transaction_id.as_str());
    payload.insert_opt(request::STREET, billing.street.as_deref().map(str::trim), limit::STREET);
    payload.insert_opt(request::CITY, billing.city.as_deref(), limit::CITY);
    payload.insert_opt(request::STATE, billing.state.as_deref(), limit::STATE_PORTAL);
    payload.insert_opt(request::ZIP, billing.zip.as_deref(), limit::ZIP);
    payload.insert_opt(
        request::DEST_ZIP,
        non_empty(session.shipping_zip.as_deref()).or(billing.zip.as_deref()),
        limit::ZIP,
    );
    payload.insert(request::AMOUNT, format_amount(session.amount_minor));
    payload.insert(
        request::USER,
        non_empty(session.customer_email.as_deref()).unwrap_or(value::GUEST_USER),
    );
    payload.insert_opt(request::PORTAL_TARGET, session.return_url.as_deref(), usize::MAX);
    payload.insert(request::PORTAL_CUSTOMER, customer);
    payload.insert_opt(request::PORTAL_CUSTOMER_NUMBER, session.customer_number.as_deref(), usize::MAX);

    payload
}

fn portal_url(base: &str, query: &[(&str, &str)]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| GatewayError::configuration(format!("invalid portal base URL '{base}': {e}"), None))?;
    url.query_pairs_mut().clear().extend_pairs(query);
    Ok(url)
}
