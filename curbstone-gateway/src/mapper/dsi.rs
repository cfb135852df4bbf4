//! Default mapper for the DSI authorization API.

use serde_json::Value;

use super::{
    AuthorizeMapper, WirePayload,
    fields::{code, limit, reply, request, value},
    format_amount, truncate,
};
use crate::{
    config::Credentials,
    model::{AuthorizationStatus, AuthorizeRequest, AuthorizeResponse, Flow, ReplyMap},
};

/// Field-code mapper for direct (non-portal) authorizations.
#[derive(Debug, Clone, Copy, Default)]
pub struct DsiMapper;

impl DsiMapper {
    /// Creates the mapper.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// `MFTYP2` value for a flow.
pub(crate) const fn subtype(flow: Flow) -> &'static str {
    match flow {
        Flow::AuthCapture => value::SUBTYPE_SALE,
        Flow::AuthOnly => value::SUBTYPE_PREAUTH,
    }
}

impl AuthorizeMapper for DsiMapper {
    fn to_payload(&self, req: &AuthorizeRequest, credentials: &Credentials) -> WirePayload {
        let mut payload = WirePayload::new();

        payload.insert(request::DSI_MARKER, value::DSI_MARKER);
        payload.insert(request::DSI_KEY, credentials.dsi_key.as_str());
        payload.insert(
            request::CUSTOMER,
            req.customer_code().filter(|c| !c.is_empty()).unwrap_or(credentials.customer_id.as_str()),
        );
        payload.insert(
            request::MERCHANT,
            req.merchant_code().filter(|m| !m.is_empty()).unwrap_or(credentials.merchant_code.as_str()),
        );
        payload.insert(request::TYPE, value::TYPE_RA);
        payload.insert(request::SUBTYPE, subtype(req.flow()));
        payload.insert(request::AMOUNT, format_amount(req.amount_minor()));
        payload.insert(request::CURRENCY, req.currency().to_ascii_uppercase());
        payload.insert(request::REFERENCE, truncate(req.order_number(), limit::REFERENCE));
        payload.insert(request::USER, value::USER_TAG);
        payload.insert(request::METHOD, value::METHOD_DSI);

        payload.insert_opt(request::TOKEN, req.previous_token(), usize::MAX);

        if let Some(avs) = req.avs() {
            payload.insert_opt(request::NAME, avs.name.as_deref(), limit::NAME);
            payload.insert_opt(request::STREET, avs.street.as_deref(), limit::STREET);
            payload.insert_opt(request::CITY, avs.city.as_deref(), limit::CITY);
            payload.insert_opt(request::STATE, avs.state.as_deref(), limit::STATE_DSI);
            payload.insert_opt(request::ZIP, avs.zip.as_deref(), limit::ZIP);
        }

        payload.insert_opt(request::PORTAL_CUSTOMER, req.customer_code(), usize::MAX);
        payload.insert_opt(request::PORTAL_CUSTOMER_NUMBER, req.customer_number(), usize::MAX);
        payload.insert_opt(request::PORTAL_TARGET, req.return_url(), usize::MAX);

        payload
    }

    fn from_response(&self, raw: ReplyMap) -> AuthorizeResponse {
        let view = NormalizedReply::new(&raw);

        let result_code = view.text(reply::RESULT).unwrap_or_default().to_ascii_uppercase();
        let status = match result_code.as_str() {
            code::APPROVED => AuthorizationStatus::Approved,
            code::DECLINED => AuthorizationStatus::Declined,
            _ => AuthorizationStatus::Error,
        };

        let mut message = view.text(reply::TEXT).unwrap_or_default();
        if status == AuthorizationStatus::Error
            && let Some(fatal) = view.text(reply::FATAL).filter(|f| !f.is_empty())
        {
            message = format!("{message} {fatal}").trim().to_owned();
        }

        let network_ref = view
            .text(reply::RETRIEVAL_REF)
            .filter(|r| !r.is_empty())
            .or_else(|| view.text(reply::NETWORK_REF));

        AuthorizeResponse::new(status, view.text(reply::TOKEN), network_ref, Some(message), raw)
    }
}

/// Case-insensitive view over a reply.
pub(crate) struct NormalizedReply<'a> {
    entries: Vec<(String, &'a Value)>,
}

impl<'a> NormalizedReply<'a> {
    pub(crate) fn new(raw: &'a ReplyMap) -> Self {
        Self { entries: raw.iter().map(|(k, v)| (k.to_ascii_uppercase(), v)).collect() }
    }

    /// Scalar value as text; null, arrays and objects count as absent.
    pub(crate) fn text(&self, code: &str) -> Option<String> {
        // Last one wins when keys differ only by case.
        let value = self.entries.iter().rev().find(|(k, _)| k == code).map(|(_, v)| *v)?;
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::AvsAddress;

    fn credentials() -> Credentials {
        Credentials::new("dsi-key", "00001", "99998")
    }

    fn reply_map(value: Value) -> ReplyMap {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test replies are objects"),
        }
    }

    #[test]
    fn test_minimal_payload() {
        let request = AuthorizeRequest::new(1234, "usd", "ORD-1").unwrap();
        let payload = DsiMapper.to_payload(&request, &credentials());

        assert_eq!(payload.get("MFDSIT"), Some("1"));
        assert_eq!(payload.get("MFDSIK"), Some("dsi-key"));
        assert_eq!(payload.get("MFCUST"), Some("00001"));
        assert_eq!(payload.get("MFMRCH"), Some("99998"));
        assert_eq!(payload.get("MFTYPE"), Some("RA"));
        assert_eq!(payload.get("MFTYP2"), Some("PA"));
        assert_eq!(payload.get("MFAMT1"), Some("12.34"));
        assert_eq!(payload.get("MFCURR"), Some("USD"));
        assert_eq!(payload.get("MFREFR"), Some("ORD-1"));
        assert_eq!(payload.get("MFUSER"), Some("SHOPWARE"));
        assert_eq!(payload.get("MFMETH"), Some("01"));
        assert_eq!(payload.len(), 11);
        assert!(!payload.contains("MFKEYP"));
    }

    #[test]
    fn test_auth_capture_uses_sale_subtype() {
        let request = AuthorizeRequest::new(100, "EUR", "ORD-2").unwrap().with_flow(Flow::AuthCapture);
        let payload = DsiMapper.to_payload(&request, &credentials());
        assert_eq!(payload.get("MFTYP2"), Some("SA"));
    }

    #[test]
    fn test_avs_fields_are_truncated_and_empty_omitted() {
        let avs = AvsAddress {
            name: Some("N".repeat(50)),
            street: Some(String::new()),
            city: Some("C".repeat(31)),
            state: Some("California".to_owned()),
            zip: Some("12345-67890-1".to_owned()),
        };
        let request = AuthorizeRequest::new(1, "USD", "ORD-3").unwrap().with_avs(avs);
        let payload = DsiMapper.to_payload(&request, &credentials());

        assert_eq!(payload.get("MFNAME").map(str::len), Some(40));
        assert!(!payload.contains("MFADD1"));
        assert_eq!(payload.get("MFCITY").map(str::len), Some(30));
        assert_eq!(payload.get("MFSTAT"), Some("Ca"));
        assert_eq!(payload.get("MFZIPC"), Some("12345-6789"));
    }

    #[test]
    fn test_long_order_number_truncated() {
        let order = "O".repeat(64);
        let request = AuthorizeRequest::new(1, "USD", order).unwrap();
        let payload = DsiMapper.to_payload(&request, &credentials());
        assert_eq!(payload.get("MFREFR").map(|r| r.chars().count()), Some(40));
    }

    #[test]
    fn test_request_overrides_and_portal_fields() {
        let request = AuthorizeRequest::new(1, "USD", "ORD-4")
            .unwrap()
            .with_previous_token("tok_prev")
            .with_customer_code("C-77")
            .with_merchant_code("M-88")
            .with_customer_number("10001")
            .with_return_url("https://shop.example/return");
        let payload = DsiMapper.to_payload(&request, &credentials());

        assert_eq!(payload.get("MFKEYP"), Some("tok_prev"));
        assert_eq!(payload.get("MFCUST"), Some("C-77"));
        assert_eq!(payload.get("MFMRCH"), Some("M-88"));
        assert_eq!(payload.get("MPCUST"), Some("C-77"));
        assert_eq!(payload.get("MPCUSF"), Some("10001"));
        assert_eq!(payload.get("MPTRGT"), Some("https://shop.example/return"));
    }

    #[test]
    fn test_empty_previous_token_omitted() {
        let request = AuthorizeRequest::new(1, "USD", "ORD-5").unwrap().with_previous_token("");
        let payload = DsiMapper.to_payload(&request, &credentials());
        assert!(!payload.contains("MFKEYP"));
    }

    #[test]
    fn test_payload_json_is_deterministic() {
        let request = AuthorizeRequest::new(999, "usd", "ORD-6").unwrap();
        let first = DsiMapper.to_payload(&request, &credentials()).to_json();
        let second = DsiMapper.to_payload(&request, &credentials()).to_json();

        assert_eq!(first, second);
        let decoded: Value = serde_json::from_slice(&first).unwrap();
        assert_eq!(decoded["MFAMT1"], "9.99");
    }

    #[test]
    fn test_approved_reply() {
        let raw = reply_map(json!({
            "MFRTRN": "UG",
            "MFUKEY": "tok_123",
            "MFRREF": "R-1",
            "MFRTXT": "Approved",
        }));
        let response = DsiMapper.from_response(raw.clone());

        assert_eq!(response.status(), AuthorizationStatus::Approved);
        assert_eq!(response.token(), Some("tok_123"));
        assert_eq!(response.network_ref(), Some("R-1"));
        assert_eq!(response.message(), Some("Approved"));
        assert_eq!(response.raw(), &raw);
    }

    #[test]
    fn test_declined_reply_lowercase_keys() {
        let raw = reply_map(json!({"mfrtrn": "un", "mfrtxt": "Insufficient funds", "mfnref": "N-9"}));
        let response = DsiMapper.from_response(raw);

        assert_eq!(response.status(), AuthorizationStatus::Declined);
        assert_eq!(response.message(), Some("Insufficient funds"));
        assert_eq!(response.network_ref(), Some("N-9"));
    }

    #[test]
    fn test_error_reply_appends_fatal() {
        let raw = reply_map(json!({"MFRTRN": "UL", "MFRTXT": "Failed", "MFATAL": "bad key"}));
        let response = DsiMapper.from_response(raw);

        assert_eq!(response.status(), AuthorizationStatus::Error);
        assert_eq!(response.message(), Some("Failed bad key"));
    }

    #[test]
    fn test_fatal_without_text_is_trimmed() {
        let raw = reply_map(json!({"MFATAL": "gateway down"}));
        let response = DsiMapper.from_response(raw);

        assert_eq!(response.status(), AuthorizationStatus::Error);
        assert_eq!(response.message(), Some("gateway down"));
    }

    #[test]
    fn test_fatal_ignored_on_approval() {
        let raw = reply_map(json!({"MFRTRN": "UG", "MFRTXT": "OK", "MFATAL": "noise"}));
        assert_eq!(DsiMapper.from_response(raw).message(), Some("OK"));
    }

    #[test]
    fn test_unknown_and_missing_codes_are_errors() {
        for raw in [json!({}), json!({"MFRTRN": ""}), json!({"MFRTRN": "ZZ"}), json!({"MFRTRN": null})] {
            let response = DsiMapper.from_response(reply_map(raw));
            assert_eq!(response.status(), AuthorizationStatus::Error);
            assert_eq!(response.token(), None);
            assert_eq!(response.network_ref(), None);
        }
    }

    #[test]
    fn test_non_string_scalars_rendered() {
        let raw = reply_map(json!({"MFRTRN": "UG", "MFRREF": 4_711, "MFUKEY": {"nested": true}}));
        let response = DsiMapper.from_response(raw);

        assert_eq!(response.network_ref(), Some("4711"));
        assert_eq!(response.token(), None);
    }

    #[test]
    fn test_empty_retrieval_ref_falls_back_to_network_ref() {
        let raw = reply_map(json!({"MFRTRN": "UG", "MFRREF": "", "MFNREF": "N-2"}));
        assert_eq!(DsiMapper.from_response(raw).network_ref(), Some("N-2"));
    }
}
