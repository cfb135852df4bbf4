//! Provider field codes and length limits.

/// Request field codes.
pub mod request {
    /// DSI marker, always `1`.
    pub const DSI_MARKER: &str = "MFDSIT";
    /// DSI API key.
    pub const DSI_KEY: &str = "MFDSIK";
    /// Customer id.
    pub const CUSTOMER: &str = "MFCUST";
    /// Merchant code.
    pub const MERCHANT: &str = "MFMRCH";
    /// Transaction type, always `RA`.
    pub const TYPE: &str = "MFTYPE";
    /// Transaction subtype: `SA` sale or `PA` pre-authorization.
    pub const SUBTYPE: &str = "MFTYP2";
    /// Decimal amount.
    pub const AMOUNT: &str = "MFAMT1";
    /// ISO currency code.
    pub const CURRENCY: &str = "MFCURR";
    /// Merchant reference.
    pub const REFERENCE: &str = "MFREFR";
    /// Order number (portal only).
    pub const ORDER: &str = "MFORDR";
    /// Originating user tag.
    pub const USER: &str = "MFUSER";
    /// Entry method.
    pub const METHOD: &str = "MFMETH";
    /// Stored card token.
    pub const TOKEN: &str = "MFKEYP";
    /// Cardholder name.
    pub const NAME: &str = "MFNAME";
    /// Street.
    pub const STREET: &str = "MFADD1";
    /// City.
    pub const CITY: &str = "MFCITY";
    /// State.
    pub const STATE: &str = "MFSTAT";
    /// Billing zip.
    pub const ZIP: &str = "MFZIPC";
    /// Destination (shipping) zip.
    pub const DEST_ZIP: &str = "MFDSTZ";
    /// Portal customer code.
    pub const PORTAL_CUSTOMER: &str = "MPCUST";
    /// Portal customer number.
    pub const PORTAL_CUSTOMER_NUMBER: &str = "MPCUSF";
    /// Portal return target.
    pub const PORTAL_TARGET: &str = "MPTRGT";
}

/// Reply field codes.
pub mod reply {
    /// Result code.
    pub const RESULT: &str = "MFRTRN";
    /// Result text.
    pub const TEXT: &str = "MFRTXT";
    /// Fatal error detail.
    pub const FATAL: &str = "MFATAL";
    /// Retrieval reference.
    pub const RETRIEVAL_REF: &str = "MFRREF";
    /// Network reference.
    pub const NETWORK_REF: &str = "MFNREF";
    /// Issued card token.
    pub const TOKEN: &str = "MFUKEY";
    /// Portal session id.
    pub const SESSION: &str = "MFSESS";
}

/// Fixed request values.
pub mod value {
    /// `MFDSIT`.
    pub const DSI_MARKER: &str = "1";
    /// `MFTYPE`.
    pub const TYPE_RA: &str = "RA";
    /// `MFTYP2` for auth-and-capture.
    pub const SUBTYPE_SALE: &str = "SA";
    /// `MFTYP2` for auth-only.
    pub const SUBTYPE_PREAUTH: &str = "PA";
    /// `MFMETH` for direct API calls.
    pub const METHOD_DSI: &str = "01";
    /// `MFMETH` for portal sessions.
    pub const METHOD_PORTAL: &str = "02";
    /// `MFUSER` for direct API calls.
    pub const USER_TAG: &str = "SHOPWARE";
    /// `MFUSER` for a portal session without an email.
    pub const GUEST_USER: &str = "guest";
}

/// Result codes.
pub mod code {
    /// Approved.
    pub const APPROVED: &str = "UG";
    /// Declined.
    pub const DECLINED: &str = "UN";
}

/// Character limits.
pub mod limit {
    /// Merchant reference.
    pub const REFERENCE: usize = 40;
    /// Cardholder name.
    pub const NAME: usize = 40;
    /// Street.
    pub const STREET: usize = 40;
    /// City.
    pub const CITY: usize = 30;
    /// State, direct API.
    pub const STATE_DSI: usize = 2;
    /// State, portal.
    pub const STATE_PORTAL: usize = 10;
    /// Zip codes.
    pub const ZIP: usize = 10;
}
