//! `curbstone-smoke`: authorize one payment and dump the provider reply.
//!
//! ```text
//! curbstone-smoke --config curbstone.toml 1234 ORD-SMOKE-1 eu
//! ```
//!
//! The configuration file holds the gateway settings under `[global]` and
//! `[tenants.<id>]`, plus optional `[http]` and `[endpoints]` tables. The
//! exit code is success only for an approved authorization.

#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest"
)]

mod observability;

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use curbstone_gateway::{
    Gateway, GatewayError, PaymentGateway,
    config::{ConfigResolver, Endpoints, ResolverDefaults, TomlConfigSource},
    model::{AuthorizationStatus, AuthorizeRequest, AuthorizeResponse},
    transport::{HttpConfig, ReqwestExchange},
};
use serde::Deserialize;
use tracing::debug;

use crate::observability::{LogFormat, init_observability};

#[derive(Parser, Debug)]
#[command(name = "curbstone-smoke", version)]
#[command(about = "Authorize via the Curbstone gateway and dump the raw response", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, short, value_name = "PATH", env = "CURBSTONE_CONFIG")]
    config: Option<PathBuf>,

    /// ISO currency code
    #[arg(long, default_value = "EUR")]
    currency: String,

    /// Amount in minor units (1234 = 12.34)
    #[arg(default_value_t = 1234)]
    amount: u64,

    /// Order number
    #[arg(default_value = "ORD-SMOKE-1")]
    order: String,

    /// Tenant id; global settings when omitted
    tenant: Option<String>,
}

/// Transport sections of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TransportFile {
    http: HttpConfig,
    endpoints: Endpoints,
}

fn load(path: Option<&PathBuf>) -> curbstone_gateway::Result<(TomlConfigSource, TransportFile)> {
    let Some(path) = path else {
        return Ok((TomlConfigSource::default(), TransportFile::default()));
    };
    let content = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::configuration(format!("cannot read config file {}: {e}", path.display()), None)
    })?;
    parse(&content)
}

fn parse(content: &str) -> curbstone_gateway::Result<(TomlConfigSource, TransportFile)> {
    let source = TomlConfigSource::from_toml(content)?;
    let transport: TransportFile = toml::from_str(content)
        .map_err(|e| GatewayError::configuration(format!("invalid [http]/[endpoints] section: {e}"), None))?;
    Ok((source, transport))
}

fn mode_label(enabled: bool, sandbox: bool) -> &'static str {
    match (enabled, sandbox) {
        (false, _) => "DISABLED (no network)",
        (true, true) => "SANDBOX (live call)",
        (true, false) => "PRODUCTION (live call)",
    }
}

fn print_response(response: &AuthorizeResponse) {
    println!("Status:      {}", response.status());
    println!("Token:       {}", response.token().unwrap_or("-"));
    println!("Network Ref: {}", response.network_ref().unwrap_or("-"));
    println!("Message:     {}", response.message().unwrap_or("-"));

    if !response.raw().is_empty() {
        println!();
        println!("Raw Curbstone response (MF*):");
        match serde_json::to_string_pretty(response.raw()) {
            Ok(json) => println!("{json}"),
            Err(_) => println!("{:?}", response.raw()),
        }
    }
}

fn print_error(err: &GatewayError) {
    println!();
    println!("Curbstone error: {err}");
    if !err.context().is_empty() {
        match serde_json::to_string(err.context()) {
            Ok(json) => println!("Context: {json}"),
            Err(_) => println!("Context: {:?}", err.context()),
        }
    }
}

async fn run(args: Args) -> curbstone_gateway::Result<AuthorizeResponse> {
    let (source, transport) = load(args.config.as_ref())?;
    let resolver = ConfigResolver::with_defaults(source, ResolverDefaults::from_env());

    let tenant = args.tenant.as_deref().filter(|t| !t.is_empty());
    let config = resolver.resolve(tenant)?;
    println!("Mode: {}", mode_label(config.enabled(), config.sandbox()));
    debug!(?config, "resolved configuration");

    let exchange = ReqwestExchange::with_config(&transport.http)?;
    let gateway = Gateway::new(resolver, exchange).with_endpoints(transport.endpoints);

    let mut request = AuthorizeRequest::new(args.amount, args.currency, args.order)?;
    if let Some(tenant) = tenant {
        request = request.with_tenant(tenant);
    }
    gateway.authorize(&request).await
}

#[tokio::main]
async fn main() -> ExitCode {
    init_observability(LogFormat::from_env());
    let args = Args::parse();

    match run(args).await {
        Ok(response) => {
            print_response(&response);
            if response.status() == AuthorizationStatus::Approved { ExitCode::SUCCESS } else { ExitCode::FAILURE }
        }
        Err(err) => {
            print_error(&err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use curbstone_gateway::{config::ConfigSource, transport::HttpVersion};

    use super::*;

    #[test]
    fn test_positional_defaults() {
        let args = Args::try_parse_from(["curbstone-smoke"]).unwrap();
        assert_eq!(args.amount, 1234);
        assert_eq!(args.order, "ORD-SMOKE-1");
        assert_eq!(args.currency, "EUR");
        assert!(args.tenant.is_none());
    }

    #[test]
    fn test_positional_overrides() {
        let args = Args::try_parse_from(["curbstone-smoke", "--config", "c.toml", "500", "ORD-9", "eu"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("c.toml")));
        assert_eq!(args.amount, 500);
        assert_eq!(args.order, "ORD-9");
        assert_eq!(args.tenant.as_deref(), Some("eu"));
    }

    #[test]
    fn test_rejects_non_numeric_amount() {
        assert!(Args::try_parse_from(["curbstone-smoke", "12.34"]).is_err());
    }

    #[test]
    fn test_parse_full_file() {
        let (source, transport) = parse(
            r#"
            [global.Curbstone.config]
            enabled = true
            sandbox = false

            [http]
            timeout_secs = 15
            http_version = "http1"

            [endpoints]
            dsi_production = "http://127.0.0.1:9000/dsi/"
            "#,
        )
        .unwrap();

        assert_eq!(source.get("Curbstone.config.sandbox", None), Some(false.into()));
        assert_eq!(transport.http.timeout_secs, 15);
        assert_eq!(transport.http.http_version, HttpVersion::Http1);
        assert_eq!(transport.endpoints.dsi_base_url(false), "http://127.0.0.1:9000/dsi/");
        assert_eq!(transport.endpoints.dsi_base_url(true), "https://c3sbx.net/dsi/");
    }

    #[test]
    fn test_parse_rejects_unknown_http_field() {
        assert!(parse("[http]\nretries = 3").is_err());
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = load(Some(&PathBuf::from("/nonexistent/curbstone.toml"))).unwrap_err();
        assert!(err.to_string().contains("cannot read config file"));
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(mode_label(false, true), "DISABLED (no network)");
        assert_eq!(mode_label(true, true), "SANDBOX (live call)");
        assert_eq!(mode_label(true, false), "PRODUCTION (live call)");
    }
}
