//! Configuration sources.
//!
//! A [`ConfigSource`] is the host's key/value store. Values are loosely
//! typed; the resolver coerces them.

use std::{collections::HashMap, path::Path};

use serde_json::Value;

use crate::error::{GatewayError, Result};

/// Loosely typed configuration store keyed by an optional tenant.
///
/// `get(key, Some(tenant))` returns only the tenant-scoped value and
/// `get(key, None)` only the global one; layering is done by the resolver.
/// `None` and `Value::Null` both mean "not set".
pub trait ConfigSource: Send + Sync {
    /// Looks up `key` in the given scope.
    fn get(&self, key: &str, tenant: Option<&str>) -> Option<Value>;
}

impl<T: ConfigSource + ?Sized> ConfigSource for &T {
    fn get(&self, key: &str, tenant: Option<&str>) -> Option<Value> {
        (**self).get(key, tenant)
    }
}

impl<T: ConfigSource + ?Sized> ConfigSource for std::sync::Arc<T> {
    fn get(&self, key: &str, tenant: Option<&str>) -> Option<Value> {
        (**self).get(key, tenant)
    }
}

/// In-memory source, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigSource {
    global: HashMap<String, Value>,
    tenants: HashMap<String, HashMap<String, Value>>,
}

impl MemoryConfigSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a global value.
    #[must_use]
    pub fn with_global(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.global.insert(key.into(), value.into());
        self
    }

    /// Sets a tenant-scoped value.
    #[must_use]
    pub fn with_tenant(
        mut self,
        tenant: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.tenants.entry(tenant.into()).or_default().insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for MemoryConfigSource {
    fn get(&self, key: &str, tenant: Option<&str>) -> Option<Value> {
        match tenant {
            Some(tenant) => self.tenants.get(tenant)?.get(key).cloned(),
            None => self.global.get(key).cloned(),
        }
    }
}

/// Source backed by a TOML document.
///
/// The document has a `[global]` table and optional `[tenants.<id>]`
/// tables. Nested tables are flattened into dotted keys, so these two
/// spellings are equivalent:
///
/// ```toml
/// [global.Curbstone.config]
/// dsiKey = "secret"
///
/// [global]
/// "Curbstone.config.dsiKey" = "secret"
/// ```
///
/// Other top-level tables are ignored, so the same file can carry
/// transport settings.
///
/// # Examples
///
/// ```
/// use curbstone_gateway::config::{ConfigSource, TomlConfigSource};
///
/// let source = TomlConfigSource::from_toml(r#"
///     [global.Curbstone.config]
///     sandbox = true
///
///     [tenants.eu.Curbstone.config]
///     merchantCode = "99998"
/// "#)?;
///
/// assert_eq!(source.get("Curbstone.config.sandbox", None), Some(true.into()));
/// assert_eq!(source.get("Curbstone.config.merchantCode", Some("eu")), Some("99998".into()));
/// # Ok::<(), curbstone_gateway::GatewayError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct TomlConfigSource {
    inner: MemoryConfigSource,
}

impl TomlConfigSource {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] if the document is not valid
    /// TOML or `global`/`tenants` are not tables.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let document: toml::Table = toml::from_str(toml_str)
            .map_err(|e| GatewayError::configuration(format!("invalid TOML config: {e}"), None))?;

        let mut inner = MemoryConfigSource::new();

        if let Some(global) = document.get("global") {
            let table = global.as_table().ok_or_else(|| {
                GatewayError::configuration("'global' must be a table", None)
            })?;
            flatten_into(table, "", &mut inner.global);
        }

        if let Some(tenants) = document.get("tenants") {
            let tenants = tenants.as_table().ok_or_else(|| {
                GatewayError::configuration("'tenants' must be a table", None)
            })?;
            for (tenant, settings) in tenants {
                let table = settings.as_table().ok_or_else(|| {
                    GatewayError::configuration(format!("tenant '{tenant}' must be a table"), Some(tenant.as_str()))
                })?;
                flatten_into(table, "", inner.tenants.entry(tenant.clone()).or_default());
            }
        }

        Ok(Self { inner })
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            GatewayError::configuration(
                format!("cannot read config file {}: {e}", path.as_ref().display()),
                None,
            )
        })?;
        Self::from_toml(&content)
    }
}

impl ConfigSource for TomlConfigSource {
    fn get(&self, key: &str, tenant: Option<&str>) -> Option<Value> {
        self.inner.get(key, tenant)
    }
}

fn flatten_into(table: &toml::Table, prefix: &str, out: &mut HashMap<String, Value>) {
    for (key, value) in table {
        let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
        match value {
            toml::Value::Table(nested) => flatten_into(nested, &path, out),
            toml::Value::String(s) => {
                out.insert(path, Value::from(s.as_str()));
            }
            toml::Value::Integer(i) => {
                out.insert(path, Value::from(*i));
            }
            toml::Value::Float(f) => {
                out.insert(path, Value::from(*f));
            }
            toml::Value::Boolean(b) => {
                out.insert(path, Value::from(*b));
            }
            toml::Value::Datetime(dt) => {
                out.insert(path, Value::from(dt.to_string()));
            }
            toml::Value::Array(_) => {
                // Arrays have no scalar meaning; keep them so coercion can reject them.
                if let Ok(json) = serde_json::to_value(value) {
                    out.insert(path, json);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_scopes_are_separate() {
        let source = MemoryConfigSource::new()
            .with_global("Curbstone.config.retries", 3)
            .with_tenant("eu", "Curbstone.config.sandbox", false);

        assert_eq!(source.get("Curbstone.config.retries", None), Some(Value::from(3)));
        assert_eq!(source.get("Curbstone.config.retries", Some("eu")), None);
        assert_eq!(source.get("Curbstone.config.sandbox", Some("eu")), Some(Value::from(false)));
        assert_eq!(source.get("Curbstone.config.sandbox", Some("us")), None);
    }

    #[test]
    fn test_toml_source_flattens_nested_tables() {
        let source = TomlConfigSource::from_toml(
            r#"
            [global.Curbstone.config]
            enabled = true
            retries = 4
            backoffMs = 250.5

            [global]
            "Curbstone.config.dsiKey" = "quoted-key"

            [tenants.eu.Curbstone.config]
            merchantCode = "99998"
            "#,
        )
        .unwrap();

        assert_eq!(source.get("Curbstone.config.enabled", None), Some(Value::from(true)));
        assert_eq!(source.get("Curbstone.config.retries", None), Some(Value::from(4)));
        assert_eq!(source.get("Curbstone.config.backoffMs", None), Some(Value::from(250.5)));
        assert_eq!(source.get("Curbstone.config.dsiKey", None), Some(Value::from("quoted-key")));
        assert_eq!(
            source.get("Curbstone.config.merchantCode", Some("eu")),
            Some(Value::from("99998"))
        );
    }

    #[test]
    fn test_toml_source_ignores_other_tables() {
        let source = TomlConfigSource::from_toml(
            r#"
            [http]
            timeout_secs = 15
            "#,
        )
        .unwrap();

        assert_eq!(source.get("http.timeout_secs", None), None);
    }

    #[test]
    fn test_toml_source_rejects_invalid_document() {
        assert!(TomlConfigSource::from_toml("global = [").is_err());
        assert!(TomlConfigSource::from_toml("global = 3").is_err());
        assert!(TomlConfigSource::from_toml("[tenants]\neu = 1").is_err());
    }

    #[test]
    fn test_toml_source_from_missing_file() {
        let err = TomlConfigSource::from_file("/nonexistent/curbstone.toml").unwrap_err();
        assert!(err.to_string().contains("cannot read config file"));
    }

    #[test]
    fn test_source_through_reference() {
        let source = MemoryConfigSource::new().with_global("k", "v");
        let by_ref: &dyn ConfigSource = &source;
        assert_eq!(by_ref.get("k", None), Some(Value::from("v")));
    }
}
