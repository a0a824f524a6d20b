//! Client configuration loaded from environment variables.

use std::time::Duration;

use common::Money;
use reqwest::Url;
use thiserror::Error;

/// The configured base URL cannot have paths appended to it.
#[derive(Debug, Error)]
#[error("Invalid base URL {base_url}: {reason}")]
pub struct InvalidBaseUrl {
    pub base_url: String,
    pub reason: String,
}

/// Cart and checkout client configuration.
///
/// Reads from environment variables:
/// - `STOREFRONT_API_URL`: server base URL (default: `"http://localhost:3000"`)
/// - `STOREFRONT_TIMEOUT_SECS`: per-request timeout (default: `10`)
/// - `STOREFRONT_SHIPPING_FEE_CENTS`: flat shipping fee (default: `500`)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub shipping_fee: Money,
    /// Device storage key of the anonymous cart.
    pub storage_key: String,
}

impl ClientConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("STOREFRONT_API_URL").unwrap_or(defaults.base_url),
            request_timeout: std::env::var("STOREFRONT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            shipping_fee: std::env::var("STOREFRONT_SHIPPING_FEE_CENTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Money::from_cents)
                .unwrap_or(defaults.shipping_fee),
            storage_key: defaults.storage_key,
        }
    }

    /// Builds a URL under the configured base from raw path segments.
    ///
    /// Each segment is percent-encoded, so ids may hold `/`, `?` or `#`.
    pub fn url(&self, segments: &[&str]) -> Result<Url, InvalidBaseUrl> {
        let invalid = |reason: String| InvalidBaseUrl {
            base_url: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            request_timeout: Duration::from_secs(10),
            shipping_fee: Money::from_cents(500),
            storage_key: "storefront-cart".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.shipping_fee.cents(), 500);
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = ClientConfig {
            base_url: "http://127.0.0.1:8080/".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.url(&["orders"]).unwrap().as_str(),
            "http://127.0.0.1:8080/orders"
        );
    }

    #[test]
    fn test_url_encodes_reserved_characters_in_segments() {
        let config = ClientConfig {
            base_url: "http://127.0.0.1:8080/shop".to_string(),
            ..ClientConfig::default()
        };
        let url = config.url(&["carts", "u1", "items", "SKU#7/a?b"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8080/shop/carts/u1/items/SKU%237%2Fa%3Fb"
        );
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_url_rejects_unusable_base() {
        let config = ClientConfig {
            base_url: "not a url".to_string(),
            ..ClientConfig::default()
        };
        assert!(config.url(&["orders"]).is_err());
    }
}
