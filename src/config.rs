//! Initialization-string parsing.
//!
//! Adapters are configured from a single URL-query-string style parameter
//! string (`account=123&secret=abc&url=https%3A%2F%2F...`). Values are
//! percent-decoded, which matters for providers whose configuration embeds
//! whole PEM blocks. The core only ever reads named keys; a required key
//! that is absent or empty is a configuration error raised at construction.

use std::collections::HashMap;

use crate::{Error, Result};

/// Parsed provider initialization parameters.
#[derive(Clone, Debug, Default)]
pub struct ProviderParams {
    entries: HashMap<String, String>,
}

impl ProviderParams {
    /// Parses a query-string style parameter string. Later duplicates of a
    /// key win.
    pub fn parse(parameter_string: &str) -> Self {
        let entries = url::form_urlencoded::parse(parameter_string.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { entries }
    }

    /// Returns a required parameter, failing with a configuration error if
    /// it is absent or empty.
    pub fn required(&self, name: &'static str) -> Result<&str> {
        match self.entries.get(name).map(String::as_str) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(Error::MissingParameter(name)),
        }
    }

    /// Returns an optional parameter; absent and empty are both `None`.
    pub fn optional(&self, name: &str) -> Option<&str> {
        self.entries
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Returns an optional parameter or the given default.
    pub fn or_default<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.optional(name).unwrap_or(default)
    }

    /// True when the parameter equals `"true"` (the convention used for
    /// test-mode flags).
    pub fn flag(&self, name: &str) -> bool {
        self.optional(name) == Some("true")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_decodes() {
        let params = ProviderParams::parse("account=123&url=https%3A%2F%2Fbank.example%2Fpay&testMode=true");
        assert_eq!(params.required("account").unwrap(), "123");
        assert_eq!(params.optional("url"), Some("https://bank.example/pay"));
        assert!(params.flag("testMode"));
        assert!(!params.flag("missing"));
    }

    #[test]
    fn missing_required_is_config_error() {
        let params = ProviderParams::parse("account=123");
        let err = params.required("secret").unwrap_err();
        assert!(matches!(err, Error::MissingParameter("secret")));
    }

    #[test]
    fn empty_counts_as_missing() {
        let params = ProviderParams::parse("secret=");
        assert!(params.required("secret").is_err());
        assert_eq!(params.optional("secret"), None);
    }

    #[test]
    fn plus_decodes_to_space() {
        let params = ProviderParams::parse("receiverName=Oy+Example+Ab");
        assert_eq!(params.optional("receiverName"), Some("Oy Example Ab"));
    }
}
