//! Payment-initiation and callback-verification adapters.
//!
//! Each supported bank or payment gateway speaks its own externally dictated
//! wire protocol: a fixed field layout, a fixed canonicalization order, and a
//! fixed MAC or signature primitive. This crate reproduces those protocols
//! bit-exactly, one adapter per provider, behind two capability traits:
//!
//! - [`PaymentProvider`](providers::PaymentProvider) generates the outbound
//!   field set (including the embedded MAC) and verifies synchronous
//!   callback fields.
//! - [`VerificationProvider`](verifiers::VerificationProvider) queries a
//!   provider's remote transaction-status service with a signed request.
//!
//! Adapters own their full configuration independently; nothing is shared
//! across providers because the protocols rarely generalize. Configuration
//! is parsed once at construction and a missing parameter fails there, never
//! at generate/verify time.
//!
//! # Example
//!
//! ```ignore
//! use maksu::providers::{self, PaymentProvider};
//! use rust_decimal_macros::dec;
//!
//! let provider = providers::create("nordea", "account=12345678&secret=LEHTI...")?;
//! let details = provider
//!     .generate_details("1000234", dec!(99.90), "https://shop/ok", "https://shop/err", "")
//!     .await?;
//! // redirect the customer to details.url with details.fields as a form POST
//! ```

use std::sync::Arc;

use chrono::NaiveDateTime;

pub mod amount;
pub mod cache;
pub mod config;
pub mod errors;
pub mod keys;
pub mod prelude;
pub mod providers;
pub mod reference;
pub mod signing;
pub mod verifiers;

pub use errors::Error;

/// Common result alias for maksu operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Injectable time source for providers whose payload embeds a timestamp.
///
/// Generation must be byte-identical for identical inputs under a fixed
/// clock, so anything time-dependent goes through this rather than reading
/// the system clock directly.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// The default clock: local wall-clock time.
pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Local::now().naive_local())
}

/// Insertion-ordered collection of wire-protocol fields.
///
/// Field names and their order are part of each provider's external
/// contract, so a plain map will not do: insertion order is preserved for
/// form submission. Lookup comes in two flavors because callback field
/// casing varies by provider: some send ordinal case-sensitive keys,
/// others match case-insensitively.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(String, String)>,
}

impl Fields {
    /// Creates an empty field collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing an existing value under the same
    /// (case-sensitive) name or appending at the end otherwise.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Case-sensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive lookup, for providers whose callback keys are not
    /// ordinal.
    pub fn get_ci(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no fields are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Fields {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut fields = Fields::new();
        for (n, v) in iter {
            fields.insert(n, v);
        }
        fields
    }
}

/// Outbound payment request: the target URL plus the ordered form fields,
/// signature field included. Handed to the caller for the browser redirect;
/// never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentDetails {
    /// Gateway endpoint the form is submitted to.
    pub url: String,
    /// Ordered form fields including the embedded MAC/signature field(s).
    pub fields: Fields,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_preserves_order_and_replaces() {
        let mut fields = Fields::new();
        fields.insert("b", "1");
        fields.insert("a", "2");
        fields.insert("b", "3");
        let collected: Vec<_> = fields.iter().collect();
        assert_eq!(collected, vec![("b", "3"), ("a", "2")]);
    }

    #[test]
    fn lookup_case_sensitivity() {
        let fields: Fields = [("ButikId", "9999")].into_iter().collect();
        assert_eq!(fields.get("ButikId"), Some("9999"));
        assert_eq!(fields.get("butikid"), None);
        assert_eq!(fields.get_ci("butikid"), Some("9999"));
    }
}
