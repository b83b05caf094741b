//! Payment initiation adapters.
//!
//! One module per bank or gateway protocol. Each adapter turns an order
//! (identifier, amount, return URLs, free-text message) into the exact form
//! field set its protocol dictates, MAC included, and checks the fields the
//! service posts back on the synchronous return leg.
//!
//! Adapters are self-contained: configuration is parsed once from the
//! initialization string at construction, and a missing or malformed
//! parameter fails there rather than on first use. The trait is async
//! because a few gateways (PayPal, Stripe) make real API calls during
//! generation or verification; the bank-form adapters complete immediately.
//!
//! # Example
//!
//! ```ignore
//! use maksu::providers::{self, PaymentProvider};
//! use rust_decimal_macros::dec;
//!
//! let provider = providers::create("osuuspankki", "account=MYYJA1&secret=...")?;
//! let details = provider
//!     .generate_details("12345", dec!(99.90), "https://shop/ok", "https://shop/err", "")
//!     .await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::config::ProviderParams;
use crate::{Error, Fields, PaymentDetails, Result};

pub mod assist;
pub mod crosskey;
pub mod danske;
pub mod dibs;
pub mod handelsbanken;
pub mod luottokunta;
pub mod maksekeskus;
pub mod nordea;
pub mod nordea_sweden;
pub mod osuuspankki;
pub mod paypal;
pub mod samlink;
pub mod sampo;
pub mod stripe;
pub mod swedbank;

/// A payment initiation protocol adapter.
///
/// `verify_response` covers the synchronous browser-return leg only; a
/// verification failure is an ordinary `Ok(false)`, reserved errors are for
/// transport and configuration problems. Adapters never log secrets.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Generates the outbound payment request for an order.
    async fn generate_details(
        &self,
        identifier: &str,
        amount: Decimal,
        return_url: &str,
        error_url: &str,
        message: &str,
    ) -> Result<PaymentDetails>;

    /// Checks the fields posted back by the service against the order.
    async fn verify_response(
        &self,
        identifier: &str,
        amount: Decimal,
        fields: &Fields,
    ) -> Result<bool>;
}

/// Instantiates a provider by name from an initialization string.
pub fn create(name: &str, parameter_string: &str) -> Result<Arc<dyn PaymentProvider>> {
    let params = ProviderParams::parse(parameter_string);
    let provider: Arc<dyn PaymentProvider> = match name.to_ascii_lowercase().as_str() {
        "assist" => Arc::new(assist::AssistProvider::from_params(&params)?),
        "crosskey" => Arc::new(crosskey::CrosskeyProvider::from_params(&params)?),
        "danske" => Arc::new(danske::DanskeProvider::from_params(&params)?),
        "dibs" => Arc::new(dibs::DibsProvider::from_params(&params)?),
        "handelsbanken" => Arc::new(handelsbanken::HandelsbankenProvider::from_params(&params)?),
        "luottokunta" => Arc::new(luottokunta::LuottokuntaProvider::from_params(&params)?),
        "maksekeskus" => Arc::new(maksekeskus::MaksekeskusProvider::from_params(&params)?),
        "nordea" => Arc::new(nordea::NordeaProvider::from_params(&params)?),
        "nordea-sweden" => Arc::new(nordea_sweden::NordeaSwedenProvider::from_params(&params)?),
        "osuuspankki" => Arc::new(osuuspankki::OsuuspankkiProvider::from_params(&params)?),
        "paypal" => Arc::new(paypal::PayPalProvider::from_params(&params)?),
        "samlink" => Arc::new(samlink::SamlinkProvider::from_params(&params)?),
        "sampo" => Arc::new(sampo::SampoProvider::from_params(&params)?),
        "stripe" => Arc::new(stripe::StripeProvider::from_params(&params)?),
        "swedbank" => Arc::new(swedbank::SwedbankProvider::from_params(&params)?),
        _ => {
            return Err(Error::InvalidParameter {
                parameter: "provider",
                reason: format!("unknown provider '{name}'"),
            })
        }
    };
    Ok(provider)
}
