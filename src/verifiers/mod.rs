//! Remote payment-status verifiers.
//!
//! Where the synchronous browser return is missing, untrusted, or simply
//! not enough, these adapters ask the provider's own status service whether
//! a payment actually went through. Every call takes a cancellation token;
//! a cancelled in-flight request surfaces as [`Error::Cancelled`].
//!
//! Outcome mapping is strict: "paid" answers are `Ok(true)`, "not found" or
//! "not paid" answers are `Ok(false)`, and anything outside the service's
//! documented response grammar is a [`Error::Protocol`] carrying the raw
//! payload, because an unparseable answer means the integration is broken,
//! not that the payment failed.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::config::ProviderParams;
use crate::{Error, Result};

pub mod assist;
pub mod crosskey;
pub mod danske;
pub mod maksekeskus;
pub mod nordea;
pub mod osuuspankki;
pub mod samlink;

/// A remote payment-status lookup.
#[async_trait]
pub trait VerificationProvider: Send + Sync {
    /// Asks the provider whether the payment identified by `identifier` has
    /// completed. When `expected_amount` is given, a completed payment over
    /// a different amount does not count as verified.
    async fn verify_payment(
        &self,
        identifier: &str,
        expected_amount: Option<Decimal>,
        cancel: &CancellationToken,
    ) -> Result<bool>;
}

/// Instantiates a verifier by name from an initialization string.
pub fn create(name: &str, parameter_string: &str) -> Result<Arc<dyn VerificationProvider>> {
    let params = ProviderParams::parse(parameter_string);
    let verifier: Arc<dyn VerificationProvider> = match name.to_ascii_lowercase().as_str() {
        "assist" => Arc::new(assist::AssistVerifier::from_params(&params)?),
        "crosskey" => Arc::new(crosskey::CrosskeyVerifier::from_params(&params)?),
        "danske" => Arc::new(danske::DanskeVerifier::from_params(&params)?),
        "maksekeskus" => Arc::new(maksekeskus::MaksekeskusVerifier::from_params(&params)?),
        "nordea" => Arc::new(nordea::NordeaVerifier::from_params(&params)?),
        "osuuspankki" => Arc::new(osuuspankki::OsuuspankkiVerifier::from_params(&params)?),
        "samlink" => Arc::new(samlink::SamlinkVerifier::from_params(&params)?),
        _ => {
            return Err(Error::InvalidParameter {
                parameter: "verifier",
                reason: format!("unknown verifier '{name}'"),
            })
        }
    };
    Ok(verifier)
}

/// Sends a prepared request, racing it against caller cancellation.
pub(crate) async fn send_cancellable(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<reqwest::Response> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        response = request.send() => Ok(response?),
    }
}
