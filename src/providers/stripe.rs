//! Stripe card charges behind a gateway form.
//!
//! Generation produces fields for the merchant's own checkout page with an
//! HMAC binding the message to the order. Verification exchanges the
//! returned card token for an actual charge through the Stripe API, so this
//! is one of the two adapters that performs I/O.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::amount::minor_units;
use crate::config::ProviderParams;
use crate::providers::PaymentProvider;
use crate::signing::hmac_sha256_hex;
use crate::{Fields, PaymentDetails, Result};

const DEFAULT_ENDPOINT: &str = "https://api.stripe.com/v1/";

pub struct StripeProvider {
    secret: String,
    gateway_url: String,
    endpoint: String,
    currency: String,
    client: reqwest::Client,
}

impl StripeProvider {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            secret: params.required("secret")?.to_owned(),
            gateway_url: params.required("gatewayUrl")?.to_owned(),
            endpoint: params.or_default("endpoint", DEFAULT_ENDPOINT).to_owned(),
            currency: params.or_default("currency", "EUR").to_owned(),
            client: reqwest::Client::new(),
        })
    }

    fn order_mac(&self, identifier: &str, minor_amount: &str, message: &str) -> String {
        hmac_sha256_hex(
            self.secret.as_bytes(),
            &format!("{identifier}{minor_amount}{message}"),
        )
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn generate_details(
        &self,
        identifier: &str,
        amount: Decimal,
        return_url: &str,
        error_url: &str,
        message: &str,
    ) -> Result<PaymentDetails> {
        let minor_amount = minor_units(amount);
        let mut fields = Fields::new();
        fields.insert("identifier", identifier);
        fields.insert("amount", &minor_amount);
        fields.insert("returnUrl", return_url);
        fields.insert("errorUrl", error_url);
        fields.insert("message", message);
        fields.insert("mac", self.order_mac(identifier, &minor_amount, message));
        Ok(PaymentDetails {
            url: self.gateway_url.clone(),
            fields,
        })
    }

    async fn verify_response(
        &self,
        identifier: &str,
        amount: Decimal,
        fields: &Fields,
    ) -> Result<bool> {
        let Some(token) = fields.get("stripeToken") else {
            return Ok(false);
        };
        let minor_amount = minor_units(amount);
        let mut form: Vec<(&str, &str)> = vec![
            ("amount", &minor_amount),
            ("currency", &self.currency),
            ("source", token),
        ];
        if let Some(message) = fields.get("message") {
            let expected = self.order_mac(identifier, &minor_amount, message);
            if fields.get("mac") != Some(expected.as_str()) {
                tracing::warn!("order message MAC mismatch, refusing to charge");
                return Ok(false);
            }
            form.push(("description", message));
        }
        let response = self
            .client
            .post(format!("{}charges", self.endpoint))
            .basic_auth(&self.secret, None::<&str>)
            .form(&form)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(true)
        } else {
            tracing::warn!(status = %response.status(), "charge was not accepted");
            Ok(false)
        }
    }
}
