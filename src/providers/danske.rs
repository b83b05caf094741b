//! Danske Bank Finland payment forms (Vemaha, protocol version 4).
//!
//! The check value prepends the secret instead of appending it, and the
//! payload carries a due date (`ERAPAIVA`) taken from the clock, which is
//! why the clock is injectable here.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::amount::grouped_comma_2dp;
use crate::config::ProviderParams;
use crate::providers::PaymentProvider;
use crate::reference::generate_reference_number;
use crate::signing::{amp_delimited, hash_hex_upper, HashAlg};
use crate::{system_clock, Clock, Fields, PaymentDetails, Result};

const DEFAULT_URL: &str = "https://verkkopankki.danskebank.fi/SP/vemaha/VemahaApp";

pub struct DanskeProvider {
    account: String,
    secret: String,
    currency: String,
    url: String,
    clock: Clock,
}

impl DanskeProvider {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            account: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            currency: params.required("currency")?.to_owned(),
            url: params.or_default("url", DEFAULT_URL).to_owned(),
            clock: system_clock(),
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl PaymentProvider for DanskeProvider {
    async fn generate_details(
        &self,
        identifier: &str,
        amount: Decimal,
        return_url: &str,
        error_url: &str,
        _message: &str,
    ) -> Result<PaymentDetails> {
        let reference = generate_reference_number(identifier);
        let formatted_amount = grouped_comma_2dp(amount);
        let due_date = (self.clock)().format("%d.%m.%Y").to_string();
        let mut fields = Fields::new();
        fields.insert("KNRO", &self.account);
        fields.insert("SUMMA", &formatted_amount);
        fields.insert("VIITE", &reference);
        fields.insert("VALUUTTA", &self.currency);
        fields.insert("VERSIO", "4");
        fields.insert("ALG", "03");
        fields.insert("ERAPAIVA", &due_date);
        fields.insert("OKURL", return_url);
        fields.insert("VIRHEURL", error_url);
        let check = hash_hex_upper(
            HashAlg::Sha256,
            &amp_delimited(&[
                &self.secret,
                &formatted_amount,
                &reference,
                &self.account,
                "4",
                &self.currency,
                return_url,
                error_url,
                &due_date,
            ]),
        );
        fields.insert("TARKISTE", check);
        Ok(PaymentDetails {
            url: self.url.clone(),
            fields,
        })
    }

    async fn verify_response(
        &self,
        identifier: &str,
        _amount: Decimal,
        fields: &Fields,
    ) -> Result<bool> {
        let reference = generate_reference_number(identifier);
        let returned_ref = fields.get("VIITE").unwrap_or_default();
        if reference != returned_ref {
            tracing::warn!(
                expected = %reference,
                found = %returned_ref,
                "reference number mismatch in return fields"
            );
            return Ok(false);
        }
        let expected = hash_hex_upper(
            HashAlg::Sha256,
            &amp_delimited(&[
                self.secret.as_str(),
                fields.get("VIITE").unwrap_or_default(),
                fields.get("SUMMA").unwrap_or_default(),
                fields.get("STATUS").unwrap_or_default(),
                fields.get("KNRO").unwrap_or_default(),
                fields.get("VERSIO").unwrap_or_default(),
                fields.get("VALUUTTA").unwrap_or_default(),
                fields.get("ERAPAIVA").unwrap_or_default(),
            ]),
        );
        if expected == fields.get("TARKISTE").unwrap_or_default() {
            return Ok(true);
        }
        tracing::warn!("check value mismatch in return fields");
        Ok(false)
    }
}
