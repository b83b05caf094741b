//! Nordea Sweden direct payment forms.
//!
//! A SOLO variant that signs with HMAC-SHA256 instead of a bare hash. The
//! canonical string has no trailing delimiter, the key is hex-decoded, and
//! only the first 32 hex characters of the tag go on the wire.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::amount::grouped_comma_2dp;
use crate::config::ProviderParams;
use crate::providers::PaymentProvider;
use crate::reference::generate_reference_number;
use crate::signing::{hex_key, hmac_sha256_hex};
use crate::{Fields, PaymentDetails, Result};

const DEFAULT_URL: &str = "https://solo3.nordea.fi/cgi-bin/SOLOPM01";

pub struct NordeaSwedenProvider {
    account: String,
    key: Vec<u8>,
    key_version: String,
    currency: String,
    url: String,
}

impl NordeaSwedenProvider {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            account: params.required("account")?.to_owned(),
            key: hex_key("secret", params.required("secret")?)?,
            key_version: params.required("kvv")?.to_owned(),
            currency: params.or_default("currency", "SEK").to_owned(),
            url: params.or_default("url", DEFAULT_URL).to_owned(),
        })
    }

    fn truncated_hmac(&self, canonical: &str) -> String {
        hmac_sha256_hex(&self.key, canonical)[..32].to_uppercase()
    }
}

#[async_trait]
impl PaymentProvider for NordeaSwedenProvider {
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
        let mut fields = Fields::new();
        fields.insert("NB_VERSION", "0002");
        fields.insert("NB_RCV_ID", &self.account);
        fields.insert("NB_STAMP", &reference);
        fields.insert("NB_DB_AMOUNT", &formatted_amount);
        fields.insert("NB_DB_CUR", &self.currency);
        fields.insert("NB_DB_REF", &reference);
        fields.insert("NB_RETURN", return_url);
        fields.insert("NB_CANCEL", error_url);
        fields.insert("NB_REJECT", error_url);
        let canonical = format!(
            "{}&{}&{}&{}&{}",
            self.account, reference, formatted_amount, self.currency, reference
        );
        fields.insert("NB_HMAC", self.truncated_hmac(&canonical));
        fields.insert("NB_KVV", &self.key_version);
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
        let returned_ref = fields.get("NB_RETURN_DB_REF").unwrap_or_default();
        if reference != returned_ref {
            tracing::warn!(
                expected = %reference,
                found = %returned_ref,
                "reference number mismatch in return fields"
            );
            return Ok(false);
        }
        let canonical = format!(
            "{}&{}&{}&{}&{}",
            fields.get("NB_RETURN_STAMP").unwrap_or_default(),
            fields.get("NB_RETURN_DB_AMOUNT").unwrap_or_default(),
            fields.get("NB_RETURN_DB_CUR").unwrap_or_default(),
            fields.get("NB_RETURN_DB_REF").unwrap_or_default(),
            fields.get("NB_PAID").unwrap_or_default(),
        );
        if self.truncated_hmac(&canonical) == fields.get("NB_HMAC").unwrap_or_default() {
            return Ok(true);
        }
        tracing::warn!("HMAC check failed in return fields");
        Ok(false)
    }
}
