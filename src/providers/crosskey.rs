//! Crosskey (Ålandsbanken / Tapiola) payment forms.
//!
//! Same SOLO lineage as Nordea but with `AAB_` field names, a receiver
//! account and name in the form, and a protocol revision that moved the MAC
//! from MD5 to SHA-256 (`AAB_ALG` 03). The return leg keeps whichever
//! algorithm the outbound leg uses.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::amount::comma_2dp;
use crate::config::ProviderParams;
use crate::providers::PaymentProvider;
use crate::reference::generate_reference_number;
use crate::signing::{amp_delimited, hash_hex_upper, HashAlg};
use crate::{Error, Fields, PaymentDetails, Result};

pub struct CrosskeyProvider {
    merchant_id: String,
    account: String,
    receiver_name: String,
    secret: String,
    url: String,
    language: String,
    algorithm: HashAlg,
}

impl CrosskeyProvider {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        let algorithm = match params.or_default("algorithm", "sha256") {
            "sha256" => HashAlg::Sha256,
            "md5" => HashAlg::Md5,
            other => {
                return Err(Error::InvalidParameter {
                    parameter: "algorithm",
                    reason: format!("unsupported algorithm '{other}', expected md5 or sha256"),
                })
            }
        };
        Ok(Self {
            merchant_id: params.required("identifier")?.to_owned(),
            account: params.required("account")?.to_owned(),
            receiver_name: params.required("receiverName")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            url: params.required("url")?.to_owned(),
            language: params.or_default("language", "fi").to_owned(),
            algorithm,
        })
    }
}

#[async_trait]
impl PaymentProvider for CrosskeyProvider {
    async fn generate_details(
        &self,
        identifier: &str,
        amount: Decimal,
        return_url: &str,
        error_url: &str,
        _message: &str,
    ) -> Result<PaymentDetails> {
        let reference = generate_reference_number(identifier);
        let formatted_amount = comma_2dp(amount);
        let mut fields = Fields::new();
        fields.insert("AAB_VERSION", "0002");
        fields.insert("AAB_STAMP", identifier);
        fields.insert("AAB_RCV_ID", &self.merchant_id);
        fields.insert("AAB_RCV_ACCOUNT", &self.account);
        fields.insert("AAB_RCV_NAME", &self.receiver_name);
        fields.insert("AAB_AMOUNT", &formatted_amount);
        fields.insert("AAB_REF", &reference);
        fields.insert("AAB_DATE", "EXPRESS");
        fields.insert("AAB_RETURN", return_url);
        fields.insert("AAB_CANCEL", error_url);
        fields.insert("AAB_REJECT", error_url);
        fields.insert("AAB_CONFIRM", "YES");
        fields.insert("AAB_KEYVERS", "0001");
        fields.insert("AAB_CUR", "EUR");
        fields.insert(
            "AAB_LANGUAGE",
            if self.language.starts_with("sv") { "2" } else { "1" },
        );
        fields.insert("BV_UseBVCookie", "NO");
        if self.algorithm == HashAlg::Sha256 {
            fields.insert("AAB_ALG", "03");
        }
        let mac = hash_hex_upper(
            self.algorithm,
            &amp_delimited(&[
                "0002",
                identifier,
                &self.merchant_id,
                &formatted_amount,
                &reference,
                "EXPRESS",
                "EUR",
                &self.secret,
            ]),
        );
        fields.insert("AAB_MAC", mac);
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
        let returned_ref = fields.get("AAB-RETURN-REF").unwrap_or_default();
        if reference != returned_ref {
            tracing::warn!(
                expected = %reference,
                found = %returned_ref,
                "reference number mismatch in return fields"
            );
            return Ok(false);
        }
        let expected = hash_hex_upper(
            self.algorithm,
            &amp_delimited(&[
                fields.get("AAB-RETURN-VERSION").unwrap_or_default(),
                fields.get("AAB-RETURN-STAMP").unwrap_or_default(),
                fields.get("AAB-RETURN-REF").unwrap_or_default(),
                fields.get("AAB-RETURN-PAID").unwrap_or_default(),
                self.secret.as_str(),
            ]),
        );
        if expected == fields.get("AAB-RETURN-MAC").unwrap_or_default() {
            return Ok(true);
        }
        tracing::warn!("MAC check failed in return fields");
        Ok(false)
    }
}
