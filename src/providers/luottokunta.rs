//! Luottokunta card payment forms (DMP HTML payments).
//!
//! Amounts are minor units truncated downwards, never rounded. Revision 2
//! of the merchant agreement replaced MD5 with SHA-256 in both MACs; the
//! revision is part of the configuration.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::amount::minor_units_floor;
use crate::config::ProviderParams;
use crate::providers::PaymentProvider;
use crate::signing::{concatenated, hash_hex_upper, HashAlg};
use crate::{Error, Fields, PaymentDetails, Result};

const DEFAULT_URL: &str = "https://dmp2.luottokunta.fi/dmp/html_payments";

pub struct LuottokuntaProvider {
    account: String,
    secret: String,
    url: String,
    algorithm: HashAlg,
}

impl LuottokuntaProvider {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        let algorithm = match params.or_default("revision", "1") {
            "1" => HashAlg::Md5,
            "2" => HashAlg::Sha256,
            other => {
                return Err(Error::InvalidParameter {
                    parameter: "revision",
                    reason: format!("unsupported revision '{other}', expected 1 or 2"),
                })
            }
        };
        Ok(Self {
            account: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            url: params.or_default("url", DEFAULT_URL).to_owned(),
            algorithm,
        })
    }
}

#[async_trait]
impl PaymentProvider for LuottokuntaProvider {
    async fn generate_details(
        &self,
        identifier: &str,
        amount: Decimal,
        return_url: &str,
        error_url: &str,
        message: &str,
    ) -> Result<PaymentDetails> {
        let formatted_amount = minor_units_floor(amount);
        let mut fields = Fields::new();
        fields.insert("Merchant_Number", &self.account);
        fields.insert("Card_Details_Transmit", "0");
        fields.insert("Language", "FI");
        fields.insert("Device_Category", "1");
        fields.insert("Order_ID", identifier);
        fields.insert("Amount", &formatted_amount);
        fields.insert("Currency_Code", "978");
        fields.insert("Order_Description", message);
        fields.insert("Success_Url", return_url);
        fields.insert("Failure_Url", error_url);
        fields.insert("Cancel_Url", error_url);
        fields.insert("Transaction_Type", "1");
        let mac = hash_hex_upper(
            self.algorithm,
            &concatenated(&[
                &self.account,
                identifier,
                &formatted_amount,
                "1",
                &self.secret,
            ]),
        );
        fields.insert("Authentication_Mac", mac);
        Ok(PaymentDetails {
            url: self.url.clone(),
            fields,
        })
    }

    async fn verify_response(
        &self,
        identifier: &str,
        amount: Decimal,
        fields: &Fields,
    ) -> Result<bool> {
        let formatted_amount = minor_units_floor(amount);
        let expected = hash_hex_upper(
            self.algorithm,
            &concatenated(&[
                &self.secret,
                "1",
                &formatted_amount,
                identifier,
                &self.account,
            ]),
        );
        if expected == fields.get("LKMAC").unwrap_or_default() {
            return Ok(true);
        }
        tracing::warn!("MAC check failed in return fields");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn provider(revision: &str) -> LuottokuntaProvider {
        LuottokuntaProvider::from_params(&ProviderParams::parse(&format!(
            "account=1234567&secret=SECRET&revision={revision}"
        )))
        .unwrap()
    }

    #[tokio::test]
    async fn generates_md5_mac_for_revision_one() {
        let details = provider("1")
            .generate_details("12345", dec!(100.25), "http://ok/", "http://err/", "desc")
            .await
            .unwrap();
        assert_eq!(details.fields.get("Amount"), Some("10025"));
        assert_eq!(
            details.fields.get("Authentication_Mac"),
            Some("59F2053D89BFCD6FB8CACD591A097569")
        );
    }

    #[tokio::test]
    async fn generates_sha256_mac_for_revision_two() {
        let details = provider("2")
            .generate_details("12345", dec!(100.25), "http://ok/", "http://err/", "desc")
            .await
            .unwrap();
        assert_eq!(
            details.fields.get("Authentication_Mac"),
            Some("51CA7D54E1F2A65DB3D4AE160DCBA1F85FAFE8CF603E55FC94681B66933CAD78")
        );
    }

    #[tokio::test]
    async fn verifies_return_mac_over_order_and_amount() {
        let fields: Fields = [("LKMAC", "AF9CE106542A1688B8B1C69122A764B9")]
            .into_iter()
            .collect();
        assert!(provider("1")
            .verify_response("12345", dec!(100.25), &fields)
            .await
            .unwrap());
        assert!(!provider("1")
            .verify_response("12345", dec!(1.00), &fields)
            .await
            .unwrap());
    }

    #[test]
    fn rejects_unknown_revision() {
        assert!(LuottokuntaProvider::from_params(&ProviderParams::parse(
            "account=1234567&secret=SECRET&revision=3"
        ))
        .is_err());
    }
}
