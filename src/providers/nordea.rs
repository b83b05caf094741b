//! Nordea Finland SOLO payment forms.
//!
//! SOLO MAC is MD5 over `&`-delimited values with a trailing `&`, uppercase
//! hex. Outbound and return legs sign different field subsets; the return
//! leg uses dash-separated field names.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::amount::grouped_comma_2dp;
use crate::config::ProviderParams;
use crate::providers::PaymentProvider;
use crate::reference::generate_reference_number;
use crate::signing::{amp_delimited, hash_hex_upper, HashAlg};
use crate::{Fields, PaymentDetails, Result};

const DEFAULT_URL: &str = "https://solo3.nordea.fi/cgi-bin/SOLOPM01";

pub struct NordeaProvider {
    account: String,
    secret: String,
    url: String,
}

impl NordeaProvider {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            account: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            url: params.or_default("url", DEFAULT_URL).to_owned(),
        })
    }
}

#[async_trait]
impl PaymentProvider for NordeaProvider {
    async fn generate_details(
        &self,
        identifier: &str,
        amount: Decimal,
        return_url: &str,
        error_url: &str,
        message: &str,
    ) -> Result<PaymentDetails> {
        let reference = generate_reference_number(identifier);
        let mut fields = Fields::new();
        fields.insert("SOLOPMT_VERSION", "0002");
        fields.insert("SOLOPMT_STAMP", &reference);
        fields.insert("SOLOPMT_RCV_ID", &self.account);
        fields.insert("SOLOPMT_LANGUAGE", "1");
        fields.insert("SOLOPMT_AMOUNT", grouped_comma_2dp(amount));
        fields.insert("SOLOPMT_REF", &reference);
        fields.insert("SOLOPMT_DATE", "EXPRESS");
        fields.insert("SOLOPMT_MSG", message);
        fields.insert("SOLOPMT_RETURN", return_url);
        fields.insert("SOLOPMT_CANCEL", error_url);
        fields.insert("SOLOPMT_REJECT", error_url);
        fields.insert("SOLOPMT_CONFIRM", "YES");
        fields.insert("SOLOPMT_CUR", "EUR");
        let mac = hash_hex_upper(
            HashAlg::Md5,
            &amp_delimited(&[
                fields.get("SOLOPMT_VERSION").unwrap_or_default(),
                fields.get("SOLOPMT_STAMP").unwrap_or_default(),
                fields.get("SOLOPMT_RCV_ID").unwrap_or_default(),
                fields.get("SOLOPMT_AMOUNT").unwrap_or_default(),
                fields.get("SOLOPMT_REF").unwrap_or_default(),
                fields.get("SOLOPMT_DATE").unwrap_or_default(),
                fields.get("SOLOPMT_CUR").unwrap_or_default(),
                self.secret.as_str(),
            ]),
        );
        fields.insert("SOLOPMT_MAC", mac);
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
        let returned_ref = fields.get("SOLOPMT-RETURN-REF").unwrap_or_default();
        if reference != returned_ref {
            tracing::warn!(
                expected = %reference,
                found = %returned_ref,
                "reference number mismatch in return fields"
            );
            return Ok(false);
        }
        let expected = hash_hex_upper(
            HashAlg::Md5,
            &amp_delimited(&[
                fields.get("SOLOPMT-RETURN-VERSION").unwrap_or_default(),
                fields.get("SOLOPMT-RETURN-STAMP").unwrap_or_default(),
                fields.get("SOLOPMT-RETURN-REF").unwrap_or_default(),
                fields.get("SOLOPMT-RETURN-PAID").unwrap_or_default(),
                self.secret.as_str(),
            ]),
        );
        if expected == fields.get("SOLOPMT-RETURN-MAC").unwrap_or_default() {
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

    fn provider() -> NordeaProvider {
        NordeaProvider::from_params(&ProviderParams::parse("account=ACCT&secret=SECRET")).unwrap()
    }

    #[tokio::test]
    async fn generates_signed_fields() {
        let details = provider()
            .generate_details("12345", dec!(99.90), "http://ok/", "http://err/", "msg")
            .await
            .unwrap();
        assert_eq!(details.url, DEFAULT_URL);
        assert_eq!(details.fields.get("SOLOPMT_STAMP"), Some("123453"));
        assert_eq!(details.fields.get("SOLOPMT_AMOUNT"), Some("99,90"));
        assert_eq!(
            details.fields.get("SOLOPMT_MAC"),
            Some("9D875648DD85CC79A09EDFAF9C35874E")
        );
    }

    #[tokio::test]
    async fn groups_thousands_in_amount_and_mac() {
        let details = provider()
            .generate_details("12345", dec!(1234.50), "http://ok/", "http://err/", "msg")
            .await
            .unwrap();
        assert_eq!(
            details.fields.get("SOLOPMT_AMOUNT"),
            Some("1\u{a0}234,50")
        );
        assert_eq!(
            details.fields.get("SOLOPMT_MAC"),
            Some("49B9B339218537A36D54E666D9B0FF1A")
        );
    }

    #[tokio::test]
    async fn accepts_valid_return_fields() {
        let fields: Fields = [
            ("SOLOPMT-RETURN-VERSION", "0002"),
            ("SOLOPMT-RETURN-STAMP", "123453"),
            ("SOLOPMT-RETURN-REF", "123453"),
            ("SOLOPMT-RETURN-PAID", "Y"),
            ("SOLOPMT-RETURN-MAC", "B841CAFBD6012D58F76165154BC6AEDB"),
        ]
        .into_iter()
        .collect();
        assert!(provider()
            .verify_response("12345", dec!(99.90), &fields)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn rejects_wrong_reference_and_mac() {
        let mut fields: Fields = [
            ("SOLOPMT-RETURN-VERSION", "0002"),
            ("SOLOPMT-RETURN-STAMP", "123453"),
            ("SOLOPMT-RETURN-REF", "123453"),
            ("SOLOPMT-RETURN-PAID", "Y"),
            ("SOLOPMT-RETURN-MAC", "B841CAFBD6012D58F76165154BC6AEDB"),
        ]
        .into_iter()
        .collect();
        assert!(!provider()
            .verify_response("99999", dec!(99.90), &fields)
            .await
            .unwrap());
        fields.insert("SOLOPMT-RETURN-PAID", "N");
        assert!(!provider()
            .verify_response("12345", dec!(99.90), &fields)
            .await
            .unwrap());
    }
}
