//! Osuuspankki Kultaraha payment forms.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::amount::grouped_comma_2dp;
use crate::config::ProviderParams;
use crate::providers::PaymentProvider;
use crate::reference::generate_reference_number;
use crate::signing::{concatenated, hash_hex_upper, HashAlg};
use crate::{Fields, PaymentDetails, Result};

const DEFAULT_URL: &str = "https://kultaraha.op.fi/cgi-bin/krcgi";

pub struct OsuuspankkiProvider {
    account: String,
    secret: String,
    url: String,
}

impl OsuuspankkiProvider {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            account: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            url: params.or_default("url", DEFAULT_URL).to_owned(),
        })
    }
}

#[async_trait]
impl PaymentProvider for OsuuspankkiProvider {
    async fn generate_details(
        &self,
        identifier: &str,
        amount: Decimal,
        return_url: &str,
        error_url: &str,
        message: &str,
    ) -> Result<PaymentDetails> {
        let reference = generate_reference_number(identifier);
        let formatted_amount = grouped_comma_2dp(amount);
        let mut fields = Fields::new();
        fields.insert("action_id", "701");
        fields.insert("VERSIO", "1");
        fields.insert("MAKSUTUNNUS", identifier);
        fields.insert("MYYJA", &self.account);
        fields.insert("SUMMA", &formatted_amount);
        fields.insert("VIITE", &reference);
        fields.insert("VIESTI", message);
        fields.insert("TARKISTE-VERSIO", "1");
        fields.insert("PALUULINKKI", return_url);
        fields.insert("PERUUTUSLINKKI", error_url);
        fields.insert("VAHVISTUS", "Y");
        fields.insert("VALUUTTALAJI", "EUR");
        let check = hash_hex_upper(
            HashAlg::Md5,
            &concatenated(&[
                "1",
                identifier,
                &self.account,
                &formatted_amount,
                &reference,
                "EUR",
                "1",
                &self.secret,
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
        let returned_id = fields.get("MAKSUTUNNUS").unwrap_or_default();
        if identifier != returned_id {
            tracing::warn!(
                expected = %identifier,
                found = %returned_id,
                "identifier mismatch in return fields"
            );
            return Ok(false);
        }
        let expected = hash_hex_upper(
            HashAlg::Md5,
            &concatenated(&[
                fields.get("VERSIO").unwrap_or_default(),
                fields.get("MAKSUTUNNUS").unwrap_or_default(),
                fields.get("VIITE").unwrap_or_default(),
                fields.get("ARKISTOINTITUNNUS").unwrap_or_default(),
                fields.get("TARKISTE-VERSIO").unwrap_or_default(),
                &self.secret,
            ]),
        );
        if expected == fields.get("TARKISTE").unwrap_or_default() {
            return Ok(true);
        }
        tracing::warn!("check value mismatch in return fields");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn provider() -> OsuuspankkiProvider {
        OsuuspankkiProvider::from_params(&ProviderParams::parse("account=MYYJA1&secret=SECRET"))
            .unwrap()
    }

    #[tokio::test]
    async fn generates_check_value() {
        let details = provider()
            .generate_details("12345", dec!(99.90), "http://ok/", "http://err/", "viesti")
            .await
            .unwrap();
        assert_eq!(details.fields.get("action_id"), Some("701"));
        assert_eq!(details.fields.get("SUMMA"), Some("99,90"));
        assert_eq!(
            details.fields.get("TARKISTE"),
            Some("2FD2AD2E4C502D5B8CF2030D04902DA8")
        );
    }

    #[tokio::test]
    async fn verifies_return_fields() {
        let fields: Fields = [
            ("VERSIO", "1"),
            ("MAKSUTUNNUS", "12345"),
            ("VIITE", "123453"),
            ("ARKISTOINTITUNNUS", "20240101ABC"),
            ("TARKISTE-VERSIO", "1"),
            ("TARKISTE", "4EC5B1F4A024A6E8E5C0E0272EF43C2A"),
        ]
        .into_iter()
        .collect();
        assert!(provider()
            .verify_response("12345", dec!(99.90), &fields)
            .await
            .unwrap());
        assert!(!provider()
            .verify_response("54321", dec!(99.90), &fields)
            .await
            .unwrap());
    }
}
