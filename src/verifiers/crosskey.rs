//! Crosskey (Ålandsbanken / Tapiola) payment query service.
//!
//! The query is a signed `CBS_*` form post; the service answers with an XML
//! document whose `CBS_RESPCODE` element is either `OK` or `Notfound`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::amount::comma_2dp;
use crate::config::ProviderParams;
use crate::reference::generate_reference_number;
use crate::signing::{amp_delimited, hash_hex_upper, HashAlg};
use crate::verifiers::{send_cancellable, VerificationProvider};
use crate::{system_clock, Clock, Error, Result};

pub struct CrosskeyVerifier {
    account: String,
    secret: String,
    url: String,
    currency: String,
    clock: Clock,
    client: reqwest::Client,
}

impl CrosskeyVerifier {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            account: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            url: params.required("url")?.to_owned(),
            currency: params.or_default("currency", "EUR").to_owned(),
            clock: system_clock(),
            client: reqwest::Client::new(),
        })
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn query_form(
        &self,
        identifier: &str,
        expected_amount: Option<Decimal>,
    ) -> Vec<(&'static str, String)> {
        // Bank-side timestamp grammar uses a 12-hour clock.
        let timestamp = (self.clock)().format("%Y%m%d%I%M%S0001").to_string();
        let reference = generate_reference_number(identifier);
        let amount = comma_2dp(expected_amount.unwrap_or_default());
        let mac = hash_hex_upper(
            HashAlg::Md5,
            &amp_delimited(&[
                "0001",
                &timestamp,
                &self.account,
                "1",
                "xml",
                "text/xml",
                identifier,
                &reference,
                "01",
                &self.secret,
            ]),
        );
        vec![
            ("CBS_VERSION", "0001".to_owned()),
            ("CBS_TIMESTMP", timestamp),
            ("CBS_RCV_ID", self.account.clone()),
            ("CBS_LANGUAGE", "1".to_owned()),
            ("CBS_RESPTYPE", "xml".to_owned()),
            ("CBS_RESPDATA", "text/xml".to_owned()),
            ("CBS_STAMP", identifier.to_owned()),
            ("CBS_REF", reference),
            ("CBS_AMOUNT", amount),
            ("CBS_CUR", self.currency.clone()),
            ("CBS_KEYVERS", "0001".to_owned()),
            ("CBS_ALG", "01".to_owned()),
            ("CBS_MAC", mac),
        ]
    }

    fn classify(body: &str) -> Result<bool> {
        if body.contains("<CBS_RESPCODE>OK</CBS_RESPCODE>") {
            Ok(true)
        } else if body.contains("<CBS_RESPCODE>Notfound</CBS_RESPCODE>") {
            Ok(false)
        } else {
            Err(Error::protocol("unrecognized query response", body))
        }
    }
}

#[async_trait]
impl VerificationProvider for CrosskeyVerifier {
    async fn verify_payment(
        &self,
        identifier: &str,
        expected_amount: Option<Decimal>,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let form = self.query_form(identifier, expected_amount);
        tracing::debug!(identifier, "querying payment status");
        let response = send_cancellable(self.client.post(&self.url).form(&form), cancel).await?;
        let body = response.error_for_status()?.text().await?;
        Self::classify(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn verifier() -> CrosskeyVerifier {
        CrosskeyVerifier::from_params(&ProviderParams::parse(
            "account=ACCT&secret=SECRET&url=https://bank.example/query",
        ))
        .unwrap()
        .with_clock(Arc::new(|| {
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        }))
    }

    fn field<'a>(form: &'a [(&str, String)], name: &str) -> &'a str {
        &form.iter().find(|(k, _)| *k == name).unwrap().1
    }

    #[test]
    fn query_form_is_signed() {
        let form = verifier().query_form("12345", Some(dec!(99.90)));
        assert_eq!(field(&form, "CBS_TIMESTMP"), "202401011200000001");
        assert_eq!(field(&form, "CBS_REF"), "123453");
        assert_eq!(field(&form, "CBS_AMOUNT"), "99,90");
        assert_eq!(field(&form, "CBS_MAC"), "9F056F38EF8E07EE514F5F581DEE7D65");
    }

    #[test]
    fn missing_amount_queries_zero() {
        let form = verifier().query_form("12345", None);
        assert_eq!(field(&form, "CBS_AMOUNT"), "0,00");
    }

    #[test]
    fn response_codes_map_to_outcomes() {
        assert!(CrosskeyVerifier::classify("<x><CBS_RESPCODE>OK</CBS_RESPCODE></x>").unwrap());
        assert!(
            !CrosskeyVerifier::classify("<x><CBS_RESPCODE>Notfound</CBS_RESPCODE></x>").unwrap()
        );
        assert!(CrosskeyVerifier::classify("<html>maintenance</html>").is_err());
    }
}
