//! Nordea SOLO payment query service.
//!
//! Posts a MAC-signed `SOLOPMT_*` query and reads the `SOLOPMT_RESPCODE`
//! element out of the XML answer.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::config::ProviderParams;
use crate::reference::generate_reference_number;
use crate::signing::{amp_delimited, hash_hex_upper, HashAlg};
use crate::verifiers::{send_cancellable, VerificationProvider};
use crate::{system_clock, Clock, Error, Result};

const DEFAULT_ENDPOINT: &str = "https://solo3.nordea.fi/cgi-bin/SOLOPM10";

pub struct NordeaVerifier {
    account: String,
    secret: String,
    endpoint: String,
    clock: Clock,
    client: reqwest::Client,
}

impl NordeaVerifier {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            account: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            endpoint: params
                .or_default("endpointUrl", DEFAULT_ENDPOINT)
                .to_owned(),
            clock: system_clock(),
            client: reqwest::Client::new(),
        })
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn query_form(&self, identifier: &str) -> Vec<(&'static str, String)> {
        // Bank-side timestamp grammar uses a 12-hour clock.
        let timestamp = (self.clock)().format("%Y%m%d%I%M%S0001").to_string();
        let reference = generate_reference_number(identifier);
        let mac = hash_hex_upper(
            HashAlg::Md5,
            &amp_delimited(&[
                "0001",
                &timestamp,
                &self.account,
                "3",
                "xml",
                &reference,
                "0001",
                "01",
                &self.secret,
            ]),
        );
        vec![
            ("SOLOPMT_VERSION", "0001".to_owned()),
            ("SOLOPMT_TIMESTMP", timestamp),
            ("SOLOPMT_RCV_ID", self.account.clone()),
            ("SOLOPMT_LANGUAGE", "3".to_owned()),
            ("SOLOPMT_RESPTYPE", "xml".to_owned()),
            ("SOLOPMT_REF", reference),
            ("SOLOPMT_KEYVERS", "0001".to_owned()),
            ("SOLOPMT_ALG", "01".to_owned()),
            ("SOLOPMT_MAC", mac),
        ]
    }

    fn classify(body: &str) -> Result<bool> {
        if body.contains("<SOLOPMT_RESPCODE>OK</SOLOPMT_RESPCODE>") {
            Ok(true)
        } else if body.contains("<SOLOPMT_RESPCODE>Notfound</SOLOPMT_RESPCODE>") {
            Ok(false)
        } else {
            Err(Error::protocol("unrecognized query response", body))
        }
    }
}

#[async_trait]
impl VerificationProvider for NordeaVerifier {
    async fn verify_payment(
        &self,
        identifier: &str,
        _expected_amount: Option<Decimal>,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let form = self.query_form(identifier);
        tracing::debug!(identifier, "querying payment status");
        let response =
            send_cancellable(self.client.post(&self.endpoint).form(&form), cancel).await?;
        let body = response.error_for_status()?.text().await?;
        Self::classify(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn verifier() -> NordeaVerifier {
        NordeaVerifier::from_params(&ProviderParams::parse("account=ACCT&secret=SECRET"))
            .unwrap()
            .with_clock(Arc::new(|| {
                NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap()
            }))
    }

    #[test]
    fn query_form_is_signed() {
        let form = verifier().query_form("12345");
        let get = |name: &str| form.iter().find(|(k, _)| *k == name).unwrap().1.clone();
        assert_eq!(get("SOLOPMT_TIMESTMP"), "202401011200000001");
        assert_eq!(get("SOLOPMT_REF"), "123453");
        assert_eq!(get("SOLOPMT_MAC"), "4EA7089C518729AFEC83C7F8867B2B84");
    }

    #[test]
    fn response_codes_map_to_outcomes() {
        assert!(
            NordeaVerifier::classify("<x><SOLOPMT_RESPCODE>OK</SOLOPMT_RESPCODE></x>").unwrap()
        );
        assert!(!NordeaVerifier::classify(
            "<x><SOLOPMT_RESPCODE>Notfound</SOLOPMT_RESPCODE></x>"
        )
        .unwrap());
        assert!(NordeaVerifier::classify("<html>down</html>").is_err());
    }
}
