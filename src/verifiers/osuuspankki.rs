//! Osuuspankki Kultaraha payment query (action 708).
//!
//! The answer is a human-readable Finnish page; the outcome is read off the
//! literal "Maksu on maksettu" / "Maksua ei ole maksettu" phrases.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::config::ProviderParams;
use crate::reference::generate_reference_number;
use crate::signing::{concatenated, hash_hex_upper, HashAlg};
use crate::verifiers::{send_cancellable, VerificationProvider};
use crate::{Error, Result};

const DEFAULT_ENDPOINT: &str = "https://kultaraha.op.fi/cgi-bin/krcgi";

pub struct OsuuspankkiVerifier {
    account: String,
    secret: String,
    endpoint: String,
    return_url: String,
    client: reqwest::Client,
}

impl OsuuspankkiVerifier {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            account: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            endpoint: params
                .or_default("endpointUrl", DEFAULT_ENDPOINT)
                .to_owned(),
            return_url: params
                .or_default("returnUrl", "http://localhost/")
                .to_owned(),
            client: reqwest::Client::new(),
        })
    }

    fn query_form(&self, identifier: &str) -> Vec<(&'static str, String)> {
        let reference = generate_reference_number(identifier);
        let mac = hash_hex_upper(
            HashAlg::Md5,
            &concatenated(&[
                "0006",
                &self.account,
                "0",
                identifier,
                &reference,
                "6",
                &self.secret,
            ]),
        );
        vec![
            ("action_id", "708".to_owned()),
            ("VERSIO", "0006".to_owned()),
            ("MYYJA", self.account.clone()),
            ("KYSELYTUNNUS", "0".to_owned()),
            ("MAKSUTUNNUS", identifier.to_owned()),
            ("VIITE", reference),
            ("TARKISTE", mac),
            ("TARKISTE-VERSIO", "6".to_owned()),
            ("PALUU-LINKKI", self.return_url.clone()),
        ]
    }

    fn classify(body: &str) -> Result<bool> {
        // The negative phrase must win when a page carries both.
        if body.contains("Maksua ei ole maksettu") {
            Ok(false)
        } else if body.contains("Maksu on maksettu") {
            Ok(true)
        } else {
            Err(Error::protocol("unrecognized query response", body))
        }
    }
}

#[async_trait]
impl VerificationProvider for OsuuspankkiVerifier {
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

    fn verifier() -> OsuuspankkiVerifier {
        OsuuspankkiVerifier::from_params(&ProviderParams::parse("account=MYYJA1&secret=SECRET"))
            .unwrap()
    }

    #[test]
    fn query_form_is_signed() {
        let form = verifier().query_form("12345");
        let get = |name: &str| form.iter().find(|(k, _)| *k == name).unwrap().1.clone();
        assert_eq!(get("action_id"), "708");
        assert_eq!(get("VIITE"), "123453");
        assert_eq!(get("TARKISTE"), "35FF015BAB0073979E4E1705886BE476");
        assert_eq!(get("PALUU-LINKKI"), "http://localhost/");
    }

    #[test]
    fn response_phrases_map_to_outcomes() {
        assert!(!OsuuspankkiVerifier::classify("<p>Maksua ei ole maksettu</p>").unwrap());
        assert!(OsuuspankkiVerifier::classify("<p>Maksu on maksettu</p>").unwrap());
        assert!(OsuuspankkiVerifier::classify("<p>Tuntematon virhe</p>").is_err());
    }
}
