//! Danske Bank payment-status service.
//!
//! The query posts a `VerifyCode`-signed form to the netbank gateway and
//! gets a querystring-encoded record back. Return code 000 means the
//! payment exists, 001 means it does not; everything else is a fault.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::amount::parse_invariant;
use crate::config::ProviderParams;
use crate::reference::generate_reference_number;
use crate::signing::{amp_delimited, hash_hex, HashAlg};
use crate::verifiers::{send_cancellable, VerificationProvider};
use crate::{Error, Fields, Result};

const DEFAULT_ENDPOINT: &str = "https://netbank.danskebank.dk/HB";

pub struct DanskeVerifier {
    account: String,
    secret: String,
    contract: String,
    currency: String,
    endpoint: String,
    client: reqwest::Client,
}

impl DanskeVerifier {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            account: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            contract: params.required("contract")?.to_owned(),
            currency: params.or_default("currency", "EUR").to_owned(),
            endpoint: params
                .or_default("endpointUrl", DEFAULT_ENDPOINT)
                .to_owned(),
            client: reqwest::Client::new(),
        })
    }

    fn verify_code(&self, reference: &str) -> String {
        hash_hex(
            HashAlg::Sha256,
            &amp_delimited(&[&self.secret, &self.account, reference]),
        )
    }

    fn query_form(&self, identifier: &str) -> Vec<(&'static str, String)> {
        let reference = generate_reference_number(identifier);
        let verify_code = self.verify_code(&reference);
        vec![
            ("Refno", reference),
            ("MerchantID", self.account.clone()),
            ("gsAftlnr", self.contract.clone()),
            ("gsSprog", "EN".to_owned()),
            ("gsProdukt", "IBV".to_owned()),
            ("gsNextObj", "InetPayV".to_owned()),
            ("gsNextAkt", "InetPaySt".to_owned()),
            ("gsResp", "S".to_owned()),
            ("Version", "0001".to_owned()),
            ("algorithm", "03".to_owned()),
            ("VerifyCode", verify_code),
        ]
    }

    fn classify(&self, body: &str, expected_amount: Option<Decimal>) -> Result<bool> {
        let record: Fields = url::form_urlencoded::parse(body.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        match record.get("ReturnCode") {
            Some("000") => {}
            Some("001") => return Ok(false),
            _ => return Err(Error::protocol("unrecognized return code", body)),
        }
        if record.get("Currency") != Some(self.currency.as_str()) {
            return Err(Error::protocol("payment was made in another currency", body));
        }
        if let Some(expected) = expected_amount {
            if parse_invariant(record.get("Amount")) != Some(expected) {
                return Err(Error::protocol("payment was made over another amount", body));
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl VerificationProvider for DanskeVerifier {
    async fn verify_payment(
        &self,
        identifier: &str,
        expected_amount: Option<Decimal>,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let form = self.query_form(identifier);
        tracing::debug!(identifier, "querying payment status");
        let response =
            send_cancellable(self.client.post(&self.endpoint).form(&form), cancel).await?;
        let body = response.error_for_status()?.text().await?;
        self.classify(&body, expected_amount)
    }
}
