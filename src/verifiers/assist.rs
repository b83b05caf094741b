//! Assist order-state lookups.
//!
//! The order-state service answers a login-authenticated form post with a
//! semicolon-separated text report. A successful payment shows up as a
//! `AS000;SUCCESSFUL` line for the order; rejected attempts carry an
//! `AS1xx`..`AS4xx` code instead.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::config::ProviderParams;
use crate::verifiers::{send_cancellable, VerificationProvider};
use crate::{Error, Result};

const DEFAULT_ENDPOINT: &str = "https://payments.paysecure.ru/results/results.cfm";

/// `<order>;AS<code>` report line with a rejection-range code.
static REJECTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^;\s]+);AS[1234]\d\d").expect("constant pattern"));

pub struct AssistVerifier {
    account: String,
    user: String,
    password: String,
    endpoint: String,
    client: reqwest::Client,
}

impl AssistVerifier {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            account: params.required("account")?.to_owned(),
            user: params.required("user")?.to_owned(),
            password: params.required("password")?.to_owned(),
            endpoint: params
                .or_default("endpointUrl", DEFAULT_ENDPOINT)
                .to_owned(),
            client: reqwest::Client::new(),
        })
    }

    /// Maps a results report to a payment outcome for one order.
    fn classify(identifier: &str, body: &str) -> Result<bool> {
        if body.contains(&format!("{identifier};AS000;SUCCESSFUL")) {
            return Ok(true);
        }
        if body.contains("ERROR:") {
            tracing::warn!(identifier, "order-state service reported an error");
            return Ok(false);
        }
        if REJECTED
            .captures_iter(body)
            .any(|line| &line[1] == identifier)
        {
            return Ok(false);
        }
        Err(Error::protocol(
            format!("unrecognized order-state report for '{identifier}'"),
            body,
        ))
    }
}

#[async_trait]
impl VerificationProvider for AssistVerifier {
    async fn verify_payment(
        &self,
        identifier: &str,
        _expected_amount: Option<Decimal>,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let form = [
            ("ShopOrderNumber", identifier),
            ("Shop_Id", &self.account),
            ("Login", &self.user),
            ("Password", &self.password),
            ("Format", "1"),
            ("English", "1"),
        ];
        tracing::debug!(identifier, "querying order-state service");
        let response =
            send_cancellable(self.client.post(&self.endpoint).form(&form), cancel).await?;
        let body = response.error_for_status()?.text().await?;
        Self::classify(identifier, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_line_verifies() {
        let body = "12345;AS000;SUCCESSFUL;100.25;RUR\n";
        assert!(AssistVerifier::classify("12345", body).unwrap());
    }

    #[test]
    fn rejection_code_fails() {
        let body = "12345;AS103;DECLINED;100.25;RUR\n";
        assert!(!AssistVerifier::classify("12345", body).unwrap());
    }

    #[test]
    fn service_error_fails() {
        assert!(!AssistVerifier::classify("12345", "ERROR: bad login").unwrap());
    }

    #[test]
    fn unrelated_report_is_a_protocol_break() {
        let body = "99999;AS000;SUCCESSFUL;1.00;RUR\n";
        let err = AssistVerifier::classify("12345", body).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(err.response_content().unwrap().contains("99999"));
    }
}
