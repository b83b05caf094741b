//! Maksekeskus transaction-list lookups.
//!
//! The REST API has no single-transaction query by merchant reference, so
//! verification pulls the recent transaction window (paginated through the
//! `Link: ...; rel="next"` header) and groups it by reference. References
//! are not unique in the listing; a payment verifies when any transaction
//! under the reference matches. The fetched index is kept for twenty
//! minutes so a burst of verifications does not re-crawl the listing.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Days;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::cache::TtlCache;
use crate::config::ProviderParams;
use crate::verifiers::{send_cancellable, VerificationProvider};
use crate::{system_clock, Clock, Error, Result};

const DEFAULT_ENDPOINT: &str = "https://api.maksekeskus.ee/v1/";
const CACHE_TTL: Duration = Duration::from_secs(20 * 60);

/// How many days back the transaction window reaches.
const WINDOW_DAYS: u64 = 5;

#[derive(Debug, Clone, Deserialize)]
struct Transaction {
    status: String,
    amount: Decimal,
    currency: String,
    reference: String,
}

pub struct MaksekeskusVerifier {
    account: String,
    secret: String,
    endpoint: String,
    currency: String,
    clock: Clock,
    client: reqwest::Client,
    transactions: TtlCache<HashMap<String, Vec<Transaction>>>,
}

impl MaksekeskusVerifier {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            account: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            endpoint: params
                .or_default("endpointUrl", DEFAULT_ENDPOINT)
                .to_owned(),
            currency: params.or_default("currency", "EUR").to_owned(),
            clock: system_clock(),
            client: reqwest::Client::new(),
            transactions: TtlCache::new(CACHE_TTL),
        })
    }

    fn first_page_url(&self) -> String {
        let now = (self.clock)();
        let since = now - Days::new(WINDOW_DAYS);
        let until = now + Days::new(1);
        format!(
            "{}transactions?since={}&until={}",
            self.endpoint,
            since.format("%Y-%m-%d"),
            until.format("%Y-%m-%d"),
        )
    }

    fn next_page_url(link_header: &str) -> Option<String> {
        static NEXT: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r#"<([^>]+)>;\s+rel="next""#).expect("constant pattern"));
        NEXT.captures(link_header)
            .map(|captures| captures[1].to_owned())
    }

    /// Crawls the transaction listing. A transport failure mid-crawl keeps
    /// whatever pages were already indexed, so a flaky listing degrades to
    /// "not found" instead of an error.
    async fn fetch_transactions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, Vec<Transaction>>> {
        let mut index = HashMap::new();
        let mut page_url = self.first_page_url();
        loop {
            tracing::debug!(url = %page_url, "fetching transaction listing page");
            let request = self
                .client
                .get(&page_url)
                .basic_auth(&self.account, Some(&self.secret));
            let response = match send_cancellable(request, cancel).await {
                Ok(response) => response,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(error) => {
                    tracing::warn!(%error, "transaction listing fetch failed, keeping partial index");
                    return Ok(index);
                }
            };
            let next = response
                .headers()
                .get(reqwest::header::LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(Self::next_page_url);
            let page: Vec<Transaction> = match response.json().await {
                Ok(page) => page,
                Err(error) => {
                    tracing::warn!(%error, "transaction listing page was unreadable, keeping partial index");
                    return Ok(index);
                }
            };
            for transaction in page {
                index
                    .entry(transaction.reference.clone())
                    .or_insert_with(Vec::new)
                    .push(transaction);
            }
            match next {
                Some(url) => page_url = url,
                None => return Ok(index),
            }
        }
    }

    fn matches(&self, transaction: &Transaction, expected_amount: Option<Decimal>) -> bool {
        if !transaction.status.eq_ignore_ascii_case("COMPLETED") {
            tracing::warn!(
                reference = %transaction.reference,
                status = %transaction.status,
                "transaction has not completed"
            );
            return false;
        }
        if !transaction.currency.eq_ignore_ascii_case(&self.currency) {
            tracing::warn!(reference = %transaction.reference, "transaction currency mismatch");
            return false;
        }
        if let Some(expected) = expected_amount {
            if transaction.amount != expected {
                tracing::warn!(reference = %transaction.reference, "transaction amount mismatch");
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl VerificationProvider for MaksekeskusVerifier {
    async fn verify_payment(
        &self,
        identifier: &str,
        expected_amount: Option<Decimal>,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let index = self
            .transactions
            .get_or_refresh(|| self.fetch_transactions(cancel))
            .await?;
        Ok(index.get(identifier).is_some_and(|candidates| {
            candidates
                .iter()
                .any(|transaction| self.matches(transaction, expected_amount))
        }))
    }
}
