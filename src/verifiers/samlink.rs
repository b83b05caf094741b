//! Samlink payment query service.
//!
//! The query is a signed `NET_*` post; the service answers with a 302
//! redirect whose `Location` query string carries the (also signed) result
//! record. Redirect following must stay off so the record can be read.
//!
//! Three MAC schemes are in the field, selected by the `version` parameter:
//! version 1 signs with MD5, version 3 with SHA-256 and an explicit
//! algorithm field, version 10 adds a key-generation number.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::amount::parse_invariant;
use crate::config::ProviderParams;
use crate::signing::{hash_hex_upper, HashAlg};
use crate::verifiers::{send_cancellable, VerificationProvider};
use crate::{Error, Fields, Result};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Version {
    V1,
    V3,
    V10,
}

impl Version {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim_start_matches('0') {
            "1" => Ok(Self::V1),
            "3" => Ok(Self::V3),
            "10" => Ok(Self::V10),
            _ => Err(Error::InvalidParameter {
                parameter: "version",
                reason: format!("unsupported version '{raw}'"),
            }),
        }
    }

    fn wire(self) -> &'static str {
        match self {
            Self::V1 => "001",
            Self::V3 => "003",
            Self::V10 => "010",
        }
    }

    fn alg(self) -> HashAlg {
        match self {
            Self::V1 => HashAlg::Md5,
            _ => HashAlg::Sha256,
        }
    }
}

pub struct SamlinkVerifier {
    account: String,
    secret: String,
    endpoint: String,
    return_url: String,
    currency: String,
    version: Version,
    key_version: Option<String>,
    client: reqwest::Client,
}

impl SamlinkVerifier {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        let version = Version::parse(params.or_default("version", "1"))?;
        let key_version = params.optional("keyVersion").map(str::to_owned);
        if version == Version::V10 && key_version.is_none() {
            return Err(Error::MissingParameter("keyVersion"));
        }
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            account: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            endpoint: params.required("endpointUrl")?.to_owned(),
            return_url: params
                .or_default("returnUrl", "http://localhost/")
                .to_owned(),
            currency: params.or_default("currency", "EUR").to_owned(),
            version,
            key_version,
            client,
        })
    }

    /// Joins the values of the named fields that are present, appends the
    /// secret, and hashes. Absent fields are skipped rather than signed as
    /// empty.
    fn present_fields_mac(&self, alg: HashAlg, record: &Fields, names: &[&str]) -> String {
        let mut canonical = String::new();
        for name in names {
            if let Some(value) = record.get(name) {
                canonical.push_str(value);
                canonical.push('&');
            }
        }
        canonical.push_str(&self.secret);
        canonical.push('&');
        hash_hex_upper(alg, &canonical)
    }

    fn query_form(&self, identifier: &str) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("NET_VERSION", self.version.wire().to_owned()),
            ("NET_SELLER_ID", self.account.clone()),
            ("NET_STAMP", identifier.to_owned()),
            ("NET_RETURN", self.return_url.clone()),
        ];
        if self.version != Version::V1 {
            fields.push(("NET_ALG", "03".to_owned()));
        }
        if let Some(key_version) = &self.key_version {
            fields.push(("NET_KEYVERS", key_version.clone()));
        }
        let record: Fields = fields
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        let mac = self.present_fields_mac(
            self.version.alg(),
            &record,
            &[
                "NET_VERSION",
                "NET_SELLER_ID",
                "NET_STAMP",
                "NET_REF",
                "NET_ALG",
                "NET_KEYVERS",
            ],
        );
        fields.push(("NET_MAC", mac));
        fields
    }

    fn classify(&self, record: &Fields, expected_amount: Option<Decimal>) -> Result<bool> {
        let raw = record
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        match record.get("NET_RESPCODE") {
            Some("OK") => {}
            Some("NOTFOUND") => return Ok(false),
            _ => return Err(Error::protocol("unrecognized response code", raw)),
        }
        let version = Version::parse(record.get("NET_VERSION").unwrap_or_default())?;
        let expected_mac = self.present_fields_mac(
            version.alg(),
            record,
            &[
                "NET_VERSION",
                "NET_SELLER_ID",
                "NET_RESPCODE",
                "NET_STAMP",
                "NET_REF",
                "NET_DATE",
                "NET_AMOUNT",
                "NET_CUR",
                "NET_PAID",
                "NET_ALG",
                "NET_KEYVERS",
            ],
        );
        if record.get("NET_RETURN_MAC") != Some(expected_mac.as_str()) {
            return Err(Error::protocol("response MAC mismatch", raw));
        }
        if record.get("NET_CUR") != Some(self.currency.as_str()) {
            return Err(Error::protocol("payment was made in another currency", raw));
        }
        if let Some(expected) = expected_amount {
            if parse_invariant(record.get("NET_AMOUNT")) != Some(expected) {
                return Err(Error::protocol("payment was made over another amount", raw));
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl VerificationProvider for SamlinkVerifier {
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
        if response.status() != reqwest::StatusCode::FOUND {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::protocol(
                format!("expected a 302 answer, got {status}"),
                body,
            ));
        }
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Protocol {
                message: "redirect answer without a location".to_owned(),
                response: None,
            })?;
        let record: Fields = url::Url::parse(location)
            .map_err(|e| Error::protocol(format!("unparseable redirect target: {e}"), location))?
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        self.classify(&record, expected_amount)
    }
}
