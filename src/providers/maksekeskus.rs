//! Maksekeskus signed payment forms.
//!
//! The only JSON protocol in the family: the order goes out as a JSON
//! document plus a SHA-512 of document-and-secret, and the return leg posts
//! a JSON document back in the `json` field with its own signature inside.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amount::parse_invariant;
use crate::config::ProviderParams;
use crate::providers::PaymentProvider;
use crate::signing::{hash_hex_upper, HashAlg};
use crate::{Error, Fields, PaymentDetails, Result};

const DEFAULT_URL: &str = "https://payment.maksekeskus.ee/pay/1/signed.html";

/// Outbound order document. Key order is part of the signed bytes.
#[derive(Serialize)]
struct OrderDocument<'a> {
    shop: &'a str,
    amount: String,
    reference: &'a str,
    locale: &'a str,
    country: &'a str,
}

/// Return leg document posted back in the `json` field.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReturnDocument {
    #[serde(default)]
    payment_id: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    signature: Option<String>,
}

pub struct MaksekeskusProvider {
    shop_id: String,
    secret: String,
    url: String,
    locale: String,
    country: String,
}

impl MaksekeskusProvider {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            shop_id: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            url: params.or_default("url", DEFAULT_URL).to_owned(),
            locale: params.or_default("locale", "en").to_owned(),
            country: params.or_default("country", "ee").to_owned(),
        })
    }
}

#[async_trait]
impl PaymentProvider for MaksekeskusProvider {
    async fn generate_details(
        &self,
        identifier: &str,
        amount: Decimal,
        _return_url: &str,
        _error_url: &str,
        _message: &str,
    ) -> Result<PaymentDetails> {
        let document = OrderDocument {
            shop: &self.shop_id,
            amount: crate::amount::invariant_2dp(amount),
            reference: identifier,
            locale: &self.locale,
            country: &self.country,
        };
        let json = serde_json::to_string(&document)
            .map_err(|e| Error::Signing(format!("cannot serialize order document: {e}")))?;
        let mac = hash_hex_upper(HashAlg::Sha512, &format!("{json}{}", self.secret));
        let mut fields = Fields::new();
        fields.insert("json", json);
        fields.insert("mac", mac);
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
        let Some(json) = fields.get("json").filter(|j| !j.trim().is_empty()) else {
            return Ok(false);
        };
        let document: ReturnDocument = serde_json::from_str(json)
            .map_err(|e| Error::protocol(format!("undecodable return document: {e}"), json))?;
        let payment_id = document.payment_id.as_deref().unwrap_or_default();
        let returned_amount = document.amount.as_deref().unwrap_or_default();
        let status = document.status.as_deref().unwrap_or_default();
        let expected = hash_hex_upper(
            HashAlg::Sha512,
            &format!("{payment_id}{returned_amount}{status}{}", self.secret),
        );
        if Some(expected.as_str()) != document.signature.as_deref() {
            tracing::warn!("signature check failed on return document");
            return Ok(false);
        }
        if payment_id != identifier {
            tracing::warn!(
                expected = %identifier,
                found = %payment_id,
                "payment id mismatch in return document"
            );
            return Ok(false);
        }
        match parse_invariant(document.amount.as_deref()) {
            Some(paid) if paid == amount => {}
            _ => {
                tracing::warn!(
                    expected = %amount,
                    found = %returned_amount,
                    "amount mismatch in return document"
                );
                return Ok(false);
            }
        }
        if !status.eq_ignore_ascii_case("PAID") {
            tracing::warn!(%status, "non-paid status in return document");
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const RETURN_SIGNATURE: &str =
        "DF3CE34A3CCD3020F163BB2BB6A49334C8CE93A5D6B0E2DE014A91502CC4A924\
         90A019D751FF05725BEE481D1FEEDADABE0F1C1233DF12E2790218BA42988E24";

    fn provider() -> MaksekeskusProvider {
        MaksekeskusProvider::from_params(&ProviderParams::parse("account=xyz&secret=1234567890"))
            .unwrap()
    }

    fn return_json(signature: &str) -> String {
        format!(
            r#"{{"paymentId":"123456","amount":"12.25","status":"PAID","signature":"{signature}"}}"#
        )
    }

    #[tokio::test]
    async fn generates_signed_order_document() {
        let details = provider()
            .generate_details("123456", dec!(12.25), "http://ok/", "http://err/", "")
            .await
            .unwrap();
        assert_eq!(
            details.fields.get("json"),
            Some(r#"{"shop":"xyz","amount":"12.25","reference":"123456","locale":"en","country":"ee"}"#)
        );
        assert_eq!(
            details.fields.get("mac"),
            Some(
                "7DBF7468AF6429F96177302637B48C6165F8EC6205326820EF9DC11F9C2178\
                 3D7F9ED60CB4DC279E83023998B398C33E016B79B26AABFA904A96BB1714B70347"
            )
        );
    }

    #[tokio::test]
    async fn accepts_valid_return_document() {
        let fields: Fields = [("json", return_json(RETURN_SIGNATURE))].into_iter().collect();
        assert!(provider()
            .verify_response("123456", dec!(12.25), &fields)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn rejects_amount_and_identifier_mismatch() {
        let fields: Fields = [("json", return_json(RETURN_SIGNATURE))].into_iter().collect();
        assert!(!provider()
            .verify_response("123456", dec!(99.00), &fields)
            .await
            .unwrap());
        assert!(!provider()
            .verify_response("654321", dec!(12.25), &fields)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn rejects_bad_signature_and_missing_document() {
        let fields: Fields = [("json", return_json("0000"))].into_iter().collect();
        assert!(!provider()
            .verify_response("123456", dec!(12.25), &fields)
            .await
            .unwrap());
        let empty = Fields::new();
        assert!(!provider()
            .verify_response("123456", dec!(12.25), &empty)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn undecodable_return_document_is_a_fault() {
        let fields: Fields = [("json", "{not json")].into_iter().collect();
        let err = provider()
            .verify_response("123456", dec!(12.25), &fields)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        assert_eq!(err.response_content(), Some("{not json"));
    }
}
