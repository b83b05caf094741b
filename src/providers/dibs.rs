//! DIBS payment window forms.
//!
//! The only adapter with an order-independent MAC: HMAC-SHA256 over every
//! field except `MAC` itself, sorted ordinally and joined as `key=value`
//! pairs. The shared secret is a hex-encoded key, decoded at construction.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::amount::{minor_units, parse_minor_units};
use crate::config::ProviderParams;
use crate::providers::PaymentProvider;
use crate::signing::{hex_key, hmac_sha256_hex, sorted_pairs};
use crate::{Fields, PaymentDetails, Result};

const DEFAULT_URL: &str = "https://sat1.dibspayment.com/dibspaymentwindow/entrypoint";

pub struct DibsProvider {
    merchant_id: String,
    key: Vec<u8>,
    url: String,
    currency: String,
    payment_types: String,
    language: String,
    test_mode: bool,
}

impl DibsProvider {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            merchant_id: params.required("account")?.to_owned(),
            key: hex_key("secret", params.required("secret")?)?,
            url: params.or_default("url", DEFAULT_URL).to_owned(),
            currency: params.or_default("currency", "EUR").to_owned(),
            payment_types: params.optional("paymentTypes").unwrap_or_default().to_owned(),
            language: params.or_default("language", "en").to_owned(),
            test_mode: params.flag("test"),
        })
    }

    fn compute_mac(&self, fields: &Fields) -> String {
        hmac_sha256_hex(&self.key, &sorted_pairs(fields, "MAC"))
    }
}

#[async_trait]
impl PaymentProvider for DibsProvider {
    async fn generate_details(
        &self,
        identifier: &str,
        amount: Decimal,
        return_url: &str,
        error_url: &str,
        _message: &str,
    ) -> Result<PaymentDetails> {
        let mut fields = Fields::new();
        fields.insert("orderId", identifier);
        fields.insert("merchant", &self.merchant_id);
        fields.insert("amount", minor_units(amount));
        fields.insert("currency", &self.currency);
        fields.insert("payType", &self.payment_types);
        fields.insert("acceptReturnUrl", return_url);
        fields.insert("cancelReturnUrl", error_url);
        fields.insert("language", &self.language);
        if self.test_mode {
            fields.insert("test", "1");
        }
        let mac = self.compute_mac(&fields);
        fields.insert("MAC", mac);
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
        let Some(mac) = fields.get("MAC").filter(|m| !m.is_empty()) else {
            return Ok(false);
        };
        let expected = self.compute_mac(fields);
        if !expected.eq_ignore_ascii_case(mac) {
            tracing::warn!("MAC check failed in return fields");
            return Ok(false);
        }
        match parse_minor_units(fields.get("amount")) {
            Some(paid) if paid == amount => {}
            _ => {
                tracing::warn!(
                    expected = %amount,
                    found = fields.get("amount").unwrap_or_default(),
                    "amount mismatch in return fields"
                );
                return Ok(false);
            }
        }
        if fields.get("status") != Some("ACCEPTED") {
            tracing::warn!(
                status = fields.get("status").unwrap_or_default(),
                "non-accepted status in return fields"
            );
            return Ok(false);
        }
        if fields.get("orderId") != Some(identifier) {
            tracing::warn!(
                expected = %identifier,
                found = fields.get("orderId").unwrap_or_default(),
                "order id mismatch in return fields"
            );
            return Ok(false);
        }
        if fields.get("currency") != Some(self.currency.as_str()) {
            tracing::warn!(
                expected = %self.currency,
                found = fields.get("currency").unwrap_or_default(),
                "currency mismatch in return fields"
            );
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn provider() -> DibsProvider {
        DibsProvider::from_params(&ProviderParams::parse(
            "account=12345678&secret=1234567890abcdef",
        ))
        .unwrap()
    }

    fn return_fields(status: &str, mac: &str) -> Fields {
        [
            ("acceptReturnUrl", "http://localhost:50075/"),
            ("acquirer", "TEST"),
            ("actionCode", "d100"),
            ("amount", "10025"),
            ("cancelReturnUrl", "http://localhost:50075/?error"),
            ("cardNumberMasked", "471110XXXXXX0000"),
            ("cardTypeName", "VISA"),
            ("currency", "EUR"),
            ("expMonth", "06"),
            ("expYear", "24"),
            ("language", "sv-FI"),
            ("merchant", "12345678"),
            ("orderId", "12345"),
            ("status", status),
            ("test", "1"),
            ("transaction", "1234567890"),
            ("MAC", mac),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn generates_sorted_pair_mac() {
        let details = provider()
            .generate_details("12345", dec!(100.25), "http://ok/", "http://err/", "")
            .await
            .unwrap();
        assert_eq!(details.fields.get("amount"), Some("10025"));
        assert_eq!(
            details.fields.get("MAC"),
            Some("bc5725562cd6ef7a371b8e840745b6043e8fe06926fee68365109defd411816f")
        );
    }

    #[tokio::test]
    async fn accepts_accepted_status_with_valid_mac() {
        let fields = return_fields(
            "ACCEPTED",
            "a264d0fe2124e431a9ca3cfba879b8552bfb508004086d38d6bb9117cff015cf",
        );
        assert!(provider()
            .verify_response("12345", dec!(100.25), &fields)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn mac_comparison_is_case_insensitive() {
        let fields = return_fields(
            "ACCEPTED",
            "A264D0FE2124E431A9CA3CFBA879B8552BFB508004086D38D6BB9117CFF015CF",
        );
        assert!(provider()
            .verify_response("12345", dec!(100.25), &fields)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn rejects_non_accepted_statuses() {
        for (status, mac) in [
            ("DECLINED", "bcf8a66086af3a10d05588f3065b7d29195dd25f6e838f2cfb17c14a93afb8b9"),
            ("CANCELLED", "4c9a093e1e9caf0951721cdd5dc3f1b851442964434c0776b6f8ef78bc0c7da3"),
            ("PENDING", "39ff9b2f74cdc76aa54b694f9442845bcf866851c242447be9afbeb0d65576df"),
        ] {
            let fields = return_fields(status, mac);
            assert!(!provider()
                .verify_response("12345", dec!(100.25), &fields)
                .await
                .unwrap());
        }
    }

    #[tokio::test]
    async fn rejects_amount_and_mac_mismatches() {
        let fields = return_fields(
            "ACCEPTED",
            "a264d0fe2124e431a9ca3cfba879b8552bfb508004086d38d6bb9117cff015cf",
        );
        assert!(!provider()
            .verify_response("12345", dec!(1.00), &fields)
            .await
            .unwrap());
        let tampered = return_fields(
            "ACCEPTED",
            "e9c216bd6329ea00314cff1bf49e456c92f9123a69957bc040af989d2c0a140f",
        );
        assert!(!provider()
            .verify_response("12345", dec!(100.25), &tampered)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn missing_mac_is_rejected_outright() {
        let fields: Fields = [("status", "ACCEPTED")].into_iter().collect();
        assert!(!provider()
            .verify_response("12345", dec!(100.25), &fields)
            .await
            .unwrap());
    }

    #[test]
    fn secret_must_be_hex() {
        assert!(DibsProvider::from_params(&ProviderParams::parse(
            "account=12345678&secret=zzzz"
        ))
        .is_err());
    }
}
