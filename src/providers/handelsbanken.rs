//! Handelsbanken direct payment forms (Swedish SSSE switch).
//!
//! Field names are matched case-insensitively on the return leg, amounts
//! are whole kronor, and the check value is lowercase MD5. The form carries
//! a latest-booking-time one day ahead of the clock.

use async_trait::async_trait;
use chrono::Duration;
use rust_decimal::Decimal;

use crate::amount::whole_units;
use crate::config::ProviderParams;
use crate::providers::PaymentProvider;
use crate::signing::{concatenated, hash_hex, HashAlg};
use crate::{system_clock, Clock, Fields, PaymentDetails, Result};

const DEFAULT_URL: &str = "https://secure.handelsbanken.se/bb/glss/servlet/ssco_dirapp";

pub struct HandelsbankenProvider {
    account: String,
    secret: String,
    url: String,
    clock: Clock,
}

impl HandelsbankenProvider {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            account: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            url: params.or_default("url", DEFAULT_URL).to_owned(),
            clock: system_clock(),
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl PaymentProvider for HandelsbankenProvider {
    async fn generate_details(
        &self,
        identifier: &str,
        amount: Decimal,
        return_url: &str,
        _error_url: &str,
        _message: &str,
    ) -> Result<PaymentDetails> {
        let formatted_amount = whole_units(amount);
        let booking_deadline = ((self.clock)() + Duration::days(1))
            .format("%Y%m%d%H%M%S")
            .to_string();
        let mut fields = Fields::new();
        fields.insert("entryid", "switch");
        fields.insert("appaction", "doDirectPay");
        fields.insert("switchaction", "3");
        fields.insert("handOverDatatype", "1");
        fields.insert("appname", "ssse");
        fields.insert("language", "sv");
        fields.insert("country", "se");
        fields.insert("butikid", &self.account);
        fields.insert("ordernummer", identifier);
        fields.insert("orderbelopp", &formatted_amount);
        fields.insert("retururl", return_url);
        fields.insert("senastebokningstid", booking_deadline);
        let check = hash_hex(
            HashAlg::Md5,
            &concatenated(&[&self.account, identifier, &formatted_amount, &self.secret]),
        );
        fields.insert("kontrollsumma", check);
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
        let returned_id = fields.get_ci("ordernummer").unwrap_or_default();
        if identifier != returned_id {
            tracing::warn!(
                expected = %identifier,
                found = %returned_id,
                "order number mismatch in return fields"
            );
            return Ok(false);
        }
        let status = fields.get_ci("status").unwrap_or_default();
        if status != "0" {
            tracing::warn!(%status, "non-success status in return fields");
            return Ok(false);
        }
        let expected = hash_hex(
            HashAlg::Md5,
            &concatenated(&[
                fields.get_ci("butikid").unwrap_or_default(),
                fields.get_ci("ordernummer").unwrap_or_default(),
                fields.get_ci("orderbelopp").unwrap_or_default(),
                status,
                fields.get_ci("timestamp").unwrap_or_default(),
                &self.secret,
            ]),
        );
        if expected == fields.get_ci("kontrollsumma").unwrap_or_default() {
            return Ok(true);
        }
        tracing::warn!("check value mismatch in return fields");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn provider() -> HandelsbankenProvider {
        HandelsbankenProvider::from_params(&ProviderParams::parse("account=9999&secret=aaaabbbb"))
            .unwrap()
            .with_clock(Arc::new(|| {
                NaiveDate::from_ymd_opt(2001, 10, 14)
                    .unwrap()
                    .and_hms_opt(12, 15, 0)
                    .unwrap()
            }))
    }

    #[tokio::test]
    async fn generates_published_example() {
        let details = provider()
            .generate_details("ABCD000001", dec!(1100), "http://localhost/", "", "")
            .await
            .unwrap();
        assert_eq!(details.fields.get("orderbelopp"), Some("1100"));
        assert_eq!(details.fields.get("senastebokningstid"), Some("20011015121500"));
        assert_eq!(
            details.fields.get("kontrollsumma"),
            Some("26efb0517cdfbbacb13a61e91feae16d")
        );
    }

    #[tokio::test]
    async fn accepts_published_return_example() {
        let fields: Fields = [
            ("butikid", "9999"),
            ("ordernummer", "ABCD000001"),
            ("orderbelopp", "1100"),
            ("status", "0"),
            ("timestamp", "20011015121000"),
            ("kontrollsumma", "1f3caf897286c3159b65a705cf880570"),
        ]
        .into_iter()
        .collect();
        assert!(provider()
            .verify_response("ABCD000001", dec!(1100), &fields)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn rejects_failure_status() {
        let fields: Fields = [
            ("butikid", "9999"),
            ("ordernummer", "ABCD000001"),
            ("orderbelopp", "1100"),
            ("status", "1"),
            ("timestamp", "20011015121000"),
            ("kontrollsumma", "b6914cca7702f96983a06c694b00ce34"),
        ]
        .into_iter()
        .collect();
        assert!(!provider()
            .verify_response("ABCD000001", dec!(1100), &fields)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn return_field_names_match_case_insensitively() {
        let fields: Fields = [
            ("ButikId", "9999"),
            ("Ordernummer", "ABCD000001"),
            ("Orderbelopp", "1100"),
            ("Status", "0"),
            ("Timestamp", "20011015121000"),
            ("Kontrollsumma", "1f3caf897286c3159b65a705cf880570"),
        ]
        .into_iter()
        .collect();
        assert!(provider()
            .verify_response("ABCD000001", dec!(1100), &fields)
            .await
            .unwrap());
    }
}
