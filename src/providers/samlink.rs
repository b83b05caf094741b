//! Samlink payment forms (Aktia, POP, Säästöpankki).
//!
//! Three coexisting protocol versions share one field layout and differ in
//! the MAC: version 001 is MD5 over the short canonical, 003 moves to
//! SHA-256 and folds the URLs in, 010 additionally signs the key version.
//! The return leg dispatches on the version the bank reports.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::amount::grouped_comma_2dp;
use crate::config::ProviderParams;
use crate::providers::PaymentProvider;
use crate::reference::generate_reference_number;
use crate::signing::{amp_delimited, hash_hex_upper, HashAlg};
use crate::{Error, Fields, PaymentDetails, Result};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Version {
    V1,
    V3,
    V10,
}

pub struct SamlinkProvider {
    account: String,
    secret: String,
    url: String,
    version: Version,
    key_version: String,
}

impl SamlinkProvider {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        let version = match params.or_default("version", "1") {
            "1" | "001" => Version::V1,
            "3" | "003" => Version::V3,
            "10" | "010" => Version::V10,
            other => {
                return Err(Error::InvalidParameter {
                    parameter: "version",
                    reason: format!("unsupported version '{other}', expected 1, 3 or 10"),
                })
            }
        };
        let key_version = if version == Version::V10 {
            params.required("keyVersion")?.to_owned()
        } else {
            String::new()
        };
        Ok(Self {
            account: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            url: params.required("url")?.to_owned(),
            version,
            key_version,
        })
    }
}

#[async_trait]
impl PaymentProvider for SamlinkProvider {
    async fn generate_details(
        &self,
        identifier: &str,
        amount: Decimal,
        return_url: &str,
        error_url: &str,
        message: &str,
    ) -> Result<PaymentDetails> {
        let reference = generate_reference_number(identifier);
        let formatted_amount = grouped_comma_2dp(amount);
        let mut fields = Fields::new();
        fields.insert("NET_STAMP", identifier);
        fields.insert("NET_SELLER_ID", &self.account);
        fields.insert("NET_AMOUNT", &formatted_amount);
        fields.insert("NET_CUR", "EUR");
        fields.insert("NET_REF", &reference);
        fields.insert("NET_DATE", "EXPRESS");
        fields.insert("NET_MSG", message);
        fields.insert("NET_RETURN", return_url);
        fields.insert("NET_CANCEL", error_url);
        fields.insert("NET_REJECT", error_url);
        fields.insert("NET_CONFIRM", "YES");
        match self.version {
            Version::V1 => {
                fields.insert("NET_VERSION", "001");
                fields.insert("NET_LOGON", "TRUE");
                let mac = hash_hex_upper(
                    HashAlg::Md5,
                    &amp_delimited(&[
                        "001",
                        identifier,
                        &self.account,
                        &formatted_amount,
                        &reference,
                        "EXPRESS",
                        "EUR",
                        &self.secret,
                    ]),
                );
                fields.insert("NET_MAC", mac);
            }
            Version::V3 => {
                fields.insert("NET_VERSION", "003");
                fields.insert("NET_ALG", "03");
                let mac = hash_hex_upper(
                    HashAlg::Sha256,
                    &amp_delimited(&[
                        "003",
                        identifier,
                        &self.account,
                        &formatted_amount,
                        &reference,
                        "EXPRESS",
                        "EUR",
                        return_url,
                        error_url,
                        error_url,
                        "03",
                        &self.secret,
                    ]),
                );
                fields.insert("NET_MAC", mac);
            }
            Version::V10 => {
                fields.insert("NET_VERSION", "010");
                fields.insert("NET_ALG", "03");
                fields.insert("NET_KEYVERS", &self.key_version);
                let mac = hash_hex_upper(
                    HashAlg::Sha256,
                    &amp_delimited(&[
                        "010",
                        identifier,
                        &self.account,
                        &formatted_amount,
                        &reference,
                        "EXPRESS",
                        "EUR",
                        return_url,
                        error_url,
                        error_url,
                        "03",
                        &self.key_version,
                        &self.secret,
                    ]),
                );
                fields.insert("NET_MAC", mac);
            }
        }
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
        let returned_id = fields.get("NET_RETURN_STAMP").unwrap_or_default();
        if identifier != returned_id {
            tracing::warn!(
                expected = %identifier,
                found = %returned_id,
                "identifier mismatch in return fields"
            );
            return Ok(false);
        }
        let expected = match fields.get("NET_RETURN_VERSION") {
            Some("001") => hash_hex_upper(
                HashAlg::Md5,
                &amp_delimited(&[
                    fields.get("NET_RETURN_VERSION").unwrap_or_default(),
                    fields.get("NET_RETURN_STAMP").unwrap_or_default(),
                    fields.get("NET_RETURN_REF").unwrap_or_default(),
                    fields.get("NET_RETURN_PAID").unwrap_or_default(),
                    &self.secret,
                ]),
            ),
            Some("003") => hash_hex_upper(
                HashAlg::Sha256,
                &amp_delimited(&[
                    fields.get("NET_RETURN_VERSION").unwrap_or_default(),
                    fields.get("NET_RETURN_STAMP").unwrap_or_default(),
                    fields.get("NET_RETURN_REF").unwrap_or_default(),
                    fields.get("NET_RETURN_PAID").unwrap_or_default(),
                    fields.get("NET_ALG").unwrap_or_default(),
                    &self.secret,
                ]),
            ),
            Some("010") => hash_hex_upper(
                HashAlg::Sha256,
                &amp_delimited(&[
                    fields.get("NET_RETURN_VERSION").unwrap_or_default(),
                    fields.get("NET_ALG").unwrap_or_default(),
                    fields.get("NET_RETURN_STAMP").unwrap_or_default(),
                    fields.get("NET_RETURN_REF").unwrap_or_default(),
                    fields.get("NET_RETURN_PAID").unwrap_or_default(),
                    fields.get("NET_KEYVERS").unwrap_or_default(),
                    &self.secret,
                ]),
            ),
            other => {
                return Err(Error::Protocol {
                    message: format!(
                        "unsupported return version '{}'",
                        other.unwrap_or("<none>")
                    ),
                    response: None,
                })
            }
        };
        if expected == fields.get("NET_RETURN_MAC").unwrap_or_default() {
            return Ok(true);
        }
        tracing::warn!("MAC check failed in return fields");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn provider(version: &str) -> SamlinkProvider {
        let mut init = format!("account=SELLER&secret=SECRET&url=https://bank/pay&version={version}");
        if version == "10" {
            init.push_str("&keyVersion=0001");
        }
        SamlinkProvider::from_params(&ProviderParams::parse(&init)).unwrap()
    }

    #[tokio::test]
    async fn generates_version_specific_macs() {
        let v1 = provider("1")
            .generate_details("12345", dec!(99.90), "http://ok/", "http://err/", "")
            .await
            .unwrap();
        assert_eq!(v1.fields.get("NET_LOGON"), Some("TRUE"));
        assert_eq!(
            v1.fields.get("NET_MAC"),
            Some("A1750085A6A12D7BE13F97F3CE29AF2F")
        );

        let v3 = provider("3")
            .generate_details("12345", dec!(99.90), "http://ok/", "http://err/", "")
            .await
            .unwrap();
        assert_eq!(v3.fields.get("NET_ALG"), Some("03"));
        assert_eq!(
            v3.fields.get("NET_MAC"),
            Some("CD897DBBE7FB4D13B6324A3F8D0FBAB499D43301757D5C83380AD6AFB827469E")
        );

        let v10 = provider("10")
            .generate_details("12345", dec!(99.90), "http://ok/", "http://err/", "")
            .await
            .unwrap();
        assert_eq!(v10.fields.get("NET_KEYVERS"), Some("0001"));
        assert_eq!(
            v10.fields.get("NET_MAC"),
            Some("FD2874B4118BF79208B28CF585418D0199FA0C9D75015F7975AF1CBB4B6551DB")
        );
    }

    #[tokio::test]
    async fn verifies_each_return_version() {
        let v1: Fields = [
            ("NET_RETURN_VERSION", "001"),
            ("NET_RETURN_STAMP", "12345"),
            ("NET_RETURN_REF", "123453"),
            ("NET_RETURN_PAID", "Y"),
            ("NET_RETURN_MAC", "D9237D104DA2B9D4A37FFFB1E3CC380D"),
        ]
        .into_iter()
        .collect();
        assert!(provider("1").verify_response("12345", dec!(99.90), &v1).await.unwrap());

        let v3: Fields = [
            ("NET_RETURN_VERSION", "003"),
            ("NET_RETURN_STAMP", "12345"),
            ("NET_RETURN_REF", "123453"),
            ("NET_RETURN_PAID", "Y"),
            ("NET_ALG", "03"),
            (
                "NET_RETURN_MAC",
                "4D82E19D5FB8AB1194F97ADD128CEAEB1159F7302251337D631B96301FC14038",
            ),
        ]
        .into_iter()
        .collect();
        assert!(provider("3").verify_response("12345", dec!(99.90), &v3).await.unwrap());

        let v10: Fields = [
            ("NET_RETURN_VERSION", "010"),
            ("NET_RETURN_STAMP", "12345"),
            ("NET_RETURN_REF", "123453"),
            ("NET_RETURN_PAID", "Y"),
            ("NET_ALG", "03"),
            ("NET_KEYVERS", "0001"),
            (
                "NET_RETURN_MAC",
                "C89817F25C21A66E7B183383B7E1E26232ADD6F7696475A114F924C8AFD0FA7A",
            ),
        ]
        .into_iter()
        .collect();
        assert!(provider("10").verify_response("12345", dec!(99.90), &v10).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_return_version_is_a_protocol_error() {
        let fields: Fields = [
            ("NET_RETURN_VERSION", "002"),
            ("NET_RETURN_STAMP", "12345"),
        ]
        .into_iter()
        .collect();
        assert!(provider("1")
            .verify_response("12345", dec!(99.90), &fields)
            .await
            .is_err());
    }

    #[test]
    fn version_ten_requires_key_version() {
        assert!(SamlinkProvider::from_params(&ProviderParams::parse(
            "account=SELLER&secret=SECRET&url=u&version=10"
        ))
        .is_err());
    }
}
