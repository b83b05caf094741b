//! Assist payment forms (Russian card and wallet aggregator).
//!
//! The outbound form is unsigned. Assist sends no verifiable synchronous
//! return either, so `verify_response` always answers `false` and payment
//! status must come from the remote order-state service instead.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::amount::invariant_2dp;
use crate::config::ProviderParams;
use crate::providers::PaymentProvider;
use crate::{Fields, PaymentDetails, Result};

const DEFAULT_URL: &str = "https://payments148.paysecure.ru/pay/order.cfm";

/// Payment type toggles Assist recognizes on the order form.
const KNOWN_PAYMENT_TYPES: [&str; 7] = [
    "Card",
    "YM",
    "WM",
    "QIWI",
    "QIWIMts",
    "QIWIMegafon",
    "QIWIBeeline",
];

pub struct AssistProvider {
    account: String,
    currency: String,
    url: String,
    test_mode: bool,
    payment_types: Vec<String>,
}

impl AssistProvider {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        let payment_types = params
            .optional("providers")
            .map(|list| {
                list.split([' ', ','])
                    .filter(|t| !t.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            account: params.required("account")?.to_owned(),
            currency: params.or_default("currency", "RUR").to_owned(),
            url: params.or_default("url", DEFAULT_URL).to_owned(),
            test_mode: params.flag("testMode"),
            payment_types,
        })
    }
}

#[async_trait]
impl PaymentProvider for AssistProvider {
    async fn generate_details(
        &self,
        identifier: &str,
        amount: Decimal,
        return_url: &str,
        error_url: &str,
        message: &str,
    ) -> Result<PaymentDetails> {
        let mut fields = Fields::new();
        fields.insert("Merchant_ID", &self.account);
        fields.insert("OrderNumber", identifier);
        fields.insert("OrderAmount", invariant_2dp(amount));
        fields.insert("OrderCurrency", &self.currency);
        fields.insert("OrderComment", message);
        fields.insert("URL_RETURN_OK", return_url);
        fields.insert("URL_RETURN_NO", error_url);
        fields.insert("TestMode", if self.test_mode { "1" } else { "0" });
        if !self.payment_types.is_empty() {
            for payment_type in KNOWN_PAYMENT_TYPES {
                let enabled = self.payment_types.iter().any(|t| t == payment_type);
                fields.insert(
                    format!("{payment_type}Payment"),
                    if enabled { "1" } else { "0" },
                );
            }
        }
        Ok(PaymentDetails {
            url: self.url.clone(),
            fields,
        })
    }

    async fn verify_response(
        &self,
        _identifier: &str,
        _amount: Decimal,
        _fields: &Fields,
    ) -> Result<bool> {
        // No signed synchronous return exists in this protocol.
        Ok(false)
    }
}
