//! PayPal Express Checkout.
//!
//! Both legs call the classic NVP API: generation runs SetExpressCheckout
//! to obtain a redirect token, verification runs DoExpressCheckoutPayment
//! with the payer id posted back by PayPal. A non-Success `ACK` during
//! generation is a protocol error carrying PayPal's own error list.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::amount::invariant_2dp;
use crate::config::ProviderParams;
use crate::providers::PaymentProvider;
use crate::{Error, Fields, PaymentDetails, Result};

const API_VERSION: &str = "93";

pub struct PayPalProvider {
    account: String,
    secret: String,
    signature: String,
    currency: String,
    sandbox: bool,
    client: reqwest::Client,
}

impl PayPalProvider {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        Ok(Self {
            account: params.required("account")?.to_owned(),
            secret: params.required("secret")?.to_owned(),
            signature: params.required("signature")?.to_owned(),
            currency: params.or_default("currency", "EUR").to_owned(),
            sandbox: params.flag("sandbox"),
            client: reqwest::Client::new(),
        })
    }

    fn api_url(&self) -> String {
        let sandbox = if self.sandbox { ".sandbox" } else { "" };
        format!("https://api-3t{sandbox}.paypal.com/nvp")
    }

    fn redirect_url(&self) -> String {
        let sandbox = if self.sandbox { ".sandbox" } else { "" };
        format!("https://www{sandbox}.paypal.com/cgi/bin/webscr")
    }

    async fn call_api(&self, mut form: Vec<(&str, &str)>) -> Result<Fields> {
        form.push(("USER", &self.account));
        form.push(("PWD", &self.secret));
        form.push(("SIGNATURE", &self.signature));
        form.push(("VERSION", API_VERSION));
        let response = self
            .client
            .post(self.api_url())
            .form(&form)
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        Ok(url::form_urlencoded::parse(body.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect())
    }

    fn protocol_error(response: &Fields) -> Error {
        let messages: Vec<String> = response
            .iter()
            .filter(|(name, _)| name.starts_with("L_ERRORCODE"))
            .map(|(name, code)| {
                let index = name.trim_start_matches("L_ERRORCODE");
                format!(
                    "code {code}: {} ({})",
                    response
                        .get(&format!("L_SHORTMESSAGE{index}"))
                        .unwrap_or_default(),
                    response
                        .get(&format!("L_LONGMESSAGE{index}"))
                        .unwrap_or_default(),
                )
            })
            .collect();
        Error::protocol(
            format!("express checkout call failed: {}", messages.join("; ")),
            response
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&"),
        )
    }
}

#[async_trait]
impl PaymentProvider for PayPalProvider {
    async fn generate_details(
        &self,
        _identifier: &str,
        amount: Decimal,
        return_url: &str,
        error_url: &str,
        message: &str,
    ) -> Result<PaymentDetails> {
        let formatted_amount = invariant_2dp(amount);
        let response = self
            .call_api(vec![
                ("METHOD", "SetExpressCheckout"),
                ("PAYMENTREQUEST_0_DESC", message),
                ("PAYMENTREQUEST_0_PAYMENTACTION", "SALE"),
                ("PAYMENTREQUEST_0_AMT", &formatted_amount),
                ("PAYMENTREQUEST_0_CURRENCYCODE", &self.currency),
                ("SOLUTIONTYPE", "Sole"),
                ("RETURNURL", return_url),
                ("CANCELURL", error_url),
            ])
            .await?;
        if response.get("ACK") != Some("Success") {
            return Err(Self::protocol_error(&response));
        }
        let mut fields = Fields::new();
        fields.insert("cmd", "_express-checkout");
        fields.insert("token", response.get("TOKEN").unwrap_or_default());
        Ok(PaymentDetails {
            url: self.redirect_url(),
            fields,
        })
    }

    async fn verify_response(
        &self,
        _identifier: &str,
        amount: Decimal,
        fields: &Fields,
    ) -> Result<bool> {
        let formatted_amount = invariant_2dp(amount);
        let response = self
            .call_api(vec![
                ("METHOD", "DoExpressCheckoutPayment"),
                ("TOKEN", fields.get("TOKEN").unwrap_or_default()),
                ("PAYERID", fields.get("PAYERID").unwrap_or_default()),
                ("PAYMENTREQUEST_0_PAYMENTACTION", "SALE"),
                ("PAYMENTREQUEST_0_AMT", &formatted_amount),
                ("PAYMENTREQUEST_0_CURRENCYCODE", &self.currency),
            ])
            .await?;
        Ok(response.get("ACK") == Some("Success"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(sandbox: &str) -> PayPalProvider {
        PayPalProvider::from_params(&ProviderParams::parse(&format!(
            "account=api.shop.example&secret=PWD&signature=SIG&sandbox={sandbox}"
        )))
        .unwrap()
    }

    #[test]
    fn sandbox_flag_switches_endpoints() {
        assert_eq!(provider("false").api_url(), "https://api-3t.paypal.com/nvp");
        assert_eq!(
            provider("true").api_url(),
            "https://api-3t.sandbox.paypal.com/nvp"
        );
        assert_eq!(
            provider("true").redirect_url(),
            "https://www.sandbox.paypal.com/cgi/bin/webscr"
        );
    }

    #[test]
    fn protocol_error_collects_paypal_error_list() {
        let response: Fields = [
            ("ACK", "Failure"),
            ("L_ERRORCODE0", "10002"),
            ("L_SHORTMESSAGE0", "Security error"),
            ("L_LONGMESSAGE0", "Security header is not valid"),
        ]
        .into_iter()
        .collect();
        let err = PayPalProvider::protocol_error(&response);
        assert!(err.to_string().contains("10002"));
        assert!(err.to_string().contains("Security error"));
        assert!(err.response_content().unwrap().contains("ACK=Failure"));
    }
}
