//! Outbound calls for purchases: Telegram `createInvoiceLink` for Stars and
//! toncenter `getTransactions` for TON. The HTTP client is only compiled
//! with the `payments` feature; parsing is always available.

use serde_json::Value;

use crate::game::payments::TonTransfer;

/// Extract incoming transfers from a toncenter `getTransactions` reply.
/// Entries without a hash or with an unparsable value are skipped.
pub fn parse_ton_transactions(body: &Value) -> Vec<TonTransfer> {
    let Some(items) = body.get("result").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|tx| {
            let hash = tx.get("transaction_id")?.get("hash")?.as_str()?.to_string();
            let msg = tx.get("in_msg")?;
            let value_nano = match msg.get("value")? {
                Value::String(s) => s.parse().ok()?,
                Value::Number(n) => n.as_u64()?,
                _ => return None,
            };
            let comment = msg
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(TonTransfer {
                hash,
                value_nano,
                comment,
            })
        })
        .collect()
}

#[cfg(feature = "payments")]
mod client {
    use anyhow::{anyhow, Context, Result};
    use log::{debug, warn};
    use serde_json::{json, Value};

    use super::parse_ton_transactions;
    use crate::config::TonConfig;
    use crate::game::catalog::PaymentPackage;
    use crate::game::payments::TonTransfer;
    use crate::game::types::PaymentRecord;

    const TELEGRAM_API: &str = "https://api.telegram.org";

    /// Ask the Bot API for a Stars invoice link. The payload carries the
    /// payment id so the bot can confirm it later.
    pub async fn create_invoice_link(
        http: &reqwest::Client,
        bot_token: &str,
        payment: &PaymentRecord,
        package: &PaymentPackage,
    ) -> Result<String> {
        let body = json!({
            "title": format!("Shadow Empire: {}", package.label),
            "description": package.label,
            "payload": json!({ "payment_id": payment.id, "telegram_id": payment.telegram_id }).to_string(),
            "currency": "XTR",
            "prices": [{ "label": package.label, "amount": package.stars }],
        });
        let reply: Value = http
            .post(format!("{}/bot{}/createInvoiceLink", TELEGRAM_API, bot_token))
            .json(&body)
            .send()
            .await
            .context("Telegram API unreachable")?
            .json()
            .await
            .context("Telegram API returned invalid JSON")?;
        if reply.get("ok").and_then(Value::as_bool) == Some(true) {
            if let Some(link) = reply.get("result").and_then(Value::as_str) {
                return Ok(link.to_string());
            }
        }
        let description = reply
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        warn!("payments: createInvoiceLink failed: {}", description);
        Err(anyhow!("Telegram API error: {}", description))
    }

    /// Recent incoming transfers to the configured wallet.
    pub async fn fetch_ton_transfers(http: &reqwest::Client, ton: &TonConfig) -> Result<Vec<TonTransfer>> {
        let mut request = http
            .get(format!("{}/getTransactions", ton.api_url.trim_end_matches('/')))
            .query(&[("address", ton.wallet_address.as_str())])
            .query(&[("limit", ton.scan_limit)]);
        if let Some(key) = &ton.api_key {
            request = request.header("X-API-Key", key);
        }
        let response = request.send().await.context("toncenter unreachable")?;
        if !response.status().is_success() {
            return Err(anyhow!("toncenter returned {}", response.status()));
        }
        let body: Value = response.json().await.context("toncenter returned invalid JSON")?;
        let transfers = parse_ton_transactions(&body);
        debug!("payments: fetched {} ton transfers", transfers.len());
        Ok(transfers)
    }
}

#[cfg(feature = "payments")]
pub use client::{create_invoice_link, fetch_ton_transfers};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn toncenter_reply_is_parsed() {
        let body = json!({
            "ok": true,
            "result": [
                {
                    "transaction_id": { "hash": "abc=", "lt": "1" },
                    "in_msg": { "value": "2000000000", "message": "se_1_vip_week_deadbeef" }
                },
                {
                    "transaction_id": { "hash": "def=" },
                    "in_msg": { "value": "oops" }
                },
                {
                    "transaction_id": { "hash": "ghi=" },
                    "in_msg": { "value": 5 }
                }
            ]
        });
        let transfers = parse_ton_transactions(&body);
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].hash, "abc=");
        assert_eq!(transfers[0].value_nano, 2_000_000_000);
        assert_eq!(transfers[0].comment, "se_1_vip_week_deadbeef");
        assert_eq!(transfers[1].comment, "");
    }

    #[test]
    fn missing_result_yields_nothing() {
        assert!(parse_ton_transactions(&json!({ "ok": false })).is_empty());
    }
}
