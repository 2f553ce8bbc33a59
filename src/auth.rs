//! Telegram Mini App `initData` verification.
//!
//! Telegram signs the launch parameters with its Ed25519 key. The signed
//! message is `"{bot_id}:WebAppData\n"` followed by every field except
//! `hash` and `signature`, sorted by key, as `key=value` lines joined by
//! `\n`. The signature is unpadded URL-safe base64.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::Deserialize;
use thiserror::Error;

/// Telegram's production key for third-party `initData` validation.
pub const TELEGRAM_PUBLIC_KEY_HEX: &str = "e7bf03a2fa4602af4580703d88dda5bb59f32ed8b02a56c187fe7d34caed242d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InitDataError {
    #[error("init data is empty")]
    Empty,
    #[error("malformed init data")]
    Malformed,
    #[error("signature missing")]
    MissingSignature,
    #[error("signature does not verify")]
    BadSignature,
    #[error("user field missing")]
    MissingUser,
    #[error("invalid public key")]
    InvalidKey,
}

/// The `user` object embedded in `initData`. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InitDataVerifier {
    bot_id: i64,
    key: VerifyingKey,
}

impl InitDataVerifier {
    /// Verifier using Telegram's published key.
    pub fn telegram(bot_id: i64) -> Result<Self, InitDataError> {
        let bytes: [u8; 32] = hex::decode(TELEGRAM_PUBLIC_KEY_HEX)
            .map_err(|_| InitDataError::InvalidKey)?
            .try_into()
            .map_err(|_| InitDataError::InvalidKey)?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|_| InitDataError::InvalidKey)?;
        Ok(Self::with_key(bot_id, key))
    }

    pub fn with_key(bot_id: i64, key: VerifyingKey) -> Self {
        Self { bot_id, key }
    }

    /// Check the signature and return the embedded user.
    pub fn verify(&self, init_data: &str) -> Result<TelegramUser, InitDataError> {
        if init_data.trim().is_empty() {
            return Err(InitDataError::Empty);
        }
        let mut fields = parse_query(init_data)?;
        let signature = fields.remove("signature").ok_or(InitDataError::MissingSignature)?;
        fields.remove("hash");

        let raw = URL_SAFE_NO_PAD
            .decode(signature.trim_end_matches('='))
            .map_err(|_| InitDataError::BadSignature)?;
        let bytes: [u8; 64] = raw.try_into().map_err(|_| InitDataError::BadSignature)?;
        let message = data_check_string(self.bot_id, &fields);
        self.key
            .verify(message.as_bytes(), &Signature::from_bytes(&bytes))
            .map_err(|_| InitDataError::BadSignature)?;

        let user = fields.get("user").ok_or(InitDataError::MissingUser)?;
        serde_json::from_str(user).map_err(|_| InitDataError::MissingUser)
    }
}

/// Decode an `application/x-www-form-urlencoded` query into sorted fields.
/// A repeated key keeps its last value.
pub fn parse_query(query: &str) -> Result<BTreeMap<String, String>, InitDataError> {
    let mut fields = BTreeMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        fields.insert(form_decode(key)?, form_decode(value)?);
    }
    Ok(fields)
}

fn form_decode(raw: &str) -> Result<String, InitDataError> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|s| s.into_owned())
        .map_err(|_| InitDataError::Malformed)
}

pub fn data_check_string(bot_id: i64, fields: &BTreeMap<String, String>) -> String {
    let lines: Vec<String> = fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}:WebAppData\n{}", bot_id, lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    const BOT_ID: i64 = 7_000_001;

    fn signed_init_data(key: &SigningKey, user_json: &str) -> String {
        let mut fields = BTreeMap::new();
        fields.insert("auth_date".to_string(), "1760000000".to_string());
        fields.insert("query_id".to_string(), "AAE-test".to_string());
        fields.insert("user".to_string(), user_json.to_string());
        let signature = key.sign(data_check_string(BOT_ID, &fields).as_bytes());
        let mut pairs: Vec<String> = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        pairs.push(format!("hash={}", "ignored"));
        pairs.push(format!("signature={}", URL_SAFE_NO_PAD.encode(signature.to_bytes())));
        pairs.join("&")
    }

    fn keypair() -> (SigningKey, InitDataVerifier) {
        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let verifier = InitDataVerifier::with_key(BOT_ID, signing.verifying_key());
        (signing, verifier)
    }

    #[test]
    fn valid_signature_yields_user() {
        let (signing, verifier) = keypair();
        let data = signed_init_data(&signing, r#"{"id":42,"first_name":"Vito","username":"don"}"#);
        let user = verifier.verify(&data).unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.username.as_deref(), Some("don"));
    }

    #[test]
    fn tampered_field_is_rejected() {
        let (signing, verifier) = keypair();
        let data = signed_init_data(&signing, r#"{"id":42}"#);
        let tampered = data.replace("auth_date=1760000000", "auth_date=1760000001");
        assert_eq!(verifier.verify(&tampered), Err(InitDataError::BadSignature));
    }

    #[test]
    fn other_bot_id_is_rejected() {
        let (signing, _) = keypair();
        let data = signed_init_data(&signing, r#"{"id":42}"#);
        let other = InitDataVerifier::with_key(BOT_ID + 1, signing.verifying_key());
        assert_eq!(other.verify(&data), Err(InitDataError::BadSignature));
    }

    #[test]
    fn missing_signature_and_empty_input() {
        let (_, verifier) = keypair();
        assert_eq!(verifier.verify(""), Err(InitDataError::Empty));
        assert_eq!(
            verifier.verify("user=%7B%22id%22%3A1%7D&hash=abc"),
            Err(InitDataError::MissingSignature)
        );
    }

    #[test]
    fn telegram_key_parses() {
        InitDataVerifier::telegram(BOT_ID).unwrap();
    }

    #[test]
    fn query_decoding_handles_plus_and_percent() {
        let fields = parse_query("a=hello+world&b=%7B%7D&c").unwrap();
        assert_eq!(fields["a"], "hello world");
        assert_eq!(fields["b"], "{}");
        assert_eq!(fields["c"], "");
    }
}
