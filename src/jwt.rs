// Compact JWS verification for identity tokens (RS256 / HS256)

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use ring::{hmac, signature};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token is not three dot-separated segments")]
    Malformed,
    #[error("token segment is not valid base64url")]
    Encoding,
    #[error("token segment is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm {0}")]
    UnsupportedAlgorithm(String),
    #[error("no verification key for kid {0:?}")]
    UnknownKey(Option<String>),
    #[error("signature does not verify")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("unexpected issuer {0:?}")]
    Issuer(Option<String>),
    #[error("token was issued for another audience")]
    Audience,
    #[error("failed to fetch key set: {0}")]
    Fetch(#[from] reqwest::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Header {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, aud: &str) -> bool {
        match self {
            Audience::One(a) => a == aud,
            Audience::Many(all) => all.iter().any(|a| a == aud),
        }
    }
}

/// Claims of a token whose signature has been checked.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IdentityClaims {
    pub sub: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub picture: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
}

#[derive(Debug, Clone)]
pub enum VerifyingKey {
    Rsa { n: Vec<u8>, e: Vec<u8> },
    Hmac(hmac::Key),
}

impl VerifyingKey {
    fn algorithm(&self) -> &'static str {
        match self {
            VerifyingKey::Rsa { .. } => "RS256",
            VerifyingKey::Hmac(_) => "HS256",
        }
    }

    fn verify(&self, message: &[u8], sig: &[u8]) -> Result<(), TokenError> {
        match self {
            VerifyingKey::Rsa { n, e } => signature::RsaPublicKeyComponents { n, e }
                .verify(&signature::RSA_PKCS1_2048_8192_SHA256, message, sig)
                .map_err(|_| TokenError::BadSignature),
            VerifyingKey::Hmac(key) => {
                hmac::verify(key, message, sig).map_err(|_| TokenError::BadSignature)
            }
        }
    }
}

#[derive(Deserialize, Debug)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Deserialize, Debug)]
struct Jwk {
    kid: String,
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

/// Verification keys indexed by key id.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, VerifyingKey>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_hmac(&mut self, kid: impl Into<String>, secret: &[u8]) {
        self.keys
            .insert(kid.into(), VerifyingKey::Hmac(hmac::Key::new(hmac::HMAC_SHA256, secret)));
    }

    pub fn insert_rsa(&mut self, kid: impl Into<String>, n: &str, e: &str) -> Result<(), TokenError> {
        let n = b64(n)?;
        let e = b64(e)?;
        self.keys.insert(kid.into(), VerifyingKey::Rsa { n, e });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Parses a JWKS document, keeping the RSA keys.
    pub fn from_jwks(doc: &str) -> Result<Self, TokenError> {
        let jwks: Jwks = serde_json::from_str(doc)?;
        let mut set = KeySet::new();
        for k in jwks.keys {
            match (k.kty.as_str(), k.n, k.e) {
                ("RSA", Some(n), Some(e)) => set.insert_rsa(k.kid, &n, &e)?,
                (kty, ..) => tracing::debug!(kid = %k.kid, kty, "skipping unsupported jwk"),
            }
        }
        Ok(set)
    }

    pub async fn fetch(http: &reqwest::Client, url: &str) -> Result<Self, TokenError> {
        let body = http.get(url).send().await?.error_for_status()?.text().await?;
        let set = Self::from_jwks(&body)?;
        tracing::info!(url, keys = set.len(), "loaded identity key set");
        Ok(set)
    }

    fn select(&self, header: &Header) -> Result<&VerifyingKey, TokenError> {
        let key = match &header.kid {
            Some(kid) => self.keys.get(kid),
            // without a kid, only an unambiguous key will do
            None if self.keys.len() == 1 => self.keys.values().next(),
            None => None,
        };
        key.ok_or_else(|| TokenError::UnknownKey(header.kid.clone()))
    }
}

/// What a verified token must additionally satisfy.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub issuers: Vec<String>,
    pub audience: Option<String>,
    pub leeway_secs: i64,
}

impl Policy {
    pub fn google(client_id: Option<String>) -> Self {
        Self {
            issuers: GOOGLE_ISSUERS.iter().map(|s| s.to_string()).collect(),
            audience: client_id,
            leeway_secs: 60,
        }
    }
}

fn b64(s: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(s.trim_end_matches('='))
        .map_err(|_| TokenError::Encoding)
}

fn decode_segment<T: DeserializeOwned>(seg: &str) -> Result<T, TokenError> {
    Ok(serde_json::from_slice(&b64(seg)?)?)
}

fn split(token: &str) -> Result<(&str, &str, &str), TokenError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() => Ok((h, p, s)),
        _ => Err(TokenError::Malformed),
    }
}

pub fn verify(token: &str, keys: &KeySet, policy: &Policy) -> Result<IdentityClaims, TokenError> {
    verify_at(token, keys, policy, Utc::now())
}

pub fn verify_at(
    token: &str,
    keys: &KeySet,
    policy: &Policy,
    now: DateTime<Utc>,
) -> Result<IdentityClaims, TokenError> {
    let (h, p, s) = split(token)?;
    let header: Header = decode_segment(h)?;
    let key = keys.select(&header)?;
    if header.alg != key.algorithm() {
        return Err(TokenError::UnsupportedAlgorithm(header.alg));
    }
    let sig = b64(s)?;
    let signed_len = h.len() + 1 + p.len();
    key.verify(token[..signed_len].as_bytes(), &sig)?;

    let claims: IdentityClaims = decode_segment(p)?;
    if claims.exp.saturating_add(policy.leeway_secs) < now.timestamp() {
        return Err(TokenError::Expired);
    }
    if !policy.issuers.is_empty() {
        let ok = claims
            .iss
            .as_deref()
            .is_some_and(|iss| policy.issuers.iter().any(|i| i == iss));
        if !ok {
            return Err(TokenError::Issuer(claims.iss));
        }
    }
    if let Some(aud) = &policy.audience {
        if !claims.aud.as_ref().is_some_and(|a| a.contains(aud)) {
            return Err(TokenError::Audience);
        }
    }
    Ok(claims)
}

/// HS256-signs `claims` into a compact token.
pub fn sign_hs256<C: Serialize>(claims: &C, kid: &str, key: &hmac::Key) -> Result<String, TokenError> {
    let header = Header {
        alg: "HS256".into(),
        kid: Some(kid.into()),
        typ: Some("JWT".into()),
    };
    let mut out = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
    out.push('.');
    out.push_str(&URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?));
    let tag = hmac::sign(key, out.as_bytes());
    out.push('.');
    out.push_str(&URL_SAFE_NO_PAD.encode(tag.as_ref()));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &[u8] = b"test-secret";

    fn claims(exp: i64) -> IdentityClaims {
        IdentityClaims {
            sub: "1234567890".into(),
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            picture: "https://example.com/ada.png".into(),
            exp,
            iat: None,
            iss: Some("https://accounts.google.com".into()),
            aud: Some(Audience::One("client-1".into())),
        }
    }

    fn keys() -> KeySet {
        let mut k = KeySet::new();
        k.insert_hmac("k1", SECRET);
        k
    }

    fn token(c: &IdentityClaims) -> String {
        sign_hs256(c, "k1", &hmac::Key::new(hmac::HMAC_SHA256, SECRET)).unwrap()
    }

    fn future() -> i64 {
        (Utc::now() + Duration::hours(1)).timestamp()
    }

    #[test]
    fn verifies_signed_token() {
        let c = claims(future());
        let got = verify(&token(&c), &keys(), &Policy::google(Some("client-1".into()))).unwrap();
        assert_eq!(got, c);
    }

    #[test]
    fn tampered_payload_fails() {
        let t = token(&claims(future()));
        let (h, _, s) = split(&t).unwrap();
        let mut other = claims(future());
        other.sub = "someone-else".into();
        let forged = format!("{h}.{}.{s}", URL_SAFE_NO_PAD.encode(serde_json::to_vec(&other).unwrap()));
        assert!(matches!(
            verify(&forged, &keys(), &Policy::default()),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn rejects_expired_and_foreign_tokens() {
        let past = (Utc::now() - Duration::hours(2)).timestamp();
        assert!(matches!(
            verify(&token(&claims(past)), &keys(), &Policy::default()),
            Err(TokenError::Expired)
        ));

        let t = token(&claims(future()));
        assert!(matches!(
            verify(&t, &keys(), &Policy::google(Some("other-client".into()))),
            Err(TokenError::Audience)
        ));

        let mut c = claims(future());
        c.iss = Some("evil.example".into());
        assert!(matches!(
            verify(&token(&c), &keys(), &Policy::google(None)),
            Err(TokenError::Issuer(_))
        ));
    }

    #[test]
    fn far_future_expiry_with_leeway_is_accepted() {
        let policy = Policy { leeway_secs: 60, ..Policy::default() };
        let got = verify(&token(&claims(i64::MAX)), &keys(), &policy).unwrap();
        assert_eq!(got.exp, i64::MAX);
    }

    #[test]
    fn unknown_key_and_garbage() {
        let t = token(&claims(future()));
        let mut other = KeySet::new();
        other.insert_hmac("k2", SECRET);
        other.insert_hmac("k3", SECRET);
        assert!(matches!(verify(&t, &other, &Policy::default()), Err(TokenError::UnknownKey(_))));
        assert!(matches!(verify("abc", &keys(), &Policy::default()), Err(TokenError::Malformed)));
        assert!(matches!(verify("a.b.c.d", &keys(), &Policy::default()), Err(TokenError::Malformed)));
        assert!(matches!(verify("!!.??.x", &keys(), &Policy::default()), Err(TokenError::Encoding)));
    }

    #[test]
    fn algorithm_must_match_key_type() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","kid":"k1"}"#);
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims(future())).unwrap());
        let t = format!("{header}.{body}.AAAA");
        assert!(matches!(
            verify(&t, &keys(), &Policy::default()),
            Err(TokenError::UnsupportedAlgorithm(a)) if a == "RS256"
        ));
    }

    #[test]
    fn jwks_keeps_rsa_keys_only() {
        let doc = r#"{"keys":[
            {"kid":"a","kty":"RSA","alg":"RS256","n":"sXchDaQebHnPiGvyDOAT4saGEUetSyo9","e":"AQAB"},
            {"kid":"b","kty":"EC","crv":"P-256"}
        ]}"#;
        let set = KeySet::from_jwks(doc).unwrap();
        assert_eq!(set.len(), 1);
    }
}
