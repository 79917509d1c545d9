use crate::config::Config;
use crate::jwt::{self, IdentityClaims, KeySet, Policy, TokenError};
use crate::models::UserProfile;
use chrono::{Duration as Ttl, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

// only what would break the query string; `@` and `.` pass through
const SEED: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'=');

pub const LOCAL_ISSUER: &str = "mindforge";
pub const GUEST_TOKEN: &str = "guest.token.jwt";
const LOCAL_KID: &str = "mindforge-local";
const EMAIL_LATENCY: Duration = Duration::from_millis(800);

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email and password are required")]
    MissingFields,
    #[error("identity token rejected: {0}")]
    Token(#[from] TokenError),
    #[error("could not generate a signing key")]
    KeyGeneration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
}

pub fn avatar_url(seed: &str) -> String {
    format!(
        "https://api.dicebear.com/7.x/avataaars/svg?seed={}",
        utf8_percent_encode(seed, SEED)
    )
}

/// Signs tokens for users who log in with email and password.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    key: hmac::Key,
    secret: Vec<u8>,
    ttl: Ttl,
}

impl TokenIssuer {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            secret: secret.to_vec(),
            ttl: Ttl::days(7),
        }
    }

    /// Issuer with a throwaway key; its tokens stop verifying on restart.
    pub fn ephemeral() -> Result<Self, AuthError> {
        let mut secret = [0u8; 32];
        SystemRandom::new()
            .fill(&mut secret)
            .map_err(|_| AuthError::KeyGeneration)?;
        Ok(Self::new(&secret))
    }

    pub fn issue(&self, user: &UserProfile) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = IdentityClaims {
            sub: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            picture: user.avatar.clone(),
            exp: (now + self.ttl).timestamp(),
            iat: Some(now.timestamp()),
            iss: Some(LOCAL_ISSUER.into()),
            aud: None,
        };
        jwt::sign_hs256(&claims, LOCAL_KID, &self.key)
    }

    fn key_set(&self) -> KeySet {
        let mut keys = KeySet::new();
        keys.insert_hmac(LOCAL_KID, &self.secret);
        keys
    }
}

/// Where provider keys are re-read from when a token names an unknown kid.
#[derive(Debug, Clone)]
struct KeySource {
    http: reqwest::Client,
    url: String,
}

/// Turns credentials into a local [`UserProfile`] plus bearer token.
#[derive(Debug)]
pub struct AuthResolver {
    provider_keys: RwLock<KeySet>,
    key_source: Option<KeySource>,
    provider_policy: Policy,
    issuer: TokenIssuer,
    latency: Duration,
}

impl AuthResolver {
    pub fn new(provider_keys: KeySet, provider_policy: Policy, issuer: TokenIssuer) -> Self {
        Self {
            provider_keys: RwLock::new(provider_keys),
            key_source: None,
            provider_policy,
            issuer,
            latency: EMAIL_LATENCY,
        }
    }

    /// Loads Google's signing keys and sets up the local issuer from config.
    pub async fn google(cfg: &Config, http: &reqwest::Client) -> Result<Self, AuthError> {
        let keys = KeySet::fetch(http, jwt::GOOGLE_JWKS_URL).await?;
        let issuer = match &cfg.signing_secret {
            Some(s) => TokenIssuer::new(s.as_bytes()),
            None => {
                tracing::warn!("AUTH_SIGNING_SECRET unset, issued tokens will not survive a restart");
                TokenIssuer::ephemeral()?
            }
        };
        Ok(Self::new(keys, Policy::google(cfg.google_client_id.clone()), issuer)
            .with_key_source(http.clone(), jwt::GOOGLE_JWKS_URL))
    }

    /// Lets [`AuthResolver::resolve_google_token`] reload the provider keys
    /// from `url` after a rotation.
    pub fn with_key_source(mut self, http: reqwest::Client, url: impl Into<String>) -> Self {
        self.key_source = Some(KeySource { http, url: url.into() });
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Maps a provider identity token onto a profile. The token must verify.
    pub fn process_google_token(&self, credential: &str) -> Result<AuthResponse, AuthError> {
        let claims = {
            let keys = self.provider_keys.read().unwrap_or_else(PoisonError::into_inner);
            jwt::verify(credential, &keys, &self.provider_policy)?
        };
        let user = UserProfile::new_member(claims.sub, claims.name, claims.email, claims.picture);
        Ok(AuthResponse {
            user,
            token: credential.to_string(),
        })
    }

    /// Like [`AuthResolver::process_google_token`], but a token signed with a
    /// key we have not seen triggers one reload of the provider keys.
    pub async fn resolve_google_token(&self, credential: &str) -> Result<AuthResponse, AuthError> {
        match self.process_google_token(credential) {
            Err(AuthError::Token(TokenError::UnknownKey(kid))) => {
                let Some(source) = &self.key_source else {
                    return Err(TokenError::UnknownKey(kid).into());
                };
                tracing::info!(?kid, "unknown signing key, reloading provider keys");
                let fresh = KeySet::fetch(&source.http, &source.url).await?;
                *self.provider_keys.write().unwrap_or_else(PoisonError::into_inner) = fresh;
                self.process_google_token(credential)
            }
            other => other,
        }
    }

    /// Accepts any non-empty pair; there is no account store to check the
    /// password against.
    pub async fn login_with_email(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        tokio::time::sleep(self.latency).await;

        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        let local = email.split('@').next().unwrap_or(email);
        let mut chars = local.chars();
        let name = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };

        let user = UserProfile::new_member(format!("email_{email}"), name, email.to_string(), avatar_url(email));
        let token = self.issuer.issue(&user)?;
        tracing::info!(user = %user.id, "email login");
        Ok(AuthResponse { user, token })
    }

    /// Checks a token this resolver issued.
    pub fn verify_issued(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let policy = Policy {
            issuers: vec![LOCAL_ISSUER.into()],
            ..Policy::default()
        };
        Ok(jwt::verify(token, &self.issuer.key_set(), &policy)?)
    }
}

pub fn guest() -> AuthResponse {
    AuthResponse {
        user: UserProfile::new_member(
            "guest_demo".into(),
            "Guest Student".into(),
            "guest@mindforge.ai".into(),
            avatar_url("Guest"),
        ),
        token: GUEST_TOKEN.into(),
    }
}
