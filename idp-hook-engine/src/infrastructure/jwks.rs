//! # JWKS 签名校验
//!
//! 从 `jwks_url` 拉取公钥集合，按 JWT 头中的 `kid` 选择密钥并校验签名。
//! 签名算法以密钥声明的 `alg` 为准，密钥未声明时只接受默认的非对称算法。

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use serde::de::DeserializeOwned;

use idp_hooks_core::{ErrorBuilder, ErrorCode, HookError, Result};

use crate::infrastructure::adapters::http::{read_json, transport_error};

/// 密钥未声明 `alg` 时允许的算法
const DEFAULT_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::ES256,
    Algorithm::ES384,
];

pub struct JwksVerifier {
    client: Client,
    jwks_url: String,
    service: &'static str,
}

impl JwksVerifier {
    pub fn new(client: Client, jwks_url: String, service: &'static str) -> Self {
        Self {
            client,
            jwks_url,
            service,
        }
    }

    async fn fetch_keys(&self) -> Result<JwkSet> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|err| transport_error(self.service, err))?;
        read_json(self.service, response).await
    }

    /// 校验签名并解析声明
    ///
    /// 任何失败（缺少 kid、密钥不存在、签名或有效期不符）都归为校验失败。
    pub async fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T> {
        let header = decode_header(token).map_err(|err| invalid("malformed id_token", err))?;
        let kid = header.kid.as_deref().ok_or_else(|| {
            ErrorBuilder::new(ErrorCode::VerificationFailed, "id_token header has no kid")
                .build_error()
        })?;

        let keys = self.fetch_keys().await.map_err(|err| {
            ErrorBuilder::new(ErrorCode::VerificationFailed, "unable to fetch signing keys")
                .details(err.to_string())
                .build_error()
        })?;
        let jwk = keys.find(kid).ok_or_else(|| {
            ErrorBuilder::new(ErrorCode::VerificationFailed, "signing key not found")
                .details(format!("kid={kid}"))
                .build_error()
        })?;
        let algorithm = pinned_algorithm(jwk, header.alg)?;
        let key = DecodingKey::from_jwk(jwk).map_err(|err| invalid("unusable signing key", err))?;

        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;

        let data = decode::<T>(token, &key, &validation)
            .map_err(|err| invalid("id_token signature invalid", err))?;
        Ok(data.claims)
    }
}

/// 校验 JWT 头中的算法与密钥一致
fn pinned_algorithm(jwk: &Jwk, requested: Algorithm) -> Result<Algorithm> {
    let allowed = match &jwk.common.key_algorithm {
        Some(declared) => {
            let algorithm = serde_json::to_value(declared)
                .and_then(serde_json::from_value::<Algorithm>)
                .map_err(|err| {
                    ErrorBuilder::new(
                        ErrorCode::VerificationFailed,
                        "signing key declares an unusable alg",
                    )
                    .details(err.to_string())
                    .build_error()
                })?;
            vec![algorithm]
        }
        None => DEFAULT_ALGORITHMS.to_vec(),
    };

    if !allowed.contains(&requested) {
        return Err(
            ErrorBuilder::new(ErrorCode::VerificationFailed, "id_token alg not allowed for key")
                .details(format!("alg={requested:?}, allowed={allowed:?}"))
                .build_error(),
        );
    }
    Ok(requested)
}

fn invalid(message: &str, err: jsonwebtoken::errors::Error) -> HookError {
    ErrorBuilder::new(ErrorCode::VerificationFailed, message)
        .details(err.to_string())
        .build_error()
}
