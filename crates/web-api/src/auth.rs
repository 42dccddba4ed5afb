//! JWT 准入
//!
//! 连接握手前从 `Authorization: Bearer` 头或 `?token=` 查询参数中解析用户标识。
//! 中继本身只接收解析后的 [`UserId`]。

use axum::http::{header::AUTHORIZATION, HeaderMap};
use config::JwtConfig;
use domain::UserId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// 缺失时按空字符串处理，由准入阶段统一拒绝
    #[serde(default)]
    pub user_id: String,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

/// JWT Token 服务
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 签发 token，供运维工具和测试使用
    pub fn generate_token(&self, user_id: &str) -> Result<String, ApiError> {
        let exp = chrono::Duration::try_hours(self.config.expiration_hours)
            .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| ApiError::bad_request("Token expiration is out of range"))?;

        let claims = Claims {
            user_id: user_id.to_owned(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| ApiError::unauthorized(format!("Token generation failed: {}", err)))
    }

    /// 验证并解析 JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|err| ApiError::unauthorized(format!("Invalid token: {}", err)))
    }

    /// HTTP 接口使用：必须携带有效 token 且用户标识非空
    pub fn extract_user_from_headers(&self, headers: &HeaderMap) -> Result<UserId, ApiError> {
        let token = bearer_token(headers)?
            .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

        let claims = self.verify_token(token)?;
        UserId::parse(claims.user_id).map_err(|_| ApiError::unauthorized("User ID is required"))
    }

    /// WebSocket 准入使用
    ///
    /// - 没有任何凭证，或 token 有效但 `user_id` 为空：`Ok(None)`，由连接层以关闭帧拒绝
    /// - 凭证存在但无效或过期：`Err`，握手前直接返回 401
    pub fn resolve_identity(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<Option<UserId>, ApiError> {
        let token = match bearer_token(headers)? {
            Some(token) => Some(token),
            None => query_token.filter(|token| !token.is_empty()),
        };

        let Some(token) = token else {
            return Ok(None);
        };

        let claims = self.verify_token(token)?;
        Ok(UserId::parse(claims.user_id).ok())
    }
}

/// 读取 Bearer token，前缀不区分大小写
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid authorization header format"))?;

    match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => Ok(Some(value[7..].trim())),
        _ => Err(ApiError::unauthorized("Invalid authorization header format")),
    }
}
