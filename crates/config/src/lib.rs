//! 统一配置中心
//!
//! 提供中继服务的全局配置，包括：
//! - 监听地址
//! - JWT 准入校验
//! - 连接注册表与主题索引的策略
//!
//! 加载顺序：内置默认值 -> 可选配置文件（`APP_CONFIG_FILE`）-> 环境变量（`APP_*`，层级用 `__` 分隔）。

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

const DEV_JWT_SECRET: &str = "dev-secret-key-not-for-production-use";
/// token 有效期上限（一年）
const MAX_EXPIRATION_HOURS: i64 = 24 * 365;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务配置
    pub server: ServerConfig,
    /// JWT认证配置
    pub jwt: JwtConfig,
    /// 中继配置
    pub relay: RelayConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// JWT配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

/// 中继配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// 每个连接出站缓冲区的帧数
    pub outbound_buffer: usize,
    /// 同一用户重复连接时的处理方式
    pub reconnect_policy: ReconnectPolicy,
    /// 断开连接时是否同时清理该用户的主题订阅
    pub prune_subscriptions_on_disconnect: bool,
}

/// 重复连接策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectPolicy {
    /// 新连接生效，旧连接收到关闭帧
    #[default]
    Replace,
    /// 保留旧连接，拒绝新连接
    Reject,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 8080,
            },
            jwt: JwtConfig {
                secret: DEV_JWT_SECRET.into(),
                expiration_hours: 24,
            },
            relay: RelayConfig {
                outbound_buffer: 64,
                reconnect_policy: ReconnectPolicy::Replace,
                prune_subscriptions_on_disconnect: true,
            },
        }
    }
}

impl AppConfig {
    /// 按默认顺序加载并校验配置
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// 构造默认的配置来源链
    pub fn figment() -> Figment {
        let mut fig = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::InvalidServerConfig(
                "host cannot be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidServerPort(
                "port must be greater than 0".to_string(),
            ));
        }

        if self.jwt.secret.len() < 16 {
            return Err(ConfigError::InvalidJwtSecret(
                "JWT secret must be at least 16 characters long".to_string(),
            ));
        }

        if self.jwt.expiration_hours <= 0 {
            return Err(ConfigError::InvalidJwtSecret(
                "expiration hours must be positive".to_string(),
            ));
        }

        if self.jwt.expiration_hours > MAX_EXPIRATION_HOURS {
            return Err(ConfigError::InvalidJwtSecret(format!(
                "expiration hours must not exceed {MAX_EXPIRATION_HOURS}"
            )));
        }

        if self.relay.outbound_buffer == 0 {
            return Err(ConfigError::InvalidRelayConfig(
                "outbound buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// 是否仍在使用内置的开发密钥
    pub fn uses_development_secret(&self) -> bool {
        self.jwt.secret == DEV_JWT_SECRET
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] figment::Error),
    #[error("Invalid JWT configuration: {0}")]
    InvalidJwtSecret(String),
    #[error("Invalid server port: {0}")]
    InvalidServerPort(String),
    #[error("Invalid server configuration: {0}")]
    InvalidServerConfig(String),
    #[error("Invalid relay configuration: {0}")]
    InvalidRelayConfig(String),
}
