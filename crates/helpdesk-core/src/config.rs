//! 설정 관리.
//!
//! 애플리케이션 설정을 정의하고 로드합니다. 설정은 프로세스 시작 시
//! 한 번 만들어져 [`AppConfig`] 값으로 서버 상태에 전달됩니다.
//!
//! 로드 순서: 기본값 → TOML 파일(선택) → `HELPDESK__` 접두사 환경 변수.

use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// 개발용 기본 JWT 시크릿. 운영 환경에서는 반드시 교체해야 합니다.
pub const DEV_JWT_SECRET: &str = "dev-secret-key-change-in-production";

/// 애플리케이션 설정.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 인증/토큰 설정
    #[serde(default)]
    pub auth: AuthConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// CORS 설정
    #[serde(default)]
    pub cors: CorsConfig,
    /// 초기 관리자 계정 설정
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    /// `host:port` 형식의 바인딩 주소.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL 연결 URL. 없으면 인메모리 저장소를 사용합니다.
    #[serde(default)]
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connection_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connection_timeout_secs: 10,
        }
    }
}

/// 인증/토큰 설정.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// JWT 서명 키
    #[serde(deserialize_with = "deserialize_secret")]
    pub jwt_secret: SecretString,
    /// Access Token 만료 (일)
    pub access_token_days: i64,
    /// Refresh Token 만료 (일)
    pub refresh_token_days: i64,
    /// 모든 라우트에 접근 가능한 슈퍼 관리자 그룹 이름
    pub super_admin_group: String,
    /// 만료 토큰 정리 주기 (초)
    pub prune_interval_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: SecretString::new(DEV_JWT_SECRET.into()),
            access_token_days: 30,
            refresh_token_days: 90,
            super_admin_group: "admin".to_string(),
            prune_interval_secs: 60 * 60,
        }
    }
}

impl AuthConfig {
    /// 지정한 시크릿으로 기본 설정을 생성합니다.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: SecretString::new(secret.into().into_boxed_str()),
            ..Default::default()
        }
    }

    /// 개발용 기본 시크릿을 사용 중인지 확인합니다.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret.expose_secret() == DEV_JWT_SECRET
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::new(raw.into_boxed_str()))
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "helpdesk_api=info,tower_http=debug".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// CORS 설정.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// 허용 origin 목록. 비어 있으면 모든 origin을 허용합니다 (개발 모드).
    #[serde(default)]
    pub origins: Vec<String>,
}

/// 초기 관리자 계정 설정.
///
/// `username`과 `password`가 모두 설정된 경우에만 시작 시 계정을 생성합니다.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
            cors: CorsConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl AppConfig {
    /// 파일(선택)과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.connection_timeout_secs", 10)?
            .set_default("auth.jwt_secret", DEV_JWT_SECRET)?
            .set_default("auth.access_token_days", 30)?
            .set_default("auth.refresh_token_days", 90)?
            .set_default("auth.super_admin_group", "admin")?
            .set_default("auth.prune_interval_secs", 3600)?
            .set_default("logging.level", "helpdesk_api=info,tower_http=debug")?
            .set_default("logging.format", "pretty")?;

        // 파일에서 로드 (없어도 무방)
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.as_ref()).required(false));
        }

        // 환경 변수로 오버라이드
        builder = builder.add_source(
            config::Environment::with_prefix("HELPDESK")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.origins")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// 기본 경로(`HELPDESK_CONFIG` 또는 `config/default.toml`)에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        let path = std::env::var("HELPDESK_CONFIG")
            .unwrap_or_else(|_| "config/default.toml".to_string());
        Self::load(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_token_lifetimes() {
        let config = AppConfig::default();
        assert_eq!(config.auth.access_token_days, 30);
        assert_eq!(config.auth.refresh_token_days, 90);
        assert_eq!(config.auth.super_admin_group, "admin");
        assert!(config.auth.uses_dev_secret());
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_with_secret() {
        let auth = AuthConfig::with_secret("another-secret-with-enough-length-000");
        assert!(!auth.uses_dev_secret());
        assert_eq!(auth.access_token_days, 30);
    }

    #[test]
    fn test_bind_address() {
        let server = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        };
        assert_eq!(server.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = AppConfig::load(None::<&str>).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.refresh_token_days, 90);
        assert_eq!(config.logging.format, "pretty");
    }
}
