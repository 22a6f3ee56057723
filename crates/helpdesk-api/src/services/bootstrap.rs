//! 디렉터리 초기화.
//!
//! 빈 저장소로 시작해도 관리 API를 쓸 수 있도록
//! 슈퍼 관리자 그룹과 (설정된 경우) 초기 관리자 계정을 만듭니다.
//! 이미 있는 그룹/계정은 건드리지 않습니다.

use thiserror::Error;
use tracing::{info, warn};

use helpdesk_core::{normalize_login, BootstrapConfig, Group, UserStatus};

use crate::auth::{hash_password, validate_password_strength, PasswordError};
use crate::repository::{DirectoryStore, NewGroup, NewUser, StoreError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("초기 관리자 비밀번호 오류: {0}")]
    Password(#[from] PasswordError),
}

/// 초기화 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub group_created: bool,
    pub admin_created: bool,
}

/// 슈퍼 관리자 그룹과 초기 관리자 계정을 보장합니다.
pub async fn bootstrap_directory(
    directory: &dyn DirectoryStore,
    super_admin_group: &str,
    config: &BootstrapConfig,
) -> Result<BootstrapReport, BootstrapError> {
    let (group, group_created) = ensure_group(directory, super_admin_group).await?;

    let (Some(username), Some(password)) = (config.username.as_deref(), config.password.as_deref())
    else {
        return Ok(BootstrapReport {
            group_created,
            admin_created: false,
        });
    };

    let username = normalize_login(username);
    if directory.find_user_by_login(&username).await?.is_some() {
        info!(username = %username, "초기 관리자 계정이 이미 존재");
        return Ok(BootstrapReport {
            group_created,
            admin_created: false,
        });
    }

    validate_password_strength(password)?;
    let email = config
        .email
        .as_deref()
        .map(normalize_login)
        .unwrap_or_else(|| format!("{}@localhost", username));

    let admin = directory
        .create_user(NewUser {
            username,
            email,
            password_hash: hash_password(password)?,
            first_name: "Admin".to_string(),
            last_name: String::new(),
            group_id: Some(group.id),
            status: UserStatus::Active,
        })
        .await?;
    warn!(
        user_id = %admin.id,
        username = %admin.username,
        "초기 관리자 계정 생성. 비밀번호를 변경하세요"
    );

    Ok(BootstrapReport {
        group_created,
        admin_created: true,
    })
}

async fn ensure_group(
    directory: &dyn DirectoryStore,
    name: &str,
) -> Result<(Group, bool), StoreError> {
    if let Some(group) = directory.find_group_by_name(name).await? {
        return Ok((group, false));
    }

    let group = directory
        .create_group(NewGroup {
            name: name.to_string(),
            description: Some("모든 라우트에 접근 가능한 슈퍼 관리자".to_string()),
            creator_id: None,
        })
        .await?;
    info!(group_id = %group.id, name = %group.name, "슈퍼 관리자 그룹 생성");
    Ok((group, true))
}
