//! 권한 리소스와 권한 집합.
//!
//! 권한은 `"<소문자 HTTP 메서드>@<라우트 템플릿>"` 형식의 문자열입니다.
//! 예: `get@/api/v1/admin/users/{user_id}`
//!
//! 라우트 템플릿은 라우터에 등록된 경로 그대로이며, 요청 시점에는
//! axum의 `MatchedPath`와 문자열로 비교됩니다.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{HelpdeskError, HelpdeskResult};

/// 모든 라우트를 허용하는 와일드카드 권한.
pub const WILDCARD: &str = "*";

/// 권한 리소스에 허용되는 HTTP 메서드.
const ALLOWED_METHODS: [&str; 5] = ["get", "post", "put", "patch", "delete"];

/// 권한 엔티티.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Permission {
    pub id: Uuid,
    /// 사람이 읽는 이름
    pub name: String,
    /// `<method>@<path-template>` (유일)
    pub resource: String,
}

/// 메서드와 라우트 템플릿으로 권한 키를 만듭니다.
///
/// 메서드는 소문자로 변환되고 템플릿은 그대로 사용됩니다.
pub fn permission_key(method: &str, template: &str) -> String {
    format!("{}@{}", method.to_lowercase(), template)
}

/// 파싱된 권한 리소스.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionResource {
    method: String,
    path: String,
}

impl PermissionResource {
    /// `<method>@<path>` 문자열을 파싱합니다.
    ///
    /// 메서드는 대소문자를 구분하지 않지만 결과는 소문자로 정규화됩니다.
    /// 경로는 `/`로 시작해야 하며 공백을 포함할 수 없습니다.
    pub fn parse(raw: &str) -> HelpdeskResult<Self> {
        let raw = raw.trim();
        let (method, path) = raw.split_once('@').ok_or_else(|| {
            HelpdeskError::InvalidInput(format!(
                "권한 리소스는 '<method>@<path>' 형식이어야 합니다: {}",
                raw
            ))
        })?;

        let method = method.to_lowercase();
        if !ALLOWED_METHODS.contains(&method.as_str()) {
            return Err(HelpdeskError::InvalidInput(format!(
                "지원하지 않는 HTTP 메서드: {}",
                method
            )));
        }

        if !path.starts_with('/') || path.chars().any(char::is_whitespace) {
            return Err(HelpdeskError::InvalidInput(format!(
                "잘못된 라우트 경로: {}",
                path
            )));
        }

        Ok(Self {
            method,
            path: path.to_string(),
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for PermissionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.method, self.path)
    }
}

impl std::str::FromStr for PermissionResource {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// 사용자에게 부여된 권한 문자열의 집합 (중복 없음, 정렬됨).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    /// 빈 집합. 어떤 라우트도 허용하지 않습니다.
    pub fn empty() -> Self {
        Self::default()
    }

    /// 와일드카드만 담은 집합.
    pub fn wildcard() -> Self {
        Self(BTreeSet::from([WILDCARD.to_string()]))
    }

    /// 권한 키가 허용되는지 확인합니다.
    pub fn allows(&self, key: &str) -> bool {
        self.0.contains(WILDCARD) || self.0.contains(key)
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.contains(WILDCARD)
    }

    pub fn insert(&mut self, resource: impl Into<String>) -> bool {
        self.0.insert(resource.into())
    }

    pub fn contains(&self, resource: &str) -> bool {
        self.0.contains(resource)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// JWT 클레임에 넣을 정렬된 목록.
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<String> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for PermissionSet {
    fn from(list: Vec<String>) -> Self {
        list.into_iter().collect()
    }
}
