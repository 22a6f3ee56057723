//! 권한 해석기.
//!
//! User → Group → Role → Permission 그래프를 평탄화하여 권한 집합을 만듭니다.
//! 읽기 전용이며 로그인과 토큰 갱신 시점에만 호출됩니다.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use helpdesk_core::{PermissionSet, User};

use crate::repository::{DirectoryStore, StoreResult};

/// 권한 해석기.
#[derive(Clone)]
pub struct PermissionResolver {
    directory: Arc<dyn DirectoryStore>,
    super_admin_group: String,
}

impl PermissionResolver {
    pub fn new(directory: Arc<dyn DirectoryStore>, super_admin_group: impl Into<String>) -> Self {
        Self {
            directory,
            super_admin_group: super_admin_group.into(),
        }
    }

    pub fn super_admin_group(&self) -> &str {
        &self.super_admin_group
    }

    /// 사용자 ID로 권한 집합을 해석합니다. 알 수 없는 사용자는 빈 집합입니다.
    pub async fn resolve(&self, user_id: Uuid) -> StoreResult<PermissionSet> {
        match self.directory.find_user(user_id).await? {
            Some(user) => self.resolve_user(&user).await,
            None => Ok(PermissionSet::empty()),
        }
    }

    /// 이미 조회한 사용자의 권한 집합을 해석합니다.
    ///
    /// - 그룹 없음 → 빈 집합
    /// - 슈퍼 관리자 그룹 → `{"*"}`
    /// - 그 외 → 그룹의 모든 역할이 가진 권한 리소스의 합집합
    pub async fn resolve_user(&self, user: &User) -> StoreResult<PermissionSet> {
        let Some(group_id) = user.group_id else {
            debug!(user_id = %user.id, "그룹 없는 사용자: 빈 권한");
            return Ok(PermissionSet::empty());
        };

        let Some(group) = self.directory.find_group(group_id).await? else {
            debug!(user_id = %user.id, %group_id, "존재하지 않는 그룹: 빈 권한");
            return Ok(PermissionSet::empty());
        };

        if group.name == self.super_admin_group {
            return Ok(PermissionSet::wildcard());
        }

        let mut permissions = PermissionSet::empty();
        for role in self.directory.roles_of_group(group.id).await? {
            for permission in self.directory.permissions_of_role(role.id).await? {
                permissions.insert(permission.resource);
            }
        }

        debug!(
            user_id = %user.id,
            group = %group.name,
            count = permissions.len(),
            "권한 해석 완료"
        );
        Ok(permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryStore, NewGroup, NewPermission, NewRole, NewUser};
    use helpdesk_core::UserStatus;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    async fn group(store: &MemoryStore, name: &str) -> Uuid {
        store
            .create_group(NewGroup {
                name: name.to_string(),
                description: None,
                creator_id: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn role(store: &MemoryStore, key: &str) -> Uuid {
        store
            .create_role(NewRole {
                key: key.to_string(),
                name: key.to_uppercase(),
                description: None,
                creator_id: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn permission(store: &MemoryStore, resource: &str) -> Uuid {
        store
            .create_permission(NewPermission {
                name: resource.to_string(),
                resource: resource.to_string(),
            })
            .await
            .unwrap()
            .id
    }

    async fn user(store: &MemoryStore, username: &str, group_id: Option<Uuid>) -> Uuid {
        store
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: "hash".to_string(),
                first_name: username.to_string(),
                last_name: "Test".to_string(),
                group_id,
                status: UserStatus::Active,
            })
            .await
            .unwrap()
            .id
    }

    fn resolver(store: &MemoryStore) -> PermissionResolver {
        PermissionResolver::new(Arc::new(store.clone()), "admin")
    }

    #[tokio::test]
    async fn test_user_without_group_resolves_empty() {
        let store = MemoryStore::new();
        let id = user(&store, "nogroup", None).await;
        assert!(resolver(&store).resolve(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_resolves_empty() {
        let store = MemoryStore::new();
        assert!(resolver(&store)
            .resolve(Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_super_admin_group_gets_wildcard() {
        let store = MemoryStore::new();
        let admin = group(&store, "admin").await;
        let id = user(&store, "root", Some(admin)).await;

        let set = resolver(&store).resolve(id).await.unwrap();
        assert!(set.is_wildcard());
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_union_across_roles_is_deduplicated() {
        let store = MemoryStore::new();
        let support = group(&store, "support").await;
        let agent = role(&store, "agent").await;
        let reviewer = role(&store, "reviewer").await;
        let list = permission(&store, "get@/questions").await;
        let update = permission(&store, "put@/questions/{id}").await;

        store.grant_permission(agent, list, None).await.unwrap();
        store.grant_permission(reviewer, list, None).await.unwrap();
        store.grant_permission(reviewer, update, None).await.unwrap();
        store.assign_role(support, agent, None).await.unwrap();
        store.assign_role(support, reviewer, None).await.unwrap();

        let id = user(&store, "alice", Some(support)).await;
        let set = resolver(&store).resolve(id).await.unwrap();
        assert_eq!(set.to_vec(), vec!["get@/questions", "put@/questions/{id}"]);
    }

    proptest! {
        /// 무작위 그래프에서 해석 결과는 그룹 역할들의 권한 리소스 합집합과 같습니다.
        #[test]
        fn resolve_equals_union_of_role_resources(
            // 역할별 권한 인덱스 목록 (권한 풀 크기 6)
            role_grants in prop::collection::vec(prop::collection::btree_set(0usize..6, 0..6), 0..5),
            assigned in prop::collection::btree_set(0usize..5, 0..5),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryStore::new();
                let mut permission_ids = Vec::new();
                for i in 0..6 {
                    permission_ids.push(permission(&store, &format!("get@/resource/{}", i)).await);
                }
                let support = group(&store, "support").await;

                let mut expected = BTreeSet::new();
                for (index, grants) in role_grants.iter().enumerate() {
                    let role_id = role(&store, &format!("role{}", index)).await;
                    for p in grants {
                        store.grant_permission(role_id, permission_ids[*p], None).await.unwrap();
                    }
                    if assigned.contains(&index) {
                        store.assign_role(support, role_id, None).await.unwrap();
                        expected.extend(grants.iter().map(|p| format!("get@/resource/{}", p)));
                    }
                }

                let id = user(&store, "prop", Some(support)).await;
                let set = resolver(&store).resolve(id).await.unwrap();
                let actual: BTreeSet<String> = set.iter().cloned().collect();
                assert_eq!(actual, expected);
            });
        }
    }
}
