//! 라우트 카탈로그.
//!
//! 모든 라우트는 [`CatalogRouter`]를 통해 등록되며, axum 라우트와 함께
//! `(메서드, 경로 템플릿)` 쌍이 기록됩니다. 기록된 목록은 site-map 응답과
//! 권한 리소스 작성에 쓰입니다.

use std::collections::BTreeSet;

use axum::{
    handler::Handler,
    http::Method,
    routing::{self, MethodRouter},
    Router,
};

use helpdesk_core::permission_key;

/// 등록된 라우트 목록.
#[derive(Debug, Clone, Default)]
pub struct RouteCatalog {
    // (경로, 소문자 메서드) 순으로 정렬
    entries: BTreeSet<(&'static str, String)>,
}

impl RouteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: &Method, path: &'static str) {
        self.entries
            .insert((path, method.as_str().to_ascii_lowercase()));
    }

    /// 다른 카탈로그의 항목을 모두 추가합니다.
    pub fn extend(&mut self, other: &RouteCatalog) {
        self.entries.extend(other.entries.iter().cloned());
    }

    pub fn contains(&self, method: &Method, path: &str) -> bool {
        let method = method.as_str().to_ascii_lowercase();
        self.entries
            .iter()
            .any(|(p, m)| *p == path && *m == method)
    }

    /// `"<method>@<path>"` 목록. 경로, 메서드 순으로 정렬됩니다.
    pub fn site_map(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(path, method)| permission_key(method, path))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 카탈로그를 함께 기록하는 라우터 빌더.
pub struct CatalogRouter<S> {
    router: Router<S>,
    catalog: RouteCatalog,
}

impl<S> Default for CatalogRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> CatalogRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            catalog: RouteCatalog::new(),
        }
    }

    pub fn get<H, T>(self, path: &'static str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.add(Method::GET, path, routing::get(handler))
    }

    pub fn post<H, T>(self, path: &'static str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.add(Method::POST, path, routing::post(handler))
    }

    pub fn put<H, T>(self, path: &'static str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.add(Method::PUT, path, routing::put(handler))
    }

    pub fn patch<H, T>(self, path: &'static str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.add(Method::PATCH, path, routing::patch(handler))
    }

    pub fn delete<H, T>(self, path: &'static str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.add(Method::DELETE, path, routing::delete(handler))
    }

    fn add(mut self, method: Method, path: &'static str, route: MethodRouter<S>) -> Self {
        // 같은 경로에 대한 route 호출은 axum이 메서드 라우터를 병합합니다.
        self.router = self.router.route(path, route);
        self.catalog.insert(&method, path);
        self
    }

    /// 경로가 겹치지 않는 다른 빌더를 합칩니다.
    pub fn merge(mut self, other: CatalogRouter<S>) -> Self {
        self.router = self.router.merge(other.router);
        self.catalog.extend(&other.catalog);
        self
    }

    pub fn catalog(&self) -> &RouteCatalog {
        &self.catalog
    }

    pub fn into_parts(self) -> (Router<S>, RouteCatalog) {
        (self.router, self.catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    async fn ok() -> &'static str {
        "ok"
    }

    #[test]
    fn test_site_map_sorted_by_path_then_method() {
        let router: CatalogRouter<()> = CatalogRouter::new()
            .post("/questions", ok)
            .delete("/questions/{id}", ok)
            .get("/questions", ok)
            .get("/answers", ok);

        assert_eq!(
            router.catalog().site_map(),
            vec![
                "get@/answers",
                "get@/questions",
                "post@/questions",
                "delete@/questions/{id}",
            ]
        );
    }

    #[test]
    fn test_contains_is_case_insensitive_on_method() {
        let router: CatalogRouter<()> = CatalogRouter::new().put("/questions/{id}", ok);
        assert!(router.catalog().contains(&Method::PUT, "/questions/{id}"));
        assert!(!router.catalog().contains(&Method::GET, "/questions/{id}"));
    }

    #[test]
    fn test_merge_combines_catalogs() {
        let a: CatalogRouter<()> = CatalogRouter::new().get("/a", ok);
        let b: CatalogRouter<()> = CatalogRouter::new().get("/b", ok);
        assert_eq!(a.merge(b).catalog().len(), 2);
    }

    #[tokio::test]
    async fn test_same_path_methods_are_both_routed() {
        let (router, _) = CatalogRouter::<()>::new()
            .get("/questions", ok)
            .post("/questions", ok)
            .into_parts();

        for method in [Method::GET, Method::POST] {
            let response = router
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri("/questions")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
