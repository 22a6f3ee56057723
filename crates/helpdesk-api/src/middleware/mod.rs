//! API 서버용 HTTP middleware.
//!
//! 권한 게이트는 [`crate::auth::authorize`]에 있습니다.

mod metrics;

pub use metrics::metrics_layer;
