//! 인증 및 권한 부여.
//!
//! JWT 기반 인증과 User → Group → Role → Permission 그래프 기반 접근 제어를 제공합니다.
//!
//! # 구성 요소
//!
//! - [`PermissionResolver`]: 사용자의 권한 집합 해석
//! - [`TokenIssuer`]: 로그인/토큰 갱신/비밀번호 변경
//! - [`RevocationStore`]: 토큰 폐기 추적
//! - [`authorize`]: 라우트 단위 권한 게이트 미들웨어
//! - [`JwtAuth`]: 인증된 클레임 추출기
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn me(JwtAuth(claims): JwtAuth) -> impl IntoResponse {
//!     format!("Hello, {}!", claims.sub)
//! }
//! ```

mod gate;
mod issuer;
mod jwt;
mod password;
mod resolver;
mod revocation;

pub use gate::{authenticate, authorize, bearer_token, check_permission, AuthError, JwtAuth};
pub use issuer::{IssueError, IssuedTokens, TokenIssuer};
pub use jwt::{Claims, JwtError, JwtKeys};
pub use password::{
    hash_password, validate_password_strength, verify_password, PasswordError, MIN_PASSWORD_LEN,
};
pub use resolver::PermissionResolver;
pub use revocation::RevocationStore;
