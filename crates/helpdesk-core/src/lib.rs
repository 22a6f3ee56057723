//! # Helpdesk Core
//!
//! 헬프데스크 백엔드의 핵심 도메인 모델 및 공통 인프라를 제공합니다.
//!
//! 이 크레이트는 API 서버 전반에서 사용되는 기본 타입을 제공합니다:
//! - 사용자, 그룹, 역할, 권한 엔티티
//! - 권한 리소스 문자열(`<method>@<path>`) 파싱 및 권한 집합
//! - 발급 토큰 메타데이터
//! - 헬프데스크 질문, 댓글, 처리 이력
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
