//! 서비스 모듈.
//!
//! 서버 시작 시 한 번 실행되는 초기화 작업을 제공합니다.

pub mod bootstrap;

pub use bootstrap::{bootstrap_directory, BootstrapError, BootstrapReport};
