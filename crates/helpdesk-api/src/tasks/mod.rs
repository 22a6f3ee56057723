//! 백그라운드 태스크 모듈.
//!
//! 서버 실행 중 주기적으로 실행되는 백그라운드 작업을 정의합니다.
//! - 토큰 정리: 만료된 토큰 행을 주기적으로 삭제

pub mod token_prune;

pub use token_prune::{run_prune_batch, start_token_pruner, TokenPruneConfig};
