//! 헬프데스크 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다.
//! 인증, 사용자/그룹/역할/권한 관리, 질문(티켓), 헬스 체크 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use helpdesk_api::metrics::setup_metrics_recorder;
use helpdesk_api::middleware::metrics_layer;
use helpdesk_api::openapi::swagger_ui_router;
use helpdesk_api::repository::{DirectoryStore, MemoryStore, PgStore, TicketStore, TokenStore};
use helpdesk_api::routes::{api_routes, ApiRoutes};
use helpdesk_api::services::bootstrap_directory;
use helpdesk_api::state::AppState;
use helpdesk_api::tasks::{start_token_pruner, TokenPruneConfig};
use helpdesk_core::logging::{init_logging, LogConfig};
use helpdesk_core::{AppConfig, CorsConfig, DatabaseConfig};

/// 저장소 연결 결과. 구현체 하나가 세 트레이트를 모두 맡습니다.
struct Stores {
    directory: Arc<dyn DirectoryStore>,
    tokens: Arc<dyn TokenStore>,
    tickets: Arc<dyn TicketStore>,
    pool: Option<sqlx::PgPool>,
}

/// 저장소 연결.
///
/// `database.url`이 있으면 PostgreSQL, 없으면 인메모리 저장소를 씁니다.
/// 인메모리 저장소는 재시작하면 모든 데이터가 사라집니다.
async fn connect_store(config: &DatabaseConfig) -> anyhow::Result<Stores> {
    let Some(url) = config.url.as_deref() else {
        warn!("database.url not set, using in-memory store (data is lost on restart)");
        let store = MemoryStore::new();
        return Ok(Stores {
            directory: Arc::new(store.clone()),
            tokens: Arc::new(store.clone()),
            tickets: Arc::new(store),
            pool: None,
        });
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
        .connect(url)
        .await
        .context("데이터베이스 연결 실패")?;

    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await
        .context("데이터베이스 연결 확인 실패")?;
    info!("Connected to PostgreSQL successfully");

    let store = PgStore::new(pool.clone());
    Ok(Stores {
        directory: Arc::new(store.clone()),
        tokens: Arc::new(store.clone()),
        tickets: Arc::new(store),
        pool: Some(pool),
    })
}

/// CORS 미들웨어 구성.
///
/// `cors.origins`가 비어 있으면 개발 모드로 간주하여 모든 origin을 허용합니다.
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let restricted = !origins.is_empty();
    let allow_origin = if restricted {
        info!("CORS configured with {} allowed origins", origins.len());
        AllowOrigin::list(origins)
    } else {
        if !config.origins.is_empty() {
            warn!("cors.origins contains no valid origins, allowing any");
        } else {
            warn!("cors.origins not set, allowing any origin (development mode)");
        }
        AllowOrigin::any()
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        // 자격 증명은 origin을 제한한 경우에만 허용
        .allow_credentials(restricted)
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(
    routes: ApiRoutes,
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    cors: &CorsConfig,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(routes.into_router(state))
        .merge(swagger_ui_router())
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 (30초) - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer(cors))
}

/// OpenAPI 스펙 내보내기 처리.
///
/// `--export-openapi` 플래그 또는 `EXPORT_OPENAPI` 환경변수가 설정된 경우
/// OpenAPI JSON 스펙을 stdout으로 출력하고 `true`를 반환합니다.
fn handle_export_openapi() -> anyhow::Result<bool> {
    use helpdesk_api::openapi::ApiDoc;
    use utoipa::OpenApi as _;

    let export_flag = std::env::args().any(|arg| arg == "--export-openapi");
    let export_env = std::env::var("EXPORT_OPENAPI")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    if export_flag || export_env {
        println!("{}", serde_json::to_string_pretty(&ApiDoc::openapi())?);
        return Ok(true);
    }

    Ok(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    if handle_export_openapi()? {
        return Ok(());
    }

    let config = AppConfig::load_default().context("설정 로드 실패")?;

    init_logging(&LogConfig::from_settings(&config.logging))
        .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    info!("Starting Helpdesk API server...");

    if config.auth.uses_dev_secret() {
        warn!("auth.jwt_secret not set, using default (INSECURE for development only)");
    }

    let metrics_handle = setup_metrics_recorder().context("메트릭 레코더 설치 실패")?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = config.server.bind_address().parse().map_err(|e| {
        error!(
            host = %config.server.host,
            port = config.server.port,
            error = %e,
            "소켓 주소 설정이 유효하지 않습니다. server.host, server.port 설정을 확인하세요."
        );
        e
    })?;

    let stores = connect_store(&config.database).await?;

    let report = bootstrap_directory(
        stores.directory.as_ref(),
        &config.auth.super_admin_group,
        &config.bootstrap,
    )
    .await
    .context("디렉터리 초기화 실패")?;
    info!(
        group_created = report.group_created,
        admin_created = report.admin_created,
        "Directory bootstrap completed"
    );

    let routes = api_routes();
    let mut state = AppState::new(
        stores.directory,
        stores.tokens,
        stores.tickets,
        &config.auth,
        routes.catalog().clone(),
    );
    if let Some(pool) = stores.pool {
        state = state.with_db_pool(pool);
    }
    let state = Arc::new(state);

    info!(
        version = %state.version,
        has_db = state.has_db_pool(),
        routes = state.catalog.len(),
        "Application state initialized"
    );

    // 전역 종료 토큰 (백그라운드 태스크에 종료 전파)
    let shutdown_token = CancellationToken::new();

    let pruner = start_token_pruner(
        state.revocation.clone(),
        TokenPruneConfig::from_auth(&config.auth),
        shutdown_token.clone(),
    );

    let app = create_router(routes, state, metrics_handle, &config.cors);

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();

    if tokio::time::timeout(Duration::from_secs(10), pruner)
        .await
        .is_err()
    {
        warn!("Cleanup timeout, forcing shutdown");
    }

    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
