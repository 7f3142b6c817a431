//! # Gate HTTP Server
//!
//! Wires the stores and services together and serves the webhook and admin
//! surfaces behind one router.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::admin_routes::admin_routes;
use super::chat_routes::{chat_routes, health_routes};
use super::config::HttpServerConfig;
use crate::core::config::GateConfig;
use crate::credential::InMemoryCredentialRepository;
use crate::observability::{AuditLog, FileAuditLog, Logger, MemoryAuditLog};
use crate::onboarding::{GateProtocol, InMemoryProfileRepository};
use crate::query::log::{InMemoryQueryLog, QueryLogRepository};
use crate::query::{
    CompletionClient, ExtractiveCompletion, KnowledgeStore, QueryService,
    UnconfiguredKnowledgeStore,
};
use crate::ratelimit::RateLimiter;
use crate::verification::{InMemoryCodeRepository, VerificationService};

/// Shared state behind every route
pub struct GateState {
    pub config: GateConfig,

    /// The onboarding protocol consulted by the webhook
    pub protocol: GateProtocol<
        InMemoryCodeRepository,
        InMemoryProfileRepository,
        InMemoryCredentialRepository,
    >,

    /// Query processing for authorized principals
    pub queries: QueryService,

    /// Issuance/administration over the same code and credential stores
    pub verification:
        VerificationService<InMemoryCodeRepository, InMemoryCredentialRepository>,

    /// Credential store, for the bulk import surface
    pub credentials: Arc<InMemoryCredentialRepository>,
}

impl GateState {
    /// Build state with the default stand-in retrieval/completion providers
    pub fn new(config: GateConfig) -> Self {
        Self::with_providers(
            config,
            Arc::new(UnconfiguredKnowledgeStore),
            Arc::new(ExtractiveCompletion),
        )
    }

    /// Build state around real retrieval and completion providers
    pub fn with_providers(
        config: GateConfig,
        knowledge: Arc<dyn KnowledgeStore>,
        completion: Arc<dyn CompletionClient>,
    ) -> Self {
        let codes = Arc::new(InMemoryCodeRepository::new());
        let credentials = Arc::new(InMemoryCredentialRepository::new());
        let profiles = Arc::new(InMemoryProfileRepository::new());
        let query_log = Arc::new(InMemoryQueryLog::new());

        let audit: Arc<dyn AuditLog> = match &config.audit_log_path {
            Some(path) => match FileAuditLog::open(path) {
                Ok(log) => Arc::new(log),
                Err(e) => {
                    Logger::error(
                        "AUDIT_LOG_OPEN_FAILED",
                        &[("path", path), ("error", &e.to_string())],
                    );
                    Arc::new(MemoryAuditLog::new())
                }
            },
            None => Arc::new(MemoryAuditLog::new()),
        };

        let protocol = GateProtocol::new(
            VerificationService::new(
                Arc::clone(&codes),
                Arc::clone(&credentials),
                Arc::clone(&audit),
                &config,
            ),
            profiles,
            Arc::clone(&audit),
            &config,
        );

        let limiter = RateLimiter::new(
            config.rate_limits.clone(),
            query_log.clone() as Arc<dyn QueryLogRepository>,
        );
        let queries = QueryService::new(
            knowledge,
            completion,
            query_log as Arc<dyn QueryLogRepository>,
            Arc::clone(&audit),
            limiter,
            &config,
        );

        let verification = VerificationService::new(
            Arc::clone(&codes),
            Arc::clone(&credentials),
            audit,
            &config,
        );

        Self {
            config,
            protocol,
            queries,
            verification,
            credentials,
        }
    }
}

/// HTTP server for the gate
pub struct GateServer {
    config: HttpServerConfig,
    router: Router,
}

impl GateServer {
    /// Build a server around the given state
    pub fn new(state: Arc<GateState>) -> Self {
        let config = state.config.server.clone();
        let router = Self::build_router(&config, state);
        Self { config, router }
    }

    fn build_router(config: &HttpServerConfig, state: Arc<GateState>) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(health_routes())
            .nest("/webhook", chat_routes(state.clone()))
            .nest("/admin", admin_routes(state))
            .layer(cors)
    }

    /// Socket address string
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// The router (for tests)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until the process is stopped
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{e}")))?;

        Logger::info(
            "SERVER_STARTED",
            &[("addr", &addr.to_string()), ("service", "codegate")],
        );

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;

        Ok(())
    }
}
