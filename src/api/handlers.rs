//! API Handlers
//!
//! HTTP request handlers for each statistics service endpoint.

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use tracing::{info, warn};

use super::extract::{ApiJson, ApiQuery};
use crate::aggregation::AggregationEngine;
use crate::auth::AuthGateway;
use crate::cache::CacheCoordinator;
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::{
    CacheStatsResponse, DashboardStatsResponse, HealthResponse, LoginRequest, LoginResponse,
    LogoutResponse, StatsQuery,
};
use crate::seed::seed_demo_data;
use crate::store::{ConnectionPool, MemoryStore};
use crate::tenant::{bearer_token, ScopeRequest, TenantIsolationGuard};

/// Application state shared across all handlers.
///
/// Everything is created once at start-up and shared through `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<AuthGateway>,
    pub guard: TenantIsolationGuard,
    pub coordinator: Arc<CacheCoordinator>,
    /// Record store; every write invalidates the affected cache entries
    /// before it returns
    pub store: Arc<MemoryStore>,
}

impl AppState {
    /// Wires the gateway, store, engine and cache together.
    pub fn new(config: Config, gateway: Arc<AuthGateway>, store: Arc<MemoryStore>) -> Self {
        let engine = Arc::new(AggregationEngine::new(
            store.clone(),
            config.retry_policy(),
            config.low_stock_threshold,
        ));
        let coordinator = Arc::new(CacheCoordinator::new(
            engine,
            config.cache_max_entries,
            config.coordinator_settings(),
        ));
        store.add_observer(&coordinator);

        Self {
            config: Arc::new(config),
            guard: TenantIsolationGuard::new(gateway.clone()),
            gateway,
            coordinator,
            store,
        }
    }

    /// Creates a new AppState from configuration, seeding demo data when
    /// enabled.
    pub fn from_config(config: &Config) -> Self {
        let pool = ConnectionPool::new(config.store_pool_size, config.store_acquire_timeout());
        let store = Arc::new(MemoryStore::new(pool));
        let gateway = Arc::new(AuthGateway::new(config.credential_ttl()));

        if config.seed_demo_data {
            seed_demo_data(&gateway, &store);
        }

        Self::new(config.clone(), gateway, store)
    }
}

/// Handler for POST /auth/login
///
/// Exchanges an email/password pair for a tenant-bound bearer credential.
pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let credential = state.gateway.authenticate(&req.email, &req.password)?;
    Ok(Json(LoginResponse::from(credential)))
}

/// Handler for POST /auth/logout
///
/// Revokes the presented bearer credential.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>> {
    let token = bearer_token(&headers);
    state.gateway.validate(token)?;

    if let Some(token) = token {
        state.gateway.revoke(token);
    }
    Ok(Json(LogoutResponse::new()))
}

/// Handler for GET /dashboard/stats
///
/// Returns the requested metrics for the credential's tenant. Any
/// `tenant_id` in the query or `X-Tenant-ID` header must name that same
/// tenant.
pub async fn dashboard_stats_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<StatsQuery>,
) -> Result<Json<DashboardStatsResponse>> {
    let scope = ScopeRequest::from_parts(&headers, query.tenant_id.as_deref());
    let ctx = state.guard.scope(&scope, bearer_token(&headers))?;

    let window = query.time_window(Utc::now().date_naive())?;
    let metrics = query.metric_list()?;

    let results = state.coordinator.get_many(&ctx, &metrics, window).await;

    let mut response = DashboardStatsResponse::new(ctx.tenant_id().clone(), window);
    for (metric, result) in results {
        response
            .metrics
            .insert(metric.name().to_string(), result?.into());
    }

    if response.is_degraded() {
        warn!(tenant_id = %ctx.tenant_id(), "Dashboard served with stale figures");
    } else {
        info!(tenant_id = %ctx.tenant_id(), metrics = response.metrics.len(), "Dashboard served");
    }
    Ok(Json(response))
}

/// Handler for GET /cache/stats
///
/// Returns cache statistics; requires any valid credential.
pub async fn cache_stats_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CacheStatsResponse>> {
    state.gateway.validate(bearer_token(&headers))?;

    let stats = state.coordinator.stats();
    Ok(Json(CacheStatsResponse::new(
        &stats,
        state.coordinator.inflight_count(),
    )))
}

/// Handler for GET /health
///
/// Returns service health status.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.config.app_name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::MetricValue;
    use axum::http::HeaderValue;

    fn test_state() -> AppState {
        AppState::from_config(&Config::default())
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    async fn login(state: &AppState, email: &str) -> String {
        let req = LoginRequest {
            email: email.to_string(),
            password: "password123".to_string(),
        };
        login_handler(State(state.clone()), ApiJson(req))
            .await
            .unwrap()
            .0
            .token
    }

    #[tokio::test]
    async fn test_login_and_dashboard_handlers() {
        let state = test_state();
        let token = login(&state, "seller@tenant-001.com").await;

        let query = StatsQuery {
            metrics: Some("sales_count,total_revenue".to_string()),
            ..StatsQuery::default()
        };
        let response =
            dashboard_stats_handler(State(state.clone()), bearer(&token), ApiQuery(query))
                .await
                .unwrap()
                .0;

        assert_eq!(response.tenant_id.as_str(), "tenant-001");
        assert_eq!(response.metrics.len(), 2);
        assert_eq!(response.metrics["sales_count"].value, MetricValue::Count(3));
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let state = test_state();
        let req = LoginRequest {
            email: "seller@tenant-001.com".to_string(),
            password: "nope".to_string(),
        };

        let result = login_handler(State(state), ApiJson(req)).await;
        assert!(matches!(result, Err(ApiError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let state = test_state();
        let token = login(&state, "seller@tenant-002.com").await;

        logout_handler(State(state.clone()), bearer(&token))
            .await
            .unwrap();

        let result = cache_stats_handler(State(state), bearer(&token)).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let state = test_state();
        let response = health_handler(State(state)).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.app_name, "tenant-stats");
    }
}
