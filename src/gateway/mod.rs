//! Reverse proxy in front of the domain services, with per-client rate limiting.

mod limiter;
mod proxy;

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::GatewaySettings;

pub use self::limiter::{LimiterError, MemoryLimiter, RateLimiter, client_key};
#[cfg(feature = "redis-limiter")]
pub use self::limiter::RedisLimiter;
pub use self::proxy::GatewayError;

/// Shared gateway state: ordered route table, HTTP client and limiter.
pub struct GatewayState {
    routes: Vec<(String, String)>,
    http: reqwest::Client,
    limiter: Arc<dyn RateLimiter>,
    limit_per_minute: u64,
}

/// Handle shared by the gateway's request handlers.
pub type SharedGateway = Arc<GatewayState>;

impl GatewayState {
    /// Build the route table from `settings`, trimming trailing slashes from
    /// upstream URLs.
    pub fn new(settings: &GatewaySettings, limiter: Arc<dyn RateLimiter>) -> SharedGateway {
        let http = reqwest::Client::builder()
            .timeout(settings.upstream_timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "failed to build upstream HTTP client; using defaults");
                reqwest::Client::new()
            });
        Arc::new(Self {
            routes: settings
                .upstreams
                .iter()
                .map(|(prefix, url)| (prefix.clone(), url.trim_end_matches('/').to_owned()))
                .collect(),
            http,
            limiter,
            limit_per_minute: u64::from(settings.rate_limit_per_minute),
        })
    }

    /// Upstream base URL of the first prefix matching `path`.
    pub fn upstream_for(&self, path: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, url)| url.as_str())
    }

    fn prefixes(&self) -> Vec<String> {
        self.routes.iter().map(|(prefix, _)| prefix.clone()).collect()
    }
}

/// Pick the Redis limiter when configured and reachable, else count in memory.
pub async fn build_limiter(settings: &GatewaySettings) -> Arc<dyn RateLimiter> {
    #[cfg(feature = "redis-limiter")]
    if let Some(url) = settings.redis_url.as_deref() {
        match RedisLimiter::connect(url).await {
            Ok(limiter) => {
                info!("rate limiting through redis");
                return Arc::new(limiter);
            }
            Err(err) => warn!(error = %err, "redis unreachable; counting requests in memory"),
        }
    }
    #[cfg(not(feature = "redis-limiter"))]
    if settings.redis_url.is_some() {
        warn!("REDIS_URL ignored: built without the redis-limiter feature");
    }
    info!("rate limiting in process memory");
    Arc::new(MemoryLimiter::new())
}

#[derive(Debug, Serialize)]
struct GatewayHealth {
    status: &'static str,
    service: &'static str,
}

#[derive(Debug, Serialize)]
struct GatewayInfo {
    message: &'static str,
    version: &'static str,
    services: Vec<String>,
}

async fn health() -> Json<GatewayHealth> {
    Json(GatewayHealth {
        status: "healthy",
        service: "api-gateway",
    })
}

async fn service_info(State(gateway): State<SharedGateway>) -> Json<GatewayInfo> {
    Json(GatewayInfo {
        message: "Storefront API Gateway",
        version: env!("CARGO_PKG_VERSION"),
        services: gateway.prefixes(),
    })
}

/// Gateway routes; everything but `/health` and `/` is proxied.
pub fn router(gateway: SharedGateway) -> Router<()> {
    Router::new()
        .route("/health", get(health))
        .route("/", get(service_info))
        .fallback(proxy::forward)
        .with_state(gateway)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        body::{Body, to_bytes},
        extract::ConnectInfo,
        http::{Request, StatusCode},
    };
    use indexmap::IndexMap;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use super::*;

    async fn spawn_upstream() -> String {
        let app = Router::new().fallback(|request: Request<Body>| async move {
            let path = request.uri().path().to_owned();
            let query = request.uri().query().map(str::to_owned);
            let method = request.method().to_string();
            Json(json!({ "path": path, "query": query, "method": method }))
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn settings(upstream: &str, limit: u32) -> GatewaySettings {
        let mut upstreams = IndexMap::new();
        upstreams.insert("/api/v1/catalog".to_owned(), upstream.to_owned());
        upstreams.insert("/api/v1/users".to_owned(), "http://127.0.0.1:9".to_owned());
        GatewaySettings {
            rate_limit_per_minute: limit,
            redis_url: None,
            upstreams,
            upstream_timeout: std::time::Duration::from_secs(5),
        }
    }

    fn from_client(uri: &str, ip: [u8; 4]) -> Request<Body> {
        let mut request = Request::get(uri).body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((ip, 40_000))));
        request
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[test]
    fn first_matching_prefix_wins() {
        let gateway = GatewayState::new(
            &settings("http://catalog:8002/", 60),
            Arc::new(MemoryLimiter::new()),
        );
        assert_eq!(
            gateway.upstream_for("/api/v1/catalog/games"),
            Some("http://catalog:8002")
        );
        assert_eq!(gateway.upstream_for("/api/v2/catalog"), None);
    }

    #[test]
    fn default_table_routes_friends_to_the_chat_service() {
        let config = crate::config::AppConfig::from_lookup(|_| None);
        let gateway = GatewayState::new(&config.gateway, Arc::new(MemoryLimiter::new()));
        assert_eq!(
            gateway.upstream_for("/api/v1/friends/requests"),
            Some("http://localhost:8013")
        );
        assert_eq!(
            gateway.upstream_for("/api/v1/catalog/games"),
            Some("http://localhost:8002")
        );
        assert_eq!(gateway.prefixes().len(), 14);
    }

    #[tokio::test]
    async fn proxies_path_and_query() {
        let upstream = spawn_upstream().await;
        let app = router(GatewayState::new(
            &settings(&upstream, 60),
            Arc::new(MemoryLimiter::new()),
        ));
        let (status, body) = call(
            &app,
            from_client("/api/v1/catalog/games?page=2", [10, 0, 0, 1]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["path"], "/api/v1/catalog/games");
        assert_eq!(body["query"], "page=2");
        assert_eq!(body["method"], "GET");
    }

    #[tokio::test]
    async fn unknown_prefix_is_404() {
        let app = router(GatewayState::new(
            &settings("http://127.0.0.1:9", 60),
            Arc::new(MemoryLimiter::new()),
        ));
        let (status, body) = call(&app, from_client("/api/v1/nowhere", [10, 0, 0, 1])).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Service not found");
    }

    #[tokio::test]
    async fn requests_over_the_cap_get_429() {
        let upstream = spawn_upstream().await;
        let app = router(GatewayState::new(
            &settings(&upstream, 2),
            Arc::new(MemoryLimiter::new()),
        ));
        for _ in 0..2 {
            let (status, _) = call(&app, from_client("/api/v1/catalog/games", [10, 0, 0, 2])).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = call(&app, from_client("/api/v1/catalog/games", [10, 0, 0, 2])).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        let (status, _) = call(&app, from_client("/api/v1/catalog/games", [10, 0, 0, 3])).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_503() {
        let app = router(GatewayState::new(
            &settings("http://127.0.0.1:9", 60),
            Arc::new(MemoryLimiter::new()),
        ));
        let (status, body) = call(&app, from_client("/api/v1/users/me", [10, 0, 0, 4])).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(
            body["detail"]
                .as_str()
                .is_some_and(|detail| detail.starts_with("Service unavailable"))
        );
    }

    #[tokio::test]
    async fn health_and_info() {
        let app = router(GatewayState::new(
            &settings("http://127.0.0.1:9", 60),
            Arc::new(MemoryLimiter::new()),
        ));
        let (_, health) = call(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(health, json!({ "status": "healthy", "service": "api-gateway" }));
        let (_, info) = call(&app, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(info["services"][0], "/api/v1/catalog");
    }
}
