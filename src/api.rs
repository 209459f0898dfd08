use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;

use crate::error::{Error, Result};
use crate::metrics::GaugeStore;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

async fn metrics(store: State<Arc<GaugeStore>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        store.render(),
    )
}

/// Liveness only; says nothing about scan health.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new(store: Arc<GaugeStore>) -> Self {
        let router = axum::Router::new()
            .route("/metrics", get(metrics))
            .route("/healthz", get(healthz))
            .with_state(store);
        Self { router }
    }

    /// Binds `addr` and serves until the server fails.
    pub async fn listen(self, addr: SocketAddr) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        log::info!("Starting exporter on {addr}");
        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(Error::Serve)
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::metrics::MetricKey;

    async fn get_body(router: axum::Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_healthz() {
        let server = APIServer::new(Arc::new(GaugeStore::default()));
        let (status, body) = get_body(server.router, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_metrics_serves_store() {
        let store = Arc::new(GaugeStore::default());
        store.set(MetricKey::new("default", "web", 80), true);
        let server = APIServer::new(Arc::clone(&store));

        let (status, body) = get_body(server.router, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, store.render());
        assert!(body.contains("open_ports{namespace=\"default\",pod=\"web\",port=\"80\"} 1"));
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let err = APIServer::new(Arc::new(GaugeStore::default()))
            .listen(addr)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Bind { addr: a, .. } if a == addr));
    }
}
