//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum Router for the demo application
//! - Put the tap in front of it
//! - Bind to the listener and serve until shutdown

use std::net::SocketAddr;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::http::middleware::{tap, TapState};
use crate::transaction::Interceptor;

/// HTTP server whose every request is tapped.
pub struct TapServer {
    interceptor: Interceptor,
}

impl TapServer {
    pub fn new(interceptor: Interceptor) -> Self {
        Self { interceptor }
    }

    /// Build the router with the tap applied. `server_port` is reported in
    /// every record when set.
    pub fn router(&self, server_port: Option<u16>) -> Router {
        let app = Router::new()
            .route("/health", get(handlers::health))
            .route("/users/{id}", get(handlers::get_user))
            .fallback(handlers::not_found);

        tap(app, TapState::new(self.interceptor.clone(), server_port))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router(Some(addr.port()))
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Publish, PublishError};
    use crate::transaction::{HighLevelStatus, TransactionRecord};
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, StatusCode};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<TransactionRecord>>);

    impl Publish for Recorder {
        fn publish(&self, record: TransactionRecord) -> Result<(), PublishError> {
            self.0.lock().unwrap().push(record);
            Ok(())
        }
    }

    fn app(recorder: Arc<Recorder>) -> Router {
        let peer: SocketAddr = "127.0.0.1:45321".parse().unwrap();
        TapServer::new(Interceptor::new(recorder))
            .router(Some(8080))
            .layer(MockConnectInfo(peer))
    }

    #[tokio::test]
    async fn test_tapped_request() {
        let recorder = Arc::new(Recorder::default());
        let response = app(recorder.clone())
            .oneshot(Request::get("/users/7?verbose=1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let records = recorder.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.method.as_deref(), Some("GET"));
        assert_eq!(record.path.as_deref(), Some("/users/7"));
        assert_eq!(record.port, Some(8080));
        assert_eq!(record.client_port, Some(45321));
        assert_eq!(record.client_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(record.status, Some(HighLevelStatus::Ok));
        assert_eq!(record.http.code, Some(200));
        assert_eq!(
            record.http.response_headers.get("content-type"),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_not_found_is_client_error() {
        let recorder = Arc::new(Recorder::default());
        let response = app(recorder.clone())
            .oneshot(Request::get("/users/nobody").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let records = recorder.0.lock().unwrap();
        assert_eq!(records[0].status, Some(HighLevelStatus::ClientError));
        assert_eq!(records[0].http.phrase.as_deref(), Some("Not Found"));
    }

    #[tokio::test]
    async fn test_fallback_is_tapped() {
        let recorder = Arc::new(Recorder::default());
        let response = app(recorder.clone())
            .oneshot(Request::get("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let records = recorder.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].http.response_headers.get("cache-control"),
            Some("no-store")
        );
    }

    struct SlowSink(Mutex<usize>);

    impl Publish for SlowSink {
        fn publish(&self, _record: TransactionRecord) -> Result<(), PublishError> {
            std::thread::sleep(std::time::Duration::from_millis(300));
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_sink_does_not_block_other_requests() {
        let sink = Arc::new(SlowSink(Mutex::new(0)));
        let peer: SocketAddr = "127.0.0.1:45321".parse().unwrap();
        let app = TapServer::new(Interceptor::new(sink.clone()))
            .router(Some(8080))
            .layer(MockConnectInfo(peer));

        let started = std::time::Instant::now();
        let (first, second) = tokio::join!(
            app.clone()
                .oneshot(Request::get("/health").body(Body::empty()).unwrap()),
            app.oneshot(Request::get("/health").body(Body::empty()).unwrap()),
        );
        assert_eq!(first.unwrap().status(), StatusCode::OK);
        assert_eq!(second.unwrap().status(), StatusCode::OK);

        // Both publishes ran side by side on the blocking pool.
        assert!(started.elapsed() < std::time::Duration::from_millis(550));
        assert_eq!(*sink.0.lock().unwrap(), 2);
    }
}
