// src/server/handler.rs
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;

use crate::health::Health;

/// Reported while any critical check is failing.
pub const UNHEALTHY_STATUS: StatusCode = StatusCode::IM_A_TEAPOT;

/// Answers every request with the registry status as JSON.
///
/// 200 when healthy, 418 when not, 500 with an empty body if the status
/// could not be serialized.
#[derive(Clone)]
pub struct StatusHandler {
    health: Arc<Health>,
}

impl StatusHandler {
    pub fn new(health: Arc<Health>) -> Self {
        Self { health }
    }

    pub async fn respond(&self) -> Response<Body> {
        let status = self.health.status().await;

        let data = match status.to_json() {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(%e, "failed to serialize health status");
                return with_status(Response::new(Body::empty()), StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let code = if status.healthy {
            StatusCode::OK
        } else {
            UNHEALTHY_STATUS
        };
        with_status(Response::new(Body::from(data)), code)
    }
}

fn with_status(mut response: Response<Body>, code: StatusCode) -> Response<Body> {
    *response.status_mut() = code;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

impl Service<Request<Body>> for StatusHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move {
            tracing::trace!(method = %req.method(), path = %req.uri().path(), "health status requested");
            Ok(handler.respond().await)
        })
    }
}
