use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{RawQuery, State},
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::any,
};
use tokio::net::TcpListener;

use crate::formatter::{MISSING_LANGUAGE_BODY, invalid_method_body};
use crate::github::{RepositoryApiProvider, TokenExchange};
use crate::services::{Orchestrator, OrchestratorError};
use crate::types::LanguageQuery;

const QUERY_PARAM: &str = "q";

/// Builds the router: `/metrics` plus a search handler answering on every other path.
pub fn router<P, X>(orchestrator: Arc<Orchestrator<P, X>>) -> Router
where
    P: RepositoryApiProvider,
    X: TokenExchange,
{
    Router::new()
        .route("/metrics", any(handle_metrics::<P, X>))
        .fallback(handle_search::<P, X>)
        .with_state(orchestrator)
}

async fn handle_search<P, X>(
    State(orchestrator): State<Arc<Orchestrator<P, X>>>,
    method: Method,
    uri: Uri,
    RawQuery(raw_query): RawQuery,
) -> Response
where
    P: RepositoryApiProvider,
    X: TokenExchange,
{
    tracing::info!("Request received: {} {}", method, uri);

    if method != Method::GET {
        return plain_response(StatusCode::METHOD_NOT_ALLOWED, invalid_method_body(method.as_str()));
    }

    let query = language_query(raw_query.as_deref().unwrap_or_default());
    if query.is_empty() {
        return plain_response(StatusCode::BAD_REQUEST, MISSING_LANGUAGE_BODY.to_string());
    }

    let body = match orchestrator.run(query).await {
        Ok(result) => result.body,
        Err(OrchestratorError::NoLanguages) => {
            return plain_response(StatusCode::BAD_REQUEST, MISSING_LANGUAGE_BODY.to_string());
        }
        // Credential and client failures are still answered with 200, the error text as body.
        Err(e) => {
            tracing::error!("Request {} failed: {}", uri, e);
            e.to_string()
        }
    };

    tracing::info!(
        "Response sent: {} {} -> 200 ({} bytes)",
        method,
        uri,
        body.len()
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        body,
    )
        .into_response()
}

async fn handle_metrics<P, X>(
    State(orchestrator): State<Arc<Orchestrator<P, X>>>,
    method: Method,
) -> Response
where
    P: RepositoryApiProvider,
    X: TokenExchange,
{
    if method != Method::GET {
        return plain_response(StatusCode::METHOD_NOT_ALLOWED, invalid_method_body(method.as_str()));
    }
    Json(orchestrator.metrics().snapshot()).into_response()
}

/// Languages from every `q` value of the query string, in first-seen order.
fn language_query(raw_query: &str) -> LanguageQuery {
    let languages = url::form_urlencoded::parse(raw_query.as_bytes())
        .filter(|(key, _)| key == QUERY_PARAM)
        .flat_map(|(_, value)| LanguageQuery::parse(&value).into_languages())
        .collect();
    LanguageQuery::from_languages(languages)
}

fn plain_response(status: StatusCode, body: String) -> Response {
    tracing::info!("Response sent: {} ({} bytes)", status, body.len());
    (status, body).into_response()
}

pub struct HttpServerApp<P, X> {
    bind_addr: SocketAddr,
    orchestrator: Arc<Orchestrator<P, X>>,
}

impl<P, X> HttpServerApp<P, X>
where
    P: RepositoryApiProvider,
    X: TokenExchange,
{
    pub fn new(bind_addr: SocketAddr, orchestrator: Arc<Orchestrator<P, X>>) -> Self {
        Self {
            bind_addr,
            orchestrator,
        }
    }

    /// Binds the configured address and serves until Ctrl+C.
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", self.bind_addr))?;

        self.serve_with_shutdown(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        tracing::info!("Listening on http://{}", local_addr);

        axum::serve(listener, router(self.orchestrator))
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server failed")?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
