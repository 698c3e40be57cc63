use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::sink::exposition::CONTENT_TYPE;
use crate::sink::Registry;

pub type SharedRegistry = Arc<Registry>;

pub async fn metrics_handler(State(registry): State<SharedRegistry>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], registry.render())
}
