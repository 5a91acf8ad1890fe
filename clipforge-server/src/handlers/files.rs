//! `GET /downloads/file/{token}` — streams a completed artifact's bytes back
//! to the client, grounded on `file_manager.py`'s `serve_file` endpoint.

use crate::error::ApiResult;
use crate::state::SharedState;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use clipforge_core::file::FileToken;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub signature: Option<String>,
}

pub async fn get(
    State(state): State<SharedState>,
    Path(token): Path<String>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Response> {
    let token = FileToken::from(token);
    let (file, bytes) = state
        .files
        .fetch(&token, query.signature.as_deref())
        .await?;

    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&file.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Ok(value) = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        file.original_filename
    )) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response.into_response())
}
