//! `POST /videos/resolutions` — resolves a source URL to its metadata and
//! every downloadable format, grounded on
//! `video_processing_service.py`'s `resolve_video` endpoint.

use crate::dto::ResolveRequest;
use crate::error::ApiResult;
use crate::state::SharedState;
use axum::extract::State;
use axum::Json;
use clipforge_core::error::{DomainError, ErrorCategory};
use clipforge_core::video::VideoResolution;

pub async fn resolve(
    State(state): State<SharedState>,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<Json<VideoResolution>> {
    validate_url(&req.url)?;
    let resolution = state.extractor.resolve(&req.url).await?;
    Ok(Json(resolution))
}

pub fn validate_url(url: &str) -> Result<(), DomainError> {
    if url::Url::parse(url).is_err() {
        return Err(DomainError::categorized(
            ErrorCategory::InvalidUrl,
            format!("not a valid URL: {url}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_urls() {
        assert!(validate_url("https://example.com/watch?v=abc").is_ok());
    }

    #[test]
    fn rejects_garbage_as_invalid_url_category() {
        let err = validate_url("not a url").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidUrl);
    }
}
