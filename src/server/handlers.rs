//! Request routing and endpoint handlers
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | `/health` | liveness, returns `ok` |
//! | POST | `/api/upload` | proxied upload (`multipart/form-data`) |
//! | GET | `/api/upload` | presigned upload URL |
//! | GET | `/api/files` | caller's objects |
//! | GET | `/api/files/url` | presigned download URL |
//! | GET | `/api/files/meta` | object metadata |
//!
//! Every error body is `{"error": <message>, "code": <code>}`.

use super::multipart::{self, UploadForm};
use super::query::parse_query;
use super::AppState;
use crate::auth::{AuthError, AuthRequest, UserId};
use crate::metrics;
use crate::upload::{LogicalType, UploadError, UploadRequest, MAX_UPLOAD_BYTES};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::Instrument;

const PRESIGN_DEFAULT_FILENAME: &str = "file";
const PRESIGN_DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const ROUTES: [&str; 5] = [
    "/health",
    "/api/upload",
    "/api/files",
    "/api/files/url",
    "/api/files/meta",
];

/// Entry point for every request
pub(crate) async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!(
        "http.request",
        http.method = %req.method(),
        http.target = %req.uri().path(),
        request.id = %request_id,
        http.status_code = tracing::field::Empty,
    );

    let mut response = route(req, &state).instrument(span.clone()).await;

    span.record("http.status_code", response.status().as_u16());
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    Ok(response)
}

async fn route(req: Request<Incoming>, state: &AppState) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    tracing::debug!("Handling {} {}", method, path);

    match (&method, path.as_str()) {
        (&Method::GET, "/health") => text_response(StatusCode::OK, "ok"),
        (&Method::POST, "/api/upload") => respond(upload(req, state).await),
        (&Method::GET, "/api/upload") => respond(presign(req, state).await),
        (&Method::GET, "/api/files") => respond(list_files(req, state).await),
        (&Method::GET, "/api/files/url") => respond(download_url(req, state).await),
        (&Method::GET, "/api/files/meta") => respond(describe(req, state).await),
        (_, known) if ROUTES.contains(&known) => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &json!({ "error": "Method not allowed", "code": "method_not_allowed" }),
        ),
        _ => json_response(
            StatusCode::NOT_FOUND,
            &json!({ "error": "Not Found", "code": "not_found" }),
        ),
    }
}

/// Build AuthRequest from hyper Request headers
pub(crate) fn build_auth_request<B>(req: &Request<B>) -> AuthRequest {
    let mut headers = HashMap::new();
    for (name, value) in req.headers() {
        if let Ok(v) = value.to_str() {
            headers.insert(name.as_str().to_lowercase(), v.to_string());
        }
    }

    AuthRequest {
        headers,
        query: req.uri().query().map(str::to_string),
        method: req.method().to_string(),
        path: req.uri().path().to_string(),
    }
}

/// Resolve the caller.
///
/// `Ok(None)` for an anonymous or rejected caller; a misconfigured
/// authenticator is a server fault and fails the request.
async fn authenticate(
    state: &AppState,
    auth_request: AuthRequest,
) -> Result<Option<UserId>, UploadError> {
    let method = state.authenticator.method();
    match state.authenticator.authenticate(&auth_request).await {
        Ok(identity) => {
            tracing::debug!(user_id = %identity.user_id, "Authenticated");
            Ok(Some(identity.user_id))
        }
        Err(AuthError::Misconfigured(reason)) => {
            tracing::error!(method, %reason, "Authenticator misconfigured");
            metrics::record_error("auth_misconfigured");
            Err(UploadError::Internal(reason))
        }
        Err(e) => {
            tracing::warn!(method, error = %e, "Authentication failed");
            Ok(None)
        }
    }
}

async fn upload(req: Request<Incoming>, state: &AppState) -> Result<Value, UploadError> {
    // Identity first: an anonymous body is never read
    let auth_request = build_auth_request(&req);
    let Some(owner) = authenticate(state, auth_request).await? else {
        metrics::record_validation_rejection(UploadError::Unauthorized.code());
        return Err(UploadError::Unauthorized);
    };

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let boundary = multipart::boundary(content_type)
        .ok_or_else(|| UploadError::BadRequest("Expected a multipart/form-data body".into()))?;

    let body = read_body(req.into_body(), state.max_body_bytes).await?;
    let UploadForm { file, logical_type } = multipart::parse_upload_form(body, boundary)
        .await
        .map_err(|e| UploadError::BadRequest(format!("Malformed multipart body: {}", e)))?;

    let logical_type = LogicalType::parse(logical_type.as_deref().unwrap_or_default());
    let request = match file {
        Some(file) => UploadRequest {
            owner: Some(owner),
            logical_type,
            size: file.data.len() as u64,
            filename: file.filename,
            content_type: file.content_type,
            payload: Some(file.data),
        },
        None => UploadRequest {
            owner: Some(owner),
            logical_type,
            filename: String::new(),
            content_type: String::new(),
            size: 0,
            payload: None,
        },
    };

    let result = state.gateway.proxied_upload(request).await?;
    Ok(json!({
        "success": true,
        "bucket": result.bucket,
        "key": result.key,
        "url": result.url,
        "filename": result.filename,
        "size": result.size,
        "type": result.content_type,
    }))
}

async fn presign(req: Request<Incoming>, state: &AppState) -> Result<Value, UploadError> {
    let auth_request = build_auth_request(&req);
    let owner = authenticate(state, auth_request).await?;
    let params = parse_query(req.uri().query());

    let presigned = state
        .gateway
        .request_presigned_upload(
            owner.as_ref(),
            logical_type_param(&params),
            non_empty(&params, "filename").unwrap_or(PRESIGN_DEFAULT_FILENAME),
            non_empty(&params, "contentType").unwrap_or(PRESIGN_DEFAULT_CONTENT_TYPE),
            None,
        )
        .await?;

    Ok(json!({
        "uploadUrl": presigned.url,
        "bucket": presigned.bucket,
        "key": presigned.key,
        "expiresIn": presigned.expires_in_seconds,
    }))
}

async fn list_files(req: Request<Incoming>, state: &AppState) -> Result<Value, UploadError> {
    let auth_request = build_auth_request(&req);
    let owner = authenticate(state, auth_request).await?;
    let params = parse_query(req.uri().query());

    let files = state
        .gateway
        .list_uploads(owner.as_ref(), logical_type_param(&params))
        .await?;

    let files: Vec<Value> = files
        .into_iter()
        .map(|f| {
            json!({
                "key": f.key,
                "size": f.size,
                "lastModified": f.last_modified.map(|t| t.to_rfc3339()),
            })
        })
        .collect();
    Ok(json!({ "files": files }))
}

async fn download_url(req: Request<Incoming>, state: &AppState) -> Result<Value, UploadError> {
    let auth_request = build_auth_request(&req);
    let owner = authenticate(state, auth_request).await?;
    let params = parse_query(req.uri().query());
    let key = required_key(&params, owner.is_some())?;

    let download = state
        .gateway
        .download_url(owner.as_ref(), logical_type_param(&params), key, None)
        .await?;

    Ok(json!({
        "downloadUrl": download.url,
        "bucket": download.bucket,
        "key": download.key,
        "expiresIn": download.expires_in_seconds,
    }))
}

async fn describe(req: Request<Incoming>, state: &AppState) -> Result<Value, UploadError> {
    let auth_request = build_auth_request(&req);
    let owner = authenticate(state, auth_request).await?;
    let params = parse_query(req.uri().query());
    let key = required_key(&params, owner.is_some())?;

    let metadata = state
        .gateway
        .describe(owner.as_ref(), logical_type_param(&params), key)
        .await?;

    Ok(json!({
        "key": key,
        "contentType": metadata.content_type,
        "size": metadata.size,
        "lastModified": metadata.last_modified.map(|t| t.to_rfc3339()),
        "metadata": metadata.metadata,
    }))
}

/// `key` parameter; an anonymous caller gets `Unauthorized` before `BadRequest`
fn required_key(params: &HashMap<String, String>, identified: bool) -> Result<&str, UploadError> {
    match non_empty(params, "key") {
        Some(key) => Ok(key),
        None if !identified => Err(UploadError::Unauthorized),
        None => Err(UploadError::BadRequest("Missing key parameter".into())),
    }
}

fn logical_type_param(params: &HashMap<String, String>) -> LogicalType {
    LogicalType::parse(params.get("type").map(String::as_str).unwrap_or_default())
}

fn non_empty<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

async fn read_body(body: Incoming, limit: usize) -> Result<Bytes, UploadError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            metrics::record_validation_rejection("too_large");
            Err(UploadError::TooLarge {
                size: limit as u64,
                max: MAX_UPLOAD_BYTES,
            })
        }
        Err(e) => Err(UploadError::BadRequest(format!("Failed to read body: {}", e))),
    }
}

fn respond(result: Result<Value, UploadError>) -> Response<Full<Bytes>> {
    match result {
        Ok(body) => json_response(StatusCode::OK, &body),
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &UploadError) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = json_response(
        status,
        &json!({ "error": err.public_message(), "code": err.code() }),
    );
    if matches!(err, UploadError::Unauthorized) {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}

fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}
