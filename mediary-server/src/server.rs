use crate::config::Config;
use crate::error::{ApiError, ApiResponse};
use crate::upload::{UploadPolicy, file_extension};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequestParts, Multipart, Path, RawQuery, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::IntoResponse,
    routing::{delete, get},
};
use bytes::Bytes;
use mediary_core::{
    Asset, AssetFilter, AssetKind, AssetRegistry, AssetSort, CategoryCount,
    CreateAssetOperationRequest, DEFAULT_PAGE_SIZE, DeleteAssetOperationRequest,
    ListAssetsOperationRequest, PageRequest, Pagination, Result, SortField, SortOrder,
};
use serde::Serialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_http::trace::TraceLayer;

/// Room for multipart framing and the text fields on top of the file limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub struct ServerState {
    pub registry: AssetRegistry,
    pub upload_policy: UploadPolicy,
    pub auth_token: String,
}

/// Marker extractor for routes that require the shared bearer token.
pub struct Authorized;

#[axum::async_trait]
impl FromRequestParts<Arc<ServerState>> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::MissingToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::MissingToken)?;

        if !tokens_match(token, &state.auth_token) {
            return Err(ApiError::InvalidToken);
        }

        Ok(Authorized)
    }
}

/// Constant-time for equal lengths; only the length can leak.
fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[derive(Debug, Serialize)]
struct ListMediaResponse {
    items: Vec<Asset>,
    pagination: Pagination,
    stats: CategoryStats,
}

#[derive(Debug, Serialize)]
struct CategoryStats {
    categories: Vec<CategoryCount>,
    total: u64,
}

pub async fn run_server(config: Config) -> Result<()> {
    let registry = config.build_registry()?;
    let state = Arc::new(ServerState {
        registry,
        upload_policy: UploadPolicy::new(&config.upload),
        auth_token: config.auth_token.clone(),
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    let body_limit = state
        .upload_policy
        .max_bytes()
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/media", get(list_media).post(upload_media))
        .route("/api/media/:id", delete(delete_media))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

#[derive(Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    name: Option<String>,
    kind: Option<String>,
    category: Option<String>,
}

struct UploadedFile {
    file_name: Option<String>,
    content_type: String,
    body: Bytes,
}

async fn read_upload_form(mut multipart: Multipart) -> std::result::Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field.bytes().await?;
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    body,
                });
            }
            "name" => form.name = Some(field.text().await?),
            "type" => form.kind = Some(field.text().await?),
            "category" => form.category = Some(field.text().await?),
            other => {
                tracing::debug!("ignoring multipart field {}", other);
            }
        }
    }

    Ok(form)
}

fn required(value: Option<String>, field: &str) -> std::result::Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("missing field: {}", field)))
}

async fn upload_media(
    State(state): State<Arc<ServerState>>,
    _auth: Authorized,
    multipart: Multipart,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let form = read_upload_form(multipart).await?;

    let file = form
        .file
        .ok_or_else(|| ApiError::BadRequest("missing field: file".to_string()))?;
    let name = required(form.name, "name")?;
    let kind = required(form.kind, "type")?;
    let category = required(form.category, "category")?;

    state
        .upload_policy
        .check(&file.content_type, file.body.len())?;

    let extension = file_extension(file.file_name.as_deref(), &file.content_type)
        .ok_or_else(|| ApiError::UnsupportedMediaType(file.content_type.clone()))?;

    let result = state
        .registry
        .create(CreateAssetOperationRequest {
            kind,
            category,
            name,
            extension,
            body: file.body,
            content_type: file.content_type,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(result.asset))))
}

fn split_values(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number(value: &str, field: &str) -> std::result::Result<i64, ApiError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("{} must be an integer", field)))
}

fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

/// Builds a list request from the raw query string. `type` may repeat or carry
/// comma-separated values. `category` may repeat; each value is matched literally.
fn parse_list_query(
    query: Option<&str>,
) -> std::result::Result<ListAssetsOperationRequest, ApiError> {
    let mut kinds = Vec::new();
    let mut categories = Vec::new();
    let mut search = None;
    let mut page = 1_i64;
    let mut limit = DEFAULT_PAGE_SIZE as i64;
    let mut field = SortField::default();
    let mut order = SortOrder::default();

    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match &*key {
            "type" => {
                for kind in split_values(&value) {
                    kinds.push(kind.parse::<AssetKind>()?);
                }
            }
            "category" => {
                if !value.is_empty() {
                    categories.push(value.into_owned());
                }
            }
            "search" => search = Some(value.into_owned()),
            "page" => page = parse_number(&value, "page")?,
            "limit" => limit = parse_number(&value, "limit")?,
            "sort" => field = value.parse()?,
            "order" => order = value.parse()?,
            _ => {}
        }
    }

    let mut filter = AssetFilter::default()
        .with_kinds(kinds)
        .with_categories(categories);
    if let Some(search) = search {
        filter = filter.with_search(search);
    }

    Ok(ListAssetsOperationRequest {
        filter,
        sort: AssetSort::new(field, order),
        page: PageRequest::new(clamp_u32(page), clamp_u32(limit)),
    })
}

async fn list_media(
    State(state): State<Arc<ServerState>>,
    RawQuery(query): RawQuery,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let request = parse_list_query(query.as_deref())?;
    let result = state.registry.list(request).await?;

    let response = ListMediaResponse {
        items: result.items,
        stats: CategoryStats {
            categories: result.category_stats,
            total: result.pagination.total,
        },
        pagination: result.pagination,
    };

    Ok((StatusCode::OK, Json(ApiResponse::ok(response))))
}

async fn delete_media(
    State(state): State<Arc<ServerState>>,
    _auth: Authorized,
    Path(id): Path<String>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let result = state
        .registry
        .delete(DeleteAssetOperationRequest { id })
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(result.asset))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use axum::body::Body;
    use axum::http::{Request, header::CONTENT_TYPE};
    use mediary_core::{BlobStore, KeyDeriver, ObjectBlobStore, SqliteMetadataIndex};
    use serde_json::Value;
    use tower::ServiceExt;

    const TOKEN: &str = "secret-token";
    const BOUNDARY: &str = "mediary-test-boundary";

    struct TestApp {
        router: Router,
        blobs: Arc<ObjectBlobStore>,
        _dir: tempfile::TempDir,
    }

    fn test_app(max_bytes: usize) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(ObjectBlobStore::in_memory());
        let index = Arc::new(SqliteMetadataIndex::open(dir.path().join("assets.db")).unwrap());
        let keys = KeyDeriver::new("https://cdn.example.com").unwrap();

        let state = Arc::new(ServerState {
            registry: AssetRegistry::new(blobs.clone(), index, keys),
            upload_policy: UploadPolicy::new(&UploadConfig {
                max_bytes,
                ..UploadConfig::default()
            }),
            auth_token: TOKEN.to_string(),
        });

        TestApp {
            router: build_router(state),
            blobs,
            _dir: dir,
        }
    }

    fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content_type, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(token: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/media")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn image_upload(name: &str, category: &str, kind: &str) -> Vec<u8> {
        multipart_body(
            &[("name", name), ("type", kind), ("category", category)],
            Some(("upload.png", "image/png", b"\x89PNG")),
        )
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(1024);
        let (status, body) = send(&app.router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_upload_and_list() {
        let app = test_app(1024);

        let (status, body) = send(
            &app.router,
            upload_request(Some(TOKEN), image_upload("acme", "logos", "image")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["type"], "image");
        assert_eq!(
            body["data"]["url"],
            "https://cdn.example.com/image/logos/acme.png"
        );
        assert!(body["data"]["createdAt"].is_string());
        assert_eq!(
            app.blobs.get("image/logos/acme.png").await.unwrap().as_ref(),
            b"\x89PNG"
        );

        send(
            &app.router,
            upload_request(Some(TOKEN), image_upload("home", "nav", "icon")),
        )
        .await;

        let (status, body) = send(&app.router, get("/api/media?type=icon")).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["items"].as_array().unwrap().len(), 1);
        assert_eq!(data["items"][0]["name"], "home");
        assert_eq!(data["pagination"]["total"], 1);
        assert_eq!(data["pagination"]["totalPages"], 1);
        assert_eq!(data["stats"]["total"], 1);
        assert_eq!(data["stats"]["categories"][0]["category"], "nav");

        let (_, body) = send(&app.router, get("/api/media?type=image,icon&limit=1")).await;
        assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"]["pagination"]["total"], 2);
        assert_eq!(body["data"]["pagination"]["totalPages"], 2);
        assert_eq!(body["data"]["stats"]["total"], 2);

        // Category stats ignore the category filter; the total does not.
        let (_, body) = send(&app.router, get("/api/media?category=nav")).await;
        assert_eq!(body["data"]["pagination"]["total"], 1);
        assert_eq!(body["data"]["stats"]["total"], 1);
        assert_eq!(
            body["data"]["stats"]["categories"].as_array().unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_upload_requires_token() {
        let app = test_app(1024);

        let (status, body) = send(
            &app.router,
            upload_request(None, image_upload("acme", "logos", "image")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = send(
            &app.router,
            upload_request(Some("wrong"), image_upload("acme", "logos", "image")),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(app.blobs.list("image").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let app = test_app(8);

        let missing_name = multipart_body(
            &[("type", "image"), ("category", "logos")],
            Some(("a.png", "image/png", b"png")),
        );
        let (status, _) = send(&app.router, upload_request(Some(TOKEN), missing_name)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing_file = multipart_body(
            &[("name", "a"), ("type", "image"), ("category", "logos")],
            None,
        );
        let (status, _) = send(&app.router, upload_request(Some(TOKEN), missing_file)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let pdf = multipart_body(
            &[("name", "a"), ("type", "image"), ("category", "docs")],
            Some(("a.pdf", "application/pdf", b"pdf")),
        );
        let (status, _) = send(&app.router, upload_request(Some(TOKEN), pdf)).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let large = multipart_body(
            &[("name", "a"), ("type", "image"), ("category", "logos")],
            Some(("a.png", "image/png", b"0123456789abcdef")),
        );
        let (status, _) = send(&app.router, upload_request(Some(TOKEN), large)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let bad_type = image_upload("a", "logos", "video");
        let (status, _) = send(&app.router, upload_request(Some(TOKEN), bad_type)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(app.blobs.list("image").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_query_errors() {
        let app = test_app(1024);

        for uri in [
            "/api/media?sort=size",
            "/api/media?order=sideways",
            "/api/media?page=two",
            "/api/media?type=video",
        ] {
            let (status, body) = send(&app.router, get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["success"], false);
        }

        // Empty index has no out-of-range pages.
        let (status, body) = send(&app.router, get("/api/media?page=9")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pagination"]["total"], 0);

        send(
            &app.router,
            upload_request(Some(TOKEN), image_upload("acme", "logos", "image")),
        )
        .await;
        let (status, _) = send(&app.router, get("/api/media?page=9")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete() {
        let app = test_app(1024);
        let (_, body) = send(
            &app.router,
            upload_request(Some(TOKEN), image_upload("acme", "logos", "image")),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let unauthenticated = Request::builder()
            .method("DELETE")
            .uri(format!("/api/media/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app.router, unauthenticated).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let delete_request = || {
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/media/{id}"))
                .header(AUTHORIZATION, format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .unwrap()
        };

        let (status, body) = send(&app.router, delete_request()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], id.as_str());
        assert!(app.blobs.list("image").await.unwrap().is_empty());

        let (status, _) = send(&app.router, delete_request()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match(TOKEN, TOKEN));
        assert!(!tokens_match("secret-tokeN", TOKEN));
        assert!(!tokens_match("secret", TOKEN));
        assert!(!tokens_match("", TOKEN));
    }

    #[test]
    fn test_parse_list_query() {
        let request = parse_list_query(Some(
            "type=image&type=icon&category=a&category=b&page=0&limit=500&sort=name&order=asc&search=Lo",
        ))
        .unwrap();
        assert_eq!(request.filter.kinds, vec![AssetKind::Image, AssetKind::Icon]);
        assert_eq!(request.filter.categories, vec!["a", "b"]);
        assert_eq!(request.filter.search.as_deref(), Some("Lo"));
        assert_eq!(request.page.page(), 1);
        assert_eq!(request.page.page_size(), 100);
        assert_eq!(request.sort, AssetSort::new(SortField::Name, SortOrder::Asc));

        let defaults = parse_list_query(None).unwrap();
        assert_eq!(defaults.page.page(), 1);
        assert_eq!(defaults.page.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(defaults.sort, AssetSort::default());

        let literal = parse_list_query(Some("category=logos%2C2024&category=a,b")).unwrap();
        assert_eq!(literal.filter.categories, vec!["logos,2024", "a,b"]);
    }

    #[tokio::test]
    async fn test_list_by_category_with_comma() {
        let app = test_app(1024);
        send(
            &app.router,
            upload_request(Some(TOKEN), image_upload("acme", "logos,2024", "image")),
        )
        .await;
        send(
            &app.router,
            upload_request(Some(TOKEN), image_upload("other", "logos", "image")),
        )
        .await;

        let (status, body) = send(&app.router, get("/api/media?category=logos%2C2024")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pagination"]["total"], 1);
        assert_eq!(body["data"]["items"][0]["name"], "acme");
        assert_eq!(body["data"]["items"][0]["category"], "logos,2024");

        let (_, body) = send(
            &app.router,
            get("/api/media?category=logos%2C2024&category=logos"),
        )
        .await;
        assert_eq!(body["data"]["pagination"]["total"], 2);
    }
}
