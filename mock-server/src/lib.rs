use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Multipart, OriginalUri, Path, Query, RawQuery, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{
    net::TcpListener,
    sync::{Mutex, RwLock},
};
use tracing::info;
use uuid::Uuid;

pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const HEADER_AUTH_TOKEN: &str = "x-auth-token";
pub const HEADER_CLUSTER_VERSION: &str = "x-cluster-version";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub flavor: String,
    pub nodes: u32,
}

#[derive(Deserialize)]
pub struct CreateCluster {
    pub name: String,
    pub flavor: String,
    #[serde(default = "default_nodes")]
    pub nodes: u32,
}

fn default_nodes() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct UpdateCluster {
    pub name: Option<String>,
    pub nodes: Option<u32>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub name: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct FlakyQuery {
    pub key: String,
    #[serde(default)]
    pub fail: u32,
}

#[derive(Default)]
pub struct AppState {
    clusters: RwLock<HashMap<String, Cluster>>,
    flaky: Mutex<HashMap<String, u32>>,
}

pub type Db = Arc<AppState>;

/// Error envelope in the `{"error_code", "error_msg"}` shape.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn cluster_not_found(id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "CCE.01404", format!("cluster {id} not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({"error_code": self.code, "error_msg": self.message});
        (self.status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(AppState::default());
    Router::new()
        .route(
            "/v1/{project_id}/clusters",
            get(list_clusters).post(create_cluster),
        )
        .route(
            "/v1/{project_id}/clusters/{cluster_id}",
            get(get_cluster).put(update_cluster).delete(delete_cluster),
        )
        .route("/v1/{project_id}/echo", any(echo))
        .route("/v1/{project_id}/upload", post(upload))
        .route("/v1/{project_id}/objects/{name}", get(download))
        .route("/v1/{project_id}/flaky", get(flaky))
        .route("/v1/errors/{shape}", get(error_shape))
        .route("/v1/buckets/{name}", get(bucket))
        .layer(middleware::from_fn(request_id))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Tag every response with a request id unless the handler set one.
async fn request_id(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    if !response.headers().contains_key(HEADER_REQUEST_ID) {
        if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().simple().to_string()) {
            response.headers_mut().insert(HEADER_REQUEST_ID, value);
        }
    }
    response
}

fn authorize(headers: &HeaderMap) -> Result<(), ApiError> {
    match headers.get(HEADER_AUTH_TOKEN) {
        Some(token) if !token.is_empty() => Ok(()),
        _ => Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "APIGW.0301",
            "Incorrect IAM authentication information",
        )),
    }
}

async fn list_clusters(
    State(db): State<Db>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    authorize(&headers)?;
    let clusters = db.clusters.read().await;
    let mut found: Vec<Cluster> = clusters
        .values()
        .filter(|c| c.project_id == project_id)
        .filter(|c| query.name.as_ref().map_or(true, |name| c.name == *name))
        .cloned()
        .collect();
    found.sort_by(|a, b| a.name.cmp(&b.name));
    if let Some(limit) = query.limit {
        found.truncate(limit);
    }
    Ok(Json(json!({ "clusters": found })))
}

async fn create_cluster(
    State(db): State<Db>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<CreateCluster>,
) -> Result<(StatusCode, Json<Cluster>), ApiError> {
    authorize(&headers)?;
    let cluster = Cluster {
        id: Uuid::new_v4().to_string(),
        project_id,
        name: input.name,
        flavor: input.flavor,
        nodes: input.nodes,
    };
    info!(id = %cluster.id, name = %cluster.name, "cluster created");
    db.clusters
        .write()
        .await
        .insert(cluster.id.clone(), cluster.clone());
    Ok((StatusCode::CREATED, Json(cluster)))
}

async fn get_cluster(
    State(db): State<Db>,
    Path((project_id, cluster_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&headers)?;
    let clusters = db.clusters.read().await;
    let cluster = clusters
        .get(&cluster_id)
        .filter(|c| c.project_id == project_id)
        .cloned()
        .ok_or_else(|| ApiError::cluster_not_found(&cluster_id))?;
    Ok(([(HEADER_CLUSTER_VERSION, "3")], Json(cluster)))
}

async fn update_cluster(
    State(db): State<Db>,
    Path((project_id, cluster_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(input): Json<UpdateCluster>,
) -> Result<Json<Cluster>, ApiError> {
    authorize(&headers)?;
    let mut clusters = db.clusters.write().await;
    let cluster = clusters
        .get_mut(&cluster_id)
        .filter(|c| c.project_id == project_id)
        .ok_or_else(|| ApiError::cluster_not_found(&cluster_id))?;
    if let Some(name) = input.name {
        cluster.name = name;
    }
    if let Some(nodes) = input.nodes {
        cluster.nodes = nodes;
    }
    Ok(Json(cluster.clone()))
}

async fn delete_cluster(
    State(db): State<Db>,
    Path((project_id, cluster_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    authorize(&headers)?;
    let mut clusters = db.clusters.write().await;
    let owned = clusters
        .get(&cluster_id)
        .is_some_and(|c| c.project_id == project_id);
    if !owned {
        return Err(ApiError::cluster_not_found(&cluster_id));
    }
    clusters.remove(&cluster_id);
    info!(id = %cluster_id, "cluster deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Reflect what arrived: method, path, raw query, headers and body.
async fn echo(
    method: Method,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let headers: serde_json::Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.as_str().to_string(), Value::String(value))
        })
        .collect();
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": query.unwrap_or_default(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

/// Report the received parts in arrival order.
async fn upload(headers: HeaderMap, mut multipart: Multipart) -> Result<Json<Value>, ApiError> {
    authorize(&headers)?;
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        ApiError::new(StatusCode::BAD_REQUEST, "CCE.01400", e.to_string())
    };
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(bad_form)?;
        let value = match file_name {
            Some(_) => Value::Null,
            None => Value::String(String::from_utf8_lossy(&data).into_owned()),
        };
        parts.push(json!({
            "name": name,
            "file_name": file_name,
            "content_type": content_type,
            "size": data.len(),
            "value": value,
        }));
    }
    Ok(Json(json!({ "parts": parts })))
}

/// Every byte value once, in order.
pub fn object_content() -> Vec<u8> {
    (0..=255u8).collect()
}

async fn download(Path((_project_id, name)): Path<(String, String)>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\"")),
        ],
        object_content(),
    )
}

/// Fail with 503 for the first `fail` calls per key.
async fn flaky(
    State(db): State<Db>,
    Query(query): Query<FlakyQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut calls = db.flaky.lock().await;
    let count = calls.entry(query.key).or_insert(0);
    *count += 1;
    if *count <= query.fail {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SYS.0503",
            "service busy, retry later",
        ));
    }
    Ok(Json(json!({ "attempts": *count })))
}

/// Failure bodies in each envelope a vendor service is known to use.
async fn error_shape(Path(shape): Path<String>) -> Response {
    match shape.as_str() {
        "flat" => ApiError::new(StatusCode::BAD_REQUEST, "CCE.01400", "invalid flavor").into_response(),
        "nested" => (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"code": "IAM.0003", "message": "policy denies access"}})),
        )
            .into_response(),
        "authorization" => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error_code": "IAM.0002",
                "error_msg": "not authorized",
                "encoded_authorization_message": "encoded-details",
            })),
        )
            .into_response(),
        "body-request-id" => (
            StatusCode::CONFLICT,
            [(HEADER_REQUEST_ID, "")],
            Json(json!({"code": "VPC.0409", "message": "conflict", "request_id": "rid-in-body"})),
        )
            .into_response(),
        "plain" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        _ => ApiError::new(StatusCode::NOT_FOUND, "SYS.0404", format!("unknown shape {shape}"))
            .into_response(),
    }
}

async fn bucket(Path(name): Path<String>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        format!("<Bucket><Name>{name}</Name><Region>eu-west-0</Region></Bucket>"),
    )
}
