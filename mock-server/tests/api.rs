use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, object_content, Cluster, HEADER_AUTH_TOKEN, HEADER_REQUEST_ID};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn authed(method: &str, uri: &str) -> http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(HEADER_AUTH_TOKEN, "token")
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    authed(method, uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- auth and request ids ---

#[tokio::test]
async fn missing_token_returns_401_envelope() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/v1/p1/clusters")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = body_json(resp).await;
    assert_eq!(body["error_code"], "APIGW.0301");
}

#[tokio::test]
async fn every_response_has_a_request_id() {
    let resp = app()
        .oneshot(authed("GET", "/v1/p1/clusters").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let request_id = resp.headers().get(HEADER_REQUEST_ID).unwrap();
    assert_eq!(request_id.len(), 32);
}

// --- clusters ---

#[tokio::test]
async fn create_cluster_returns_201() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/v1/p1/clusters",
            r#"{"name":"prod","flavor":"cce.s1.small"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let cluster: Cluster = body_json(resp).await;
    assert_eq!(cluster.name, "prod");
    assert_eq!(cluster.project_id, "p1");
    assert_eq!(cluster.nodes, 1);
}

#[tokio::test]
async fn create_cluster_malformed_json_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/v1/p1/clusters", r#"{"name":"x"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn get_cluster_not_found() {
    let resp = app()
        .oneshot(authed("GET", "/v1/p1/clusters/missing").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = body_json(resp).await;
    assert_eq!(body["error_code"], "CCE.01404");
    assert_eq!(body["error_msg"], "cluster missing not found");
}

#[tokio::test]
async fn cluster_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/v1/p1/clusters",
            r#"{"name":"prod","flavor":"cce.s1.small","nodes":3}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Cluster = body_json(resp).await;
    let id = created.id;

    // another project does not see it
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            authed("GET", &format!("/v1/p2/clusters/{id}"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            authed("GET", &format!("/v1/p1/clusters/{id}"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-cluster-version"], "3");
    let fetched: Cluster = body_json(resp).await;
    assert_eq!(fetched.nodes, 3);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "PUT",
            &format!("/v1/p1/clusters/{id}"),
            r#"{"nodes":5}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Cluster = body_json(resp).await;
    assert_eq!(updated.name, "prod");
    assert_eq!(updated.nodes, 5);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            authed("GET", "/v1/p1/clusters?name=prod&limit=10")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    let listed: Value = body_json(resp).await;
    assert_eq!(listed["clusters"].as_array().unwrap().len(), 1);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            authed("DELETE", &format!("/v1/p1/clusters/{id}"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            authed("DELETE", &format!("/v1/p1/clusters/{id}"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- echo ---

#[tokio::test]
async fn echo_reflects_request() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/v1/p1/echo?b=2&a=1")
                .header("X-Trace", "t1")
                .body("payload".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    let body: Value = body_json(resp).await;
    assert_eq!(body["method"], "PATCH");
    assert_eq!(body["path"], "/v1/p1/echo");
    assert_eq!(body["query"], "b=2&a=1");
    assert_eq!(body["headers"]["x-trace"], "t1");
    assert_eq!(body["body"], "payload");
}

// --- upload / download ---

#[tokio::test]
async fn upload_reports_parts_in_order() {
    let body = concat!(
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"description\"\r\n\r\n",
        "kubeconfig\r\n",
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"file\"; filename=\"config.yaml\"\r\n",
        "Content-Type: text/yaml\r\n\r\n",
        "apiVersion: v1\r\n",
        "--XyZ--\r\n",
    );
    let resp = app()
        .oneshot(
            authed("POST", "/v1/p1/upload")
                .header(http::header::CONTENT_TYPE, "multipart/form-data; boundary=XyZ")
                .body(body.to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    let parts = body["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0]["name"], "description");
    assert_eq!(parts[0]["value"], "kubeconfig");
    assert_eq!(parts[1]["file_name"], "config.yaml");
    assert_eq!(parts[1]["content_type"], "text/yaml");
    assert_eq!(parts[1]["size"], 14);
}

#[tokio::test]
async fn download_returns_binary() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/v1/p1/objects/blob.bin")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(body_bytes(resp).await.to_vec(), object_content());
}

// --- flaky and error shapes ---

#[tokio::test]
async fn flaky_fails_then_recovers() {
    use tower::Service;

    let mut app = app().into_service();
    let mut statuses = Vec::new();
    for _ in 0..3 {
        let resp = ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(
                Request::builder()
                    .uri("/v1/p1/flaky?key=k&fail=2")
                    .body(String::new())
                    .unwrap(),
            )
            .await
            .unwrap();
        statuses.push(resp.status());
    }
    assert_eq!(
        statuses,
        [
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::OK
        ]
    );
}

#[tokio::test]
async fn nested_error_shape() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/v1/errors/nested")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = body_json(resp).await;
    assert_eq!(body["error"]["code"], "IAM.0003");
}

#[tokio::test]
async fn bucket_is_xml() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/v1/buckets/logs")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/xml");
    let body = body_bytes(resp).await;
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        "<Bucket><Name>logs</Name><Region>eu-west-0</Region></Bucket>"
    );
}
