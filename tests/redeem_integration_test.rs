use asset_redeem::Config;
use serde_json::{Value as JsonValue, json};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0 not really a jpeg";

#[derive(serde::Deserialize, Debug)]
struct RedeemResponse {
    ok: bool,
    token: String,
    msg: String,
    expires_in: u64,
}

/// Test harness that runs the server on a free port with a throwaway workspace
struct TestServer {
    handle: JoinHandle<()>,
    port: u16,
    workspace: PathBuf,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(codes: &[&str]) -> Self {
        Self::start_with_ttl(codes, 3600).await
    }

    async fn start_with_ttl(codes: &[&str], token_ttl_secs: u64) -> Self {
        // Only open when debugging
        // tracing_subscriber::fmt::init();

        let port = portpicker::pick_unused_port().expect("No available port");

        let test_id = uuid::Uuid::new_v4().to_string();
        let workspace = PathBuf::from(format!("/tmp/test-workspace-{test_id}"));
        let asset_dir = workspace.join("paid").join("img_paid");
        std::fs::create_dir_all(&asset_dir).unwrap();
        std::fs::write(asset_dir.join("1.jpg"), JPEG_BYTES).unwrap();
        std::fs::write(asset_dir.join("2.jpg"), JPEG_BYTES).unwrap();

        let ledger = json!({
            "codes": codes
                .iter()
                .map(|code| json!({ "code": code, "used": false }))
                .collect::<Vec<_>>(),
        });
        let ledger_file = workspace.join("codes.json");
        std::fs::write(&ledger_file, serde_json::to_string_pretty(&ledger).unwrap()).unwrap();

        let config = Config {
            listen_on_port: port,
            host: "127.0.0.1".to_string(),
            asset_dir: asset_dir.display().to_string(),
            ledger_file: ledger_file.display().to_string(),
            token_ttl_secs,
            ..Default::default()
        };

        let handle = tokio::spawn(async move {
            asset_redeem::run(config).await.expect("Server failed");
        });

        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        // Poll until server is ready
        for _ in 0..200 {
            if let Ok(response) = client
                .get(format!("http://127.0.0.1:{port}/health"))
                .send()
                .await
                && response.status().is_success()
            {
                break;
            }

            sleep(Duration::from_millis(10)).await;
        }

        TestServer {
            handle,
            port,
            workspace,
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    fn asset_path(&self, name: &str) -> PathBuf {
        self.workspace.join("paid").join("img_paid").join(name)
    }

    fn ledger(&self) -> JsonValue {
        let content = std::fs::read_to_string(self.workspace.join("codes.json")).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    fn ledger_record(&self, code: &str) -> JsonValue {
        self.ledger()["codes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["code"] == code)
            .cloned()
            .unwrap()
    }

    async fn redeem(&self, code: &str, asset: &str) -> reqwest::Response {
        self.client
            .post(self.url("/redeem"))
            .json(&json!({ "code": code, "asset": asset }))
            .send()
            .await
            .unwrap()
    }

    async fn redeem_token(&self, code: &str, asset: &str) -> String {
        let response = self.redeem(code, asset).await;
        assert_eq!(response.status(), 200);
        let body: RedeemResponse = response.json().await.unwrap();
        assert!(body.ok);
        body.token
    }

    async fn download(&self, token: &str, asset: &str) -> reqwest::Response {
        self.client
            .get(self.url("/download"))
            .query(&[("token", token), ("asset", asset)])
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();

        // Clean up test workspace
        std::fs::remove_dir_all(&self.workspace).ok();
    }
}

async fn error_msg(response: reqwest::Response) -> String {
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body["ok"], false);
    body["msg"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_index() {
    let server = TestServer::start(&[]).await;

    let response = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body["ok"], true);

    let response = server.client.get(server.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("/redeem"));
}

#[tokio::test]
async fn test_redeem_code_only_once() {
    let server = TestServer::start(&["X1"]).await;

    let response = server.redeem("X1", "1.jpg").await;
    assert_eq!(response.status(), 200);
    let body: RedeemResponse = response.json().await.unwrap();
    assert!(body.ok);
    assert!(!body.token.is_empty());
    assert!(!body.msg.is_empty());
    assert_eq!(body.expires_in, 3600);

    let record = server.ledger_record("X1");
    assert_eq!(record["used"], true);
    assert_eq!(record["asset"], "1.jpg");
    assert!(record["usedAt"].is_string());

    let response = server.redeem("X1", "1.jpg").await;
    assert_eq!(response.status(), 401);
    assert!(error_msg(response).await.contains("already been used"));
}

#[tokio::test]
async fn test_unknown_code() {
    let server = TestServer::start(&["X1"]).await;

    let response = server.redeem("NOPE", "1.jpg").await;
    assert_eq!(response.status(), 401);
    assert!(error_msg(response).await.contains("invalid"));
    assert_eq!(server.ledger_record("X1")["used"], false);
}

#[tokio::test]
async fn test_download_only_once() {
    let server = TestServer::start(&["X1"]).await;
    let token = server.redeem_token("X1", "1.jpg").await;

    let response = server.download(&token, "1.jpg").await;
    assert_eq!(response.status(), 200);
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains("1.jpg"));
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), JPEG_BYTES);

    let response = server.download(&token, "1.jpg").await;
    assert_eq!(response.status(), 401);
    assert!(error_msg(response).await.contains("already been used"));
}

#[tokio::test]
async fn test_expired_token() {
    let server = TestServer::start_with_ttl(&["X1"], 1).await;
    let token = server.redeem_token("X1", "1.jpg").await;

    sleep(Duration::from_secs(2)).await;

    let response = server.download(&token, "1.jpg").await;
    assert_eq!(response.status(), 401);
    assert!(error_msg(response).await.contains("expired"));
}

#[tokio::test]
async fn test_redeem_missing_asset_keeps_code() {
    let server = TestServer::start(&["X2"]).await;

    let response = server.redeem("X2", "missing.jpg").await;
    assert_eq!(response.status(), 404);
    assert_eq!(server.ledger_record("X2")["used"], false);

    // the code is still good for an existing asset
    server.redeem_token("X2", "2.jpg").await;
}

#[tokio::test]
async fn test_asset_mismatch() {
    let server = TestServer::start(&["X1"]).await;
    let token = server.redeem_token("X1", "1.jpg").await;

    let response = server.download(&token, "2.jpg").await;
    assert_eq!(response.status(), 401);
    assert!(error_msg(response).await.contains("does not match"));

    // a mismatch does not burn the token
    let response = server.download(&token, "1.jpg").await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_invalid_token() {
    let server = TestServer::start(&[]).await;

    let response = server
        .download("00000000-0000-4000-8000-000000000000", "1.jpg")
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_missing_fields() {
    let server = TestServer::start(&["X1"]).await;

    for body in [
        json!({ "code": "X1" }),
        json!({ "asset": "1.jpg" }),
        json!({ "code": "", "asset": "1.jpg" }),
        json!({}),
    ] {
        let response = server
            .client
            .post(server.url("/redeem"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "body: {body}");
    }

    let response = server
        .client
        .post(server.url("/redeem"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    for query in ["/download", "/download?token=abc", "/download?asset=1.jpg"] {
        let response = server.client.get(server.url(query)).send().await.unwrap();
        assert_eq!(response.status(), 400, "query: {query}");
    }

    assert_eq!(server.ledger_record("X1")["used"], false);
}

#[tokio::test]
async fn test_path_traversal_is_reduced_to_basename() {
    let server = TestServer::start(&["X1", "X2"]).await;

    // resolves to "passwd" inside the asset directory, which does not exist
    let response = server.redeem("X1", "../../etc/passwd").await;
    assert_eq!(response.status(), 404);
    assert_eq!(server.ledger_record("X1")["used"], false);

    // "../img_paid/1.jpg" is just "1.jpg"
    let token = server.redeem_token("X2", "../img_paid/1.jpg").await;
    assert_eq!(server.ledger_record("X2")["asset"], "1.jpg");

    let response = server.download(&token, "../../1.jpg").await;
    assert_eq!(response.status(), 200);

    let response = server.redeem("X1", "..").await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_legacy_img_field() {
    let server = TestServer::start(&["X1"]).await;

    let response = server
        .client
        .post(server.url("/redeem"))
        .json(&json!({ "code": "X1", "img": "1.jpg" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: RedeemResponse = response.json().await.unwrap();

    let response = server
        .client
        .get(server.url("/download"))
        .query(&[("token", body.token.as_str()), ("img", "1.jpg")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_missing_file_does_not_burn_token() {
    let server = TestServer::start(&["X1"]).await;
    let token = server.redeem_token("X1", "1.jpg").await;

    let asset = server.asset_path("1.jpg");
    std::fs::remove_file(&asset).unwrap();

    let response = server.download(&token, "1.jpg").await;
    assert_eq!(response.status(), 404);

    std::fs::write(&asset, JPEG_BYTES).unwrap();
    let response = server.download(&token, "1.jpg").await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_concurrent_redeem_same_code() {
    let server = TestServer::start(&["RACE"]).await;

    let responses =
        futures::future::join_all((0..10).map(|_| server.redeem("RACE", "1.jpg"))).await;

    let ok = responses.iter().filter(|r| r.status() == 200).count();
    let unauthorized = responses.iter().filter(|r| r.status() == 401).count();
    assert_eq!(ok, 1);
    assert_eq!(unauthorized, 9);
}

#[tokio::test]
async fn test_concurrent_download_same_token() {
    let server = TestServer::start(&["X1"]).await;
    let token = server.redeem_token("X1", "1.jpg").await;

    let responses =
        futures::future::join_all((0..10).map(|_| server.download(&token, "1.jpg"))).await;

    let ok = responses.iter().filter(|r| r.status() == 200).count();
    assert_eq!(ok, 1);
}
