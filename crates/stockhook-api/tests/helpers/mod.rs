//! Test helpers: build the real router over a temporary data directory.
//!
//! Run from workspace root: `cargo test -p stockhook-api`.

#![allow(dead_code)]

use axum_test::{TestResponse, TestServer};
use stockhook_core::constants::TOKEN_HEADER;
use stockhook_core::Config;
use tempfile::TempDir;

pub const TEST_TOKEN: &str = "test-token-0123456789";

/// Test application: server plus the data directory it writes to.
pub struct TestApp {
    pub server: TestServer,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Names of every file in the data directory, sorted.
    pub fn data_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.temp_dir.path())
            .expect("Failed to read data dir")
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Deliver `body` with the dedicated token header and an explicit length.
    pub async fn deliver(&self, content_type: &str, body: &[u8]) -> TestResponse {
        self.server
            .post("/webhook")
            .add_header(TOKEN_HEADER, TEST_TOKEN)
            .content_type(content_type)
            .add_header("Content-Length", body.len().to_string())
            .bytes(body.to_vec().into())
            .await
    }

    /// Deliver and return the id from the `ok <id>` response.
    pub async fn deliver_ok(&self, content_type: &str, body: &[u8]) -> String {
        let response = self.deliver(content_type, body).await;
        assert_eq!(response.status_code(), 200, "{}", response.text());
        parse_ok_id(&response.text())
    }
}

pub fn parse_ok_id(text: &str) -> String {
    text.strip_prefix("ok ")
        .and_then(|rest| rest.strip_suffix('\n'))
        .unwrap_or_else(|| panic!("unexpected ingest response {:?}", text))
        .to_string()
}

pub fn test_config(dir: &std::path::Path) -> Config {
    Config::new(dir).with_token(TEST_TOKEN)
}

/// App with the test token configured and default limits.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|config| config).await
}

/// App whose configuration is adjusted by `configure` before startup.
pub async fn setup_test_app_with(configure: impl FnOnce(Config) -> Config) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = configure(test_config(temp_dir.path()));

    let (_state, app) = stockhook_api::initialize_app(config)
        .await
        .expect("Failed to initialize app");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp { server, temp_dir }
}
