//! Browsing endpoint integration tests.
//!
//! Run with: `cargo test -p stockhook-api --test browse_test`

mod helpers;

use helpers::setup_test_app;

#[tokio::test]
async fn test_health() {
    let app = setup_test_app().await;
    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "ok\n");
    assert_eq!(response.header("x-content-type-options"), "nosniff");
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let app = setup_test_app().await;
    let response = app.client().get("/nope").await;
    assert_eq!(response.status_code(), 404);
    assert_eq!(response.text(), "not found\n");
    assert_eq!(response.header("cache-control"), "no-store");
}

#[tokio::test]
async fn test_index_lists_deliveries() {
    let app = setup_test_app().await;

    let empty = app.client().get("/").await;
    assert_eq!(empty.status_code(), 200);
    assert!(empty.text().contains("No deliveries yet."));

    let first = app
        .deliver_ok("application/json", br#"{"title": "First <one>"}"#)
        .await;
    let second = app
        .deliver_ok("text/markdown", b"# Second heading\n\nbody")
        .await;

    for path in ["/", "/index.html"] {
        let response = app.client().get(path).await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.header("content-type"), "text/html; charset=utf-8");
        assert_eq!(response.header("cache-control"), "no-store");

        let html = response.text();
        assert!(html.contains("First &lt;one&gt;"));
        assert!(html.contains("Second heading"));
        assert!(html.contains(&format!("/view?id={}", first)));
        assert!(html.contains(&format!("/view?id={}", second)));
    }
}

#[tokio::test]
async fn test_view_renders_payload_body_escaped() {
    let app = setup_test_app().await;
    let id = app
        .deliver_ok(
            "application/json",
            br##"{"title": "Hi", "content": "# Hi\n\n- a\n- b\n\n**bold** and <script>alert(1)</script>"}"##,
        )
        .await;

    let response = app.client().get("/view").add_query_param("id", &id).await;
    assert_eq!(response.status_code(), 200);
    let html = response.text();

    assert!(html.contains("<h1>Hi</h1>"));
    assert!(html.contains("<ul><li>a</li><li>b</li></ul>"));
    assert!(html.contains("<strong>bold</strong> and &lt;script&gt;"));
    assert!(!html.contains("<script>"));
    assert!(html.contains(&format!("/raw?id={}", id)));
    assert!(response
        .header("content-security-policy")
        .to_str()
        .unwrap()
        .contains("default-src 'none'"));
}

#[tokio::test]
async fn test_view_accepts_record_file_name() {
    let app = setup_test_app().await;
    let id = app.deliver_ok("text/plain", b"plain text body").await;

    let response = app
        .client()
        .get("/view")
        .add_query_param("id", format!("{}.json", id))
        .await;
    assert_eq!(response.status_code(), 200);
    assert!(response.text().contains("plain text body"));
}

#[tokio::test]
async fn test_view_falls_back_to_raw_json() {
    let app = setup_test_app().await;
    let id = app
        .deliver_ok("application/json", br#"{"zeta": 1, "alpha": [true]}"#)
        .await;

    let html = app
        .client()
        .get("/view")
        .add_query_param("id", &id)
        .await
        .text();
    assert!(html.contains("No displayable body field found"));
    let alpha = html.find("&quot;alpha&quot;").unwrap();
    let zeta = html.find("&quot;zeta&quot;").unwrap();
    assert!(alpha < zeta, "keys are sorted");
}

#[tokio::test]
async fn test_bad_and_unknown_ids() {
    let app = setup_test_app().await;
    let client = app.client();

    for path in ["/view", "/raw"] {
        for bad in ["../../etc/passwd", "a/b", "..", ""] {
            let response = client.get(path).add_query_param("id", bad).await;
            assert_eq!(response.status_code(), 400, "{} {:?}", path, bad);
            assert_eq!(response.text(), "invalid id\n");
        }

        let response = client.get(path).await;
        assert_eq!(response.status_code(), 400);

        let response = client
            .get(path)
            .add_query_param("id", "20200101T000000Z-000000000000")
            .await;
        assert_eq!(response.status_code(), 404);
        assert_eq!(response.text(), "not found\n");
    }
}

#[tokio::test]
async fn test_raw_text_gets_charset() {
    let app = setup_test_app().await;
    let id = app.deliver_ok("text/plain", b"hello").await;

    let response = app.client().get("/raw").add_query_param("id", &id).await;
    assert_eq!(response.header("content-type"), "text/plain; charset=utf-8");
    assert_eq!(response.header("content-length"), "5");
    assert_eq!(response.text(), "hello");
}
