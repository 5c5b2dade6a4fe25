mod common;

use std::io::Write;

use axum::http::{StatusCode, header::CONTENT_TYPE};
use flate2::{Compression, write::GzEncoder};
use serde_json::json;
use tempfile::TempDir;

use common::{build_app, get, test_config};

struct Fixture {
    assets: TempDir,
    work: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            assets: TempDir::new().unwrap(),
            work: TempDir::new().unwrap(),
        }
    }

    fn put(&self, name: &str, content: &[u8]) {
        let path = self.assets.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn app(&self) -> axum::Router {
        build_app(test_config(self.assets.path(), self.work.path(), None))
    }
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

const SAMPLE: &[u8] = b"Phone|Lang\n15551234567|en\n15557654321|fr\n";

#[tokio::test]
async fn test_single_phone_json_lookup() {
    let fixture = Fixture::new();
    fixture.put("en.csv", SAMPLE);
    let app = fixture.app();

    let response = get(&app, "/language/15551234567?format=json").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "language": "en" }));

    let response = get(&app, "/language/19990000000?format=json").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "language": "not-found" }));
}

#[tokio::test]
async fn test_full_table_defaults_to_json() {
    let fixture = Fixture::new();
    fixture.put("en.csv", SAMPLE);
    let app = fixture.app();

    let response = get(&app, "/language").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({ "15551234567": "en", "15557654321": "fr" })
    );
}

#[tokio::test]
async fn test_text_rendering() {
    let fixture = Fixture::new();
    fixture.put("en.csv", SAMPLE);
    let app = fixture.app();

    let response = get(&app, "/language?format=text").await;
    assert_eq!(response.headers[CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(
        response.body,
        "Phone|Lang\n15551234567|en\n15557654321|fr\n"
    );

    let response = get(&app, "/language/15557654321?format=text").await;
    assert_eq!(response.body, "Phone|Lang\n15557654321|fr");

    let response = get(&app, "/language/19990000000?format=text").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_empty_store_never_errors() {
    let fixture = Fixture::new();
    let app = fixture.app();

    let response = get(&app, "/language?format=json").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({}));

    let response = get(&app, "/language/15551234567").await;
    assert_eq!(response.json(), json!({ "language": "not-found" }));

    let response = get(&app, "/language?format=text").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_merges_plain_and_gzip_assets() {
    let fixture = Fixture::new();
    fixture.put("a-base.csv", b"Phone|Lang\n1|en\n2|de\n");
    fixture.put("packs/b-override.gz", &gzip(b"Phone|Lang\n1|pt\n3|ar\n"));
    fixture.put("packs/README.md", b"not data");
    let app = fixture.app();

    let response = get(&app, "/language?format=text").await;
    assert_eq!(response.body, "Phone|Lang\n1|en\n2|de\n1|pt\n3|ar\n");

    let response = get(&app, "/language/1").await;
    assert_eq!(response.json(), json!({ "language": "pt" }));
    let response = get(&app, "/language/3").await;
    assert_eq!(response.json(), json!({ "language": "ar" }));
}

#[tokio::test]
async fn test_new_asset_is_picked_up_on_next_request() {
    let fixture = Fixture::new();
    fixture.put("en.csv", SAMPLE);
    let app = fixture.app();

    let response = get(&app, "/language/5511").await;
    assert_eq!(response.json(), json!({ "language": "not-found" }));

    fixture.put("pt.csv", b"Phone|Lang\n5511|pt\n");
    let response = get(&app, "/language/5511").await;
    assert_eq!(response.json(), json!({ "language": "pt" }));
}

#[tokio::test]
async fn test_removed_asset_disappears_from_mirror() {
    let fixture = Fixture::new();
    fixture.put("en.csv", SAMPLE);
    fixture.put("pt.csv", b"Phone|Lang\n5511|pt\n");
    let app = fixture.app();
    assert_eq!(
        get(&app, "/language/5511").await.json(),
        json!({ "language": "pt" })
    );

    std::fs::remove_file(fixture.assets.path().join("pt.csv")).unwrap();
    assert_eq!(
        get(&app, "/language/5511").await.json(),
        json!({ "language": "not-found" })
    );
}

#[tokio::test]
async fn test_unrecognised_columns_serve_empty_table() {
    let fixture = Fixture::new();
    fixture.put("people.csv", b"Id|Name\n1|Alice\n");
    let app = fixture.app();

    let response = get(&app, "/language").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({}));
}

#[tokio::test]
async fn test_malformed_table_is_server_error() {
    let fixture = Fixture::new();
    fixture.put("en.csv", b"Phone|Lang\n1|en|extra\n");
    let app = fixture.app();

    let response = get(&app, "/language/1").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_corrupt_gzip_is_server_error_and_mirror_is_kept() {
    let fixture = Fixture::new();
    fixture.put("en.csv", SAMPLE);
    let app = fixture.app();
    assert_eq!(
        get(&app, "/language/15551234567").await.json(),
        json!({ "language": "en" })
    );

    fixture.put("broken.gz", b"not gzip at all");
    let response = get(&app, "/language/15551234567").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    let mirrored = fixture.work.path().join("language/en.csv");
    assert!(mirrored.exists());
}

#[tokio::test]
async fn test_probes_answer_ok() {
    let fixture = Fixture::new();
    let app = fixture.app();

    for uri in ["/_/health", "/_/check", "/_/metrics"] {
        let response = get(&app, uri).await;
        assert_eq!(response.status, StatusCode::OK, "{uri}");
        assert!(response.body.is_empty());
        assert!(response.headers.contains_key("x-request-id"));
    }
}
