use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use uploader_engine::{
    ApiError, ApiSettings, ArchiveApi, JobResult, JobStatus, JobStatusSource, NoProgress,
    PluginData, ReqwestArchiveApi, TagStat, UploadProgress,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> ReqwestArchiveApi {
    ReqwestArchiveApi::new(ApiSettings {
        base_url: server.uri(),
        ..ApiSettings::default()
    })
    .expect("client")
}

#[tokio::test]
async fn submit_url_posts_form_and_returns_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download_url"))
        .and(body_string_contains("url=https%3A%2F%2Fexample.com%2Fa.zip"))
        .and(body_string_contains("catid=SET_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "operation": "download_url",
            "success": 1,
            "job": 42,
            "url": "https://example.com/a.zip"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let job = api_for(&server)
        .submit_url("https://example.com/a.zip", Some("SET_1"))
        .await
        .expect("submit ok");
    assert_eq!(job, 42);
}

#[tokio::test]
async fn refused_submission_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download_url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 0,
            "message": "No downloader for this URL"
        })))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .submit_url("https://example.com/a.zip", None)
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::Rejected("No downloader for this URL".to_string()));
}

#[tokio::test]
async fn upload_file_sends_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/archives/upload"))
        .and(body_string_contains("filename=\"book.zip\""))
        .and(body_string_contains("zip-bytes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "job": "17",
            "name": "book.zip"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("book.zip");
    let mut file = std::fs::File::create(&file_path).unwrap();
    file.write_all(b"zip-bytes").unwrap();

    let job = api_for(&server)
        .upload_file(&file_path, None, Arc::new(NoProgress))
        .await
        .expect("upload ok");
    assert_eq!(job, 17);
}

#[derive(Default)]
struct RecordedProgress(Mutex<Vec<(u64, u64)>>);

impl UploadProgress for RecordedProgress {
    fn sent(&self, sent: u64, total: u64) {
        self.0.lock().unwrap().push((sent, total));
    }
}

#[tokio::test]
async fn upload_file_reports_bytes_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/archives/upload"))
        .and(body_string_contains("catid=SET_2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": 1, "job": 18})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("large.cbz");
    std::fs::write(&file_path, vec![b'x'; 20_000]).unwrap();

    let progress = Arc::new(RecordedProgress::default());
    let job = api_for(&server)
        .upload_file(&file_path, Some("SET_2"), progress.clone())
        .await
        .expect("upload ok");
    assert_eq!(job, 18);

    let seen = progress.0.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&(0, 20_000)));
    assert_eq!(seen.last(), Some(&(20_000, 20_000)));
    assert!(seen.len() > 2, "expected several chunks, got {seen:?}");
}

#[tokio::test]
async fn upload_of_missing_file_is_io_error() {
    let server = MockServer::start().await;
    let err = api_for(&server)
        .upload_file(
            std::path::Path::new("/definitely/not/here.zip"),
            None,
            Arc::new(NoProgress),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Io(_)));
}

#[tokio::test]
async fn job_status_maps_minion_states() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/minion/1/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "active"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/minion/2/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "finished",
            "result": {"success": 1, "id": "abc123", "title": "My Book", "message": "Added"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/minion/3/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "failed",
            "result": "Unsupported file"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/minion/4/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "exploded"})))
        .mount(&server)
        .await;

    let api = api_for(&server);
    assert_eq!(api.job_status(1).await, Ok(JobStatus::Pending));
    assert_eq!(
        api.job_status(2).await,
        Ok(JobStatus::Finished(JobResult {
            title: Some("My Book".to_string()),
            id: Some("abc123".to_string()),
            message: Some("Added".to_string()),
            success: true,
        }))
    );
    assert_eq!(
        api.job_status(3).await,
        Ok(JobStatus::Failed("Unsupported file".to_string()))
    );
    assert!(matches!(api.job_status(4).await, Err(ApiError::Decode(_))));
}

#[tokio::test]
async fn job_status_http_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/minion/9/detail"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert_eq!(
        api_for(&server).job_status(9).await,
        Err(ApiError::HttpStatus(500))
    );
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/minion/1/detail"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({"state": "active"})),
        )
        .mount(&server)
        .await;

    let api = ReqwestArchiveApi::new(ApiSettings {
        base_url: server.uri(),
        request_timeout: Duration::from_millis(50),
        ..ApiSettings::default()
    })
    .unwrap();
    assert!(matches!(api.job_status(1).await, Err(ApiError::Timeout(_))));
}

#[tokio::test]
async fn api_key_is_sent_as_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/search/cache"))
        .and(header("Authorization", "Bearer c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let api = ReqwestArchiveApi::new(ApiSettings {
        base_url: server.uri(),
        api_key: Some("secret".to_string()),
        ..ApiSettings::default()
    })
    .unwrap();
    api.invalidate_cache().await.expect("invalidate ok");
}

#[tokio::test]
async fn metadata_update_and_plugin_run() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/archives/abc/metadata"))
        .and(body_string_contains("title=New+title"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/plugins/use"))
        .and(query_param("plugin", "ehplugin"))
        .and(query_param("id", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "operation": "use_plugin",
            "success": 1,
            "data": {"title": "Found", "new_tags": "artist:foo, language:english"}
        })))
        .mount(&server)
        .await;

    let api = api_for(&server);
    api.update_metadata("abc", "New title", "a, b")
        .await
        .expect("metadata ok");
    let data = api.use_plugin("ehplugin", "abc", Some("")).await.unwrap();
    assert_eq!(
        data,
        PluginData {
            title: Some("Found".to_string()),
            new_tags: "artist:foo, language:english".to_string(),
        }
    );
}

#[tokio::test]
async fn plugin_failure_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plugins/use"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 0,
            "error": "Plugin not found"
        })))
        .mount(&server)
        .await;

    assert_eq!(
        api_for(&server).use_plugin("nope", "abc", None).await,
        Err(ApiError::Rejected("Plugin not found".to_string()))
    );
}

#[tokio::test]
async fn tag_stats_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/database/stats"))
        .and(query_param("minweight", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"namespace": "artist", "text": "foo", "weight": 4},
            {"namespace": "", "text": "colour", "weight": 2}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/archives/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let stats = api.tag_stats(2).await.unwrap();
    assert_eq!(
        stats,
        vec![
            TagStat {
                namespace: "artist".to_string(),
                text: "foo".to_string(),
                weight: 4,
            },
            TagStat {
                namespace: String::new(),
                text: "colour".to_string(),
                weight: 2,
            },
        ]
    );
    api.delete_archive("abc").await.expect("delete ok");
}
