use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use futures_util::TryStreamExt;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use uploader_logging::{uploader_debug, uploader_trace};

use crate::types::{deserialize_flag, deserialize_job_id};
use crate::{ApiError, JobId, JobResult, JobStatus, PluginData, TagStat};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/".to_string(),
            api_key: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Receives byte counts while an upload body is being sent.
pub trait UploadProgress: Send + Sync {
    fn sent(&self, sent: u64, total: u64);
}

/// Progress sink for callers that do not track uploads.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl UploadProgress for NoProgress {
    fn sent(&self, _sent: u64, _total: u64) {}
}

/// Where a poller gets job status from.
#[async_trait::async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn job_status(&self, job_id: JobId) -> Result<JobStatus, ApiError>;
}

/// The archive server's REST surface used by the uploader.
#[async_trait::async_trait]
pub trait ArchiveApi: JobStatusSource {
    /// Queues a download job for `url`.
    async fn submit_url(&self, url: &str, category: Option<&str>) -> Result<JobId, ApiError>;

    /// Uploads a local file and returns the job that processes it.
    ///
    /// `progress` sees the byte count after each chunk of the file is handed
    /// to the connection, starting at zero.
    async fn upload_file(
        &self,
        path: &Path,
        category: Option<&str>,
        progress: Arc<dyn UploadProgress>,
    ) -> Result<JobId, ApiError>;

    async fn invalidate_cache(&self) -> Result<(), ApiError>;

    async fn update_metadata(
        &self,
        archive_id: &str,
        title: &str,
        tags: &str,
    ) -> Result<(), ApiError>;

    async fn use_plugin(
        &self,
        plugin: &str,
        archive_id: &str,
        arg: Option<&str>,
    ) -> Result<PluginData, ApiError>;

    async fn tag_stats(&self, min_weight: u32) -> Result<Vec<TagStat>, ApiError>;

    async fn delete_archive(&self, archive_id: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default, deserialize_with = "deserialize_flag")]
    success: bool,
    #[serde(default, deserialize_with = "deserialize_job_id")]
    job: Option<JobId>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    #[serde(default, deserialize_with = "deserialize_flag")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PluginResponse {
    #[serde(default, deserialize_with = "deserialize_flag")]
    success: bool,
    #[serde(default)]
    data: Option<PluginData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MinionStatus {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

fn rejection(error: Option<String>, message: Option<String>, fallback: &str) -> ApiError {
    ApiError::Rejected(
        error
            .or(message)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| fallback.to_string()),
    )
}

impl MinionStatus {
    fn into_status(self) -> Result<JobStatus, ApiError> {
        if let Some(error) = self.error.filter(|e| !e.is_empty()) {
            return Err(ApiError::Rejected(error));
        }
        match self.state.as_deref() {
            Some("inactive") | Some("active") => Ok(JobStatus::Pending),
            Some("finished") => Ok(JobStatus::Finished(job_result(self.result)?)),
            Some("failed") => Ok(JobStatus::Failed(failure_text(self.result))),
            Some(other) => Err(ApiError::Decode(format!("unknown job state {other}"))),
            None => Err(ApiError::Decode("job state missing".to_string())),
        }
    }
}

fn job_result(result: Option<serde_json::Value>) -> Result<JobResult, ApiError> {
    match result {
        Some(value @ serde_json::Value::Object(_)) => {
            serde_json::from_value(value).map_err(|err| ApiError::Decode(err.to_string()))
        }
        Some(serde_json::Value::String(message)) => Ok(JobResult {
            message: Some(message),
            success: true,
            ..JobResult::default()
        }),
        _ => Ok(JobResult {
            success: true,
            ..JobResult::default()
        }),
    }
}

fn failure_text(result: Option<serde_json::Value>) -> String {
    match result {
        Some(serde_json::Value::String(text)) => text,
        Some(serde_json::Value::Null) | None => "job failed".to_string(),
        Some(other) => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestArchiveApi {
    client: reqwest::Client,
    base_url: Url,
    authorization: Option<String>,
}

impl ReqwestArchiveApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let mut base = settings.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|err| ApiError::InvalidUrl(err.to_string()))?;

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;

        let authorization = settings
            .api_key
            .filter(|key| !key.is_empty())
            .map(|key| {
                let encoded = base64::engine::general_purpose::STANDARD.encode(key);
                format!("Bearer {encoded}")
            });

        Ok(Self {
            client,
            base_url,
            authorization,
        })
    }

    /// Server root, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| ApiError::InvalidUrl(err.to_string()))?;
        let builder = self.client.request(method, url);
        Ok(match &self.authorization {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        uploader_trace!("{} -> {}", response.url(), status);
        if !status.is_success() {
            return Err(ApiError::HttpStatus(status.as_u16()));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        serde_json::from_slice(&body).map_err(|err| ApiError::Decode(err.to_string()))
    }

    async fn submit(&self, builder: RequestBuilder, what: &str) -> Result<JobId, ApiError> {
        let response: SubmitResponse = self.send_json(builder).await?;
        if !response.success {
            return Err(rejection(response.error, response.message, "submission refused"));
        }
        let job = response
            .job
            .ok_or_else(|| ApiError::Decode("response carries no job id".to_string()))?;
        uploader_debug!("Queued job {} for {}", job, what);
        Ok(job)
    }

    async fn operation(&self, builder: RequestBuilder, fallback: &str) -> Result<(), ApiError> {
        let response: OperationResponse = self.send_json(builder).await?;
        if response.success {
            Ok(())
        } else {
            Err(rejection(response.error, response.message, fallback))
        }
    }
}

#[async_trait::async_trait]
impl JobStatusSource for ReqwestArchiveApi {
    async fn job_status(&self, job_id: JobId) -> Result<JobStatus, ApiError> {
        let builder = self.request(Method::GET, &format!("api/minion/{job_id}/detail"))?;
        let status: MinionStatus = self.send_json(builder).await?;
        status.into_status()
    }
}

#[async_trait::async_trait]
impl ArchiveApi for ReqwestArchiveApi {
    async fn submit_url(&self, url: &str, category: Option<&str>) -> Result<JobId, ApiError> {
        let mut form = vec![("url", url)];
        if let Some(category) = category {
            form.push(("catid", category));
        }
        let builder = self.request(Method::POST, "api/download_url")?.form(&form);
        self.submit(builder, url).await
    }

    async fn upload_file(
        &self,
        path: &Path,
        category: Option<&str>,
        progress: Arc<dyn UploadProgress>,
    ) -> Result<JobId, ApiError> {
        let io_error = |err: std::io::Error| ApiError::Io(format!("{}: {err}", path.display()));
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ApiError::Io(format!("{} has no file name", path.display())))?;
        let file = tokio::fs::File::open(path).await.map_err(io_error)?;
        let total = file.metadata().await.map_err(io_error)?.len();

        progress.sent(0, total);
        let mut sent = 0u64;
        let chunks = ReaderStream::new(file).inspect_ok(move |chunk| {
            sent += chunk.len() as u64;
            progress.sent(sent, total);
        });
        let part = Part::stream_with_length(Body::wrap_stream(chunks), total)
            .file_name(file_name.clone());

        let mut form = Form::new().part("file", part);
        if let Some(category) = category {
            form = form.text("catid", category.to_string());
        }
        let builder = self
            .request(Method::POST, "api/archives/upload")?
            .multipart(form);
        self.submit(builder, &file_name).await
    }

    async fn invalidate_cache(&self) -> Result<(), ApiError> {
        let builder = self.request(Method::DELETE, "api/search/cache")?;
        self.send(builder).await.map(|_| ())
    }

    async fn update_metadata(
        &self,
        archive_id: &str,
        title: &str,
        tags: &str,
    ) -> Result<(), ApiError> {
        let builder = self
            .request(Method::PUT, &format!("api/archives/{archive_id}/metadata"))?
            .form(&[("tags", tags), ("title", title)]);
        self.operation(builder, "metadata update refused").await
    }

    async fn use_plugin(
        &self,
        plugin: &str,
        archive_id: &str,
        arg: Option<&str>,
    ) -> Result<PluginData, ApiError> {
        let mut query = vec![("plugin", plugin), ("id", archive_id)];
        if let Some(arg) = arg.filter(|arg| !arg.is_empty()) {
            query.push(("arg", arg));
        }
        let builder = self
            .request(Method::POST, "api/plugins/use")?
            .query(&query);
        let response: PluginResponse = self.send_json(builder).await?;
        if !response.success {
            return Err(rejection(response.error, None, "plugin run failed"));
        }
        response
            .data
            .ok_or_else(|| ApiError::Decode("plugin response carries no data".to_string()))
    }

    async fn tag_stats(&self, min_weight: u32) -> Result<Vec<TagStat>, ApiError> {
        let builder = self
            .request(Method::GET, "api/database/stats")?
            .query(&[("minweight", min_weight)]);
        self.send_json(builder).await
    }

    async fn delete_archive(&self, archive_id: &str) -> Result<(), ApiError> {
        let builder = self.request(Method::DELETE, &format!("api/archives/{archive_id}"))?;
        self.operation(builder, "archive could not be deleted").await
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(err.to_string());
    }
    if err.is_decode() {
        return ApiError::Decode(err.to_string());
    }
    ApiError::Network(err.to_string())
}
