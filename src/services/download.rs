use crate::config::DownloadConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::CompletedJob;
use crate::services::job_client::HttpJobClient;
use crate::services::validation::safe_file_name;
use futures::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_TYPE};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};
use url::Url;

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Fetches result artifacts of completed jobs.
pub struct DownloadService {
    client: HttpJobClient,
    min_free_space_bytes: u64,
}

impl DownloadService {
    pub fn new(client: HttpJobClient, config: &DownloadConfig) -> Self {
        Self {
            client,
            min_free_space_bytes: config.min_free_space_mb.saturating_mul(1024 * 1024),
        }
    }

    /// Direct link to the artifact, for callers that hand the download to a browser.
    pub fn download_url(&self, job: &CompletedJob) -> ClientResult<Url> {
        self.client.download_url(job)
    }

    pub async fn fetch_bytes(&self, job: &CompletedJob) -> ClientResult<Vec<u8>> {
        let response = self.client.download_response(job).await?;
        check_content_type(job, response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Download(format!("Failed to read result for job {}: {e}", job.id())))?;
        Ok(bytes.to_vec())
    }

    /// Streams the artifact into `dir` and returns the written path.
    #[instrument(skip(self, job), fields(job_id = %job.id(), operation = %job.operation()))]
    pub async fn save(&self, job: &CompletedJob, dir: &Path) -> ClientResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        self.check_disk_space(dir)?;

        let response = self.client.download_response(job).await?;
        check_content_type(job, response.headers());

        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(content_disposition_file_name)
            .and_then(|name| safe_file_name(&name))
            .unwrap_or_else(|| job.result_file_name());
        let (mut file, path) = create_unique_file(dir, &file_name).await?;
        let mut stream = Box::pin(response.bytes_stream());
        let mut written: u64 = 0;

        let result: ClientResult<()> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| ClientError::Download(format!("Result stream interrupted: {e}")))?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<(), ClientError>(())
        }
        .await;

        if let Err(e) = result {
            drop(file);
            // Clean up the partial file
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove partial download {:?}: {}", path, remove_err);
            }
            return Err(e);
        }

        info!("Saved result of job {} to {:?} ({} bytes)", job.id(), path, written);
        Ok(path)
    }

    fn check_disk_space(&self, dir: &Path) -> ClientResult<()> {
        match fs2::available_space(dir) {
            Ok(available_bytes) => {
                if available_bytes < self.min_free_space_bytes {
                    return Err(ClientError::Io(format!(
                        "Insufficient disk space in {}. Available: {available_bytes} bytes, Required: {} bytes",
                        dir.display(),
                        self.min_free_space_bytes
                    )));
                }
                Ok(())
            }
            Err(e) => {
                warn!("Failed to check disk space: {}", e);
                // An unknown amount of space is not a reason to skip the download
                Ok(())
            }
        }
    }
}

/// Opens a new file named `file_name` in `dir`, inserting `-1`, `-2`, ...
/// before the extension while the name is taken. Existing files are never
/// truncated.
async fn create_unique_file(dir: &Path, file_name: &str) -> ClientResult<(tokio::fs::File, PathBuf)> {
    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = match (attempt, extension) {
            (0, _) => file_name.to_string(),
            (n, Some(ext)) => format!("{stem}-{n}.{ext}"),
            (n, None) => format!("{stem}-{n}"),
        };
        let path = dir.join(candidate);
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(ClientError::Io(format!(
        "No free file name for {file_name} in {}",
        dir.display()
    )))
}

fn check_content_type(job: &CompletedJob, headers: &HeaderMap) {
    let Some(raw) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return;
    };
    let Ok(received) = raw.parse::<mime::Mime>() else {
        warn!("Unparseable content type {:?} for job {}", raw, job.id());
        return;
    };
    let expected = job.operation().profile().content_type;
    if received.essence_str() != expected && received != mime::APPLICATION_OCTET_STREAM {
        warn!(
            "Job {} returned {} where {} was expected",
            job.id(),
            received.essence_str(),
            expected
        );
    }
}

/// Extracts `filename` from a `Content-Disposition` header value.
pub fn content_disposition_file_name(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|param| {
        let (key, raw) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = raw.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_quoted_file_name() {
        assert_eq!(
            content_disposition_file_name("attachment; filename=\"merged_abc.pdf\"").as_deref(),
            Some("merged_abc.pdf")
        );
        assert_eq!(
            content_disposition_file_name("attachment;filename=split_abc.zip").as_deref(),
            Some("split_abc.zip")
        );
    }

    #[test]
    fn huge_free_space_minimum_saturates() {
        let mut config = crate::config::Config::default();
        config.api.base_url = "http://localhost:8081".to_string();
        config.download.min_free_space_mb = u64::MAX;
        let client = HttpJobClient::from_config(&config).unwrap();

        let service = DownloadService::new(client, &config.download);
        assert_eq!(service.min_free_space_bytes, u64::MAX);
    }

    #[tokio::test]
    async fn existing_results_are_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("merged_abc.pdf"), b"earlier").await.unwrap();

        let (_, first) = create_unique_file(dir.path(), "merged_abc.pdf").await.unwrap();
        let (_, second) = create_unique_file(dir.path(), "merged_abc.pdf").await.unwrap();
        let (_, bare) = create_unique_file(dir.path(), "README").await.unwrap();
        let (_, bare_again) = create_unique_file(dir.path(), "README").await.unwrap();

        assert_eq!(first, dir.path().join("merged_abc-1.pdf"));
        assert_eq!(second, dir.path().join("merged_abc-2.pdf"));
        assert_eq!(bare, dir.path().join("README"));
        assert_eq!(bare_again, dir.path().join("README-1"));
        assert_eq!(tokio::fs::read(dir.path().join("merged_abc.pdf")).await.unwrap(), b"earlier");
    }

    #[test]
    fn ignores_headers_without_file_name() {
        assert_eq!(content_disposition_file_name("inline"), None);
        assert_eq!(content_disposition_file_name("attachment; filename=\"\""), None);
        assert_eq!(
            content_disposition_file_name("attachment; filename*=UTF-8''x.pdf"),
            None
        );
    }
}
