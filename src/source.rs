use crate::error::SourceError;
use crate::types::GeometryRef;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use tracing::debug;

/// Resolves a geometry reference to parsed JSON.
pub trait GeometrySource {
    fn fetch(&self, reference: &GeometryRef) -> impl Future<Output = Result<Value, SourceError>>;
}

/// Fetches remote references over HTTP and reads file references relative to
/// `base_dir`. No timeout or retry is applied.
pub struct HttpSource {
    client: reqwest::Client,
    base_dir: PathBuf,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, base_dir: PathBuf) -> Self {
        Self { client, base_dir }
    }
}

impl GeometrySource for HttpSource {
    async fn fetch(&self, reference: &GeometryRef) -> Result<Value, SourceError> {
        match reference {
            GeometryRef::Inline(value) => Ok(value.clone()),
            GeometryRef::Remote(url) => {
                debug!(%url, "Fetching geometry");
                let response = self
                    .client
                    .get(url)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .send()
                    .await
                    .map_err(|source| SourceError::Http {
                        url: url.clone(),
                        source,
                    })?;
                let status = response.status();
                if !status.is_success() {
                    return Err(SourceError::Status {
                        url: url.clone(),
                        status,
                    });
                }
                let bytes = response.bytes().await.map_err(|source| SourceError::Http {
                    url: url.clone(),
                    source,
                })?;
                Ok(serde_json::from_slice(&bytes)?)
            }
            GeometryRef::File(path) => {
                let path = self.base_dir.join(path);
                debug!(?path, "Reading geometry");
                let bytes = tokio::fs::read(&path).await.map_err(|source| SourceError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Ok(serde_json::from_slice(&bytes)?)
            }
        }
    }
}
