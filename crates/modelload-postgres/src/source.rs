//! Where model DDL comes from: a data-models HTTP service or a local
//! directory of SQL files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::ddl::{DdlKind, ModelDdl};

/// Public data-models service used when no DDL source hint is given.
pub const DEFAULT_SERVICE_URL: &str = "https://data-models-sqlalchemy.research.chop.edu";

/// Errors raised while fetching model DDL.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("http error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that can hand out DDL text for a model version.
#[async_trait]
pub trait DdlSource: Send + Sync {
    /// Human readable location, used in log records.
    fn location(&self) -> String;

    async fn fetch(&self, model: &str, version: &str, kind: DdlKind) -> Result<String, SourceError>;
}

/// Fetch and parse all three bundles for a model version.
pub async fn fetch_model_ddl(
    source: &dyn DdlSource,
    model: &str,
    version: &str,
) -> Result<ModelDdl, SourceError> {
    let mut texts = Vec::with_capacity(DdlKind::ALL.len());
    for kind in DdlKind::ALL {
        texts.push(source.fetch(model, version, kind).await?);
    }
    Ok(ModelDdl::from_sql(&texts[0], &texts[1], &texts[2]))
}

/// Pick a source for `hint`: `http(s)://` URLs are services, any other
/// non-empty value is a directory, and an empty hint falls back to
/// `default_url`.
pub fn resolve_source(hint: &str, default_url: &str) -> Box<dyn DdlSource> {
    let hint = hint.trim();
    if hint.is_empty() {
        return Box::new(HttpDdlSource::new(default_url));
    }
    if hint.starts_with("http://") || hint.starts_with("https://") {
        Box::new(HttpDdlSource::new(hint))
    } else {
        Box::new(DirectoryDdlSource::new(hint))
    }
}

/// Data-models service serving `/{model}/{version}/ddl/postgresql/{kind}/`.
#[derive(Debug, Clone)]
pub struct HttpDdlSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDdlSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, model: &str, version: &str, kind: DdlKind) -> String {
        format!(
            "{}/{model}/{version}/ddl/postgresql/{}/",
            self.base_url,
            kind.as_str()
        )
    }
}

#[async_trait]
impl DdlSource for HttpDdlSource {
    fn location(&self) -> String {
        self.base_url.clone()
    }

    async fn fetch(&self, model: &str, version: &str, kind: DdlKind) -> Result<String, SourceError> {
        let url = self.url_for(model, version, kind);
        let http_error = |source: reqwest::Error| SourceError::Http {
            url: url.clone(),
            source,
        };

        let response = self.client.get(&url).send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(http_error)
    }
}

/// Directory laid out as `{root}/{model}/{version}/{kind}.sql`.
#[derive(Debug, Clone)]
pub struct DirectoryDdlSource {
    root: PathBuf,
}

impl DirectoryDdlSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, model: &str, version: &str, kind: DdlKind) -> PathBuf {
        self.root
            .join(model)
            .join(version)
            .join(format!("{}.sql", kind.as_str()))
    }
}

#[async_trait]
impl DdlSource for DirectoryDdlSource {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    async fn fetch(&self, model: &str, version: &str, kind: DdlKind) -> Result<String, SourceError> {
        let path = self.path_for(model, version, kind);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| SourceError::Io { path, source })
    }
}
