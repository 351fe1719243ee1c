//! Upstream fetchers.
//!
//! A [`Fetcher`] turns an upstream source string into package files plus an
//! opaque revision. Only [`CtlError::Network`] failures are retried by the
//! sync engine, so fetchers map transport problems and server-side errors to
//! it and everything else to a permanent error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::core::package::MANIFEST_FILE;
use crate::error::{CtlError, Result};
use crate::utils::fs::{hash_files, package_files};

/// Files and revision of one upstream package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPackage {
    pub revision: String,
    /// `(relative path, contents)` pairs.
    pub files: Vec<(PathBuf, Vec<u8>)>,
}

pub trait Fetcher: Send + Sync {
    fn fetch(&self, source: &str) -> Result<FetchedPackage>;
}

/// Mirrors a directory on the local filesystem (`file://` or a plain path).
///
/// The revision is the content hash of the directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirFetcher;

impl Fetcher for DirFetcher {
    fn fetch(&self, source: &str) -> Result<FetchedPackage> {
        let dir = Path::new(source.strip_prefix("file://").unwrap_or(source));
        if !dir.is_dir() {
            return Err(CtlError::not_found(format!(
                "upstream directory {} does not exist",
                dir.display()
            )));
        }
        let mut files = Vec::new();
        for relative in package_files(dir)? {
            let bytes = std::fs::read(dir.join(&relative))?;
            files.push((relative, bytes));
        }
        let revision = hash_files(&files);
        Ok(FetchedPackage { revision, files })
    }
}

/// Downloads a single `SKILL.md` over HTTP(S).
///
/// The revision is the response ETag when the server sends one, otherwise
/// the SHA-256 of the body.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout.max(Duration::from_secs(1)))
            .user_agent(concat!("skillctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| CtlError::Config(format!("http client: {err}")))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, source: &str) -> Result<FetchedPackage> {
        let network = |message: String| CtlError::Network {
            id: None,
            source_url: source.to_string(),
            message,
        };

        let response = self
            .client
            .get(source)
            .send()
            .map_err(|err| network(err.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(network(format!("HTTP {status}")));
        }
        if status.as_u16() == 404 || status.as_u16() == 410 {
            return Err(CtlError::not_found(format!("{source} returned HTTP {status}")));
        }
        if !status.is_success() {
            return Err(CtlError::Config(format!("{source} returned HTTP {status}")));
        }

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(normalize_etag)
            .filter(|tag| !tag.is_empty());
        let body = response
            .bytes()
            .map_err(|err| network(format!("read body: {err}")))?
            .to_vec();

        let revision = etag.unwrap_or_else(|| hex::encode(Sha256::digest(&body)));
        debug!(source, %revision, bytes = body.len(), "fetched manifest");
        Ok(FetchedPackage {
            revision,
            files: vec![(PathBuf::from(MANIFEST_FILE), body)],
        })
    }
}

fn normalize_etag(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("W/")
        .trim_matches('"')
        .to_string()
}

/// Picks a fetcher from the source scheme.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    dir: DirFetcher,
    http: HttpFetcher,
}

impl SourceFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            dir: DirFetcher,
            http: HttpFetcher::new(timeout)?,
        })
    }
}

impl Fetcher for SourceFetcher {
    fn fetch(&self, source: &str) -> Result<FetchedPackage> {
        match source.split_once("://") {
            Some(("http" | "https", _)) => self.http.fetch(source),
            Some(("file", _)) | None => self.dir.fetch(source),
            Some((scheme, _)) => Err(CtlError::Config(format!(
                "unsupported upstream scheme {scheme}:// in {source}"
            ))),
        }
    }
}
