//! Region data source URI resolution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SourceUri {
    /// HTTPS: https://data.example.com/regions/US/PA/topo.json
    Https { url: String },
    /// S3: s3://bucket/regions/US/PA/topo.json
    S3 { bucket: String, key: String },
    /// Local file: file:///srv/regions/PA/topo.json or ./regions/PA/topo.json
    File { path: String },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unsupported source scheme: {0}")]
    UnsupportedScheme(String),
    #[error("invalid source URI: {0}")]
    InvalidUri(String),
}

impl SourceUri {
    pub fn parse(uri: &str) -> Result<Self, SourceError> {
        if uri.starts_with("https://") || uri.starts_with("http://") {
            Ok(SourceUri::Https {
                url: uri.to_string(),
            })
        } else if let Some(rest) = uri.strip_prefix("s3://") {
            let (bucket, key) = rest
                .split_once('/')
                .ok_or_else(|| SourceError::InvalidUri(uri.to_string()))?;
            if bucket.is_empty() {
                return Err(SourceError::InvalidUri(uri.to_string()));
            }
            Ok(SourceUri::S3 {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        } else if let Some(path) = uri.strip_prefix("file://") {
            Ok(SourceUri::File {
                path: path.to_string(),
            })
        } else if uri.starts_with("./") || uri.starts_with('/') {
            Ok(SourceUri::File {
                path: uri.to_string(),
            })
        } else {
            Err(SourceError::UnsupportedScheme(uri.to_string()))
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            SourceUri::Https { .. } => "https",
            SourceUri::S3 { .. } => "s3",
            SourceUri::File { .. } => "file",
        }
    }

    /// Public HTTPS location for remote sources.
    ///
    /// S3 objects are addressed virtual-hosted style, which works for
    /// publicly readable buckets without request signing.
    pub fn http_url(&self) -> Option<String> {
        match self {
            SourceUri::Https { url } => Some(url.clone()),
            SourceUri::S3 { bucket, key } => Some(format!("https://{bucket}.s3.amazonaws.com/{key}")),
            SourceUri::File { .. } => None,
        }
    }
}
