//! Byte sources for om files on different storage backends

use crate::error::{OmError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

/// Storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Local file system
    FileSystem,
    /// Bytes already in memory
    Memory,
    /// HTTP(S) server honouring `Range` requests
    Http,
}

impl StorageBackend {
    /// Parse storage backend from URL scheme
    pub fn from_url(url: &str) -> Result<Self> {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end];
            match scheme {
                "file" => Ok(StorageBackend::FileSystem),
                "http" | "https" => Ok(StorageBackend::Http),
                _ => Err(OmError::InvalidUrl(format!("Unknown scheme: {}", scheme))),
            }
        } else {
            // Assume file system if no scheme
            Ok(StorageBackend::FileSystem)
        }
    }
}

/// Random access to the bytes of one om file
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Read exactly `count` bytes starting at `offset`
    async fn fetch(&self, offset: u64, count: u64) -> Result<Bytes>;

    /// Total size in bytes
    async fn len(&self) -> Result<u64>;

    /// Get the backend type
    fn backend(&self) -> StorageBackend;
}

fn check_range(offset: u64, count: u64, len: u64) -> Result<()> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(OmError::OutOfBounds(format!(
            "Read of {} bytes at {} exceeds source size {}",
            count, offset, len
        ))),
    }
}

/// Om file on the local file system
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).await?;
        let len = file.metadata().await?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn fetch(&self, offset: u64, count: u64) -> Result<Bytes> {
        check_range(offset, count, self.len)?;
        let mut buffer = vec![0u8; count as usize];
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset)).await?;
        file.read_exact(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.len)
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::FileSystem
    }
}

/// Om file held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    async fn fetch(&self, offset: u64, count: u64) -> Result<Bytes> {
        check_range(offset, count, self.data.len() as u64)?;
        Ok(self.data.slice(offset as usize..(offset + count) as usize))
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

/// Om file behind an HTTP server, read with `Range` requests
#[cfg(feature = "http-client")]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

#[cfg(feature = "http-client")]
impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[cfg(feature = "http-client")]
#[async_trait]
impl ByteSource for HttpSource {
    async fn fetch(&self, offset: u64, count: u64) -> Result<Bytes> {
        if count == 0 {
            return Ok(Bytes::new());
        }
        let range = format!("bytes={}-{}", offset, offset + count - 1);
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::RANGE, range)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        if (body.len() as u64) < count {
            return Err(OmError::Network(format!(
                "Range request for {} bytes at {} returned {}",
                count,
                offset,
                body.len()
            )));
        }
        Ok(body.slice(..count as usize))
    }

    async fn len(&self) -> Result<u64> {
        let response = self
            .client
            .head(&self.url)
            .send()
            .await?
            .error_for_status()?;
        response
            .content_length()
            .ok_or_else(|| OmError::Network(format!("No content length for {}", self.url)))
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Http
    }
}

/// Parse URL and open the matching byte source
pub async fn open_source(url: &str) -> Result<Box<dyn ByteSource>> {
    match StorageBackend::from_url(url)? {
        StorageBackend::FileSystem => {
            let path = url.strip_prefix("file://").unwrap_or(url);
            Ok(Box::new(FileSource::open(path).await?))
        }
        #[cfg(feature = "http-client")]
        StorageBackend::Http => Ok(Box::new(HttpSource::new(url))),
        backend => Err(OmError::StorageBackend(format!(
            "Backend {:?} cannot be opened from a URL in this build",
            backend
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_file_source() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Hello, om file!").unwrap();
        file.flush().unwrap();

        let source = FileSource::open(file.path()).await.unwrap();
        assert_eq!(source.len().await.unwrap(), 15);
        assert_eq!(&source.fetch(7, 2).await.unwrap()[..], b"om");
        assert_eq!(&source.fetch(0, 5).await.unwrap()[..], b"Hello");
        assert!(matches!(
            source.fetch(10, 6).await,
            Err(OmError::OutOfBounds(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemorySource::new(vec![1u8, 2, 3, 4, 5]);
        assert_eq!(&source.fetch(1, 3).await.unwrap()[..], &[2, 3, 4]);
        assert_eq!(source.fetch(5, 0).await.unwrap().len(), 0);
        assert!(source.fetch(4, 2).await.is_err());
        assert!(source.fetch(u64::MAX, 2).await.is_err());
        assert_eq!(source.backend(), StorageBackend::Memory);
    }

    #[tokio::test]
    async fn test_open_source_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 32]).unwrap();
        file.flush().unwrap();

        let url = format!("file://{}", file.path().display());
        let source = open_source(&url).await.unwrap();
        assert_eq!(source.backend(), StorageBackend::FileSystem);
        assert_eq!(source.len().await.unwrap(), 32);

        assert!(open_source("/definitely/not/here.om").await.is_err());
    }

    #[test]
    fn test_backend_from_url() {
        assert_eq!(
            StorageBackend::from_url("file:///data/temperature.om").unwrap(),
            StorageBackend::FileSystem
        );
        assert_eq!(
            StorageBackend::from_url("https://example.com/data.om").unwrap(),
            StorageBackend::Http
        );
        assert_eq!(
            StorageBackend::from_url("data/temperature.om").unwrap(),
            StorageBackend::FileSystem
        );
        assert!(StorageBackend::from_url("s3://bucket/data.om").is_err());
    }
}
