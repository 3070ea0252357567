//! The blob publisher — "publish bytes under a key" for audit artifacts.
//!
//! Object storage itself is an external collaborator; the pipeline only
//! needs this capability trait. The filesystem implementation mirrors the
//! key space under a local root, which is also what the tests use.

use std::future::Future;
use std::io;
use std::path::PathBuf;

/// Publish a blob under a key. Returns the key on success.
pub trait BlobPublisher: Send + Sync {
  fn publish(
    &self,
    key: &str,
    body: Vec<u8>,
    content_type: &str,
  ) -> impl Future<Output = io::Result<String>> + Send;
}

/// Publisher that writes each key as a file under a local root directory.
#[derive(Debug, Clone)]
pub struct DirPublisher {
  root: PathBuf,
}

impl DirPublisher {
  pub fn new(root: PathBuf) -> Self { Self { root } }
}

impl BlobPublisher for DirPublisher {
  async fn publish(
    &self,
    key: &str,
    body: Vec<u8>,
    _content_type: &str,
  ) -> io::Result<String> {
    let path = self.root.join(key);
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, body).await?;
    Ok(key.to_owned())
  }
}
