/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// A request body that can be read again for every retry and redirect.
#[async_trait]
pub trait RequestBody: Send + Sync {
    async fn open(&self) -> io::Result<BodyReader>;

    /// Exact size if known in advance.
    fn size(&self) -> Option<u64> {
        None
    }
}

#[async_trait]
impl RequestBody for Bytes {
    async fn open(&self) -> io::Result<BodyReader> {
        Ok(Box::new(io::Cursor::new(self.clone())))
    }

    fn size(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

/// Upload the content of a local file.
pub struct FileBody {
    path: PathBuf,
}

impl FileBody {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileBody { path: path.into() }
    }
}

#[async_trait]
impl RequestBody for FileBody {
    async fn open(&self) -> io::Result<BodyReader> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }
}
