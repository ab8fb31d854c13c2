use crate::{BiTimestamp, Result, Tickstore, TickstoreError};
use chrono::{DateTime, Utc};
use splay::Batch;
use std::path::PathBuf;

const BACKEND: &str = "remote blob tickstore";

/// Placeholder for a tickstore kept in a remote blob container.
///
/// Every capability reports [`TickstoreError::Unsupported`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBlobTickstore {
    container: String,
}

impl RemoteBlobTickstore {
    pub fn new<S: Into<String>>(container: S) -> Self {
        Self {
            container: container.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }
}

fn unsupported<T>(operation: &'static str) -> Result<T> {
    Err(TickstoreError::Unsupported {
        backend: BACKEND,
        operation,
    })
}

impl Tickstore for RemoteBlobTickstore {
    fn select(
        &self,
        _symbol: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _as_of: DateTime<Utc>,
    ) -> Result<Batch> {
        unsupported("select")
    }

    fn insert(&mut self, _symbol: &str, _ts: BiTimestamp, _batch: &Batch) -> Result<PathBuf> {
        unsupported("insert")
    }

    fn delete(&mut self, _symbol: &str, _ts: BiTimestamp) -> Result<bool> {
        unsupported("delete")
    }

    fn flush(&mut self) -> Result<()> {
        unsupported("flush")
    }

    fn close(&mut self) -> Result<()> {
        unsupported("close")
    }

    fn destroy(&mut self) -> Result<()> {
        unsupported("destroy")
    }

    fn is_open(&self) -> bool {
        false
    }
}
