//! Access-code resolution backed by the filesystem.
//!
//! Registered destination addresses are stored one-per-file under
//! `<root>/access-codes/<code>.txt`, written at registration time by
//! the (out-of-scope) issuance flow.

use std::path::PathBuf;

use async_trait::async_trait;

use onramp_domain::DestinationAddress;

use crate::error::AccessCodeError;
use crate::ports::AccessCodeStore;

/// File-backed access-code store.
pub struct FsAccessCodes {
    root: PathBuf,
}

impl FsAccessCodes {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, code: &str) -> PathBuf {
        self.root.join("access-codes").join(format!("{}.txt", code))
    }
}

#[async_trait]
impl AccessCodeStore for FsAccessCodes {
    async fn resolve(&self, code: &str) -> Result<Option<DestinationAddress>, AccessCodeError> {
        // Codes are short alphanumeric tokens; anything else cannot be a
        // registered code and must not touch the filesystem.
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(None);
        }

        let path = self.path_for(code);

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let address = DestinationAddress::parse(contents.trim()).map_err(|e| {
                    AccessCodeError(format!("corrupt registration {}: {}", path.display(), e))
                })?;
                Ok(Some(address))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AccessCodeError(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
