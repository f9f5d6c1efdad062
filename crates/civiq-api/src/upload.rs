//! Photo intake for issue reports
//!
//! An uploaded photo is validated and persisted before the issue record
//! is created, so the record always carries the final locator.

use chrono::Utc;
use civiq_core::{Error, MediaConfig, Result};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// URL prefix stored photos are served under
pub const PUBLIC_PREFIX: &str = "/uploads";

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// Persists uploaded photos and yields their public locator
pub trait MediaProcessor: Send + Sync {
    /// Validate and persist one photo, returning its public URL path.
    fn store(
        &self,
        bytes: &[u8],
        original_name: &str,
        content_type: Option<&str>,
    ) -> Result<String>;
}

/// Media processor writing into a local directory
pub struct DiskMedia {
    upload_dir: PathBuf,
    max_bytes: u64,
}

impl DiskMedia {
    pub fn new(config: &MediaConfig) -> Result<Self> {
        fs::create_dir_all(&config.upload_dir)?;
        Ok(Self {
            upload_dir: config.upload_dir.clone(),
            max_bytes: config.max_bytes,
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }
}

impl MediaProcessor for DiskMedia {
    fn store(
        &self,
        bytes: &[u8],
        original_name: &str,
        content_type: Option<&str>,
    ) -> Result<String> {
        if bytes.is_empty() {
            return Err(Error::Validation("uploaded image is empty".to_string()));
        }
        if bytes.len() as u64 > self.max_bytes {
            return Err(Error::Validation(format!(
                "image exceeds the limit of {} bytes",
                self.max_bytes
            )));
        }

        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| {
                Error::Validation("only jpg, jpeg, png and gif images are accepted".to_string())
            })?;

        if let Some(content_type) = content_type
            && !content_type.starts_with("image/")
        {
            return Err(Error::Validation(format!(
                "unexpected content type: {content_type}"
            )));
        }

        let name = format!("{}-{}.{ext}", Uuid::new_v4(), Utc::now().timestamp_millis());
        fs::write(self.upload_dir.join(&name), bytes)?;
        Ok(format!("{PUBLIC_PREFIX}/{name}"))
    }
}
