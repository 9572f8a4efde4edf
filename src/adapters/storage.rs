use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Storage for LocalStorage {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    fn describe(&self, path: &str) -> String {
        self.base_path.join(path).display().to_string()
    }
}

/// Storage for runs whose results are not kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStorage;

impl Storage for NullStorage {
    async fn write_file(&self, path: &str, _data: &[u8]) -> Result<()> {
        tracing::debug!("Discarding result {}", path);
        Ok(())
    }

    fn describe(&self, _path: &str) -> String {
        "<discarded>".to_string()
    }
}
