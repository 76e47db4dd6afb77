use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Errors reading or writing the session file
#[derive(Debug, thiserror::Error)]
pub enum SessionFileError {
    #[error("Session file I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Session file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// Durable session config: `{"cookies": "<raw cookie text>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFile {
    #[serde(default)]
    pub cookies: String,
}

impl SessionFile {
    pub fn new(cookies: impl Into<String>) -> Self {
        Self {
            cookies: cookies.into(),
        }
    }

    /// Load the file; a missing file is `Ok(None)`
    pub async fn load(path: &Path) -> Result<Option<Self>, SessionFileError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Overwrite the file with this config
    pub async fn save(&self, path: &Path) -> Result<(), SessionFileError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = SessionFile::load(&dir.path().join("config.json")).await;
        assert!(matches!(loaded, Ok(None)));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        SessionFile::new("a=1; b=2").save(&path).await.unwrap();
        let loaded = SessionFile::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded.cookies, "a=1; b=2");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"{"cookies":"a=1; b=2"}"#);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            SessionFile::load(&path).await,
            Err(SessionFileError::Format(_))
        ));
    }
}
