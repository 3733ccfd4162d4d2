// FICHIER : backend/src/utils/fs.rs

use crate::raise_error;
use crate::utils::error::{AppError, Result};
use crate::utils::json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;

// --- RE-EXPORTS (Isolation de la couche OS) ---
pub use std::path::{Path, PathBuf};

pub async fn exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}

pub async fn ensure_dir(path: &Path) -> Result<()> {
    if !exists(path).await {
        if let Err(e) = fs::create_dir_all(path).await {
            raise_error!(
                AppError::Io(e),
                context = json!({ "path": path.to_string_lossy(), "action": "ensure_dir" })
            );
        }
    }
    Ok(())
}

pub async fn read_to_string(path: &Path) -> Result<String> {
    match fs::read_to_string(path).await {
        Ok(s) => Ok(s),
        Err(e) => raise_error!(
            AppError::Io(e),
            context = json!({ "path": path.to_string_lossy(), "action": "read_to_string" })
        ),
    }
}

#[instrument(skip(path), fields(path = ?path))]
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_to_string(path).await?;
    json::parse(&content)
}

// --- ÉCRITURE ATOMIQUE ---

/// Écriture atomique (tmp -> sync -> rename) via un fichier temporaire explicite.
#[instrument(skip(content, path, tmp_path), fields(path = ?path))]
pub async fn write_atomic_via(path: &Path, tmp_path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    let mut file = match fs::File::create(tmp_path).await {
        Ok(f) => f,
        Err(e) => raise_error!(
            AppError::Io(e),
            context = json!({ "tmp_path": tmp_path.to_string_lossy() })
        ),
    };

    if let Err(e) = file.write_all(content).await {
        raise_error!(
            AppError::Io(e),
            context = json!({ "tmp_path": tmp_path.to_string_lossy() })
        );
    }
    // On force l'écriture physique avant le renommage
    if let Err(e) = file.sync_all().await {
        raise_error!(
            AppError::Io(e),
            context = json!({ "tmp_path": tmp_path.to_string_lossy() })
        );
    }
    drop(file);

    if let Err(e) = fs::rename(tmp_path, path).await {
        let _ = fs::remove_file(tmp_path).await;
        raise_error!(
            AppError::Io(e),
            context = json!({
                "tmp": tmp_path.to_string_lossy(),
                "final": path.to_string_lossy()
            })
        );
    }
    Ok(())
}

pub async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    write_atomic_via(path, &tmp_path, content).await
}

pub async fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let content = json::stringify_pretty(data)?;
    write_atomic(path, content.as_bytes()).await
}

/// Ajoute des lignes en fin de fichier (création si absent) puis synchronise.
pub async fn append_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut file = match fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
    {
        Ok(f) => f,
        Err(e) => raise_error!(
            AppError::Io(e),
            context = json!({ "path": path.to_string_lossy(), "action": "append_open" })
        ),
    };

    let mut buffer = String::new();
    for line in lines {
        buffer.push_str(line);
        buffer.push('\n');
    }

    if let Err(e) = file.write_all(buffer.as_bytes()).await {
        raise_error!(
            AppError::Io(e),
            context = json!({ "path": path.to_string_lossy(), "action": "append_write" })
        );
    }
    if let Err(e) = file.sync_data().await {
        raise_error!(
            AppError::Io(e),
            context = json!({ "path": path.to_string_lossy(), "action": "append_sync" })
        );
    }
    Ok(())
}

// =========================================================================
// TESTS UNITAIRES
// =========================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct TestData {
        id: u32,
        name: String,
    }

    #[tokio::test]
    async fn test_atomic_write_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("nested/atomic.json");
        let data = TestData {
            id: 1,
            name: "Websemble".into(),
        };

        write_json_atomic(&file_path, &data).await.unwrap();
        let restored: TestData = read_json(&file_path).await.unwrap();
        assert_eq!(data, restored);
        assert!(!exists(&file_path.with_extension("tmp")).await);
    }

    #[tokio::test]
    async fn test_append_lines() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("log.db");

        append_lines(&file_path, &["{\"a\":1}".to_string()]).await.unwrap();
        append_lines(&file_path, &["{\"a\":2}".to_string(), "{\"a\":3}".to_string()])
            .await
            .unwrap();

        let content = read_to_string(&file_path).await.unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let res: Result<TestData> = read_json(&dir.path().join("absent.json")).await;
        assert!(matches!(res, Err(AppError::Io(_))));
    }
}
