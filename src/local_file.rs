use crate::error::FetchError;
use bytes::Bytes;

/// Reads a whole file. The path is trimmed of surrounding whitespace and
/// otherwise used as given; access policy belongs to the caller.
pub async fn read_local_file(path: &str) -> Result<Bytes, FetchError> {
    let contents = tokio::fs::read(path.trim())
        .await
        .map_err(FetchError::Filesystem)?;
    Ok(Bytes::from(contents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_trimmed_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, b"[1,2,3]").unwrap();

        let padded = format!("  {}\n", path.display());
        let bytes = read_local_file(&padded).await.unwrap();
        assert_eq!(&bytes[..], b"[1,2,3]");
    }

    #[tokio::test]
    async fn missing_file_is_filesystem_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        let err = read_local_file(path.to_str().unwrap()).await.unwrap_err();
        match err {
            FetchError::Filesystem(io) => assert_eq!(io.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn directory_is_filesystem_error() {
        let dir = tempdir().unwrap();
        let err = read_local_file(dir.path().to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, FetchError::Filesystem(_)));
    }
}
