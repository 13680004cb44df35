use anyhow::{Context, Result};
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Local filesystem path for a `file://` uri, percent-decoded. Bare paths
/// pass through undecoded.
pub fn uri_to_path(uri: &str) -> Result<PathBuf> {
    let Some(encoded) = uri.strip_prefix("file://") else {
        return Ok(PathBuf::from(uri));
    };
    let decoded = urlencoding::decode(encoded).with_context(|| format!("decoding {}", uri))?;
    Ok(PathBuf::from(decoded.into_owned()))
}

/// Hex MD5 of a file's contents.
pub fn md5_file(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Md5::new();

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_to_path() {
        assert_eq!(uri_to_path("file:///photos/a.jpg").unwrap(), PathBuf::from("/photos/a.jpg"));
        assert_eq!(uri_to_path("/photos/a.jpg").unwrap(), PathBuf::from("/photos/a.jpg"));
    }

    #[test]
    fn test_uri_to_path_decodes_escapes() {
        assert_eq!(
            uri_to_path("file:///photos/my%20pic.jpg").unwrap(),
            PathBuf::from("/photos/my pic.jpg")
        );
        assert_eq!(
            uri_to_path("file:///photos/caf%C3%A9/100%25.jpg").unwrap(),
            PathBuf::from("/photos/café/100%.jpg")
        );
        assert!(uri_to_path("file:///photos/%FF.jpg").is_err());
    }

    #[test]
    fn test_md5_of_escaped_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my pic.jpg");
        std::fs::write(&path, b"abc").unwrap();
        let uri = format!("file://{}", path.display()).replace(' ', "%20");
        assert_eq!(md5_file(&uri_to_path(&uri).unwrap()).unwrap(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_md5_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(md5_file(&path).unwrap(), "900150983cd24fb0d6963f7d28e17f72");
    }
}
