//! Photo versions: the original import and any derived edits.

pub type VersionId = u32;

/// Version id reserved for the imported original.
pub const ORIGINAL_VERSION_ID: VersionId = 1;

/// One file belonging to a photo. Owned exclusively by its `Photo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoVersion {
    pub version_id: VersionId,
    pub name: String,
    /// Directory part of the uri, always ending in `/`.
    pub base_uri: String,
    pub filename: String,
    pub import_md5: Option<String>,
    pub is_protected: bool,
}

impl PhotoVersion {
    pub fn new(
        version_id: VersionId,
        base_uri: &str,
        filename: &str,
        import_md5: Option<String>,
        name: &str,
        is_protected: bool,
    ) -> Self {
        Self {
            version_id,
            name: name.to_string(),
            base_uri: normalize_base_uri(base_uri),
            filename: filename.to_string(),
            import_md5: import_md5.filter(|h| !h.is_empty()),
            is_protected,
        }
    }

    pub fn uri(&self) -> String {
        format!("{}{}", self.base_uri, self.filename)
    }
}

/// Split a full uri into its directory and file parts.
pub fn split_uri(uri: &str) -> (String, String) {
    match uri.rfind('/') {
        Some(pos) => (uri[..=pos].to_string(), uri[pos + 1..].to_string()),
        None => (String::new(), uri.to_string()),
    }
}

fn normalize_base_uri(base_uri: &str) -> String {
    if base_uri.is_empty() || base_uri.ends_with('/') {
        base_uri.to_string()
    } else {
        format!("{}/", base_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_uri() {
        assert_eq!(
            split_uri("file:///photos/2024/IMG_1.jpg"),
            ("file:///photos/2024/".to_string(), "IMG_1.jpg".to_string())
        );
        assert_eq!(split_uri("IMG_1.jpg"), (String::new(), "IMG_1.jpg".to_string()));
    }

    #[test]
    fn test_uri_joins_base_and_filename() {
        let v = PhotoVersion::new(1, "file:///photos", "a.jpg", Some(String::new()), "Original", true);
        assert_eq!(v.base_uri, "file:///photos/");
        assert_eq!(v.uri(), "file:///photos/a.jpg");
        assert_eq!(v.import_md5, None);
    }
}
