use bytes::Bytes;

/// A single file extracted from an archive, ready to be written under
/// `<artifact hash>/<path>`.
#[derive(Clone, Debug)]
pub struct StoredFile {
    /// Normalized relative path: forward slashes, no traversal segments and
    /// no wrapper-directory prefix.
    pub path: String,
    pub data: Bytes,
    pub content_type: &'static str,
}
