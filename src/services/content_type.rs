//! Extension allow-list and MIME resolution for uploaded and served assets.

/// Broad category of an allowed asset type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetCategory {
    Markup,
    Style,
    Script,
    Image,
    Font,
    Data,
    Media,
    Document,
    WebManifest,
}

pub const HTML_CONTENT_TYPE: &str = "text/html";
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// (extension, category, content type) for every extension an archive may carry.
const ALLOWED: &[(&str, AssetCategory, &str)] = &[
    ("html", AssetCategory::Markup, HTML_CONTENT_TYPE),
    ("htm", AssetCategory::Markup, HTML_CONTENT_TYPE),
    ("css", AssetCategory::Style, "text/css"),
    ("js", AssetCategory::Script, "application/javascript"),
    ("mjs", AssetCategory::Script, "application/javascript"),
    ("cjs", AssetCategory::Script, "application/javascript"),
    ("png", AssetCategory::Image, "image/png"),
    ("jpg", AssetCategory::Image, "image/jpeg"),
    ("jpeg", AssetCategory::Image, "image/jpeg"),
    ("gif", AssetCategory::Image, "image/gif"),
    ("svg", AssetCategory::Image, "image/svg+xml"),
    ("webp", AssetCategory::Image, "image/webp"),
    ("ico", AssetCategory::Image, "image/x-icon"),
    ("bmp", AssetCategory::Image, "image/bmp"),
    ("tiff", AssetCategory::Image, "image/tiff"),
    ("woff", AssetCategory::Font, "font/woff"),
    ("woff2", AssetCategory::Font, "font/woff2"),
    ("ttf", AssetCategory::Font, "font/ttf"),
    ("otf", AssetCategory::Font, "font/otf"),
    ("eot", AssetCategory::Font, "application/vnd.ms-fontobject"),
    ("json", AssetCategory::Data, "application/json"),
    ("xml", AssetCategory::Data, "application/xml"),
    ("csv", AssetCategory::Data, "text/csv"),
    ("txt", AssetCategory::Data, "text/plain"),
    ("md", AssetCategory::Data, "text/markdown"),
    ("map", AssetCategory::Data, "application/json"),
    ("mp4", AssetCategory::Media, "video/mp4"),
    ("webm", AssetCategory::Media, "video/webm"),
    ("mp3", AssetCategory::Media, "audio/mpeg"),
    ("wav", AssetCategory::Media, "audio/wav"),
    ("ogg", AssetCategory::Media, "audio/ogg"),
    ("m4a", AssetCategory::Media, "audio/mp4"),
    ("pdf", AssetCategory::Document, "application/pdf"),
    ("webmanifest", AssetCategory::WebManifest, "application/manifest+json"),
];

/// Lower-cased extension of the last path segment, if it has one.
pub fn extension(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Category and content type for `path`, or `None` when its extension is
/// not on the allow-list.
pub fn classify(path: &str) -> Option<(AssetCategory, &'static str)> {
    let ext = extension(path)?;
    ALLOWED
        .iter()
        .find(|(candidate, _, _)| *candidate == ext)
        .map(|(_, category, content_type)| (*category, *content_type))
}

/// Content type used when serving `path`.
pub fn content_type_for(path: &str) -> &'static str {
    classify(path)
        .map(|(_, content_type)| content_type)
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

pub fn is_markup(path: &str) -> bool {
    matches!(classify(path), Some((AssetCategory::Markup, _)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_extensions_case_insensitively() {
        assert_eq!(
            classify("assets/App.JS"),
            Some((AssetCategory::Script, "application/javascript"))
        );
        assert_eq!(
            classify("site.webmanifest"),
            Some((AssetCategory::WebManifest, "application/manifest+json"))
        );
        assert!(is_markup("docs/INDEX.HTM"));
    }

    #[test]
    fn rejects_unknown_or_missing_extensions() {
        assert_eq!(classify("server.php"), None);
        assert_eq!(classify("README"), None);
        assert_eq!(classify("dir.v2/LICENSE"), None);
        assert_eq!(content_type_for("binary.exe"), FALLBACK_CONTENT_TYPE);
    }
}
