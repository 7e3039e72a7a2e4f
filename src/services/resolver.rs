//! Serving resolver.
//!
//! Maps `(deployment name, requested path)` to stored bytes. Missing paths
//! fall back to the deployment's `index.html` so client-side routers work.
//! HTML gets a `<base>` tag pointing at the deployment's mount path so that
//! relative asset references resolve without the upload knowing its name.

use crate::{
    errors::{ServiceError, ServiceResult},
    services::{
        archive::is_safe_relative_path,
        content_type::{self, HTML_CONTENT_TYPE},
        deployment_registry::DeploymentRegistry,
        object_store::{ObjectStore, ObjectStoreError},
    },
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

const INDEX_DOCUMENT: &str = "index.html";

/// How long an edge may keep a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDirective {
    /// HTML: always revalidate.
    NoCache,
    /// Any other asset: bytes of a (hash, path) pair never change.
    Immutable,
}

impl CacheDirective {
    pub fn header_value(self) -> &'static str {
        match self {
            Self::NoCache => "no-cache, no-store, must-revalidate",
            Self::Immutable => "public, max-age=31536000, immutable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedAsset {
    pub body: Bytes,
    pub content_type: String,
    pub cache: CacheDirective,
    /// Path that was actually served, `index.html` after a fallback.
    pub served_path: String,
    pub fell_back: bool,
}

#[derive(Clone)]
pub struct ServingResolver {
    registry: DeploymentRegistry,
    store: Arc<dyn ObjectStore>,
    mount_prefix: String,
}

impl ServingResolver {
    pub fn new(
        registry: DeploymentRegistry,
        store: Arc<dyn ObjectStore>,
        mount_prefix: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            store,
            mount_prefix: mount_prefix.into(),
        }
    }

    pub fn mount_prefix(&self) -> &str {
        &self.mount_prefix
    }

    /// Public path under which `name` is served.
    pub fn access_url(&self, name: &str) -> String {
        format!("/{}/{}", self.mount_prefix, name)
    }

    pub async fn resolve(&self, name: &str, requested_path: &str) -> ServiceResult<ResolvedAsset> {
        if !name.ends_with(self.registry.name_suffix()) {
            return Err(ServiceError::InvalidInput(format!(
                "deployment name `{}` must end with `{}`",
                name,
                self.registry.name_suffix()
            )));
        }

        let deployment = self
            .registry
            .find_ready_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("deployment `{}`", name)))?;

        let path = requested_path.trim_matches('/');
        let path = if path.is_empty() { INDEX_DOCUMENT } else { path };
        if !is_safe_relative_path(path) {
            return Err(ServiceError::InvalidInput(format!("invalid path `{}`", path)));
        }

        let hash = &deployment.artifact_hash;
        let (body, served_path, fell_back) =
            match self.store.get(&format!("{}/{}", hash, path)).await {
                Ok(body) => (body, path.to_string(), false),
                Err(ObjectStoreError::NotFound(_)) if path != INDEX_DOCUMENT => {
                    debug!(name, path, "asset missing, falling back to index");
                    let body = self
                        .store
                        .get(&format!("{}/{}", hash, INDEX_DOCUMENT))
                        .await
                        .map_err(|err| match err {
                            ObjectStoreError::NotFound(_) => {
                                ServiceError::NotFound(format!("`{}` in `{}`", path, name))
                            }
                            other => other.into(),
                        })?;
                    (body, INDEX_DOCUMENT.to_string(), true)
                }
                Err(ObjectStoreError::NotFound(_)) => {
                    return Err(ServiceError::NotFound(format!("`{}` in `{}`", path, name)));
                }
                Err(err) => return Err(err.into()),
            };

        if content_type::is_markup(&served_path) {
            let html = String::from_utf8_lossy(&body);
            let rewritten = inject_base_href(&html, &format!("{}/", self.access_url(name)));
            return Ok(ResolvedAsset {
                body: Bytes::from(rewritten),
                content_type: format!("{}; charset=utf-8", HTML_CONTENT_TYPE),
                cache: CacheDirective::NoCache,
                served_path,
                fell_back,
            });
        }

        Ok(ResolvedAsset {
            body,
            content_type: content_type::content_type_for(&served_path).to_string(),
            cache: CacheDirective::Immutable,
            served_path,
            fell_back,
        })
    }
}

/// Remove every `<base ...>` tag, then insert `<base href="{href}">` right
/// after the opening `<head>` tag. Without a head tag the document is only
/// stripped.
pub fn inject_base_href(html: &str, href: &str) -> String {
    let stripped = strip_base_tags(html);
    match find_open_tag(&stripped, "head") {
        Some(end) => {
            let mut out = String::with_capacity(stripped.len() + href.len() + 20);
            out.push_str(&stripped[..end]);
            out.push_str("\n<base href=\"");
            out.push_str(href);
            out.push_str("\">");
            out.push_str(&stripped[end..]);
            out
        }
        None => stripped,
    }
}

fn strip_base_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = find_tag_start(rest, "base") {
        out.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(close) => rest = &rest[start + close + 1..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Byte offset just past the `>` of the first `<tag ...>` opening tag.
fn find_open_tag(html: &str, tag: &str) -> Option<usize> {
    let start = find_tag_start(html, tag)?;
    html[start..].find('>').map(|close| start + close + 1)
}

/// Byte offset of the first `<tag` that is followed by `>`, `/` or
/// whitespace, matched case-insensitively.
fn find_tag_start(html: &str, tag: &str) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    let needle = format!("<{}", tag);
    let mut from = 0;
    while let Some(pos) = lower[from..].find(&needle) {
        let start = from + pos;
        let after = lower.as_bytes().get(start + needle.len());
        match after {
            Some(b'>') | Some(b'/') => return Some(start),
            Some(b) if b.is_ascii_whitespace() => return Some(start),
            _ => from = start + needle.len(),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_after_head() {
        let html = "<!DOCTYPE html><html><HEAD lang=\"en\"><title>x</title></head></html>";
        let out = inject_base_href(html, "/deploy/blog.site/");
        assert_eq!(
            out,
            "<!DOCTYPE html><html><HEAD lang=\"en\">\n<base href=\"/deploy/blog.site/\"><title>x</title></head></html>"
        );
    }

    #[test]
    fn replaces_existing_base() {
        let html = "<html><head><BASE href=\"/old/\"><base target=_blank></head></html>";
        let out = inject_base_href(html, "/deploy/a.site/");
        assert_eq!(
            out,
            "<html><head>\n<base href=\"/deploy/a.site/\"></head></html>"
        );
    }

    #[test]
    fn header_element_is_not_head() {
        let html = "<body><header>x</header><basefont></body>";
        let out = inject_base_href(html, "/deploy/a.site/");
        assert_eq!(out, html);
    }

    #[test]
    fn without_head_only_strips() {
        let html = "<p>hi</p><base href=\"/x/\">";
        assert_eq!(inject_base_href(html, "/deploy/a.site/"), "<p>hi</p>");
    }

    #[test]
    fn cache_headers() {
        assert!(CacheDirective::NoCache.header_value().contains("must-revalidate"));
        assert!(CacheDirective::Immutable.header_value().contains("immutable"));
    }
}
