//! Media-type checks and HTML charset resolution.

use encoding_rs::{Encoding, UTF_8};
use scraper::{ElementRef, Html};

use super::error::FetchErrorKind;

/// A parsed `Content-Type` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// Lowercased `type/subtype`
    pub essence: String,
    /// Parameters in declaration order, names lowercased
    pub params: Vec<(String, String)>,
}

impl MediaType {
    pub fn parse(value: &str) -> Result<Self, String> {
        let mut parts = value.split(';');
        let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        if essence.is_empty() {
            return Err("no media type".to_string());
        }

        let (kind, subtype) = essence
            .split_once('/')
            .ok_or_else(|| format!("expected slash after first token in {essence:?}"))?;
        if !is_token(kind) || !is_token(subtype) {
            return Err(format!("invalid media type {essence:?}"));
        }

        let mut params = Vec::new();
        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, raw_value) = part
                .split_once('=')
                .ok_or_else(|| format!("invalid media parameter {part:?}"))?;
            let name = name.trim().to_ascii_lowercase();
            if !is_token(&name) {
                return Err(format!("invalid media parameter {part:?}"));
            }
            let raw_value = raw_value.trim();
            let value = match raw_value.strip_prefix('"') {
                Some(quoted) => quoted
                    .strip_suffix('"')
                    .ok_or_else(|| format!("unterminated quoted value in {part:?}"))?,
                None => raw_value,
            };
            params.push((name, value.to_string()));
        }

        Ok(Self { essence, params })
    }

    /// First value of parameter `name` (case-insensitive).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c))
}

/// Validates a response's `Content-Type` against an optional allow-list and
/// returns its essence.
pub fn check_media_type(
    content_type: Option<&str>,
    allowed: Option<&[&str]>,
) -> Result<String, FetchErrorKind> {
    let media_type = MediaType::parse(content_type.unwrap_or_default()).map_err(|e| {
        FetchErrorKind::ContentType(format!("The document has an invalid Content-Type: {e}"))
    })?;

    if let Some(allowed) = allowed {
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&media_type.essence)) {
            return Err(FetchErrorKind::ContentType(format!(
                "The document has an invalid media type ({}).",
                media_type.essence
            )));
        }
    }

    Ok(media_type.essence)
}

/// Finds the charset an HTML document declares for itself.
///
/// Only direct `<meta>` children of `<html><head>` are inspected. The last
/// `charset` attribute wins. An `http-equiv="Content-Type"` hint applies only
/// when no `charset` attribute is present, and the first such hint wins.
pub fn html_charset(doc: &Html, origin: &str) -> Option<String> {
    let head = child_element(doc.root_element(), "head")?;

    let mut explicit: Option<String> = None;
    let mut http_equiv: Option<String> = None;

    for meta in head
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "meta")
    {
        let attr = |name: &str| {
            meta.value()
                .attrs()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.to_lowercase())
        };

        if attr("http-equiv").as_deref() == Some("content-type") {
            let content = attr("content").unwrap_or_default();
            match MediaType::parse(&content) {
                Ok(media_type) => {
                    if http_equiv.is_none() {
                        http_equiv = media_type
                            .param("charset")
                            .filter(|c| !c.is_empty())
                            .map(str::to_string);
                    }
                }
                Err(e) => {
                    tracing::error!(
                        source = %origin,
                        content = %content,
                        error = %e,
                        "Invalid content type in <meta http-equiv=\"Content-Type\"> tag"
                    );
                }
            }
        }

        if let Some(charset) = attr("charset").filter(|c| !c.is_empty()) {
            explicit = Some(charset);
        }
    }

    explicit.or(http_equiv)
}

fn child_element<'a>(parent: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == name)
}

/// Parses an HTML body, re-decoding it if the document declares a
/// non-UTF-8 charset.
pub fn parse_html(origin: &str, bytes: &[u8]) -> Result<Html, FetchErrorKind> {
    let doc = Html::parse_document(&String::from_utf8_lossy(bytes));

    let Some(label) = html_charset(&doc, origin) else {
        return Ok(doc);
    };

    let encoding = Encoding::for_label(label.as_bytes()).ok_or_else(|| {
        FetchErrorKind::Charset(format!(
            "The document has an unknown charset encoding: {label}."
        ))
    })?;
    if encoding == UTF_8 {
        return Ok(doc);
    }

    let decoded = encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| {
            FetchErrorKind::Charset(format!(
                "Failed to decode the document using {} charset",
                encoding.name()
            ))
        })?;

    tracing::debug!(source = %origin, charset = encoding.name(), "Re-decoded HTML document");
    Ok(Html::parse_document(&decoded))
}
