//! Representations a payload can be exported as.
//!
//! Targets pick a representation from the types announced in `XdndEnter` and then request the
//! bytes through the `XdndSelection` selection. Everything here is computed on demand from the
//! payload; no serialized copy is kept around between requests.

use std::borrow::Cow;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::payload::{DragPayload, UrlList};

/// Characters escaped in exported URIs. Non-ASCII bytes are always escaped.
const URI_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// A representation identified by its selection target name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MimeType {
    /// `text/uri-list`: one escaped URI per line, each line terminated by CRLF.
    UriList,
    /// `text/x-moz-url`: UTF-16, the escaped URL, a newline and the title.
    MozUrl,
    /// `text/x-moz-url-data`: UTF-16 URL.
    MozUrlData,
    /// `text/x-moz-url-desc`: UTF-16 title.
    MozUrlDesc,
    /// `_NETSCAPE_URL`: newline separated escaped URLs.
    NetscapeUrl,
    /// `text/unicode`: UTF-16 text.
    TextUnicode,
    /// `UTF8_STRING`.
    Utf8String,
    /// `STRING`: ISO-8859-1 text.
    Latin1String,
    /// `text/plain;charset=utf-8`.
    TextPlainUtf8,
    /// `text/plain`, in the locale encoding which is assumed to be UTF-8.
    TextPlain,
    /// Top-level windows of this application. Never offered to other processes.
    ToplevelWindows,
}

impl MimeType {
    pub fn as_str(self) -> &'static str {
        match self {
            MimeType::UriList => "text/uri-list",
            MimeType::MozUrl => "text/x-moz-url",
            MimeType::MozUrlData => "text/x-moz-url-data",
            MimeType::MozUrlDesc => "text/x-moz-url-desc",
            MimeType::NetscapeUrl => "_NETSCAPE_URL",
            MimeType::TextUnicode => "text/unicode",
            MimeType::Utf8String => "UTF8_STRING",
            MimeType::Latin1String => "STRING",
            MimeType::TextPlainUtf8 => "text/plain;charset=utf-8",
            MimeType::TextPlain => "text/plain",
            MimeType::ToplevelWindows => "application/x-xdnd-toplevel",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "text/uri-list" => MimeType::UriList,
            "text/x-moz-url" => MimeType::MozUrl,
            "text/x-moz-url-data" => MimeType::MozUrlData,
            "text/x-moz-url-desc" => MimeType::MozUrlDesc,
            "_NETSCAPE_URL" => MimeType::NetscapeUrl,
            "text/unicode" => MimeType::TextUnicode,
            "UTF8_STRING" => MimeType::Utf8String,
            "STRING" => MimeType::Latin1String,
            "text/plain;charset=utf-8" => MimeType::TextPlainUtf8,
            "text/plain" => MimeType::TextPlain,
            "application/x-xdnd-toplevel" => MimeType::ToplevelWindows,
            _ => return None,
        })
    }
}

/// Who is asking for data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Another process.
    Foreign,
    /// A window owned by this process.
    Local,
}

/// Answers what a payload can be exported as, and produces the bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct MimeNegotiator;

impl MimeNegotiator {
    /// The representations of `payload`, best first.
    pub fn exportable(&self, payload: &DragPayload, audience: Audience) -> Vec<MimeType> {
        match payload {
            DragPayload::Urls(list) => {
                let mut types = vec![
                    MimeType::UriList,
                    MimeType::MozUrl,
                    MimeType::MozUrlData,
                    MimeType::TextPlain,
                    MimeType::NetscapeUrl,
                ];
                if list.description().is_some() {
                    types.push(MimeType::MozUrlDesc);
                }
                types
            },
            DragPayload::Text(_) => vec![
                MimeType::TextUnicode,
                MimeType::Utf8String,
                MimeType::Latin1String,
                MimeType::TextPlainUtf8,
                MimeType::TextPlain,
            ],
            DragPayload::Windows(_) => match audience {
                Audience::Local => vec![MimeType::ToplevelWindows],
                Audience::Foreign => Vec::new(),
            },
        }
    }

    /// Serialize `payload` as `mime`. Unsupported combinations yield `None`.
    pub fn serialize(
        &self,
        payload: &DragPayload,
        mime: MimeType,
        audience: Audience,
    ) -> Option<Vec<u8>> {
        match (payload, mime) {
            (DragPayload::Urls(list), MimeType::UriList) => uri_lines(list, "\r\n", false),
            (DragPayload::Urls(list), MimeType::NetscapeUrl) => uri_lines(list, "\n", true),
            (DragPayload::Urls(list), MimeType::MozUrl) => {
                let url = escape(first_url(list)?);
                let text = format!("{url}\n{}", list.description().unwrap_or_default());
                Some(utf16(&text))
            },
            (DragPayload::Urls(list), MimeType::MozUrlData) => Some(utf16(first_url(list)?)),
            (DragPayload::Urls(list), MimeType::MozUrlDesc) => list.description().map(utf16),
            (
                DragPayload::Urls(list),
                MimeType::Utf8String | MimeType::TextPlainUtf8 | MimeType::TextPlain,
            ) => Some(first_url(list)?.as_bytes().to_vec()),
            (DragPayload::Urls(list), MimeType::Latin1String) => Some(latin1(first_url(list)?)),
            (DragPayload::Text(text), MimeType::TextUnicode) => non_empty(utf16(text)),
            (
                DragPayload::Text(text),
                MimeType::Utf8String | MimeType::TextPlainUtf8 | MimeType::TextPlain,
            ) => non_empty(text.as_bytes().to_vec()),
            (DragPayload::Text(text), MimeType::Latin1String) => non_empty(latin1(text)),
            (DragPayload::Windows(windows), MimeType::ToplevelWindows)
                if audience == Audience::Local =>
            {
                let ids: Vec<String> = windows.iter().map(|token| token.0.to_string()).collect();
                non_empty(ids.join("\n").into_bytes())
            },
            _ => None,
        }
    }

    /// Serialize by selection target name.
    pub fn serialize_named(
        &self,
        payload: &DragPayload,
        name: &str,
        audience: Audience,
    ) -> Option<Vec<u8>> {
        self.serialize(payload, MimeType::from_name(name)?, audience)
    }
}

/// Drop everything from the first line break on. A URL never spans lines.
fn single_line(url: &str) -> &str {
    match url.find(['\r', '\n']) {
        Some(end) => &url[..end],
        None => url,
    }
}

/// Rewrite local files as `file://localhost/...`, which some desktops insist on.
fn normalize(url: &str) -> Cow<'_, str> {
    let url = single_line(url);
    if let Some(path) = url.strip_prefix("file://") {
        if path.starts_with('/') {
            return Cow::Owned(format!("file://localhost{path}"));
        }
    } else if url.starts_with('/') {
        return Cow::Owned(format!("file://localhost{url}"));
    }
    Cow::Borrowed(url)
}

fn escape(url: &str) -> String {
    utf8_percent_encode(url, URI_UNSAFE).to_string()
}

fn first_url(list: &UrlList) -> Option<&str> {
    list.urls.iter().map(|url| single_line(url)).find(|url| !url.is_empty())
}

fn uri_lines(list: &UrlList, separator: &str, append_title: bool) -> Option<Vec<u8>> {
    let mut out = String::new();
    for url in &list.urls {
        let url = normalize(url);
        if url.is_empty() {
            continue;
        }
        out.push_str(&escape(&url));
        out.push_str(separator);
    }
    if out.is_empty() {
        return None;
    }
    if append_title && list.urls.len() == 1 {
        if let Some(title) = list.description() {
            out.push_str(title);
        }
    }
    Some(out.into_bytes())
}

fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_ne_bytes).collect()
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')).collect()
}

fn non_empty(bytes: Vec<u8>) -> Option<Vec<u8>> {
    (!bytes.is_empty()).then_some(bytes)
}
