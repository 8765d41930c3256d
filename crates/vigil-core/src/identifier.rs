use std::fmt;
use std::hash::{Hash, Hasher};

use url::Url;

/// Whether local file paths on the host are compared case-sensitively.
///
/// This is a per-session setting (a remote debug target may live on a
/// different OS than the adapter), so it is threaded explicitly into
/// [`ResourceIdentifier::parse`] rather than read from a global.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSensitivity {
    CaseSensitive,
    CaseInsensitive,
}

impl PathSensitivity {
    /// Sensible default for the OS the adapter itself runs on.
    pub fn host_default() -> Self {
        if cfg!(any(windows, target_os = "macos")) {
            PathSensitivity::CaseInsensitive
        } else {
            PathSensitivity::CaseSensitive
        }
    }
}

/// Flavor of a local file path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// `C:\...` or `C:/...`
    Windows,
    /// Leading `/`.
    Unix,
    /// Came from a `file://` URL whose path shape we could not classify.
    Unrecognized,
}

/// Classification of a [`ResourceIdentifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    /// A path on the local disk (including paths unwrapped from `file://` URLs).
    LocalPath(PathKind),
    /// A non-`file://` URL (http, webpack, eval, ...).
    Url,
    /// Anything else: an opaque script name reported by the runtime.
    Opaque,
}

/// An identifier for a debuggable source: a local path, a URL, or an opaque
/// name.
///
/// Two identifiers are equivalent iff their canonicalized forms match.
/// Canonicalization applies separator normalization and (depending on
/// [`PathSensitivity`]) case folding, but only to local paths; URLs and
/// opaque names are compared verbatim. Identifiers are immutable once parsed.
#[derive(Debug, Clone)]
pub struct ResourceIdentifier {
    kind: IdentifierKind,
    raw: String,
    canonical: String,
}

impl ResourceIdentifier {
    /// Classify and canonicalize `text`. Never fails: any string is at least
    /// an opaque name.
    pub fn parse(text: &str, sensitivity: PathSensitivity) -> Self {
        let (kind, raw) = classify(text);
        let canonical = canonicalize(kind, &raw, sensitivity);
        Self { kind, raw, canonical }
    }

    pub fn kind(&self) -> IdentifierKind {
        self.kind
    }

    /// The textual form after `file://` unwrapping but before canonicalization.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The canonical form used for equivalence and map keys.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn is_local_path(&self) -> bool {
        matches!(self.kind, IdentifierKind::LocalPath(_))
    }

    /// Last path/URL segment, e.g. `app.js` for `/srv/web/app.js`.
    pub fn base_name(&self) -> &str {
        let trimmed = self.raw.trim_end_matches(['/', '\\']);
        trimmed
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(trimmed)
    }

    /// [`base_name`](Self::base_name) with the final extension stripped, e.g.
    /// `app` for `/srv/web/app.js`.
    pub fn base_stem(&self) -> &str {
        let name = self.base_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        }
    }
}

impl PartialEq for ResourceIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ResourceIdentifier {}

impl Hash for ResourceIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn classify(text: &str) -> (IdentifierKind, String) {
    // Generic URL first. Single-letter schemes are excluded so that
    // `C:/project/app.js` does not parse as a URL with scheme `c`.
    if let Ok(url) = Url::parse(text) {
        if url.scheme().len() > 1 {
            if url.scheme() == "file" {
                let path = file_url_to_path(&url);
                return (IdentifierKind::LocalPath(path_kind(&path)), path);
            }
            return (IdentifierKind::Url, text.to_string());
        }
    }

    if is_windows_path(text) {
        return (IdentifierKind::LocalPath(PathKind::Windows), text.to_string());
    }
    if text.starts_with('/') {
        return (IdentifierKind::LocalPath(PathKind::Unix), text.to_string());
    }
    (IdentifierKind::Opaque, text.to_string())
}

fn is_windows_path(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn path_kind(path: &str) -> PathKind {
    if is_windows_path(path) {
        PathKind::Windows
    } else if path.starts_with('/') {
        PathKind::Unix
    } else {
        PathKind::Unrecognized
    }
}

/// Unwrap a `file://` URL into a local path, percent-decoded.
///
/// `Url::to_file_path` refuses Windows-shaped paths on non-Windows hosts (and
/// vice versa), and a remote debug session routinely crosses that boundary,
/// so the unwrapping is done textually here.
fn file_url_to_path(url: &Url) -> String {
    let decoded = percent_decode(url.path());
    // `file:///C:/x` keeps a leading slash in front of the drive letter.
    let bytes = decoded.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':' {
        decoded[1..].to_string()
    } else {
        decoded
    }
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn canonicalize(kind: IdentifierKind, raw: &str, sensitivity: PathSensitivity) -> String {
    match kind {
        IdentifierKind::LocalPath(path_kind) => {
            let mut canonical = if path_kind == PathKind::Windows {
                raw.replace('\\', "/")
            } else {
                raw.to_string()
            };
            if sensitivity == PathSensitivity::CaseInsensitive {
                canonical = canonical.to_lowercase();
            }
            canonical
        }
        IdentifierKind::Url | IdentifierKind::Opaque => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> ResourceIdentifier {
        ResourceIdentifier::parse(text, PathSensitivity::CaseSensitive)
    }

    #[test]
    fn classifies_windows_paths() {
        let id = parse(r"C:\project\app.js");
        assert_eq!(id.kind(), IdentifierKind::LocalPath(PathKind::Windows));
        assert_eq!(id.canonical(), "C:/project/app.js");
    }

    #[test]
    fn classifies_unix_paths() {
        let id = parse("/srv/web/app.js");
        assert_eq!(id.kind(), IdentifierKind::LocalPath(PathKind::Unix));
        assert_eq!(id.canonical(), "/srv/web/app.js");
    }

    #[test]
    fn classifies_urls() {
        let id = parse("http://localhost:8080/bundle.js");
        assert_eq!(id.kind(), IdentifierKind::Url);
        assert_eq!(id.canonical(), "http://localhost:8080/bundle.js");
    }

    #[test]
    fn unwraps_file_urls_with_percent_decoding() {
        let id = parse("file:///srv/my%20app/app.js");
        assert_eq!(id.kind(), IdentifierKind::LocalPath(PathKind::Unix));
        assert_eq!(id.raw(), "/srv/my app/app.js");
    }

    #[test]
    fn unwraps_windows_file_urls() {
        let id = parse("file:///C:/project/app.js");
        assert_eq!(id.kind(), IdentifierKind::LocalPath(PathKind::Windows));
        assert_eq!(id.raw(), "C:/project/app.js");
    }

    #[test]
    fn bare_names_are_opaque() {
        let id = parse("VM4821");
        assert_eq!(id.kind(), IdentifierKind::Opaque);
        // Anything with a scheme-shaped prefix counts as a URL, including
        // the pseudo-URLs some runtimes report.
        let id = parse("extensions::uncaught_exception_handler");
        assert_eq!(id.kind(), IdentifierKind::Url);
    }

    #[test]
    fn case_insensitive_equivalence() {
        let a = ResourceIdentifier::parse(r"C:\App\Main.js", PathSensitivity::CaseInsensitive);
        let b = ResourceIdentifier::parse("c:/app/main.js", PathSensitivity::CaseInsensitive);
        assert_eq!(a, b);

        let a = ResourceIdentifier::parse("/app/Main.js", PathSensitivity::CaseSensitive);
        let b = ResourceIdentifier::parse("/app/main.js", PathSensitivity::CaseSensitive);
        assert_ne!(a, b);
    }

    #[test]
    fn canonicalization_round_trips() {
        for text in ["/srv/Web/app.js", r"D:\code\x.ts", "file:///srv/a%20b.js"] {
            for sensitivity in [PathSensitivity::CaseSensitive, PathSensitivity::CaseInsensitive] {
                let once = ResourceIdentifier::parse(text, sensitivity);
                let twice = ResourceIdentifier::parse(once.canonical(), sensitivity);
                assert_eq!(once.canonical(), twice.canonical(), "round-trip for {text}");
            }
        }
    }

    #[test]
    fn base_name_and_stem() {
        assert_eq!(parse("/srv/web/app.min.js").base_name(), "app.min.js");
        assert_eq!(parse("/srv/web/app.min.js").base_stem(), "app.min");
        assert_eq!(parse(r"C:\w\index.js").base_stem(), "index");
        assert_eq!(parse("http://host/dir/lib.ts").base_stem(), "lib");
    }
}
