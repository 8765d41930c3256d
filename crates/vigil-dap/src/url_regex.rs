//! URL-regexp derivation for `Debugger.setBreakpointByUrl`.

/// Anchored, case-insensitive regex matching exactly one URL.
///
/// Breakpoints are set by URL regex rather than script id so that they
/// survive page reloads and cache-busting re-parses of the same URL.
pub fn exact_url_regex(url: &str) -> String {
    format!("(?i)^{}$", regex::escape(url))
}

/// Regex matching any URL whose base name (directory and extension ignored)
/// is `stem`.
///
/// Used when no script for a source has ever loaded: the adapter cannot know
/// which URL will eventually serve the file, so it speculates on the bare
/// filename. This cannot distinguish two different files sharing a base
/// name.
pub fn base_name_regex(stem: &str) -> String {
    format!(r".*[\\/]{}([^A-Za-z0-9].*)?$", regex::escape(stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn exact_regex_matches_only_that_url_case_insensitively() {
        let re = Regex::new(&exact_url_regex("file:///srv/app.js")).unwrap();
        assert!(re.is_match("file:///srv/app.js"));
        assert!(re.is_match("file:///SRV/App.JS"));
        assert!(!re.is_match("file:///srv/app.js.map"));
        assert!(!re.is_match("http://file:///srv/app.js"));
    }

    #[test]
    fn base_name_regex_matches_any_directory_and_extension() {
        assert_eq!(base_name_regex("index"), r".*[\\/]index([^A-Za-z0-9].*)?$");
        let re = Regex::new(&base_name_regex("index")).unwrap();
        assert!(re.is_match("http://localhost:8080/static/index.js"));
        assert!(re.is_match(r"C:\web\index.min.js"));
        assert!(re.is_match("/web/index"));
        assert!(!re.is_match("/web/reindex.js"));
        assert!(!re.is_match("/web/indexes.js"));
    }

    #[test]
    fn base_name_regex_escapes_metacharacters() {
        let re = Regex::new(&base_name_regex("app.v2")).unwrap();
        assert!(re.is_match("/srv/app.v2.js"));
        assert!(!re.is_match("/srv/appxv2.js"));
    }
}
