//! Extension-to-MIME-type lookup, built once from a small text table.

use std::collections::HashMap;

use crate::error::ConfigError;

/// `MIME_TYPE \t ext1 [SP ext2]...` per line; `#` starts a comment that runs
/// to end of line. Extensions are matched case-insensitively and are never
/// longer than 4 bytes, so anything longer just falls through to the
/// default.
pub const DEFAULT_TABLE: &str = "\
text/html\thtml htm
text/css\tcss
text/plain\ttxt log
text/csv\tcsv
text/xml\txml
text/markdown\tmd
application/javascript\tjs mjs
application/json\tjson
application/wasm\twasm
application/pdf\tpdf
application/zip\tzip
application/xml\txsl
application/octet-stream\tbin exe
image/png\tpng
image/jpeg\tjpg jpeg
image/gif\tgif
image/svg+xml\tsvg
image/webp\twebp
image/x-icon\tico
font/woff\twoff
font/woff2\twoff2
audio/mpeg\tmp3
audio/ogg\togg
video/mp4\tmp4
video/webm\twebm
";

/// The MIME type returned for an extension with no table entry.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Extension (lowercase, no leading dot) -> MIME type. Values borrow
/// straight out of the `&'static str` table they were parsed from, so
/// lookups can hand a `'static` MIME string to the response filter without
/// an allocation.
#[derive(Debug, Clone)]
pub struct ContentTypeMap {
    by_ext: HashMap<String, &'static str>,
}

impl ContentTypeMap {
    /// Parses `table` into a lookup map.
    pub fn parse(table: &'static str) -> Result<ContentTypeMap, ConfigError> {
        let mut by_ext = HashMap::new();
        for (lineno, raw_line) in table.lines().enumerate() {
            let line = match raw_line.find('#') {
                Some(i) => &raw_line[..i],
                None => raw_line,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let mime = parts
                .next()
                .ok_or(ConfigError::BadContentTypeTable { line: lineno + 1 })?;
            let mut any_ext = false;
            for ext in parts {
                if ext.len() > 4 {
                    continue;
                }
                by_ext.insert(ext.to_ascii_lowercase(), mime);
                any_ext = true;
            }
            if !any_ext {
                return Err(ConfigError::BadContentTypeTable { line: lineno + 1 });
            }
        }
        Ok(ContentTypeMap { by_ext })
    }

    /// Builds the default table. Infallible: `DEFAULT_TABLE` is a constant
    /// known to parse.
    pub fn default_map() -> ContentTypeMap {
        Self::parse(DEFAULT_TABLE).expect("DEFAULT_TABLE is well-formed")
    }

    /// Looks up the MIME type for a file name by its extension (the
    /// substring after the last `.`, lowercased, up to 4 bytes). Falls back
    /// to [`DEFAULT_MIME`] on miss or on an extension that's too long.
    pub fn lookup(&self, file_name: &str) -> &'static str {
        let ext = match file_name.rsplit_once('.') {
            Some((_, ext)) if ext.len() <= 4 && !ext.is_empty() => ext,
            _ => return DEFAULT_MIME,
        };
        let lower = ext.to_ascii_lowercase();
        self.by_ext.get(&lower).copied().unwrap_or(DEFAULT_MIME)
    }
}

impl Default for ContentTypeMap {
    fn default() -> Self {
        Self::default_map()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_table_resolves_common_extensions() {
        let map = ContentTypeMap::default_map();
        assert_eq!("text/html", map.lookup("index.html"));
        assert_eq!("image/png", map.lookup("logo.PNG"));
        assert_eq!("application/javascript", map.lookup("app.js"));
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        let map = ContentTypeMap::default_map();
        assert_eq!(DEFAULT_MIME, map.lookup("archive.tar.gzipped"));
        assert_eq!(DEFAULT_MIME, map.lookup("no-extension"));
    }

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let table = "# comment\n\ntext/plain\ttxt\n";
        let map = ContentTypeMap::parse(table).unwrap();
        assert_eq!("text/plain", map.lookup("a.txt"));
    }

    #[test]
    fn parse_rejects_a_mime_with_no_extensions() {
        let table = "text/plain\t\n";
        assert!(ContentTypeMap::parse(table).is_err());
    }
}
