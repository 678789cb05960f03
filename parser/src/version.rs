//! Representation of the request's HTTP version.

use std::fmt::Display;

/// HTTP version named on the request line. TLS, HTTP/2 and HTTP/3 are out of
/// scope, so only the two HTTP/1.x tokens are ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// HTTP/1.0
    Http10,
    /// HTTP/1.1
    Http11,
}

impl Version {
    /// Parses the version token, e.g. `b"HTTP/1.1"`.
    pub fn parse(b: &[u8]) -> Option<Version> {
        match b {
            b"HTTP/1.1" => Some(Version::Http11),
            b"HTTP/1.0" => Some(Version::Http10),
            _ => None,
        }
    }

    /// Default keep-alive disposition for this version absent a `Connection` header.
    pub fn default_keepalive(self) -> bool {
        matches!(self, Version::Http11)
    }

    /// Whether a request of this version must carry a `Host` header.
    pub fn requires_host(self) -> bool {
        matches!(self, Version::Http11)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        })
    }
}

#[cfg(test)]
mod test {
    use super::Version;

    #[test]
    fn parse_recognizes_http11_and_http10() {
        assert_eq!(Some(Version::Http11), Version::parse(b"HTTP/1.1"));
        assert_eq!(Some(Version::Http10), Version::parse(b"HTTP/1.0"));
        assert_eq!(None, Version::parse(b"HTTP/2"));
    }

    #[test]
    fn keepalive_and_host_requirement_follow_version() {
        assert!(Version::Http11.default_keepalive());
        assert!(Version::Http11.requires_host());
        assert!(!Version::Http10.default_keepalive());
        assert!(!Version::Http10.requires_host());
    }
}
