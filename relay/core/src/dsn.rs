//! DSN Parsing
//!
//! A DSN is the URL-shaped address that tells the reporting client where and
//! how to deliver reports. For the local socket transport it looks like:
//!
//! ```text
//! unix://<public_key>:<secret_key>@<project_key>/<absolute_socket_path>
//! ```
//!
//! Parsing is delegated to the `url` crate. Empty components are reported as
//! absent so that validation can treat `unix://:@proj/x` and `unix://proj/x`
//! the same way. The `url` crate keeps paths percent-encoded and, for
//! non-special schemes like `unix`, keeps the host's case; `socket_path` and
//! `hostname` undo both.

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::transport::TransportError;

/// A parsed DSN
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Dsn {
    url: Url,
}

impl Dsn {
    /// Parse a DSN string
    ///
    /// # Errors
    ///
    /// Returns `TransportError::DsnParse` if the input is not a valid URL.
    pub fn parse(input: &str) -> Result<Self, TransportError> {
        Url::parse(input)
            .map(|url| Self { url })
            .map_err(|source| TransportError::DsnParse {
                dsn: input.to_string(),
                source,
            })
    }

    /// Scheme, lowercased by the parser (e.g. `unix`)
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Path component in its serialized, percent-encoded form
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Path component decoded into a filesystem path, if non-empty
    ///
    /// `/tmp/my%20relay.sock` and `/tmp/my relay.sock` both yield the path
    /// with a space in it.
    #[must_use]
    pub fn socket_path(&self) -> Option<PathBuf> {
        let path = self.path();
        if path.is_empty() {
            return None;
        }

        let bytes: Cow<'_, [u8]> = percent_decode_str(path).into();
        Some(path_from_bytes(&bytes))
    }

    /// Host component, which carries the project key, lowercased
    #[must_use]
    pub fn hostname(&self) -> Option<Cow<'_, str>> {
        let host = self.url.host_str().filter(|host| !host.is_empty())?;
        if host.bytes().any(|b| b.is_ascii_uppercase()) {
            Some(Cow::Owned(host.to_ascii_lowercase()))
        } else {
            Some(Cow::Borrowed(host))
        }
    }

    /// User component, which carries the public key
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        Some(self.url.username()).filter(|user| !user.is_empty())
    }

    /// Password component, which carries the secret key
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.url.password().filter(|pass| !pass.is_empty())
    }

    /// Canonical serialization of the whole DSN
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Borrow the underlying URL
    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.url
    }
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

impl FromStr for Dsn {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Url> for Dsn {
    fn from(url: Url) -> Self {
        Self { url }
    }
}
