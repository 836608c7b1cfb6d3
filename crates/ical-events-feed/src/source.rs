//! Calendar source URLs.
//!
//! A [`CalendarSource`] is a feed URL that has already been checked to be an
//! absolute `http`/`https` URL with a host. Construction is the only place
//! that check happens, so anything holding a `CalendarSource` can fetch it
//! without re-validating.

use std::fmt;

use thiserror::Error;
use url::Url;

/// Why a feed URL was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidUrl {
    /// The URL has no scheme (e.g. `example.com/cal.ics`).
    #[error("missing scheme")]
    MissingScheme,
    /// The scheme is something other than `http` or `https`.
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("missing host")]
    MissingHost,
    /// The URL could not be parsed for another reason.
    #[error("malformed url: {0}")]
    Malformed(String),
}

/// A validated calendar feed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSource {
    url: Url,
}

impl CalendarSource {
    /// Schemes a feed may be fetched over.
    pub const ALLOWED_SCHEMES: &'static [&'static str] = &["http", "https"];

    /// Parses and validates a feed URL.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidUrl`] naming the first problem found. The scheme is
    /// checked before the host.
    pub fn parse(input: &str) -> Result<Self, InvalidUrl> {
        let input = input.trim();
        if let Some(scheme) = scheme_of(input) {
            let scheme = scheme.to_ascii_lowercase();
            if !Self::ALLOWED_SCHEMES.contains(&scheme.as_str()) {
                return Err(InvalidUrl::UnsupportedScheme(scheme));
            }
        }

        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => return Err(InvalidUrl::MissingScheme),
            Err(url::ParseError::EmptyHost) => return Err(InvalidUrl::MissingHost),
            Err(e) => return Err(InvalidUrl::Malformed(e.to_string())),
        };

        if !Self::ALLOWED_SCHEMES.contains(&url.scheme()) {
            return Err(InvalidUrl::UnsupportedScheme(url.scheme().to_string()));
        }

        match url.host_str() {
            Some(host) if !host.is_empty() => Ok(Self { url }),
            _ => Err(InvalidUrl::MissingHost),
        }
    }

    /// Returns the parsed URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the URL as a string.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Returns the host component.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }
}

/// Returns the scheme of an absolute URL, if the input starts with one.
fn scheme_of(input: &str) -> Option<&str> {
    let (scheme, _) = input.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

impl fmt::Display for CalendarSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
