//! Query parameter validation for `GET /events`.

use ical_events_feed::CalendarSource;

use crate::error::ApiError;

/// A validated `/events` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsQuery {
    /// The feed to fetch.
    pub source: CalendarSource,
    /// Maximum number of events to return; `None` means all.
    pub limit: Option<usize>,
}

/// Validates the raw `url` and `limit` query values.
///
/// An empty `url` counts as missing. `limit` must be a non-negative integer
/// when present.
pub fn validate_query(url: Option<&str>, limit: Option<&str>) -> Result<EventsQuery, ApiError> {
    let url = url.map(str::trim).filter(|u| !u.is_empty());
    let Some(url) = url else {
        return Err(ApiError::MissingParameter);
    };
    let source = CalendarSource::parse(url)?;

    let limit = match limit.map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<usize>().map_err(|_| ApiError::InvalidParameter {
            name: "limit",
            reason: format!("expected a non-negative integer, got '{}'", raw),
        })?),
    };

    Ok(EventsQuery { source, limit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ical_events_feed::InvalidUrl;

    #[test]
    fn accepts_url_and_limit() {
        let query = validate_query(Some("https://example.com/cal.ics"), Some("3")).unwrap();
        assert_eq!(query.source.as_str(), "https://example.com/cal.ics");
        assert_eq!(query.limit, Some(3));
    }

    #[test]
    fn limit_is_optional() {
        let query = validate_query(Some("http://example.com/cal.ics"), None).unwrap();
        assert_eq!(query.limit, None);

        let query = validate_query(Some("http://example.com/cal.ics"), Some("")).unwrap();
        assert_eq!(query.limit, None);
    }

    #[test]
    fn zero_limit_is_allowed() {
        let query = validate_query(Some("http://example.com/cal.ics"), Some("0")).unwrap();
        assert_eq!(query.limit, Some(0));
    }

    #[test]
    fn missing_or_empty_url() {
        assert!(matches!(validate_query(None, None), Err(ApiError::MissingParameter)));
        assert!(matches!(validate_query(Some("  "), None), Err(ApiError::MissingParameter)));
    }

    #[test]
    fn url_reasons_are_reported() {
        assert!(matches!(
            validate_query(Some("ftp://example.com/cal.ics"), None),
            Err(ApiError::InvalidUrl(InvalidUrl::UnsupportedScheme(_)))
        ));
        assert!(matches!(
            validate_query(Some("example.com/cal.ics"), None),
            Err(ApiError::InvalidUrl(InvalidUrl::MissingScheme))
        ));
    }

    #[test]
    fn bad_limit_is_rejected() {
        for raw in ["abc", "-1", "2.5"] {
            let err = validate_query(Some("https://example.com/cal.ics"), Some(raw)).unwrap_err();
            assert!(matches!(err, ApiError::InvalidParameter { name: "limit", .. }));
        }
    }
}
