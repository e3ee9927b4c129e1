use std::time::Duration;

use isahc::http::HeaderMap;

const BUCKET: &str = "x-ratelimit-bucket";
const LIMIT: &str = "x-ratelimit-limit";
const REMAINING: &str = "x-ratelimit-remaining";
const RESET_AFTER: &str = "x-ratelimit-reset-after";
const GLOBAL: &str = "x-ratelimit-global";
const RETRY_AFTER: &str = "retry-after";
const VIA: &str = "via";

/// The rate-limit-relevant subset of a response's headers, parsed into a
/// typed, independently testable unit per §4.D "Header interpretation".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub bucket: Option<String>,
    pub limit: Option<u32>,
    pub remaining: Option<i64>,
    pub reset_after: Option<Duration>,
    /// `Retry-After`, already normalized to a real duration: seconds when
    /// no `Via` header is present (Cloudflare edge, §4.D), milliseconds
    /// when one is (Discord's own `Retry-After`).
    pub retry_after: Option<Duration>,
    pub global: bool,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn header_parse<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    header_str(headers, name).and_then(|v| v.parse().ok())
}

impl RateLimitHeaders {
    pub fn parse(headers: &HeaderMap) -> Self {
        let has_via = headers.contains_key(VIA);
        let retry_after = header_parse::<f64>(headers, RETRY_AFTER).map(|v| {
            if has_via {
                Duration::from_secs_f64(v / 1000.0)
            } else {
                Duration::from_secs_f64(v)
            }
        });

        Self {
            bucket: header_str(headers, BUCKET).map(str::to_owned),
            limit: header_parse(headers, LIMIT),
            remaining: header_parse(headers, REMAINING),
            reset_after: header_parse::<f64>(headers, RESET_AFTER).map(Duration::from_secs_f64),
            retry_after,
            global: headers.contains_key(GLOBAL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isahc::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                isahc::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn parses_full_bucket_headers() {
        let h = headers(&[
            (BUCKET, "abcd1234"),
            (LIMIT, "5"),
            (REMAINING, "3"),
            (RESET_AFTER, "1.250"),
        ]);
        let parsed = RateLimitHeaders::parse(&h);
        assert_eq!(parsed.bucket.as_deref(), Some("abcd1234"));
        assert_eq!(parsed.limit, Some(5));
        assert_eq!(parsed.remaining, Some(3));
        assert_eq!(parsed.reset_after, Some(Duration::from_millis(1250)));
        assert!(!parsed.global);
    }

    #[test]
    fn retry_after_without_via_is_seconds() {
        let h = headers(&[(RETRY_AFTER, "1")]);
        let parsed = RateLimitHeaders::parse(&h);
        assert_eq!(parsed.retry_after, Some(Duration::from_secs(1)));
    }

    #[test]
    fn retry_after_with_via_is_milliseconds() {
        let h = headers(&[(RETRY_AFTER, "2"), (VIA, "1.1 google")]);
        let parsed = RateLimitHeaders::parse(&h);
        assert_eq!(parsed.retry_after, Some(Duration::from_millis(2)));
    }

    #[test]
    fn global_flag_set_from_presence_only() {
        let h = headers(&[(GLOBAL, "true")]);
        assert!(RateLimitHeaders::parse(&h).global);
    }

    #[test]
    fn absent_headers_parse_to_none() {
        let h = headers(&[]);
        let parsed = RateLimitHeaders::parse(&h);
        assert_eq!(parsed, RateLimitHeaders::default());
    }
}
