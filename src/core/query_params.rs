use std::borrow::Cow;
use std::collections::HashMap;

/// Query string of `uri` as decoded key/value pairs. A repeated key keeps
/// its last value; a bare key maps to an empty string.
///
/// ```
/// use warble::core::query_params::parse_query_params;
///
/// let params = parse_query_params("/tweets?limit=5&offset=10&q=hello%20world");
/// assert_eq!(params["limit"], "5");
/// assert_eq!(params["q"], "hello world");
/// ```
pub fn parse_query_params(uri: &str) -> HashMap<String, String> {
    let Some((_, query)) = uri.split_once('?') else {
        return HashMap::new();
    };

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw));
            (key.to_string(), value.into_owned())
        })
        .collect()
}

/// Positive integer parameter read from its leading digits, so `"5abc"` is
/// 5. Values too large for `usize` saturate. Anything absent, zero or
/// without leading digits falls back to `default`.
pub fn get_int(params: &HashMap<String, String>, key: &str, default: usize) -> usize {
    let Some(raw) = params.get(key) else {
        return default;
    };
    let n = raw
        .trim_start()
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0usize, |n, d| n.saturating_mul(10).saturating_add(usize::from(d - b'0')));

    if n == 0 {
        default
    } else {
        n
    }
}
