use std::collections::HashMap;

/// Parse a query string (with or without the leading `?`) into key/value pairs.
///
/// Pairs are split on `&`, then on `=`, and form-decoded. A key repeated
/// later in the string overwrites the earlier value.
pub fn parse_query_string(querystring: &str) -> HashMap<String, String> {
    let querystring = querystring.strip_prefix('?').unwrap_or(querystring);

    url::form_urlencoded::parse(querystring.as_bytes())
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// Join a path and a query string as the CDN delivers them separately
pub fn join_path_and_query(path: &str, querystring: &str) -> String {
    let querystring = querystring.strip_prefix('?').unwrap_or(querystring);
    if querystring.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{querystring}")
    }
}

/// Append one form-encoded parameter to a path that may already carry a query
pub fn append_query_param(uri: &str, key: &str, value: &str) -> String {
    let pair = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish();

    if uri.contains('?') {
        format!("{uri}&{pair}")
    } else {
        format!("{uri}?{pair}")
    }
}
