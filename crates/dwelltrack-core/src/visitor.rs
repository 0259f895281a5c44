/// Query parameter that carries the visitor-supplied identifier.
pub const VISITOR_ID_PARAM: &str = "uid";

/// Extract the visitor identifier from a request path's query string.
///
/// Accepts either a bare query (`uid=abc`) or a full path with query
/// (`/?uid=abc`). Values are percent-decoded and trimmed; an empty value is
/// treated as absent. The first `uid` wins when repeated.
pub fn visitor_id_from_query(path_and_query: &str) -> Option<String> {
    let query = match path_and_query.split_once('?') {
        Some((_, q)) => q,
        None if path_and_query.starts_with('/') => return None,
        None => path_and_query,
    };
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == VISITOR_ID_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
