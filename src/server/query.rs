//! Query string decoding

use percent_encoding::percent_decode_str;
use std::collections::HashMap;

/// Decode `a=1&b=x%20y` into a map. `+` decodes to a space and the first
/// occurrence of a repeated name wins.
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.entry(decode(name)).or_insert_with(|| decode(value));
    }
    params
}

fn decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let params = parse_query(Some(
            "type=resume&filename=r%C3%A9sum%C3%A9+final.pdf&contentType=application%2Fpdf",
        ));
        assert_eq!(params["type"], "resume");
        assert_eq!(params["filename"], "résumé final.pdf");
        assert_eq!(params["contentType"], "application/pdf");
    }

    #[test]
    fn test_first_value_wins() {
        let params = parse_query(Some("type=resume&type=document&flag"));
        assert_eq!(params["type"], "resume");
        assert_eq!(params["flag"], "");
    }

    #[test]
    fn test_empty_query() {
        assert!(parse_query(None).is_empty());
        assert!(parse_query(Some("")).is_empty());
    }
}
