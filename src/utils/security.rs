/// Replaces the value of query parameter `param` in `uri` with `***`.
pub fn mask_query_param(uri: &str, param: &str) -> String {
    let Some((path, query)) = uri.split_once('?') else {
        return uri.to_string();
    };
    let prefix = format!("{param}=");

    let masked = query
        .split('&')
        .map(|pair| {
            if pair.starts_with(&prefix) {
                format!("{prefix}***")
            } else {
                pair.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("&");

    format!("{path}?{masked}")
}

/// Equality that does not short-circuit on the first differing byte.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let (expected, provided) = (expected.as_bytes(), provided.as_bytes());
    if expected.len() != provided.len() {
        return false;
    }
    expected
        .iter()
        .zip(provided)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_only_the_named_param() {
        assert_eq!(
            mask_query_param("/pending?secret=abc&x=1", "secret"),
            "/pending?secret=***&x=1"
        );
        assert_eq!(
            mask_query_param("/pending?mysecret=abc", "secret"),
            "/pending?mysecret=abc"
        );
        assert_eq!(mask_query_param("/health", "secret"), "/health");
    }

    #[test]
    fn secret_comparison() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cret", "s3cres"));
        assert!(!secrets_match("s3cret", "s3cret-longer"));
    }
}
