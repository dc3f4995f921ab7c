/// Join a reference onto a base path.
///
/// * an empty reference keeps the base as is;
/// * a fragment-only reference replaces the base fragment;
/// * a reference with a scheme, or a base without any `/`, replaces the base;
/// * anything else replaces the last segment of the base.
#[must_use]
pub fn join_path(base: &str, reference: &str) -> String {
    if reference.is_empty() {
        return base.to_string();
    }
    let (base, _) = split_fragment(base);
    if reference.starts_with('#') {
        return format!("{base}{reference}");
    }
    if !base.contains('/') || has_scheme(reference) {
        return reference.to_string();
    }
    match base.rfind('/') {
        Some(idx) => format!("{}/{reference}", &base[..idx]),
        None => reference.to_string(),
    }
}

/// Split a path into the part before `#` and the fragment after it.
#[must_use]
pub fn split_fragment(path: &str) -> (&str, &str) {
    match path.split_once('#') {
        Some((main, fragment)) => (main, fragment),
        None => (path, ""),
    }
}

fn has_scheme(reference: &str) -> bool {
    match reference.find(':') {
        Some(0) | None => false,
        Some(idx) => !reference[..idx].contains(&['#', '/'][..]),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{join_path, split_fragment};

    #[test_case("", "#/a", "#/a"; "fragment on empty base")]
    #[test_case("root.json#/x", "#/a", "root.json#/a"; "fragment replaces fragment")]
    #[test_case("http://x.com/a/b.json", "c.json", "http://x.com/a/c.json"; "relative file")]
    #[test_case("http://x.com/a/b.json", "urn:uuid:1", "urn:uuid:1"; "absolute urn")]
    #[test_case("http://x.com/a/b.json", "https://y.com/s", "https://y.com/s"; "absolute url")]
    #[test_case("ext", "other", "other"; "base without slash")]
    #[test_case("http://x.com/a", "", "http://x.com/a"; "empty reference")]
    #[test_case("http://x.com/a/b.json#/frag", "c.json#/d", "http://x.com/a/c.json#/d"; "base fragment dropped")]
    fn test_join_path(base: &str, reference: &str, expected: &str) {
        assert_eq!(join_path(base, reference), expected);
    }

    #[test]
    fn test_split_fragment() {
        assert_eq!(split_fragment("a.json#/x"), ("a.json", "/x"));
        assert_eq!(split_fragment("a.json"), ("a.json", ""));
        assert_eq!(split_fragment("#"), ("", ""));
    }
}
