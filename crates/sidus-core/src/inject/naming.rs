//! Default registration names.

/// Convert a `CamelCase` identifier to `snake_case`.
///
/// Runs of capitals are kept together, so `HTTPServer` becomes `http_server`
/// and `getHTTPResponse` becomes `get_http_response`. Names that are already
/// snake case pass through unchanged.
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase() || prev.is_ascii_digit() || next_is_lower;
            if boundary && prev != '_' {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Name derived from a type or function item, if it has a usable one.
///
/// Only the unit's own identifier counts, so a struct declared inside an
/// async body is still named. Closures and async blocks have no identifier
/// and must be named explicitly at registration.
pub fn default_name_for<T: ?Sized>() -> Option<String> {
    let own = last_segment(std::any::type_name::<T>());
    if own.is_empty() || !own.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        return None;
    }
    Some(camel_to_snake(own))
}

/// Last `::` segment of a type path, ignoring separators inside generic
/// arguments and dropping the segment's own arguments and `dyn` bounds.
fn last_segment(full: &str) -> &str {
    let full = full.strip_prefix("dyn ").unwrap_or(full);
    let bytes = full.as_bytes();
    let mut depth = 0usize;
    let mut start = 0;
    let mut end = full.len();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                start = i + 2;
                i += 1;
            }
            b' ' if depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
        i += 1;
    }
    let segment = &full[start.min(end)..end];
    segment.split('<').next().unwrap_or(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SampleMathComponent;

    fn sample_skill_add_first() {}

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("SampleMathComponent"), "sample_math_component");
        assert_eq!(camel_to_snake("HTTPServer"), "http_server");
        assert_eq!(camel_to_snake("getHTTPResponse"), "get_http_response");
        assert_eq!(camel_to_snake("Step2Go"), "step2_go");
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
    }

    #[test]
    fn test_default_name_for_type() {
        assert_eq!(
            default_name_for::<SampleMathComponent>().as_deref(),
            Some("sample_math_component")
        );
    }

    #[test]
    fn test_default_name_for_fn_item() {
        fn name_of<F>(_: &F) -> Option<String> {
            default_name_for::<F>()
        }
        assert_eq!(
            name_of(&sample_skill_add_first).as_deref(),
            Some("sample_skill_add_first")
        );
    }

    #[test]
    fn test_closure_has_no_default_name() {
        fn name_of<F>(_: &F) -> Option<String> {
            default_name_for::<F>()
        }
        let closure = |x: i32| x + 1;
        assert_eq!(name_of(&closure), None);
    }

    #[tokio::test]
    async fn test_units_declared_inside_async_body_are_named() {
        struct LocalNotifier;
        fn local_skill_double() {}
        fn name_of<F>(_: &F) -> Option<String> {
            default_name_for::<F>()
        }

        assert_eq!(default_name_for::<LocalNotifier>().as_deref(), Some("local_notifier"));
        assert_eq!(name_of(&local_skill_double).as_deref(), Some("local_skill_double"));

        let closure = || 1;
        assert_eq!(name_of(&closure), None);
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("app::tests::run::{{closure}}::Mail"), "Mail");
        assert_eq!(last_segment("app::Cache<app::Key, alloc::string::String>"), "Cache");
        assert_eq!(last_segment("dyn app::Notifier + Send + Sync"), "Notifier");
        assert_eq!(last_segment("app::run<app::Key>::{{closure}}"), "{{closure}}");
        assert_eq!(last_segment("Plain"), "Plain");
    }
}
