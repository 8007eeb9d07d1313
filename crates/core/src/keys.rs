//! Helpers for dotted configuration keys.

/// Lower-case form with `-`, `.` and `_` removed, used to compare keys that
/// went through environment variable naming.
pub fn normalize(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '-' | '.' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// `max-idle-seconds` -> `maxIdleSeconds`
pub fn option_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Case and dash insensitive comparison of option names
pub fn option_eq(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

pub fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

pub fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if starts_with_ignore_case(s, prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Split `name.rest` at the first dot
pub fn split_first(key: &str) -> Option<(&str, &str)> {
    key.split_once('.')
}

/// Turn an environment variable name into a dotted key.
///
/// `CAMEL_COMPONENT_AWS2_S3_ACCESS_KEY` with the hint `aws2-s3` becomes
/// `camel.component.aws2-s3.access.key`.
pub fn env_name_to_key(name: &str, hints: &[String]) -> String {
    let mut key = name.to_ascii_lowercase().replace('_', ".");
    for hint in hints.iter().filter(|h| h.contains('-')) {
        let mangled = format!(".{}.", hint.to_ascii_lowercase().replace('-', "."));
        let restored = format!(".{}.", hint.to_ascii_lowercase());
        if key.contains(&mangled) {
            key = key.replacen(&mangled, &restored, 1);
        }
    }
    key
}

/// True when `target` starts with the part of `pattern` before its first `*`,
/// compared case-insensitively.
pub fn wildcard_match(pattern: &str, target: &str) -> bool {
    let head = match pattern.find('*') {
        Some(pos) => &pattern[..pos],
        None => pattern,
    };
    target.to_lowercase().starts_with(&head.to_lowercase())
}

/// Split `name[index]rest` into its parts, if the key has a bracket group
pub fn split_bracket(key: &str) -> Option<(&str, &str, &str)> {
    let open = key.find('[')?;
    let close = open + key[open..].find(']')?;
    Some((&key[..open], &key[open + 1..close], &key[close + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("camel.main.Duration-Max_Seconds"), "camelmaindurationmaxseconds");
    }

    #[test]
    fn test_option_key() {
        assert_eq!(option_key("max-idle-seconds"), "maxIdleSeconds");
        assert_eq!(option_key("timeout"), "timeout");
        assert!(option_eq("durationMaxSeconds", "duration-max-seconds"));
    }

    #[test]
    fn test_env_name_with_hints() {
        let hints = vec!["aws2-s3".to_string()];
        assert_eq!(
            env_name_to_key("CAMEL_COMPONENT_AWS2_S3_ACCESS_KEY", &hints),
            "camel.component.aws2-s3.access.key"
        );
        assert_eq!(env_name_to_key("FOO_BAR", &[]), "foo.bar");
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("camel.component.*", "camel.component.http"));
        assert!(wildcard_match("camel.component.HT*", "camel.component.http"));
        assert!(!wildcard_match("camel.component.j*", "camel.component.http"));
    }

    #[test]
    fn test_split_bracket() {
        assert_eq!(split_bracket("myMap[foo]"), Some(("myMap", "foo", "")));
        assert_eq!(split_bracket("[t1].greeting"), Some(("", "t1", ".greeting")));
        assert_eq!(split_bracket("plain"), None);
    }

    #[test]
    fn test_prefix_ignore_case() {
        assert_eq!(strip_prefix_ignore_case("Camel.Rest.port", "camel.rest."), Some("port"));
        assert_eq!(strip_prefix_ignore_case("camel", "camel.rest."), None);
    }
}
