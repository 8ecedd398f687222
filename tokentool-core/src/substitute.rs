//! Catalog variable substitution.
//!
//! Arguments of a downstream command may reference catalog endpoints as
//! `$COMPUTE` or `${OBJECT-STORE_PUBLIC}`. Expansion follows the usual shell
//! rules:
//!
//! - `$NAME` takes the longest run of ASCII letters, digits and `_`.
//! - `${NAME}` takes everything up to the closing brace.
//! - `$` followed by one of `*#$@!?-` or a digit names that single character.
//! - `$` followed by anything else, or at the end of the input, stays as is.
//! - `${}` and an unterminated `${` are dropped.
//!
//! Names missing from the variable map expand to the empty string.

use std::collections::BTreeMap;

/// Expand every argument against the catalog variables.
///
/// The result has the same length and order as `args`.
pub fn substitute(args: &[String], variables: &BTreeMap<String, String>) -> Vec<String> {
    args.iter()
        .map(|arg| {
            expand(arg, |name| {
                let value = variables.get(name).cloned();
                if value.is_none() {
                    tracing::debug!(variable = name, "unknown catalog variable, expanding to empty");
                }
                value.unwrap_or_default()
            })
        })
        .collect()
}

/// Expand `$NAME` and `${NAME}` in `input` using `lookup`.
pub fn expand<F>(input: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> String,
{
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    // Start of the pending literal run.
    let mut literal = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() {
            out.push_str(&input[literal..i]);
            let (name, width) = shell_name(&input[i + 1..]);
            match name {
                // Bad syntax such as `${}`: drop it.
                None if width > 0 => {}
                // `$` not followed by a name.
                None => out.push('$'),
                Some(name) => out.push_str(&lookup(name)),
            }
            i += 1 + width;
            literal = i;
        } else {
            i += 1;
        }
    }

    out.push_str(&input[literal..]);
    out
}

/// Parse the name after a `$`. Returns the name and how many bytes it spans.
fn shell_name(s: &str) -> (Option<&str>, usize) {
    let bytes = s.as_bytes();

    if bytes[0] == b'{' {
        if bytes.len() > 2 && is_special(bytes[1]) && bytes[2] == b'}' {
            return (Some(&s[1..2]), 3);
        }
        return match s[1..].find('}') {
            Some(0) => (None, 2),
            Some(end) => (Some(&s[1..1 + end]), end + 2),
            None => (None, 1),
        };
    }

    if is_special(bytes[0]) {
        return (Some(&s[0..1]), 1);
    }

    let len = bytes.iter().take_while(|b| b.is_ascii_alphanumeric() || **b == b'_').count();
    if len == 0 {
        (None, 0)
    } else {
        (Some(&s[..len]), len)
    }
}

fn is_special(b: u8) -> bool {
    matches!(b, b'*' | b'#' | b'$' | b'@' | b'!' | b'?' | b'-') || b.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("COMPUTE".to_string(), "https://compute.example".to_string()),
            ("OBJECT-STORE".to_string(), "https://swift.example".to_string()),
            ("IMAGE_INTERNAL".to_string(), "http://glance".to_string()),
        ])
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn expand_with_vars(input: &str) -> String {
        substitute(&args(&[input]), &vars()).remove(0)
    }

    #[test]
    fn test_substitute_known_variable() {
        assert_eq!(
            substitute(&args(&["--url", "$COMPUTE"]), &vars()),
            args(&["--url", "https://compute.example"])
        );
    }

    #[test]
    fn test_substitute_unknown_variable_is_empty() {
        assert_eq!(substitute(&args(&["$UNKNOWN"]), &vars()), args(&[""]));
    }

    #[test]
    fn test_braced_and_embedded_names() {
        assert_eq!(
            expand_with_vars("${COMPUTE}/v2.1/servers"),
            "https://compute.example/v2.1/servers"
        );
        assert_eq!(expand_with_vars("$COMPUTE/servers"), "https://compute.example/servers");
        assert_eq!(expand_with_vars("${OBJECT-STORE}/c"), "https://swift.example/c");
        assert_eq!(expand_with_vars("x=$IMAGE_INTERNAL;"), "x=http://glance;");
    }

    #[test]
    fn test_shell_edge_cases() {
        assert_eq!(expand_with_vars("cost: 5$"), "cost: 5$");
        assert_eq!(expand_with_vars("a $ b"), "a $ b");
        assert_eq!(expand_with_vars("a${}b"), "ab");
        assert_eq!(expand_with_vars("a${COMPUTE"), "aCOMPUTE");
        assert_eq!(expand_with_vars("$1x"), "x");
        assert_eq!(expand_with_vars("${#}"), "");
        assert_eq!(expand_with_vars("$$"), "");
    }

    #[test]
    fn test_substitute_is_identity_without_dollars() {
        let input = args(&["-X", "GET", "https://example.com/v3/projects", ""]);
        let once = substitute(&input, &vars());
        assert_eq!(once, input);
        assert_eq!(substitute(&once, &vars()), once);
    }

    #[test]
    fn test_multibyte_text_is_preserved() {
        assert_eq!(expand_with_vars("über $COMPUTE ✓"), "über https://compute.example ✓");
    }
}
