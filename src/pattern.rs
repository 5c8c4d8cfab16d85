//! Shell-style wildcard matching for device names.
//!
//! `*` matches any run of characters (including none), `?` matches exactly
//! one. Matching is case-insensitive and anchored at both ends: the pattern
//! must describe the whole name, not a substring of it.

/// `true` if `name` matches `pattern` in full, ignoring case.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();
    let name: Vec<char> = name.chars().flat_map(char::to_lowercase).collect();

    let (mut p, mut n) = (0usize, 0usize);
    // Position of the last `*` seen and the name position it was tried against.
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some(&c) if c == '?' || c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, tried)) => {
                    p = star + 1;
                    n = tried + 1;
                    backtrack = Some((star, tried + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// `true` if any of `patterns` matches `name`.
pub fn any_match<S: AsRef<str>>(patterns: &[S], name: &str) -> bool {
    patterns.iter().any(|p| wildcard_match(p.as_ref(), name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_inside_name() {
        assert!(wildcard_match("*Joystick*", "ACME Joystick Pro"));
        assert!(!wildcard_match("*Joystick*", "Keyboard"));
    }

    #[test]
    fn matching_ignores_case() {
        assert!(wildcard_match("*joystick*", "ACME Joystick Pro"));
        assert!(wildcard_match("TESTPAD*", "TestPad v2"));
    }

    #[test]
    fn whole_name_must_match() {
        assert!(!wildcard_match("Joystick", "ACME Joystick Pro"));
        assert!(wildcard_match("Joystick", "joystick"));
        assert!(!wildcard_match("TestPad", "TestPad v2"));
    }

    #[test]
    fn question_mark_is_one_char() {
        assert!(wildcard_match("Pad ?", "Pad 2"));
        assert!(!wildcard_match("Pad ?", "Pad 12"));
        assert!(!wildcard_match("Pad ?", "Pad "));
    }

    #[test]
    fn star_backtracks() {
        assert!(wildcard_match("*a*b", "xaxxab"));
        assert!(!wildcard_match("*a*b", "xaxxa"));
        assert!(wildcard_match("**", ""));
        assert!(wildcard_match("*", "anything at all"));
        assert!(!wildcard_match("?", ""));
    }

    #[test]
    fn any_of_several_patterns() {
        let patterns = ["T.16000M*", "*Hotas*"];
        assert!(any_match(&patterns, "Thrustmaster HOTAS X"));
        assert!(!any_match(&patterns, "Xbox Controller"));
    }
}
