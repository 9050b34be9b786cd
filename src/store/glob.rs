//! Redis-style glob matching used by `SCAN ... MATCH` on the in-memory keyspace.
//!
//! Supports `*`, `?`, `[abc]`, `[^abc]`, `[a-z]` and `\` escapes.

/// Returns true if `candidate` matches the glob `pattern`.
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    matches(pattern.as_bytes(), candidate.as_bytes())
}

/// Iterative wildcard match. Only the most recent `*` is ever backtracked to,
/// so the cost stays within pattern length times candidate length.
fn matches(pattern: &[u8], candidate: &[u8]) -> bool {
    let mut p = 0;
    let mut c = 0;
    // pattern index just past the last `*`, and the candidate index it resumes from
    let mut backtrack: Option<(usize, usize)> = None;

    while c < candidate.len() {
        if pattern.get(p) == Some(&b'*') {
            while pattern.get(p) == Some(&b'*') {
                p += 1;
            }
            if p == pattern.len() {
                return true;
            }
            backtrack = Some((p, c));
            continue;
        }

        if let Some(next) = match_token(pattern, p, candidate[c]) {
            p = next;
            c += 1;
            continue;
        }

        match backtrack {
            Some((star_p, star_c)) => {
                p = star_p;
                c = star_c + 1;
                backtrack = Some((star_p, c));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&token| token == b'*')
}

/// Matches the single token at `pattern[p]` against `ch`, returning the
/// index of the following token on success. `*` is handled by the caller.
fn match_token(pattern: &[u8], p: usize, ch: u8) -> Option<usize> {
    match *pattern.get(p)? {
        b'?' => Some(p + 1),
        b'[' => {
            let (matched, rest) = match_class(&pattern[p + 1..], ch);
            matched.then(|| pattern.len() - rest.len())
        }
        b'\\' if p + 1 < pattern.len() => (pattern[p + 1] == ch).then_some(p + 2),
        literal => (literal == ch).then_some(p + 1),
    }
}

/// Matches `ch` against a bracket class; `pattern` starts just after `[`.
/// Returns the match result and the pattern remaining after the closing `]`.
fn match_class(mut pattern: &[u8], ch: u8) -> (bool, &[u8]) {
    let negate = pattern.first() == Some(&b'^');
    if negate {
        pattern = &pattern[1..];
    }

    let mut matched = false;
    loop {
        match pattern {
            // unterminated class: the end of the pattern closes it
            [] => break,
            [b']', rest @ ..] => {
                pattern = rest;
                break;
            }
            [b'\\', escaped, rest @ ..] => {
                matched |= *escaped == ch;
                pattern = rest;
            }
            [low, b'-', high, rest @ ..] if *high != b']' => {
                let (low, high) = if low <= high { (*low, *high) } else { (*high, *low) };
                matched |= (low..=high).contains(&ch);
                pattern = rest;
            }
            [literal, rest @ ..] => {
                matched |= *literal == ch;
                pattern = rest;
            }
        }
    }

    (matched != negate, pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal() {
        assert!(glob_match("chat:context:1", "chat:context:1"));
        assert!(!glob_match("chat:context:1", "chat:context:12"));
    }

    #[test]
    fn test_star() {
        assert!(glob_match("chat:context:*", "chat:context:42"));
        assert!(glob_match("chat:context:*", "chat:context:"));
        assert!(glob_match("*", ""));
        assert!(glob_match("ratelimit:*:/login", "ratelimit:1.2.3.4:/login"));
        assert!(!glob_match("chat:context:*", "chat:session:42"));
    }

    #[test]
    fn test_question_mark() {
        assert!(glob_match("h?llo", "hello"));
        assert!(!glob_match("h?llo", "hllo"));
    }

    #[test]
    fn test_classes() {
        assert!(glob_match("h[ae]llo", "hallo"));
        assert!(!glob_match("h[ae]llo", "hillo"));
        assert!(glob_match("h[^e]llo", "hallo"));
        assert!(!glob_match("h[^e]llo", "hello"));
        assert!(glob_match("key[0-9]", "key7"));
        assert!(!glob_match("key[0-9]", "keyx"));
    }

    #[test]
    fn test_star_backtracks_to_latest_star() {
        assert!(glob_match("*a*b", "xxaxxb"));
        assert!(glob_match("a*b*c", "abbbbc"));
        assert!(!glob_match("a*b*c", "abbbb"));
        assert!(glob_match("*:typing:*", "chat:typing:7"));
        assert!(glob_match("**", "anything"));
        assert!(glob_match("ab*", "ab"));
    }

    #[test]
    fn test_many_stars_stay_fast() {
        let pattern = format!("{}b", "*a".repeat(12));
        let candidate = "a".repeat(200);

        let started = std::time::Instant::now();
        assert!(!glob_match(&pattern, &candidate));
        assert!(glob_match(&pattern, &format!("{}b", candidate)));
        assert!(started.elapsed() < std::time::Duration::from_millis(100));
    }

    #[test]
    fn test_escape() {
        assert!(glob_match(r"literal\*", "literal*"));
        assert!(!glob_match(r"literal\*", "literalx"));
    }
}
