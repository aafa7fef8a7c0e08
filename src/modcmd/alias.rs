//! Alias token expansion.
//!
//! Alias bindings carry a token list; at dispatch the list is expanded
//! against the caller's argv. `$N` substitutes one argument, `$N-M` a
//! clamped range, `$N-` the rest of the line, and `$$` a literal `$`.
//! Out-of-range references expand to nothing.

/// Expand `tokens` against `argv`. `None` marks a malformed token (a
/// `$` form that matches no rule); the caller reports an alias error.
pub fn expand(tokens: &[String], argv: &[String]) -> Option<Vec<String>> {
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        let Some(rest) = token.strip_prefix('$') else {
            out.push(token.clone());
            continue;
        };
        if let Some(literal) = rest.strip_prefix('$') {
            out.push(format!("${}", literal));
            continue;
        }
        if !rest.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        let (lbound, tail) = split_number(rest);
        let ubound = match tail {
            "" => lbound,
            "-" => argv.len().saturating_sub(1),
            _ => {
                let tail = tail.strip_prefix('-')?;
                if !tail.starts_with(|c: char| c.is_ascii_digit()) {
                    return None;
                }
                let (n, extra) = split_number(tail);
                if !extra.is_empty() {
                    return None;
                }
                n
            }
        };
        let ubound = ubound.min(argv.len().saturating_sub(1));
        if lbound < argv.len() && lbound <= ubound {
            for arg in &argv[lbound..=ubound] {
                out.push(arg.clone());
            }
        }
    }
    Some(out)
}

fn split_number(s: &str) -> (usize, &str) {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(s.len(), |(i, _)| i);
    (s[..end].parse().unwrap_or(0), &s[end..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn literals_pass_through() {
        let out = expand(&v(&["adduser", "$1", "owner"]), &v(&["addowner", "Bob"])).unwrap();
        assert_eq!(out, v(&["adduser", "Bob", "owner"]));
    }

    #[test]
    fn empty_alias_expands_empty() {
        assert_eq!(expand(&[], &v(&["x"])).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn dollar_dollar_is_literal() {
        assert_eq!(expand(&v(&["$$"]), &v(&["x"])).unwrap(), v(&["$"]));
    }

    #[test]
    fn open_range_takes_the_rest() {
        let out = expand(&v(&["$1-"]), &v(&["cmd", "a", "b", "c"])).unwrap();
        assert_eq!(out, v(&["a", "b", "c"]));
    }

    #[test]
    fn closed_range_clamps_to_available() {
        let out = expand(&v(&["$1-9"]), &v(&["cmd", "a", "b"])).unwrap();
        assert_eq!(out, v(&["a", "b"]));
    }

    #[test]
    fn out_of_range_expands_to_nothing() {
        let out = expand(&v(&["x", "$5"]), &v(&["cmd"])).unwrap();
        assert_eq!(out, v(&["x"]));
    }

    #[test]
    fn malformed_tokens_fail() {
        assert!(expand(&v(&["$x"]), &v(&["cmd"])).is_none());
        assert!(expand(&v(&["$1-x"]), &v(&["cmd", "a"])).is_none());
    }
}
