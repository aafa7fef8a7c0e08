//! IRC string handling: casemapping, case-folded ordered maps, and the
//! wildcard matchers used for hostmasks.
//!
//! All comparisons in the services core go through the RFC 1459 casemap,
//! where `{|}~` are the lowercase forms of `[\]^`. Latin-1 folding can be
//! enabled at startup for networks that negotiate it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

static LATIN1_CASEMAP: AtomicBool = AtomicBool::new(false);

/// Enable Latin-1 folding in addition to the RFC 1459 map.
///
/// Set once at startup from the protocol configuration, before any keys
/// are folded.
pub fn set_latin1_casemap(enabled: bool) {
    LATIN1_CASEMAP.store(enabled, Ordering::Relaxed);
}

/// Fold a single byte through the active casemap.
#[inline]
pub fn irc_tolower(b: u8) -> u8 {
    match b {
        b'A'..=b'Z' => b + 32,
        b'[' => b'{',
        b'\\' => b'|',
        b']' => b'}',
        b'^' => b'~',
        0xC0..=0xDE if b != 0xD7 && LATIN1_CASEMAP.load(Ordering::Relaxed) => b + 32,
        _ => b,
    }
}

/// Fold a whole string.
pub fn irc_lower(s: &str) -> String {
    s.bytes().map(|b| irc_tolower(b) as char).collect()
}

/// Case-folded equality.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes()
            .zip(b.bytes())
            .all(|(x, y)| irc_tolower(x) == irc_tolower(y))
}

/// Case-folded ordering, the sort order of every [`IrcDict`].
pub fn irc_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    a.bytes()
        .map(irc_tolower)
        .cmp(b.bytes().map(irc_tolower))
}

/// Channel name test. Plain channels start with `#`; `+` channels exist
/// on some networks and are gated separately at the command layer.
pub fn is_channel_name(s: &str) -> bool {
    s.starts_with('#') || s.starts_with('+')
}

/// An ordered map keyed by case-folded IRC strings.
///
/// The first-inserted spelling of a key is preserved for display;
/// lookups, removals and iteration order all use the folded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcDict<V> {
    inner: BTreeMap<String, (String, V)>,
}

impl<V> Default for IrcDict<V> {
    fn default() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }
}

impl<V> IrcDict<V> {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Insert under `name`, returning any displaced value.
    pub fn insert(&mut self, name: &str, value: V) -> Option<V> {
        self.inner
            .insert(irc_lower(name), (name.to_string(), value))
            .map(|(_, v)| v)
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.inner.get(&irc_lower(name)).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        self.inner.get_mut(&irc_lower(name)).map(|(_, v)| v)
    }

    /// The stored display spelling of `name`, if present.
    pub fn display_key(&self, name: &str) -> Option<&str> {
        self.inner.get(&irc_lower(name)).map(|(k, _)| k.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&irc_lower(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<V> {
        self.inner.remove(&irc_lower(name)).map(|(_, v)| v)
    }

    /// Iterate `(display name, value)` in folded sort order.
    ///
    /// Entries may be inserted or removed freely between iterations; the
    /// cursor idiom for delete-during-iteration is to collect keys first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.inner.values().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut V)> {
        self.inner.values_mut().map(|(k, v)| (k.as_str(), &mut *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.values().map(|(k, _)| k.as_str())
    }

    pub fn retain(&mut self, mut f: impl FnMut(&str, &mut V) -> bool) {
        self.inner.retain(|_, (k, v)| f(k, v));
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.inner.values_mut().map(|(_, v)| v)
    }
}

impl<V: fmt::Debug> fmt::Display for IrcDict<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} entries}}", self.inner.len())
    }
}

/// Match `text` against an IRC glob (`*`, `?`, `\` escapes), case-folded.
///
/// A backslash escape forces an exact byte comparison, so masks can pin
/// capitalization.
pub fn match_ircglob(text: &str, glob: &str) -> bool {
    let text = text.as_bytes();
    let glob = glob.as_bytes();
    let mut t = 0;
    let mut g = 0;
    loop {
        match glob.get(g) {
            None => return t == text.len(),
            Some(b'\\') => {
                g += 1;
                if glob.get(g).copied() != text.get(t).copied() || glob.get(g).is_none() {
                    return false;
                }
                g += 1;
                t += 1;
            }
            Some(b'*') | Some(b'?') => {
                let mut star = false;
                let mut q_cnt = 0usize;
                while let Some(&c) = glob.get(g) {
                    match c {
                        b'*' => star = true,
                        b'?' => q_cnt += 1,
                        _ => break,
                    }
                    g += 1;
                }
                if text.len() - t < q_cnt {
                    return false;
                }
                t += q_cnt;
                if star {
                    let Some(&next) = glob.get(g) else {
                        return true;
                    };
                    // Anchor on the next literal; recurse on each candidate.
                    let want = if next == b'\\' {
                        glob.get(g + 1).copied().unwrap_or(b'\\')
                    } else {
                        irc_tolower(next)
                    };
                    while t < text.len() {
                        let have = if next == b'\\' {
                            text[t]
                        } else {
                            irc_tolower(text[t])
                        };
                        if have == want
                            && match_ircglob(
                                std::str::from_utf8(&text[t..]).unwrap_or(""),
                                std::str::from_utf8(&glob[g..]).unwrap_or(""),
                            )
                        {
                            return true;
                        }
                        t += 1;
                    }
                    return false;
                }
            }
            Some(&c) => {
                if text.get(t).map(|&b| irc_tolower(b)) != Some(irc_tolower(c)) {
                    return false;
                }
                g += 1;
                t += 1;
            }
        }
    }
}

/// Does `broad` match every string that `narrow` matches?
///
/// Used by the ban engine to detect redundant masks: a new broader ban
/// subsumes existing narrower ones, and an incoming mask already covered
/// by a present ban coalesces instead of inserting.
pub fn glob_covers(broad: &str, narrow: &str) -> bool {
    fn rec(b: &[u8], n: &[u8]) -> bool {
        match b.first() {
            None => n.is_empty(),
            Some(b'*') => {
                // Swallow the star, or swallow one unit of the narrow mask.
                if rec(&b[1..], n) {
                    return true;
                }
                match n.first() {
                    None => false,
                    Some(_) => rec(b, &n[1..]),
                }
            }
            Some(b'?') => match n.first() {
                // '?' cannot cover a '*' (which may match many chars).
                Some(b'*') | None => false,
                Some(_) => rec(&b[1..], &n[1..]),
            },
            Some(&c) => match n.first() {
                Some(&d) if irc_tolower(c) == irc_tolower(d) && c != b'*' && d != b'*' => {
                    rec(&b[1..], &n[1..])
                }
                _ => false,
            },
        }
    }
    rec(broad.as_bytes(), narrow.as_bytes())
}

/// Parse a duration like `1h30m`, `2d`, `90` (bare seconds).
///
/// Units: y (365d), w, d, h, m, s. Returns `None` on empty or malformed
/// input.
pub fn parse_interval(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    let mut total = 0u64;
    let mut num = 0u64;
    let mut have_digit = false;
    for c in s.chars() {
        match c {
            '0'..='9' => {
                num = num.checked_mul(10)?.checked_add(c as u64 - '0' as u64)?;
                have_digit = true;
            }
            _ => {
                if !have_digit {
                    return None;
                }
                let unit = match c.to_ascii_lowercase() {
                    'y' => 365 * 86400,
                    'w' => 7 * 86400,
                    'd' => 86400,
                    'h' => 3600,
                    'm' => 60,
                    's' => 1,
                    _ => return None,
                };
                total = total.checked_add(num.checked_mul(unit)?)?;
                num = 0;
                have_digit = false;
            }
        }
    }
    if have_digit {
        total = total.checked_add(num)?;
    }
    Some(total)
}

/// Render a duration for display: the two most significant units.
pub fn interval_string(mut secs: u64) -> String {
    const UNITS: [(u64, &str); 6] = [
        (365 * 86400, "year"),
        (7 * 86400, "week"),
        (86400, "day"),
        (3600, "hour"),
        (60, "minute"),
        (1, "second"),
    ];
    if secs == 0 {
        return "0 seconds".to_string();
    }
    let mut parts = Vec::new();
    for (span, name) in UNITS {
        if secs >= span && parts.len() < 2 {
            let n = secs / span;
            secs %= span;
            parts.push(format!("{} {}{}", n, name, if n == 1 { "" } else { "s" }));
        }
    }
    parts.join(" ")
}

/// Split `nick!ident@host` into its three parts, tolerating missing
/// separators (the remainder lands in the host).
pub fn split_mask(mask: &str) -> (&str, &str, &str) {
    let (nick, rest) = mask.split_once('!').unwrap_or(("*", mask));
    let (ident, host) = rest.split_once('@').unwrap_or(("*", rest));
    (nick, ident, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casemap_folds_rfc1459_specials() {
        assert!(irc_eq("[foo]^", "{foo}~"));
        assert!(irc_eq("Nick\\One", "nick|one"));
        assert!(!irc_eq("abc", "abd"));
    }

    #[test]
    fn dict_preserves_display_spelling() {
        let mut d = IrcDict::new();
        d.insert("#MixedCase", 1u32);
        assert_eq!(d.get("#mixedcase"), Some(&1));
        assert_eq!(d.display_key("#MIXEDCASE"), Some("#MixedCase"));
        assert_eq!(d.remove("#Mixedcase"), Some(1));
        assert!(d.is_empty());
    }

    #[test]
    fn dict_iterates_in_folded_order() {
        let mut d = IrcDict::new();
        d.insert("zeta", ());
        d.insert("Alpha", ());
        d.insert("[mid]", ());
        let keys: Vec<_> = d.keys().collect();
        assert_eq!(keys, vec!["Alpha", "zeta", "[mid]"]);
    }

    #[test]
    fn ircglob_basics() {
        assert!(match_ircglob("bad!~x@evil.example", "*!*@evil.example"));
        assert!(match_ircglob("Nick!id@host", "nick!*@*"));
        assert!(match_ircglob("abc", "a?c"));
        assert!(!match_ircglob("abc", "a?d"));
        assert!(match_ircglob("", "*"));
        assert!(!match_ircglob("x", ""));
        assert!(match_ircglob("a*b", r"a\*b"));
        assert!(!match_ircglob("aXb", r"a\*b"));
    }

    #[test]
    fn glob_subsumption() {
        assert!(glob_covers("*!*@*.b", "*!*@a.b"));
        assert!(!glob_covers("*!*@a.b", "*!*@*.b"));
        assert!(glob_covers("*", "anything?at*all"));
        assert!(glob_covers("*!*@host", "*!*@host"));
        assert!(!glob_covers("n?ck!*@*", "n*!*@*"));
    }

    #[test]
    fn interval_parsing() {
        assert_eq!(parse_interval("1h"), Some(3600));
        assert_eq!(parse_interval("1h30m"), Some(5400));
        assert_eq!(parse_interval("90"), Some(90));
        assert_eq!(parse_interval("2d"), Some(172800));
        assert_eq!(parse_interval(""), None);
        assert_eq!(parse_interval("h"), None);
    }

    #[test]
    fn interval_display() {
        assert_eq!(interval_string(3600), "1 hour");
        assert_eq!(interval_string(5400), "1 hour 30 minutes");
        assert_eq!(interval_string(0), "0 seconds");
    }

    #[test]
    fn mask_split() {
        assert_eq!(split_mask("n!u@h"), ("n", "u", "h"));
        assert_eq!(split_mask("*@h"), ("*", "*", "h"));
    }
}
