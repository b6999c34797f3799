//! Credential line parser.
//!
//! Leak dumps are unstructured: one `email<sep>password` pair per line,
//! where the separator is `:` or `;` and varies from line to line. Lines
//! that do not fit that shape are skipped, never reported as errors.
//!
//! # Rules
//!
//! 1. A trailing `\r` is stripped.
//! 2. The separator is `:` if the line contains one, otherwise `;`. A line
//!    with neither is skipped.
//! 3. The line must split into exactly two fields: email and password.
//! 4. The email must split on `@` into exactly two parts: username and
//!    domain.
//! 5. Username, domain and password must be non-empty.
//!
//! # Example
//!
//! ```rust
//! use leak_indexer_core::parse::parse_line;
//!
//! let cred = parse_line("alice@example.com;hunter2").unwrap();
//! assert_eq!(cred.username, "alice");
//! assert_eq!(cred.domain, "example.com");
//! assert_eq!(cred.password, "hunter2");
//!
//! assert!(parse_line("not a credential").is_none());
//! ```

/// A credential pair borrowed from one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedLine<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub domain: &'a str,
    pub password: &'a str,
}

/// Detect the field separator used by a line.
pub fn detect_separator(line: &str) -> Option<char> {
    if line.contains(':') {
        Some(':')
    } else if line.contains(';') {
        Some(';')
    } else {
        None
    }
}

/// Parse one line into a credential, or `None` if it does not match.
pub fn parse_line(line: &str) -> Option<ParsedLine<'_>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let sep = detect_separator(line)?;

    let (email, password) = split_exactly_two(line, sep)?;
    let (username, domain) = split_exactly_two(email, '@')?;

    if username.is_empty() || domain.is_empty() || password.is_empty() {
        return None;
    }

    Some(ParsedLine {
        email,
        username,
        domain,
        password,
    })
}

fn split_exactly_two(s: &str, sep: char) -> Option<(&str, &str)> {
    let mut parts = s.split(sep);
    let first = parts.next()?;
    let second = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colon_separated() {
        let p = parse_line("a@x.com:pw1").unwrap();
        assert_eq!(p.email, "a@x.com");
        assert_eq!(p.username, "a");
        assert_eq!(p.domain, "x.com");
        assert_eq!(p.password, "pw1");
    }

    #[test]
    fn semicolon_separated() {
        let p = parse_line("b@y.com;pw2").unwrap();
        assert_eq!(p.email, "b@y.com");
        assert_eq!(p.domain, "y.com");
        assert_eq!(p.password, "pw2");
    }

    #[test]
    fn colon_takes_precedence_over_semicolon() {
        let p = parse_line("c@z.org:pa;ss").unwrap();
        assert_eq!(p.password, "pa;ss");
    }

    #[test]
    fn strips_carriage_return() {
        let p = parse_line("a@x.com:pw1\r").unwrap();
        assert_eq!(p.password, "pw1");
    }

    #[test]
    fn skips_lines_without_separator() {
        assert!(parse_line("bad-line").is_none());
        assert!(parse_line("").is_none());
        assert!(parse_line("a@x.com pw").is_none());
    }

    #[test]
    fn skips_lines_with_extra_fields() {
        assert!(parse_line("a@x.com:pw:extra").is_none());
        assert!(parse_line("a@x.com;pw;extra").is_none());
    }

    #[test]
    fn skips_emails_without_exactly_one_at() {
        assert!(parse_line("nobody.example.com:pw").is_none());
        assert!(parse_line("a@b@x.com:pw").is_none());
    }

    #[test]
    fn skips_empty_components() {
        assert!(parse_line("@x.com:pw").is_none());
        assert!(parse_line("a@:pw").is_none());
        assert!(parse_line("a@x.com:").is_none());
    }
}
