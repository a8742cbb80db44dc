//! SPF term parsing
//!
//! Only the parts of an SPF record that can be flattened into network
//! blocks are modelled; everything else parses to [`Term::Ignored`].

use spflat_core::{Error, Result};

/// Widest IPv4 prefix
const V4_BITS: u8 = 32;

/// Widest IPv6 prefix
const V6_BITS: u8 = 128;

/// Optional prefix lengths of an `a` or `mx` mechanism
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DualCidr {
    /// Prefix applied to IPv4 results
    pub v4: Option<u8>,
    /// Prefix applied to IPv6 results
    pub v6: Option<u8>,
}

/// A parsed SPF term
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// `ip4:<network>`, value kept verbatim
    Ip4(String),
    /// `ip6:<network>`, value kept verbatim
    Ip6(String),
    /// `include:<domain>`
    Include(String),
    /// `redirect=<domain>`
    Redirect(String),
    /// `a[:<domain>][/<cidr>][//<cidr6>]`
    A {
        domain: Option<String>,
        cidr: DualCidr,
    },
    /// `mx[:<domain>][/<cidr>][//<cidr6>]`
    Mx {
        domain: Option<String>,
        cidr: DualCidr,
    },
    /// Contributes nothing to the flattened result
    Ignored,
}

/// Parse one SPF term
///
/// Terms with a non-pass qualifier (`-`, `~`, `?`) are ignored; a `+`
/// qualifier is stripped.
pub fn parse_term(raw: &str) -> Result<Term> {
    let raw = raw.trim();
    let body = match raw.chars().next() {
        Some('-' | '~' | '?') => return Ok(Term::Ignored),
        Some('+') => &raw[1..],
        Some(_) => raw,
        None => return Ok(Term::Ignored),
    };
    let lower = body.to_ascii_lowercase();

    if lower == "v=spf1" || lower == "all" || lower == "ptr" || lower.starts_with("ptr:") {
        return Ok(Term::Ignored);
    }
    if lower.starts_with("exp=") || lower.starts_with("exists:") {
        return Ok(Term::Ignored);
    }

    if let Some(value) = strip_prefix_ci(body, "ip4:") {
        return non_empty(raw, value).map(|v| Term::Ip4(v.to_string()));
    }
    if let Some(value) = strip_prefix_ci(body, "ip6:") {
        return non_empty(raw, value).map(|v| Term::Ip6(v.to_string()));
    }
    if let Some(value) = strip_prefix_ci(body, "include:") {
        return domain_spec(raw, value).map(Term::Include);
    }
    if let Some(value) = strip_prefix_ci(body, "redirect=") {
        return domain_spec(raw, value).map(Term::Redirect);
    }
    if let Some(rest) = strip_mechanism(body, "mx") {
        let (domain, cidr) = host_and_cidr(raw, rest)?;
        return Ok(Term::Mx { domain, cidr });
    }
    if let Some(rest) = strip_mechanism(body, "a") {
        let (domain, cidr) = host_and_cidr(raw, rest)?;
        return Ok(Term::A { domain, cidr });
    }

    tracing::warn!("Ignoring unsupported SPF term: {}", raw);
    Ok(Term::Ignored)
}

fn strip_prefix_ci<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}

/// `a`, `a:...`, `a/...` but not `all`
fn strip_mechanism<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    let rest = strip_prefix_ci(body, name)?;
    match rest.chars().next() {
        None | Some(':') | Some('/') => Some(rest),
        Some(_) => None,
    }
}

fn non_empty<'a>(raw: &str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() {
        return Err(Error::crawler(format!("Malformed SPF term: {}", raw)));
    }
    Ok(value)
}

fn domain_spec(raw: &str, value: &str) -> Result<String> {
    let value = non_empty(raw, value)?;
    if value.contains('%') {
        return Err(Error::crawler(format!(
            "SPF macros are not supported: {}",
            raw
        )));
    }
    Ok(value.trim_end_matches('.').to_string())
}

fn host_and_cidr(raw: &str, rest: &str) -> Result<(Option<String>, DualCidr)> {
    let (host, cidr) = match rest.find('/') {
        Some(slash) => (&rest[..slash], &rest[slash..]),
        None => (rest, ""),
    };

    let domain = match host.strip_prefix(':') {
        Some(domain) => Some(domain_spec(raw, domain)?),
        None => None,
    };

    Ok((domain, parse_dual_cidr(raw, cidr)?))
}

/// Parse `""`, `/24`, `//64` or `/24//64`
fn parse_dual_cidr(raw: &str, value: &str) -> Result<DualCidr> {
    let malformed = || Error::crawler(format!("Malformed CIDR in SPF term: {}", raw));
    let parse = |digits: &str, max: u8| -> Result<u8> {
        digits
            .parse::<u8>()
            .ok()
            .filter(|bits| *bits <= max)
            .ok_or_else(malformed)
    };

    if value.is_empty() {
        return Ok(DualCidr::default());
    }
    if let Some(v6) = value.strip_prefix("//") {
        return Ok(DualCidr {
            v4: None,
            v6: Some(parse(v6, V6_BITS)?),
        });
    }

    let value = value.strip_prefix('/').ok_or_else(malformed)?;
    match value.split_once("//") {
        Some((v4, v6)) => Ok(DualCidr {
            v4: Some(parse(v4, V4_BITS)?),
            v6: Some(parse(v6, V6_BITS)?),
        }),
        None => Ok(DualCidr {
            v4: Some(parse(value, V4_BITS)?),
            v6: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_terms_are_verbatim() {
        assert_eq!(
            parse_term("ip4:10.0.0.0/24").unwrap(),
            Term::Ip4("10.0.0.0/24".to_string())
        );
        assert_eq!(
            parse_term("+IP6:2001:db8::/32").unwrap(),
            Term::Ip6("2001:db8::/32".to_string())
        );
    }

    #[test]
    fn test_non_pass_qualifiers_are_ignored() {
        assert_eq!(parse_term("-ip4:10.0.0.0/24").unwrap(), Term::Ignored);
        assert_eq!(parse_term("~include:_spf.example.net").unwrap(), Term::Ignored);
        assert_eq!(parse_term("?a").unwrap(), Term::Ignored);
        assert_eq!(parse_term("-all").unwrap(), Term::Ignored);
    }

    #[test]
    fn test_non_address_terms_are_ignored() {
        for term in [
            "v=spf1",
            "all",
            "ptr",
            "ptr:example.com",
            "exp=explain.example.com",
            "exists:%{i}.example.com",
        ] {
            assert_eq!(parse_term(term).unwrap(), Term::Ignored, "{}", term);
        }
    }

    #[test]
    fn test_include_and_redirect() {
        assert_eq!(
            parse_term("include:_spf.example.net.").unwrap(),
            Term::Include("_spf.example.net".to_string())
        );
        assert_eq!(
            parse_term("redirect=_spf.example.com").unwrap(),
            Term::Redirect("_spf.example.com".to_string())
        );
    }

    #[test]
    fn test_a_and_mx_forms() {
        assert_eq!(
            parse_term("a").unwrap(),
            Term::A {
                domain: None,
                cidr: DualCidr::default()
            }
        );
        assert_eq!(
            parse_term("a:mail.example.com/24").unwrap(),
            Term::A {
                domain: Some("mail.example.com".to_string()),
                cidr: DualCidr {
                    v4: Some(24),
                    v6: None
                }
            }
        );
        assert_eq!(
            parse_term("mx//64").unwrap(),
            Term::Mx {
                domain: None,
                cidr: DualCidr {
                    v4: None,
                    v6: Some(64)
                }
            }
        );
        assert_eq!(
            parse_term("mx:example.org/28//56").unwrap(),
            Term::Mx {
                domain: Some("example.org".to_string()),
                cidr: DualCidr {
                    v4: Some(28),
                    v6: Some(56)
                }
            }
        );
    }

    #[test]
    fn test_malformed_terms_are_errors() {
        assert!(parse_term("ip4:").is_err());
        assert!(parse_term("include:").is_err());
        assert!(parse_term("a/33").is_err());
        assert!(parse_term("mx//129").is_err());
        assert!(parse_term("a:host/x").is_err());
        assert!(parse_term("include:%{d}.example.com").is_err());
    }

    #[test]
    fn test_unknown_terms_are_ignored() {
        assert_eq!(parse_term("foo=bar").unwrap(), Term::Ignored);
        assert_eq!(parse_term("").unwrap(), Term::Ignored);
    }
}
