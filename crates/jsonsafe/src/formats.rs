//! Format matchers for the `format` keyword.
//!
//! Formats are grouped in three tables: core formats are always available, weak formats are
//! turned off by `disableWeakFormats` and by the strict mode, extra formats have to be enabled
//! with `enableExtraFormats`. Custom formats registered on the options take precedence over all
//! of them.
use std::{
    net::{Ipv4Addr, Ipv6Addr},
    str::FromStr,
    sync::Arc,
};

use email_address::EmailAddress;
use unicode_general_category::{get_general_category, GeneralCategory};
use url::Url;
use uuid_simd::{parse_hyphenated, Out};

use crate::{options::Mode, primitives, regex::CompiledRegex, ValidationOptions};

/// A user-provided format matcher.
pub type Format = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormatKind {
    Core,
    Weak,
    Extra,
}

#[derive(Clone)]
pub(crate) enum FormatCheck {
    Builtin(fn(&str) -> bool),
    Custom(Format),
}

impl FormatCheck {
    #[inline]
    pub(crate) fn is_match(&self, value: &str) -> bool {
        match self {
            FormatCheck::Builtin(check) => check(value),
            FormatCheck::Custom(check) => check(value),
        }
    }
}

pub(crate) fn builtin(name: &str) -> Option<(FormatKind, fn(&str) -> bool)> {
    let entry: (FormatKind, fn(&str) -> bool) = match name {
        "date" => (FormatKind::Core, is_valid_date),
        "time" => (FormatKind::Core, is_valid_time),
        "date-time" => (FormatKind::Core, is_valid_datetime),
        "duration" => (FormatKind::Core, is_valid_duration),
        "email" | "idn-email" => (FormatKind::Core, is_valid_email),
        "hostname" => (FormatKind::Core, is_valid_hostname),
        "idn-hostname" => (FormatKind::Core, is_valid_idn_hostname),
        "ipv4" => (FormatKind::Core, is_valid_ipv4),
        "ipv6" => (FormatKind::Core, is_valid_ipv6),
        "uri" => (FormatKind::Core, is_valid_uri),
        "uri-reference" => (FormatKind::Core, is_valid_uri_reference),
        "uuid" => (FormatKind::Core, is_valid_uuid),
        "json-pointer" => (FormatKind::Core, is_valid_json_pointer),
        "relative-json-pointer" => (FormatKind::Core, is_valid_relative_json_pointer),
        "regex" => (FormatKind::Weak, is_valid_regex),
        "uri-template" => (FormatKind::Weak, is_valid_uri_template),
        "iri" => (FormatKind::Weak, is_valid_iri),
        "iri-reference" => (FormatKind::Weak, is_valid_iri_reference),
        "alpha" => (FormatKind::Extra, is_alpha),
        "alphanumeric" => (FormatKind::Extra, is_alphanumeric),
        "hex" => (FormatKind::Extra, is_hex),
        "identifier" => (FormatKind::Extra, is_identifier),
        "base64" => (FormatKind::Extra, is_base64),
        _ => return None,
    };
    Some(entry)
}

/// Find the matcher for `name` under the given options.
pub(crate) fn lookup(name: &str, options: &ValidationOptions) -> Option<FormatCheck> {
    if let Some(custom) = options.custom_formats.get(name) {
        return Some(FormatCheck::Custom(Arc::clone(custom)));
    }
    let (kind, check) = builtin(name)?;
    let enabled = match kind {
        FormatKind::Core => true,
        FormatKind::Weak => !options.disable_weak_formats && options.mode != Mode::Strict,
        FormatKind::Extra => options.enable_extra_formats,
    };
    enabled.then_some(FormatCheck::Builtin(check))
}

fn parse_digits(value: &str) -> Option<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn is_leap_year(year: u32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn is_valid_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let (Some(year), Some(month), Some(day)) = (
        parse_digits(&value[..4]),
        parse_digits(&value[5..7]),
        parse_digits(&value[8..]),
    ) else {
        return false;
    };
    let days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => return false,
    };
    (1..=days).contains(&day)
}

fn is_valid_time(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() < 9 || !value.is_ascii() || bytes[2] != b':' || bytes[5] != b':' {
        return false;
    }
    let (Some(hour), Some(minute), Some(second)) = (
        parse_digits(&value[..2]),
        parse_digits(&value[3..5]),
        parse_digits(&value[6..8]),
    ) else {
        return false;
    };
    if hour > 23 || minute > 59 || second > 60 {
        return false;
    }
    let mut rest = &value[8..];
    if let Some(fraction) = rest.strip_prefix('.') {
        let digits = fraction.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return false;
        }
        rest = &fraction[digits..];
    }
    let offset_minutes: i64 = if rest.eq_ignore_ascii_case("z") {
        0
    } else {
        let sign = match rest.as_bytes().first() {
            Some(b'+') => 1,
            Some(b'-') => -1,
            _ => return false,
        };
        let offset = &rest[1..];
        if offset.len() != 5 || offset.as_bytes()[2] != b':' {
            return false;
        }
        let (Some(offset_hour), Some(offset_minute)) =
            (parse_digits(&offset[..2]), parse_digits(&offset[3..]))
        else {
            return false;
        };
        if offset_hour > 23 || offset_minute > 59 {
            return false;
        }
        sign * i64::from(offset_hour * 60 + offset_minute)
    };
    if second == 60 {
        // Leap seconds are only valid at 23:59 UTC.
        let utc = (i64::from(hour * 60 + minute) - offset_minutes).rem_euclid(24 * 60);
        return utc == 23 * 60 + 59;
    }
    true
}

fn is_valid_datetime(value: &str) -> bool {
    if value.len() < 11 || !value.is_ascii() {
        return false;
    }
    let (date, rest) = value.split_at(10);
    let Some(time) = rest.strip_prefix(&['T', 't'][..]) else {
        return false;
    };
    is_valid_date(date) && is_valid_time(time)
}

fn is_valid_duration(value: &str) -> bool {
    let Some(body) = value.strip_prefix('P') else {
        return false;
    };
    if body.is_empty() {
        return false;
    }
    if let Some(weeks) = body.strip_suffix('W') {
        return parse_digits(weeks).is_some();
    }
    let (date, time) = match body.split_once('T') {
        Some((_, "")) => return false,
        Some((date, time)) => (date, Some(time)),
        None => (body, None),
    };
    let parse_components = |mut part: &str, units: &[char]| -> Option<usize> {
        let mut position = 0;
        let mut count = 0;
        while !part.is_empty() {
            let digits = part.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 {
                return None;
            }
            let unit = part[digits..].chars().next()?;
            let idx = units[position..].iter().position(|u| *u == unit)?;
            position += idx + 1;
            count += 1;
            part = &part[digits + unit.len_utf8()..];
        }
        Some(count)
    };
    let Some(date_count) = parse_components(date, &['Y', 'M', 'D']) else {
        return false;
    };
    match time {
        Some(time) => parse_components(time, &['H', 'M', 'S']).is_some_and(|count| count > 0),
        None => date_count > 0,
    }
}

fn is_valid_email(value: &str) -> bool {
    EmailAddress::from_str(value).is_ok()
}

fn is_valid_hostname(value: &str) -> bool {
    let value = value.strip_suffix('.').unwrap_or(value);
    if value.is_empty() || value.len() > 253 {
        return false;
    }
    value.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

fn is_valid_idn_hostname(value: &str) -> bool {
    idna::domain_to_ascii_strict(value).is_ok_and(|ascii| is_valid_hostname(&ascii))
}

fn is_valid_ipv4(value: &str) -> bool {
    Ipv4Addr::from_str(value).is_ok()
}

fn is_valid_ipv6(value: &str) -> bool {
    Ipv6Addr::from_str(value).is_ok()
}

const URI_FORBIDDEN: &[char] = &[' ', '<', '>', '"', '{', '}', '|', '\\', '^', '`'];

fn has_forbidden_uri_chars(value: &str, allow_unicode: bool) -> bool {
    value.chars().any(|ch| {
        ch.is_control()
            || ch.is_whitespace()
            || URI_FORBIDDEN.contains(&ch)
            || (!allow_unicode && !ch.is_ascii())
    })
}

fn parse_reference(value: &str) -> bool {
    if Url::parse(value).is_ok() {
        return true;
    }
    Url::parse("http://example.com/").is_ok_and(|base| base.join(value).is_ok())
}

fn is_valid_uri(value: &str) -> bool {
    !has_forbidden_uri_chars(value, false) && Url::parse(value).is_ok()
}

fn is_valid_uri_reference(value: &str) -> bool {
    !has_forbidden_uri_chars(value, false) && parse_reference(value)
}

fn is_valid_iri(value: &str) -> bool {
    !has_forbidden_uri_chars(value, true) && Url::parse(value).is_ok()
}

fn is_valid_iri_reference(value: &str) -> bool {
    !has_forbidden_uri_chars(value, true) && parse_reference(value)
}

fn is_valid_uri_template(value: &str) -> bool {
    let mut open = false;
    for ch in value.chars() {
        match ch {
            '{' if open => return false,
            '{' => open = true,
            '}' if !open => return false,
            '}' => open = false,
            _ => {}
        }
    }
    !open
}

fn is_valid_uuid(value: &str) -> bool {
    let mut out = [0; 16];
    parse_hyphenated(value.as_bytes(), Out::from_mut(&mut out)).is_ok()
}

fn is_valid_json_pointer(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    if !value.starts_with('/') {
        return false;
    }
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '~' && !matches!(chars.next(), Some('0' | '1')) {
            return false;
        }
    }
    true
}

fn is_valid_relative_json_pointer(value: &str) -> bool {
    let digits = value.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || (digits > 1 && value.starts_with('0')) {
        return false;
    }
    let rest = &value[digits..];
    rest == "#" || is_valid_json_pointer(rest)
}

fn is_valid_regex(value: &str) -> bool {
    CompiledRegex::new(value).is_ok()
}

fn is_alpha(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_alphabetic())
}

fn is_alphanumeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn is_hex(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_identifier_start(ch: char) -> bool {
    ch == '_'
        || ch == '$'
        || matches!(
            get_general_category(ch),
            GeneralCategory::UppercaseLetter
                | GeneralCategory::LowercaseLetter
                | GeneralCategory::TitlecaseLetter
                | GeneralCategory::ModifierLetter
                | GeneralCategory::OtherLetter
                | GeneralCategory::LetterNumber
        )
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next().is_some_and(is_identifier_start)
        && chars.all(|ch| {
            is_identifier_start(ch)
                || matches!(
                    get_general_category(ch),
                    GeneralCategory::DecimalNumber
                        | GeneralCategory::NonspacingMark
                        | GeneralCategory::SpacingMark
                        | GeneralCategory::ConnectorPunctuation
                )
        })
}

fn is_base64(value: &str) -> bool {
    primitives::decode_base64(value).is_some()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use test_case::test_case;

    use super::{builtin, lookup};
    use crate::options::Mode;

    #[test_case("date", "2020-02-29", true)]
    #[test_case("date", "2021-02-29", false)]
    #[test_case("date", "1900-02-29", false)]
    #[test_case("date", "2020-13-01", false)]
    #[test_case("date", "2020-1-01", false)]
    #[test_case("time", "08:30:06Z", true)]
    #[test_case("time", "08:30:06.283185+01:00", true)]
    #[test_case("time", "23:59:60Z", true)]
    #[test_case("time", "22:59:60Z", false)]
    #[test_case("time", "15:59:60-08:00", true)]
    #[test_case("time", "08:30:06", false)]
    #[test_case("time", "24:00:00Z", false)]
    #[test_case("date-time", "1963-06-19T08:30:06.283185Z", true)]
    #[test_case("date-time", "1963-06-19t08:30:06z", true)]
    #[test_case("date-time", "1963-06-19 08:30:06Z", false)]
    #[test_case("duration", "P4DT12H30M5S", true)]
    #[test_case("duration", "P2W", true)]
    #[test_case("duration", "PT", false)]
    #[test_case("duration", "P", false)]
    #[test_case("duration", "P1D2Y", false)]
    #[test_case("duration", "P1Y2W", false)]
    #[test_case("email", "joe.bloggs@example.com", true)]
    #[test_case("email", "2962", false)]
    #[test_case("hostname", "www.example.com", true)]
    #[test_case("hostname", "-a-host-name", false)]
    #[test_case("hostname", "not_a_valid_host_name", false)]
    #[test_case("idn-hostname", "실례.테스트", true)]
    #[test_case("ipv4", "192.168.0.1", true)]
    #[test_case("ipv4", "256.256.256.256", false)]
    #[test_case("ipv6", "::1", true)]
    #[test_case("ipv6", "12345::", false)]
    #[test_case("uri", "http://foo.bar/?baz=qux#quux", true)]
    #[test_case("uri", "//foo.bar/?baz=qux#quux", false)]
    #[test_case("uri", "http:// shouldfail.com", false)]
    #[test_case("uri-reference", "/abc", true)]
    #[test_case("uri-reference", "\\\\WINDOWS\\fileshare", false)]
    #[test_case("uuid", "2EB8AA08-AA98-11EA-B4AA-73B441D16380", true)]
    #[test_case("uuid", "2eb8aa08-aa98-11ea-b4aa-73b441d1638", false)]
    #[test_case("json-pointer", "/foo/bar~0/baz~1/%a", true)]
    #[test_case("json-pointer", "/foo/bar~", false)]
    #[test_case("json-pointer", "#", false)]
    #[test_case("relative-json-pointer", "1/foo", true)]
    #[test_case("relative-json-pointer", "0#", true)]
    #[test_case("relative-json-pointer", "01/a", false)]
    #[test_case("relative-json-pointer", "/foo", false)]
    #[test_case("regex", "([abc])+\\s+$", true)]
    #[test_case("regex", "^(abc]", false)]
    #[test_case("uri-template", "http://example.com/dictionary/{term:1}/{term}", true)]
    #[test_case("uri-template", "http://example.com/dictionary/{term:1}/{term", false)]
    #[test_case("iri", "http://ƒøø.ßår/?∂éœ=πîx#πîüx", true)]
    #[test_case("alpha", "abc", true)]
    #[test_case("alpha", "ab1", false)]
    #[test_case("alphanumeric", "ab1", true)]
    #[test_case("hex", "deadBEEF", true)]
    #[test_case("hex", "0x1", false)]
    #[test_case("identifier", "_café1", true)]
    #[test_case("identifier", "1abc", false)]
    #[test_case("base64", "aGVsbG8=", true)]
    #[test_case("base64", "aGVsbG8", false)]
    fn test_builtin(format: &str, value: &str, expected: bool) {
        let (_, check) = builtin(format).expect("Known format");
        assert_eq!(check(value), expected, "{format}: {value}");
    }

    #[test]
    fn test_lookup_tables() {
        let options = crate::options();
        assert!(lookup("date", &options).is_some());
        assert!(lookup("regex", &options).is_some());
        assert!(lookup("hex", &options).is_none());
        assert!(lookup("unknown", &options).is_none());

        let options = crate::options().with_mode(Mode::Strict);
        assert!(lookup("regex", &options).is_none());

        let options = crate::options()
            .with_disable_weak_formats(true)
            .with_enable_extra_formats(true);
        assert!(lookup("uri-template", &options).is_none());
        assert!(lookup("hex", &options).is_some());
    }

    #[test]
    fn test_custom_overrides_builtin() {
        let options =
            crate::options().with_format("date", Arc::new(|value: &str| value == "today"));
        let check = lookup("date", &options).expect("Custom format");
        assert!(check.is_match("today"));
        assert!(!check.is_match("2020-01-01"));
    }
}
