//! Date helper functions

use chrono::{DateTime, Locale, TimeZone, Utc};

/// Format a date using a date-fns style pattern, localized and shifted to `tz`
///
/// # Examples
/// ```ignore
/// format_date(&date, "dd MMM yyyy", "pt-BR", chrono_tz::UTC) // -> "06 mai 2020"
/// ```
pub fn format_date<Tz: TimeZone>(
    date: &DateTime<Utc>,
    pattern: &str,
    language: &str,
    tz: Tz,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let chrono_format = date_fns_to_chrono_format(pattern);
    date.with_timezone(&tz)
        .format_localized(&chrono_format, locale_for(language))
        .to_string()
}

/// Format a date in RFC 3339 / XML format
pub fn date_xml(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string()
}

/// Map a language tag such as `pt-BR` or `en` to a chrono locale
pub fn locale_for(language: &str) -> Locale {
    let normalized = language.trim().replace('-', "_");
    if let Ok(locale) = Locale::try_from(normalized.as_str()) {
        return locale;
    }

    // Bare language: try the language's own region (pt -> pt_PT, de -> de_DE)
    if !normalized.contains('_') && !normalized.is_empty() {
        let guess = match normalized.as_str() {
            "en" => "en_US".to_string(),
            lang => format!("{}_{}", lang, lang.to_uppercase()),
        };
        if let Ok(locale) = Locale::try_from(guess.as_str()) {
            return locale;
        }
    }

    Locale::POSIX
}

/// Convert a date-fns format string to a chrono one
///
/// Letters form tokens by repetition; text inside single quotes is literal.
fn date_fns_to_chrono_format(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut result = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            // Quoted literal; '' is an escaped quote
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        result.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut result, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut result, c);
            i += 1;
            continue;
        }

        let mut len = 1;
        while i + len < chars.len() && chars[i + len] == c {
            len += 1;
        }

        match (c, len) {
            ('y', 2) => result.push_str("%y"),
            ('y', _) => result.push_str("%Y"),
            ('M', 1) => result.push_str("%-m"),
            ('M', 2) => result.push_str("%m"),
            ('M', 3) => result.push_str("%b"),
            ('M', _) => result.push_str("%B"),
            ('d', 1) => result.push_str("%-d"),
            ('d', _) => result.push_str("%d"),
            ('H', 1) => result.push_str("%-H"),
            ('H', _) => result.push_str("%H"),
            ('h', 1) => result.push_str("%-I"),
            ('h', _) => result.push_str("%I"),
            ('m', 1) => result.push_str("%-M"),
            ('m', _) => result.push_str("%M"),
            ('s', 1) => result.push_str("%-S"),
            ('s', _) => result.push_str("%S"),
            ('E', 4) => result.push_str("%A"),
            ('E', _) => result.push_str("%a"),
            ('a', _) => result.push_str("%p"),
            _ => {
                for _ in 0..len {
                    push_literal(&mut result, c);
                }
            }
        }
        i += len;
    }

    result
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}
