//! Phone number handling shared by the patient records and the WhatsApp bridge.
//!
//! Numbers are stored as international digits without `+` (`5511987654321`), which is the
//! form the WhatsApp gateway expects. Chatwoot wants E.164 with the leading `+`.

const MIN_DIGITS: usize = 8;
const MAX_DIGITS: usize = 15;

/// Normalises a raw phone number or WhatsApp JID into international digits.
///
/// JIDs and `+`/`00` prefixed numbers are already international and are kept as they are;
/// only bare national numbers get `default_country_code`. Returns `None` for
/// group/broadcast JIDs and for inputs that cannot be a phone number.
pub fn normalize_phone(raw: &str, default_country_code: &str) -> Option<String> {
    normalize(raw, Some(default_country_code))
}

/// Normalises digits known to be international already, such as a WhatsApp JID or a
/// Chatwoot `source_id`. No country code is ever added.
pub fn normalize_international_phone(raw: &str) -> Option<String> {
    normalize(raw, None)
}

fn normalize(raw: &str, default_country_code: Option<&str>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let (local, is_jid) = match raw.split_once('@') {
        Some((local, domain)) => {
            if domain.starts_with("g.us") || domain.starts_with("broadcast") || domain.starts_with("newsletter") {
                return None;
            }
            // multi-device JIDs carry a ":<device>" suffix
            (local.split(':').next().unwrap_or(local), true)
        }
        None => (raw, false),
    };

    let mut digits: String = local.chars().filter(|c| c.is_ascii_digit()).collect();

    match default_country_code {
        Some(country_code) if !is_jid && !local.starts_with('+') => {
            if let Some(rest) = digits.strip_prefix("00") {
                digits = rest.to_string();
            } else {
                if let Some(rest) = digits.strip_prefix('0') {
                    digits = rest.to_string();
                }
                if matches!(digits.len(), 10 | 11) && !country_code.is_empty() {
                    digits = format!("{}{}", country_code, digits);
                }
            }
        }
        _ => {}
    }

    if digits.len() < MIN_DIGITS || digits.len() > MAX_DIGITS {
        return None;
    }

    Some(digits)
}

/// Formats normalised digits as E.164 (`+5511987654321`).
pub fn to_e164(digits: &str) -> String {
    if digits.starts_with('+') {
        digits.to_string()
    } else {
        format!("+{}", digits)
    }
}

/// Brazilian mobiles gained a leading 9 in 2012-2016; WhatsApp still reports
/// some accounts without it. Drops that digit so both spellings compare equal.
fn without_brazilian_ninth_digit(digits: &str) -> String {
    if digits.len() == 13 && digits.starts_with("55") && digits.as_bytes()[4] == b'9' {
        format!("{}{}", &digits[..4], &digits[5..])
    } else {
        digits.to_string()
    }
}

/// True when both inputs name the same phone line.
pub fn phones_match(a: &str, b: &str, default_country_code: &str) -> bool {
    match (
        normalize_phone(a, default_country_code),
        normalize_phone(b, default_country_code),
    ) {
        (Some(a), Some(b)) => {
            a == b || without_brazilian_ninth_digit(&a) == without_brazilian_ninth_digit(&b)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn national_numbers_get_country_code() {
        assert_eq!(normalize_phone("(11) 98765-4321", "55").as_deref(), Some("5511987654321"));
        assert_eq!(normalize_phone("11 8765-4321", "55").as_deref(), Some("551187654321"));
        assert_eq!(normalize_phone("011 98765-4321", "55").as_deref(), Some("5511987654321"));
    }

    #[test]
    fn international_forms_are_kept() {
        assert_eq!(normalize_phone("+55 11 98765-4321", "55").as_deref(), Some("5511987654321"));
        assert_eq!(normalize_phone("+1 415 555 2671", "55").as_deref(), Some("14155552671"));
        assert_eq!(normalize_phone("00351 912 345 678", "55").as_deref(), Some("351912345678"));
        assert_eq!(normalize_phone("5511987654321", "55").as_deref(), Some("5511987654321"));
    }

    #[test]
    fn jids_are_unwrapped() {
        assert_eq!(
            normalize_phone("5511987654321@s.whatsapp.net", "55").as_deref(),
            Some("5511987654321")
        );
        assert_eq!(
            normalize_phone("5511987654321:17@s.whatsapp.net", "55").as_deref(),
            Some("5511987654321")
        );
        assert_eq!(
            normalize_phone("14155552671@s.whatsapp.net", "55").as_deref(),
            Some("14155552671")
        );
        assert_eq!(normalize_phone("120363025246125486@g.us", "55"), None);
        assert_eq!(normalize_phone("status@broadcast", "55"), None);
    }

    #[test]
    fn international_digits_never_get_a_country_code() {
        assert_eq!(normalize_international_phone("14155552671").as_deref(), Some("14155552671"));
        assert_eq!(normalize_international_phone("4420794601").as_deref(), Some("4420794601"));
        assert_eq!(normalize_international_phone("+5511987654321").as_deref(), Some("5511987654321"));
        assert_eq!(normalize_international_phone("abc"), None);
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(normalize_phone("", "55"), None);
        assert_eq!(normalize_phone("1234", "55"), None);
        assert_eq!(normalize_phone("+1234567890123456789", "55"), None);
    }

    #[test]
    fn e164_adds_plus_once() {
        assert_eq!(to_e164("5511987654321"), "+5511987654321");
        assert_eq!(to_e164("+5511987654321"), "+5511987654321");
    }

    #[test]
    fn matching_tolerates_ninth_digit_and_formatting() {
        assert!(phones_match("+55 (11) 98765-4321", "5511987654321@s.whatsapp.net", "55"));
        assert!(phones_match("551187654321", "5511987654321", "55"));
        assert!(!phones_match("5511987654321", "5511987654322", "55"));
        assert!(!phones_match("", "5511987654321", "55"));
    }
}
