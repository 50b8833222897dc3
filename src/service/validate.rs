//! Field format checks shared by the record store and the admin API.

/// Characters allowed in the local part besides ASCII alphanumerics.
const LOCAL_SPECIALS: &str = ".!#$%&'*+/=?^_`{|}~-";

/// Longest address accepted (RFC 5321 path limit minus the brackets).
const MAX_EMAIL_LEN: usize = 254;

/// Check that `value` looks like `local@domain`.
///
/// The domain is one or more dot-separated labels of 1-63 alphanumerics or
/// hyphens that neither start nor end with a hyphen. A single-label domain
/// (`admin@localhost`) is accepted.
pub fn is_email(value: &str) -> bool {
    if value.is_empty() || value.len() > MAX_EMAIL_LEN {
        return false;
    }

    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };

    if local.is_empty()
        || !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || LOCAL_SPECIALS.contains(c))
    {
        return false;
    }

    !domain.is_empty() && domain.split('.').all(is_domain_label)
}

fn is_domain_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return false;
    }
    if bytes[0] == b'-' || bytes[bytes.len() - 1] == b'-' {
        return false;
    }
    bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_addresses() {
        assert!(is_email("a@b.com"));
        assert!(is_email("first.last+tag@mail.example.org"));
        assert!(is_email("admin@localhost"));
        assert!(is_email("o'brien@x-y.io"));
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        assert!(!is_email(""));
        assert!(!is_email("not-an-email"));
        assert!(!is_email("@b.com"));
        assert!(!is_email("a@"));
        assert!(!is_email("a@b..com"));
        assert!(!is_email("a@-b.com"));
        assert!(!is_email("a b@c.com"));
        assert!(!is_email("a@b.com."));
        assert!(!is_email(&format!("{}@b.com", "a".repeat(260))));
    }
}
