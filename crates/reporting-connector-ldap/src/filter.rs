//! LDAP search filters.

/// Escape special characters in LDAP filter values (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// Person by mail address or mail alias.
pub fn person_filter(alias_attribute: &str, email: &str) -> String {
    let email = escape_filter_value(email);
    format!("(&(|(mail={email})({alias_attribute}={email}))(objectClass=posixAccount))")
}

/// Account by login name.
pub fn account_filter(username: &str) -> String {
    format!(
        "(&(uid={})(objectClass=posixAccount))",
        escape_filter_value(username)
    )
}

/// Groups whose name contains `fragment` and which list the account as a member.
pub fn membership_filter(fragment: &str, username: &str) -> String {
    format!(
        "(&(cn=*{}*)(member=uid={}*))",
        escape_filter_value(fragment),
        escape_filter_value(username)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("plain"), "plain");
        assert_eq!(escape_filter_value("a*b"), "a\\2ab");
        assert_eq!(escape_filter_value("(x)"), "\\28x\\29");
        assert_eq!(escape_filter_value("back\\slash"), "back\\5cslash");
        assert_eq!(escape_filter_value("nul\0"), "nul\\00");
    }

    #[test]
    fn test_person_filter() {
        assert_eq!(
            person_filter("rhatPreferredAlias", "alice@redhat.com"),
            "(&(|(mail=alice@redhat.com)(rhatPreferredAlias=alice@redhat.com))(objectClass=posixAccount))"
        );
    }

    #[test]
    fn test_person_filter_escapes_injection() {
        let filter = person_filter("alias", "*)(uid=*");
        assert!(!filter.contains("(uid=*"));
        assert!(filter.contains("\\2a\\29\\28uid=\\2a"));
    }

    #[test]
    fn test_account_and_membership_filters() {
        assert_eq!(
            account_filter("jdoe"),
            "(&(uid=jdoe)(objectClass=posixAccount))"
        );
        assert_eq!(
            membership_filter("geo", "jdoe"),
            "(&(cn=*geo*)(member=uid=jdoe*))"
        );
        assert_eq!(
            membership_filter("partner", "j*"),
            "(&(cn=*partner*)(member=uid=j\\2a*))"
        );
    }
}
