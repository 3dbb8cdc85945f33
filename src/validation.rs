use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// Field name to message, in the order the fields appear on the form.
pub type FieldErrors = IndexMap<&'static str, String>;

pub fn is_valid_email(string: &str) -> Result<(), String> {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
        r#"^(?:(?:[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*|"(?:[\x01-\x08\x0b\x0c\x0e-\x1f\x21\x23-\x5b\x5d-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])*")@(?:(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?|\[(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?|[a-z0-9-]*[a-z0-9]:(?:[\x01-\x08\x0b\x0c\x0e-\x1f\x21-\x5a\x53-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])+)\]))$"#
    ).unwrap()
    });
    match RE.is_match(&string.to_lowercase()) {
        true => Ok(()),
        false => Err("Please enter a valid email address".to_string()),
    }
}

/// Strips everything except digits, so that "98765 43210" and
/// "(987) 654-3210" are both accepted.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Returns the normalized number if it has exactly ten digits.
pub fn is_valid_phone(raw: &str) -> Result<String, String> {
    let digits = normalize_phone(raw);
    match digits.len() == 10 {
        true => Ok(digits),
        false => Err("Phone number must have exactly 10 digits".to_string()),
    }
}

pub fn is_valid_person_name(name: &str) -> Result<(), String> {
    match name.trim().chars().count() >= 2 {
        true => Ok(()),
        false => Err("Name must be at least 2 characters".to_string()),
    }
}

#[cfg(test)]
#[test]
fn test_email() {
    assert!(is_valid_email("hello@example.com").is_ok());
    assert!(is_valid_email("Hello@Example.com").is_ok());
    assert!(is_valid_email("not an email").is_err());
    assert!(is_valid_email("junk a@b.co junk").is_err());
    assert!(is_valid_email("a@b.co trailing").is_err());
}

#[cfg(test)]
#[test]
fn test_phone() {
    assert_eq!(is_valid_phone("98765 43210").unwrap(), "9876543210");
    assert_eq!(is_valid_phone("(987) 654-3210").unwrap(), "9876543210");
    assert!(is_valid_phone("12345").is_err());
    assert!(is_valid_phone("123456789012").is_err());
}

#[cfg(test)]
#[test]
fn test_person_name() {
    assert!(is_valid_person_name("  A ").is_err());
    assert!(is_valid_person_name("Jo").is_ok());
}
