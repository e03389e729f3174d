use std::borrow::Cow;

use validator::ValidationError;

/// Strips formatting and prefixes a country code: ten digits are taken as a
/// North American number (`+1`), longer numbers only gain a `+`.
pub fn normalize_phone(raw: &str) -> Result<String, String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        10 => Ok(format!("+1{}", digits)),
        11..=15 => Ok(format!("+{}", digits)),
        _ => Err(format!(
            "Phone number must contain 10 to 15 digits, got {}",
            digits.len()
        )),
    }
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let phone_regex = regex::Regex::new(r"^\+?[0-9()\-.\s]{10,24}$")
        .map_err(|_| ValidationError::new("Invalid phone regex"))?;

    if !phone_regex.is_match(phone) || normalize_phone(phone).is_err() {
        let mut error = ValidationError::new("invalid_phone");
        error.message = Some(Cow::from(
            "Phone number must be in a valid format (e.g., +15551234567 or 555-123-4567)",
        ));
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_digits_get_us_prefix() {
        assert_eq!(normalize_phone("(555) 123-4567").unwrap(), "+15551234567");
    }

    #[test]
    fn longer_numbers_keep_their_country_code() {
        assert_eq!(normalize_phone("+44 20 7946 0958").unwrap(), "+442079460958");
    }

    #[test]
    fn short_numbers_are_rejected() {
        assert!(normalize_phone("12345").is_err());
        assert!(validate_phone("12345").is_err());
    }

    #[test]
    fn formatted_numbers_validate() {
        assert!(validate_phone("555-123-4567").is_ok());
        assert!(validate_phone("+1 (555) 123-4567").is_ok());
        assert!(validate_phone("call me maybe").is_err());
    }
}
