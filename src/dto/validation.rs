//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that an access code is 1 to 32 ASCII letters or digits.
///
/// # Examples
///
/// ```ignore
/// validate_access_code("owls42") // Ok
/// validate_access_code("")       // Err - empty
/// validate_access_code("a b")    // Err - space
/// ```
pub fn validate_access_code(code: &str) -> Result<(), ValidationError> {
    if code.is_empty() || code.len() > 32 {
        let mut err = ValidationError::new("access_code_length");
        err.message = Some(
            format!(
                "Access code must be 1 to 32 characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("access_code_format");
        err.message = Some("Access code must contain only letters and digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a media file name is a bare file name with an extension.
pub fn validate_media_name(name: &str) -> Result<(), ValidationError> {
    let bare = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && name.rsplit_once('.').is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty());
    if !bare {
        let mut err = ValidationError::new("media_name");
        err.message = Some(format!("`{name}` is not a plain file name").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_access_code() {
        assert!(validate_access_code("owls42").is_ok());
        assert!(validate_access_code("X").is_ok());
        assert!(validate_access_code("").is_err());
        assert!(validate_access_code("a b").is_err());
        assert!(validate_access_code(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_media_name() {
        assert!(validate_media_name("castle.jpg").is_ok());
        assert!(validate_media_name("round.2.mp3").is_ok());
        assert!(validate_media_name("../etc/passwd").is_err());
        assert!(validate_media_name(".hidden").is_err());
        assert!(validate_media_name("noext").is_err());
        assert!(validate_media_name("dir\\file.png").is_err());
    }
}
