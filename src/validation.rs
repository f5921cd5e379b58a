pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), String> {
    let len = value.len();
    if len < min || len > max {
        return Err(format!(
            "{field} must be between {min} and {max} characters (got {len})"
        ));
    }
    Ok(())
}

pub fn check_not_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

/// Resource names are the cross-call correlation key, so they end up in URL paths.
pub fn check_name(field: &str, value: &str) -> Result<(), String> {
    check_length(field, value, 1, 255)?;
    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(format!(
            "{field} must contain only alphanumeric characters, hyphens, underscores, or dots (got {value:?})"
        ));
    }
    Ok(())
}

pub fn check_url(field: &str, value: &str) -> Result<(), String> {
    check_length(field, value, 1, 2048)?;
    let parsed = url::Url::parse(value).map_err(|e| format!("{field} is not a valid url: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("{field} must use http or https scheme"));
    }
    Ok(())
}
