//! Input validation and normalization shared by the handlers.

use crate::errors::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;

pub type ValidationResult<T = ()> = Result<T, AppError>;

/// Trims and lowercases, then checks the `local@domain.tld` shape.
pub fn normalize_email(email: &str) -> ValidationResult<String> {
    let email = email.trim().to_lowercase();

    if email.is_empty() {
        return Err(AppError::validation("Email is required"));
    }
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(AppError::validation("Please use a valid email address"));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(AppError::validation("Please use a valid email address"));
    };
    let domain_ok = domain
        .split_once('.')
        .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
        .unwrap_or(false);
    if local.is_empty() || domain.contains('@') || !domain_ok {
        return Err(AppError::validation("Please use a valid email address"));
    }

    Ok(email)
}

pub fn validate_password(password: &str) -> ValidationResult {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// `"Jane Ann Doe"` -> `("Jane", "Ann Doe")`; a single word leaves the last
/// name empty.
pub fn split_full_name(full_name: &str) -> ValidationResult<(String, String)> {
    let mut parts = full_name.split_whitespace();
    let Some(first) = parts.next() else {
        return Err(AppError::validation("Full name is required"));
    };
    let last = parts.collect::<Vec<_>>().join(" ");
    Ok((first.to_string(), last))
}

pub fn required(field: &str, value: Option<&str>) -> ValidationResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::validation(format!("{field} is required"))),
    }
}

/// Lowercase, alphanumeric runs joined by single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub fn validate_price(field: &str, value: f64) -> ValidationResult {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::validation(format!("{field} must be a non-negative number")));
    }
    Ok(())
}

pub fn validate_discount(value: f64) -> ValidationResult {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(AppError::validation("discountPercentage must be between 0 and 100"));
    }
    Ok(())
}
