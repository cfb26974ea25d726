use crate::error::AppError;

pub const MAX_SLUG_LEN: usize = 128;

/// Derive a URL slug from a title: lowercase ASCII alphanumerics joined by
/// single hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Validate a client-supplied slug.
pub fn validate_slug(slug: &str) -> Result<(), AppError> {
    if slug.is_empty() || slug.len() > MAX_SLUG_LEN {
        return Err(AppError::Validation(format!(
            "Slug must be 1-{MAX_SLUG_LEN} characters"
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(AppError::Validation(
            "Slug may only contain lowercase letters, digits, and hyphens".into(),
        ));
    }
    if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err(AppError::Validation(
            "Slug must not start or end with a hyphen or contain consecutive hyphens".into(),
        ));
    }
    Ok(())
}

/// Use the supplied slug, or derive one from the title.
pub fn resolve_slug(explicit: Option<&str>, title: &str) -> Result<String, AppError> {
    let slug = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.to_string(),
        None => slugify(title),
    };
    validate_slug(&slug)?;
    Ok(slug)
}
