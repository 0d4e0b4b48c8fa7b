//! URL slugs for products, categories and subcategories.

/// Lower-case ASCII slug: alphanumerics kept, everything else collapsed to a
/// single `-`, no leading or trailing dashes.
///
/// ```
/// use emporium_core::slug::slugify;
///
/// assert_eq!(slugify("  Men's T-Shirts & Tops "), "men-s-t-shirts-tops");
/// ```
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Whether a client-supplied slug is already in canonical form.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Summer Sale 2025"), "summer-sale-2025");
        assert_eq!(slugify("--Already--dashed--"), "already-dashed");
        assert_eq!(slugify("Café Crème"), "caf-cr-me");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("kitchen-tools"));
        assert!(!is_valid_slug("Kitchen Tools"));
        assert!(!is_valid_slug("-x"));
        assert!(!is_valid_slug(""));
    }
}
