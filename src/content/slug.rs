/*!
 * Slug generation for localized records.
 */

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{ContentRecord, ContentRepository, SlugField, SlugScope, SlugUniqueness};

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("Invalid slug regex"));

/// Upper bound of numeric suffixes tried before giving up
const MAX_SUFFIX: u32 = 1000;

/// Lower-case `text` and join its words with dashes
pub fn slugify(text: &str) -> String {
    NON_SLUG_CHARS
        .replace_all(&text.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Build the slug of a record from the field's source fields
///
/// Returns `None` when none of the source fields has a value.
pub fn build_slug(field: &SlugField, record: &ContentRecord) -> Option<String> {
    let parts: Vec<String> = field
        .source_fields
        .iter()
        .filter_map(|name| record.fields.get(name))
        .map(|value| slugify(value))
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        return None;
    }

    let slug = parts.join("/");
    Some(if field.leading_slash { format!("/{}", slug) } else { slug })
}

/// Scope a slug field's uniqueness policy covers for `record`
pub fn scope_for(field: &SlugField, record: &ContentRecord, site_root: i64) -> SlugScope {
    match field.uniqueness {
        SlugUniqueness::Site => SlugScope::Site { root_page_id: site_root },
        SlugUniqueness::Parent => SlugScope::Parent { pid: record.pid },
        SlugUniqueness::Table => SlugScope::Table,
    }
}

/// Make `base` unique in the field's scope by appending `-1`, `-2`, ...
pub async fn unique_slug(
    content: &dyn ContentRepository,
    record: &ContentRecord,
    field: &SlugField,
    base: &str,
    site_root: i64,
) -> Result<String> {
    let scope = scope_for(field, record, site_root);

    if !content.slug_exists(record, &field.field, base, scope).await? {
        return Ok(base.to_string());
    }

    for suffix in 1..=MAX_SUFFIX {
        let candidate = format!("{}-{}", base, suffix);
        if !content.slug_exists(record, &field.field, &candidate, scope).await? {
            return Ok(candidate);
        }
    }

    Err(anyhow::anyhow!(
        "No unique value for {}.{} based on '{}'",
        record.table,
        field.field,
        base
    ))
}

/// Regenerate every slug field of a freshly localized record
///
/// Returns true when at least one field changed.
pub async fn regenerate_slugs(
    content: &dyn ContentRepository,
    record: &mut ContentRecord,
    fields: &[SlugField],
    site_root: i64,
) -> Result<bool> {
    let mut changed = false;

    for field in fields {
        let Some(base) = build_slug(field, record) else {
            continue;
        };
        let slug = unique_slug(content, record, field, &base, site_root).await?;
        if record.fields.get(&field.field) != Some(&slug) {
            record.fields.insert(field.field.clone(), slug);
            changed = true;
        }
    }

    Ok(changed)
}
