//! URL slugs for titled documents (games, forum posts, workshop items).

use uuid::Uuid;

use crate::dao::{
    document_store::{Entity, Filter, Repository},
    storage::StorageResult,
};

/// Lowercase ASCII words of `title` joined by single dashes.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch == '\'' {
            continue;
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Pick the first free slug among `base`, `base-1`, `base-2`, ...
///
/// `exclude` skips the document being renamed so it does not collide with
/// itself.
pub async fn unique_slug<T: Entity>(
    repo: &Repository<T>,
    title: &str,
    fallback: &str,
    exclude: Option<Uuid>,
) -> StorageResult<String> {
    let base = match slugify(title) {
        slug if slug.is_empty() => fallback.to_owned(),
        slug => slug,
    };

    let mut candidate = base.clone();
    let mut counter = 1u32;
    loop {
        let mut filter = Filter::eq("slug", candidate.clone());
        if let Some(id) = exclude {
            filter = filter.and(Filter::ne("id", id.to_string()));
        }
        if repo.count(filter).await? == 0 {
            return Ok(candidate);
        }
        candidate = format!("{base}-{counter}");
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Half-Life 2: Episode One"), "half-life-2-episode-one");
        assert_eq!(slugify("  Baldur's   Gate "), "baldurs-gate");
        assert_eq!(slugify("!!!"), "");
    }
}
