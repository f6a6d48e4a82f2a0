use crate::db::{CategoryStore, StoreError};
use crate::models::{Category, NewCategory};

pub const DEFAULT_CATEGORY_NAME: &str = "General";
pub const DEFAULT_CATEGORY_SLUG: &str = "general";
pub const DEFAULT_CATEGORY_COLOR: &str = "#6B7280";

/// Exact, case-sensitive name match against the local taxonomy; anything else
/// lands in `default`.
pub fn resolve(category_hint: &str, available: &[Category], default: &Category) -> Category {
    available
        .iter()
        .find(|category| category.name == category_hint)
        .unwrap_or(default)
        .clone()
}

/// Looks up the `general` category, creating it when absent.
pub fn ensure_default_category(store: &dyn CategoryStore) -> Result<Category, StoreError> {
    if let Some(category) = store.find_by_slug(DEFAULT_CATEGORY_SLUG)? {
        return Ok(category);
    }
    tracing::info!("creating default category");
    store.create_category(NewCategory::new(
        DEFAULT_CATEGORY_NAME,
        DEFAULT_CATEGORY_SLUG,
        DEFAULT_CATEGORY_COLOR,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    fn category(id: i64, name: &str, slug: &str) -> Category {
        Category {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
            color: "#FFFFFF".to_string(),
        }
    }

    #[test]
    fn resolves_documented_hints() {
        let available = vec![
            category(1, "Music", "music"),
            category(2, "Theater", "theater"),
            category(3, "Arts & Culture", "arts-culture"),
            category(4, "General", "general"),
        ];
        let default = available[3].clone();

        let table = [
            ("Music", "Music"),
            ("Theater", "Theater"),
            ("Arts & Culture", "Arts & Culture"),
            ("General", "General"),
            ("music", "General"),
            ("Underwater Basket Weaving", "General"),
            ("", "General"),
        ];
        for _ in 0..3 {
            for (hint, expected) in table {
                assert_eq!(resolve(hint, &available, &default).name, expected, "hint={hint}");
            }
        }
    }

    #[test]
    fn empty_taxonomy_always_defaults() {
        let default = category(9, "General", "general");
        assert_eq!(resolve("Music", &[], &default), default);
    }

    #[test]
    fn default_category_is_created_once() {
        let store = Store::open_in_memory().expect("open store");
        let created = ensure_default_category(&store).expect("create default");
        assert_eq!(created.name, "General");
        assert_eq!(created.slug, "general");
        assert_eq!(created.color, "#6B7280");

        let again = ensure_default_category(&store).expect("lookup default");
        assert_eq!(again, created);
        assert_eq!(store.list_categories().expect("list").len(), 1);
    }

    #[test]
    fn seeded_general_category_is_reused() {
        let store = Store::open_in_memory().expect("open store");
        crate::db::seed_categories(&store).expect("seed");
        let general = ensure_default_category(&store).expect("lookup default");
        assert_eq!(general.color, "#B2BEC3");
    }
}
