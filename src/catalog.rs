//! Category tree loaded from a JSON array of descriptors.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// One node of the two-level category tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDescriptor {
    pub id: String,
    pub name: String,
    /// `None` for top-level categories.
    #[serde(default, alias = "parent")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Products wanted for this category; the configured default applies when absent.
    #[serde(default, alias = "quota")]
    pub product_quota: Option<usize>,
}

impl CategoryDescriptor {
    pub fn level(&self) -> u8 {
        if self.parent_id.is_some() {
            1
        } else {
            0
        }
    }

    /// Search queries for this category: its keywords, else its name.
    pub fn queries(&self, max: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        let keywords = self
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .filter(|k| seen.insert(k.to_lowercase()))
            .map(str::to_string);

        let mut queries: Vec<String> = keywords.take(max.max(1)).collect();
        if queries.is_empty() && !self.name.trim().is_empty() {
            queries.push(self.name.trim().to_string());
        }
        queries
    }

    pub fn quota(&self, default: usize) -> usize {
        self.product_quota.unwrap_or(default)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Duplicate category id '{0}'")]
    DuplicateId(String),
    #[error("Category '{id}' references unknown parent '{parent}'")]
    UnknownParent { id: String, parent: String },
    #[error("Category '{id}' has parent '{parent}', which is itself a subcategory")]
    NestedTooDeep { id: String, parent: String },
    #[error("Category with empty id")]
    EmptyId,
}

/// Checks the two-level tree shape and fills in missing slugs.
pub fn validate(mut categories: Vec<CategoryDescriptor>) -> Result<Vec<CategoryDescriptor>, CatalogError> {
    let mut parents: HashMap<&str, Option<&str>> = HashMap::new();
    for category in &categories {
        if category.id.trim().is_empty() {
            return Err(CatalogError::EmptyId);
        }
        if parents.insert(&category.id, category.parent_id.as_deref()).is_some() {
            return Err(CatalogError::DuplicateId(category.id.clone()));
        }
    }

    for category in &categories {
        let Some(parent) = category.parent_id.as_deref() else { continue };
        match parents.get(parent) {
            None => {
                return Err(CatalogError::UnknownParent {
                    id: category.id.clone(),
                    parent: parent.to_string(),
                })
            }
            Some(Some(_)) => {
                return Err(CatalogError::NestedTooDeep {
                    id: category.id.clone(),
                    parent: parent.to_string(),
                })
            }
            Some(None) => {}
        }
    }

    for category in &mut categories {
        if category.slug.is_empty() {
            category.slug = slugify(&category.name);
        }
    }
    Ok(categories)
}

/// Reads and validates a category file.
pub fn load_categories(path: impl AsRef<Path>) -> Result<Vec<CategoryDescriptor>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read category file: {}", path.display()))?;
    let categories: Vec<CategoryDescriptor> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse category file: {}", path.display()))?;

    let categories = validate(categories)
        .with_context(|| format!("Invalid category tree in {}", path.display()))?;
    debug!("Loaded {} categories from {}", categories.len(), path.display());
    Ok(categories)
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cat(id: &str, parent: Option<&str>) -> CategoryDescriptor {
        CategoryDescriptor {
            id: id.to_string(),
            name: format!("Category {id}"),
            parent_id: parent.map(str::to_string),
            slug: String::new(),
            keywords: Vec::new(),
            product_quota: None,
        }
    }

    #[test]
    fn test_valid_tree() {
        let tree = validate(vec![cat("home", None), cat("lamps", Some("home"))]).unwrap();
        assert_eq!(tree[0].level(), 0);
        assert_eq!(tree[1].level(), 1);
        assert_eq!(tree[1].slug, "category-lamps");
    }

    #[test]
    fn test_rejects_unknown_parent() {
        let err = validate(vec![cat("lamps", Some("home"))]).unwrap_err();
        assert_eq!(err, CatalogError::UnknownParent { id: "lamps".into(), parent: "home".into() });
    }

    #[test]
    fn test_rejects_third_level() {
        let err = validate(vec![cat("a", None), cat("b", Some("a")), cat("c", Some("b"))]).unwrap_err();
        assert!(matches!(err, CatalogError::NestedTooDeep { .. }));
    }

    #[test]
    fn test_rejects_duplicate_id() {
        let err = validate(vec![cat("a", None), cat("a", None)]).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateId("a".into()));
    }

    #[test]
    fn test_queries_prefer_keywords() {
        let mut c = cat("lamps", None);
        assert_eq!(c.queries(3), vec!["Category lamps"]);

        c.keywords = vec![
            "desk lamp".into(),
            " ".into(),
            "Desk Lamp".into(),
            "floor lamp".into(),
            "reading lamp".into(),
        ];
        assert_eq!(c.queries(2), vec!["desk lamp", "floor lamp"]);
    }

    #[test]
    fn test_quota_default() {
        let mut c = cat("a", None);
        assert_eq!(c.quota(10), 10);
        c.product_quota = Some(4);
        assert_eq!(c.quota(10), 4);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Home & Kitchen"), "home-kitchen");
        assert_eq!(slugify("  Küche  "), "küche");
    }

    #[test]
    fn test_load_categories_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": "home", "name": "Home", "parent_id": null, "keywords": ["home decor"]}},
                {{"id": "lamps", "name": "Desk Lamps", "parent": "home", "slug": "desk-lamps", "quota": 5}}
            ]"#
        )
        .unwrap();

        let categories = load_categories(file.path()).unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[1].parent_id.as_deref(), Some("home"));
        assert_eq!(categories[1].product_quota, Some(5));
        assert_eq!(categories[0].slug, "home");
    }

    #[test]
    fn test_load_categories_invalid_tree() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"id": "lamps", "name": "Lamps", "parent_id": "nope"}}]"#).unwrap();

        let err = load_categories(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid category tree"));
        assert!(err.downcast_ref::<CatalogError>().is_some());
    }
}
