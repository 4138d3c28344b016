use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::product::{CatalogItem, ItemId};

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// Category value the shop grid uses for "no category filter".
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog item id must be a positive integer")]
    ZeroItemId,
    #[error("catalog item id {0} appears more than once")]
    DuplicateItemId(ItemId),
    #[error("catalog item {0} has a negative price")]
    NegativePrice(ItemId),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    pub category: Option<String>,
    pub search_term: Option<String>,
    pub limit: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogSearch {
    pub products: Vec<CatalogItem>,
    pub total_found: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if item.id.0 == 0 {
                return Err(CatalogError::ZeroItemId);
            }
            if !seen.insert(item.id) {
                return Err(CatalogError::DuplicateItemId(item.id));
            }
            if item.price_eur < Decimal::ZERO {
                return Err(CatalogError::NegativePrice(item.id));
            }
        }

        Ok(Self { items })
    }

    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let items = serde_json::from_str::<Vec<CatalogItem>>(raw)?;
        Self::new(items)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_json_str(&raw)
    }

    /// Loads from `path` when given, otherwise falls back to the built-in catalog.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn find(&self, item_id: ItemId) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn categories(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| item.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Assistant-facing search: both filters are substring matches on name or
    /// description, applied together. `total_found` is counted before `limit`.
    pub fn search(&self, query: &CatalogQuery) -> CatalogSearch {
        let matches = self
            .items
            .iter()
            .filter(|item| {
                query.category.as_deref().map_or(true, |category| item.matches_text(category))
                    && query.search_term.as_deref().map_or(true, |term| item.matches_text(term))
            })
            .collect::<Vec<_>>();

        CatalogSearch {
            total_found: matches.len(),
            products: matches.into_iter().take(query.limit).cloned().collect(),
        }
    }

    /// Shop-grid listing: exact category match, free-text search, sorted by name.
    pub fn browse(&self, category: Option<&str>, search_term: Option<&str>) -> Vec<&CatalogItem> {
        let category = category.filter(|value| !value.is_empty() && *value != ALL_CATEGORIES);
        let search_term = search_term.map(str::trim).filter(|value| !value.is_empty());

        let mut products = self
            .items
            .iter()
            .filter(|item| category.map_or(true, |category| item.category == category))
            .filter(|item| search_term.map_or(true, |term| item.matches_text(term)))
            .collect::<Vec<_>>();
        products.sort_by(|left, right| left.name.cmp(&right.name));
        products
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{Catalog, CatalogError, CatalogQuery};
    use crate::domain::product::{CatalogItem, ItemId};

    fn item(id: u32, name: &str, price: Decimal) -> CatalogItem {
        CatalogItem {
            id: ItemId(id),
            name: name.to_string(),
            description: String::new(),
            price_eur: price,
            weight_or_count: "1 pc".to_string(),
            image: String::new(),
            category: "Misc".to_string(),
        }
    }

    #[test]
    fn builtin_catalog_loads_with_unique_ids() {
        let catalog = Catalog::builtin().expect("builtin catalog");
        assert_eq!(catalog.len(), 30);
        assert_eq!(catalog.find(ItemId(4)).map(|item| item.name.as_str()), Some("Apples Gala"));
        assert_eq!(catalog.find(ItemId(4)).map(|item| item.price_eur), Some(Decimal::new(299, 2)));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let error = Catalog::new(vec![
            item(1, "Eggs", Decimal::ONE),
            item(1, "More eggs", Decimal::ONE),
        ])
        .expect_err("duplicate ids should fail");
        assert!(matches!(error, CatalogError::DuplicateItemId(ItemId(1))));
    }

    #[test]
    fn rejects_negative_prices_and_zero_ids() {
        let negative = Catalog::new(vec![item(2, "Flour", Decimal::new(-1, 0))])
            .expect_err("negative price should fail");
        assert!(matches!(negative, CatalogError::NegativePrice(ItemId(2))));

        let zero = Catalog::new(vec![item(0, "Nothing", Decimal::ONE)]).expect_err("zero id");
        assert!(matches!(zero, CatalogError::ZeroItemId));
    }

    #[test]
    fn accepts_numeric_prices_in_json() {
        let catalog = Catalog::from_json_str(
            r#"[{"id":1,"name":"Eggs","description":"","price_eur":3.49,"weight_or_count":"12","image":"","category":"Dairy"}]"#,
        )
        .expect("numeric prices parse");
        assert_eq!(catalog.items()[0].price_eur, Decimal::new(349, 2));
    }

    #[test]
    fn search_matches_name_or_description_case_insensitively() {
        let catalog = Catalog::builtin().expect("builtin catalog");
        let result = catalog.search(&CatalogQuery {
            search_term: Some("APPLE".to_string()),
            limit: 10,
            ..CatalogQuery::default()
        });

        assert_eq!(result.total_found, 3);
        assert!(result.products.iter().all(|item| item.matches_text("apple")));
    }

    #[test]
    fn search_applies_both_filters_and_counts_before_limit() {
        let catalog = Catalog::builtin().expect("builtin catalog");
        let result = catalog.search(&CatalogQuery {
            category: Some("baking".to_string()),
            search_term: Some("flour".to_string()),
            limit: 1,
        });

        assert_eq!(result.total_found, 1);
        assert_eq!(result.products.len(), 1);
        assert_eq!(result.products[0].id, ItemId(2));

        let truncated = catalog.search(&CatalogQuery {
            search_term: Some("flour".to_string()),
            limit: 1,
            ..CatalogQuery::default()
        });
        assert_eq!(truncated.total_found, 2);
        assert_eq!(truncated.products.len(), 1);
    }

    #[test]
    fn browse_filters_by_exact_category_and_sorts_by_name() {
        let catalog = Catalog::builtin().expect("builtin catalog");
        let fruits = catalog.browse(Some("Fruits"), None);
        let names = fruits.iter().map(|item| item.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Apples Gala", "Bananas", "Granny Smith Apples", "Lemons"]);

        assert_eq!(catalog.browse(Some("All"), None).len(), catalog.len());
        assert_eq!(catalog.browse(None, Some("croissant")).len(), 1);
    }

    #[test]
    fn categories_are_sorted_and_unique() {
        let catalog = Catalog::builtin().expect("builtin catalog");
        let categories = catalog.categories();
        assert_eq!(categories.first().map(String::as_str), Some("Bakery"));
        assert_eq!(categories.len(), 8);
    }
}
