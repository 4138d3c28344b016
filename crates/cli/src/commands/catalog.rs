use epicerie_core::catalog::ALL_CATEGORIES;
use serde_json::json;

use super::{load_config_and_catalog, CommandResult};

pub fn run(category: Option<&str>, search: Option<&str>) -> CommandResult {
    let (_, catalog) = match load_config_and_catalog("catalog") {
        Ok(loaded) => loaded,
        Err(failure) => return failure,
    };

    let products = catalog.browse(category, search);
    let mut categories = vec![ALL_CATEGORIES.to_string()];
    categories.extend(catalog.categories());

    let message = match (category, search) {
        (Some(category), Some(search)) => {
            format!("{} products in `{category}` matching `{search}`", products.len())
        }
        (Some(category), None) => format!("{} products in `{category}`", products.len()),
        (None, Some(search)) => format!("{} products matching `{search}`", products.len()),
        (None, None) => format!("{} products", products.len()),
    };

    CommandResult::success_with_data(
        "catalog",
        message,
        json!({
            "categories": categories,
            "total": products.len(),
            "products": products,
        }),
    )
}
