use rust_decimal::Decimal;
use tracing::info;

use super::repo::CatalogStore;
use super::repo_types::NewItem;

// (name, category, price in cents, stock, description)
const SAMPLE_ITEMS: &[(&str, &str, i64, i32, &str)] = &[
    ("Apples", "Fruits", 299, 50, "Fresh red apples"),
    ("Bananas", "Fruits", 149, 30, "Ripe yellow bananas"),
    ("Oranges", "Fruits", 349, 25, "Juicy oranges"),
    ("Strawberries", "Fruits", 499, 15, "Sweet strawberries"),
    ("Milk", "Dairy", 329, 40, "Whole milk 1L"),
    ("Cheese", "Dairy", 599, 20, "Cheddar cheese block"),
    ("Yogurt", "Dairy", 199, 35, "Greek yogurt 500g"),
    ("Butter", "Dairy", 449, 25, "Unsalted butter"),
    ("Carrots", "Vegetables", 199, 45, "Fresh carrots 1kg"),
    ("Broccoli", "Vegetables", 279, 30, "Fresh broccoli head"),
    ("Tomatoes", "Vegetables", 399, 20, "Ripe tomatoes 1kg"),
    ("Lettuce", "Vegetables", 249, 25, "Fresh lettuce head"),
    ("Chicken Breast", "Meat", 899, 15, "Fresh chicken breast 1kg"),
    ("Ground Beef", "Meat", 1299, 10, "Ground beef 1kg"),
    ("Salmon", "Meat", 1699, 8, "Fresh salmon fillet"),
    ("Rice", "Pantry", 499, 50, "Basmati rice 2kg"),
    ("Pasta", "Pantry", 299, 40, "Spaghetti pasta 500g"),
    ("Olive Oil", "Pantry", 799, 30, "Extra virgin olive oil 500ml"),
];

pub fn sample_items() -> Vec<NewItem> {
    SAMPLE_ITEMS
        .iter()
        .map(|&(name, category, cents, stock, description)| NewItem {
            name: name.into(),
            category: category.into(),
            price: Decimal::new(cents, 2),
            stock,
            description: description.into(),
        })
        .collect()
}

/// Insert the sample catalog when the store is empty. Returns how many items were added.
pub async fn seed_if_empty(catalog: &dyn CatalogStore) -> anyhow::Result<usize> {
    if catalog.count().await? > 0 {
        return Ok(0);
    }
    let items = sample_items();
    let n = items.len();
    for item in items {
        catalog.create(item).await?;
    }
    info!(items = n, "sample catalog seeded");
    Ok(n)
}
