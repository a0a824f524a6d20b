//! Catalog seeding from a JSON file of products.

use std::path::Path;

use store::{Catalog, Product, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to store product: {0}")]
    Store(#[from] StoreError),
}

/// Upserts every product in `path` (a JSON array of products) into `catalog`.
///
/// Returns the number of products written.
pub async fn seed_catalog<C: Catalog>(catalog: &C, path: &Path) -> Result<usize, SeedError> {
    let bytes = tokio::fs::read(path).await?;
    let products: Vec<Product> = serde_json::from_slice(&bytes)?;
    let count = products.len();
    for product in products {
        catalog.upsert_product(product).await?;
    }
    tracing::info!(count, path = %path.display(), "catalog seeded");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, ProductId};
    use store::InMemoryStore;

    #[tokio::test]
    async fn test_seed_catalog_loads_products() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"id":"P1","name":"Lamp","price":1500,"stock":4},
                {"id":"P2","name":"Rug","price":9900,"stock":0}]"#,
        )
        .unwrap();

        let store = InMemoryStore::new();
        assert_eq!(seed_catalog(&store, &path).await.unwrap(), 2);

        let lamp = store.get_product(&ProductId::new("P1")).await.unwrap().unwrap();
        assert_eq!(lamp.price, Money::from_cents(1500));
        assert_eq!(lamp.stock, 4);
    }

    #[tokio::test]
    async fn test_seed_catalog_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{").unwrap();

        let err = seed_catalog(&InMemoryStore::new(), &path).await.unwrap_err();
        assert!(matches!(err, SeedError::Json(_)));
    }
}
