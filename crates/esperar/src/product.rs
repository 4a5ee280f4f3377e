//! Product listing value object and table verification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::result::EsperarResult;

/// One listing entry, normalised on construction
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Product {
    name: String,
    price: String,
}

impl Product {
    /// Create with trimmed fields
    #[must_use]
    pub fn new(name: &str, price: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            price: price.trim().to_string(),
        }
    }

    /// Create from possibly absent fields; absent becomes ""
    #[must_use]
    pub fn from_optional(name: Option<&str>, price: Option<&str>) -> Self {
        Self::new(name.unwrap_or_default(), price.unwrap_or_default())
    }

    /// Product name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Price as displayed
    #[must_use]
    pub fn price(&self) -> &str {
        &self.price
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Product{{name='{}', price='{}'}}", self.name, self.price)
    }
}

/// Row of an expected-products table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedProductRow {
    /// Product column
    #[serde(rename = "Product", default)]
    pub product: Option<String>,
    /// Price column
    #[serde(rename = "Price", default)]
    pub price: Option<String>,
}

impl From<ExpectedProductRow> for Product {
    fn from(row: ExpectedProductRow) -> Self {
        Self::from_optional(row.product.as_deref(), row.price.as_deref())
    }
}

/// Parse a YAML list of `{Product, Price}` rows
pub fn expected_from_yaml(yaml: &str) -> EsperarResult<Vec<Product>> {
    let rows: Vec<ExpectedProductRow> = serde_yaml_ng::from_str(yaml)?;
    Ok(rows.into_iter().map(Product::from).collect())
}

/// Parse a JSON array of `{Product, Price}` rows
pub fn expected_from_json(json: &str) -> EsperarResult<Vec<Product>> {
    let rows: Vec<ExpectedProductRow> = serde_json::from_str(json)?;
    Ok(rows.into_iter().map(Product::from).collect())
}

/// Load an expected table from a `.json`, `.yaml` or `.yml` file
pub fn expected_from_file(path: impl AsRef<Path>) -> EsperarResult<Vec<Product>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => expected_from_json(&content),
        _ => expected_from_yaml(&content),
    }
}

/// Why an observed listing does not match
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductMismatch {
    /// Different number of entries
    #[error("Product count mismatch! expected:<{expected}> actual:<{actual}>")]
    Count {
        /// Expected count
        expected: usize,
        /// Observed count
        actual: usize,
    },
    /// Name differs at an index
    #[error("Name mismatch at index {index} expected:<{expected}> actual:<{actual}>")]
    Name {
        /// Position in the listing
        index: usize,
        /// Expected name
        expected: String,
        /// Observed name
        actual: String,
    },
    /// Price differs at an index
    #[error("Price mismatch at index {index} expected:<{expected}> actual:<{actual}>")]
    Price {
        /// Position in the listing
        index: usize,
        /// Expected price
        expected: String,
        /// Observed price
        actual: String,
    },
    /// Nothing was listed
    #[error("No products found!")]
    Empty,
    /// Blank name
    #[error("Product name empty at index {index}")]
    EmptyName {
        /// Position in the listing
        index: usize,
    },
    /// Blank price
    #[error("Product price empty at index {index}")]
    EmptyPrice {
        /// Position in the listing
        index: usize,
    },
}

/// Compare count first, then index for index
pub fn verify_products(expected: &[Product], actual: &[Product]) -> Result<(), ProductMismatch> {
    if expected.len() != actual.len() {
        return Err(ProductMismatch::Count {
            expected: expected.len(),
            actual: actual.len(),
        });
    }

    for (index, (want, got)) in expected.iter().zip(actual).enumerate() {
        if want.name != got.name {
            return Err(ProductMismatch::Name {
                index,
                expected: want.name.clone(),
                actual: got.name.clone(),
            });
        }
        if want.price != got.price {
            return Err(ProductMismatch::Price {
                index,
                expected: want.price.clone(),
                actual: got.price.clone(),
            });
        }
    }
    Ok(())
}

/// Non-empty listing where every entry has a name and a price
pub fn verify_products_present(actual: &[Product]) -> Result<(), ProductMismatch> {
    if actual.is_empty() {
        return Err(ProductMismatch::Empty);
    }
    for (index, product) in actual.iter().enumerate() {
        if product.name.is_empty() {
            return Err(ProductMismatch::EmptyName { index });
        }
        if product.price.is_empty() {
            return Err(ProductMismatch::EmptyPrice { index });
        }
    }
    Ok(())
}
