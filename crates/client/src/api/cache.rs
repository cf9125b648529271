//! Cache types for catalog responses.

use shopfront_core::{CategoryId, ProductId};

use crate::types::{Category, Page, Product, ProductQuery};

/// Cache key for products and categories.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    Products(ProductQuery),
    Category(CategoryId),
    Categories,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Page<Product>),
    Category(Box<Category>),
    Categories(Vec<Category>),
}
