//! Products and categories, including the admin catalog endpoints.

use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, instrument};

use shopfront_core::{CategoryId, ProductId};

use super::cache::{CacheKey, CacheValue};
use super::{Access, ApiClient, ApiError};
use crate::types::{
    Category, CategoryInput, Page, PagedEnvelope, Product, ProductInput, ProductQuery,
    UpdateCategoryRequest,
};

#[derive(Deserialize)]
struct ProductEnvelope {
    product: Product,
}

#[derive(Deserialize)]
struct CategoryEnvelope {
    category: Category,
}

#[derive(Deserialize)]
struct CategoriesEnvelope {
    #[serde(default)]
    categories: Option<Vec<Category>>,
}

impl ApiClient {
    // =========================================================================
    // Product Methods
    // =========================================================================

    /// List products. Searches are never cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, ApiError> {
        let cacheable = query.search.as_deref().is_none_or(|s| s.trim().is_empty());
        let cache_key = CacheKey::Products(query.clone());

        if cacheable
            && let Some(CacheValue::Products(page)) = self.inner.cache.get(&cache_key).await
        {
            debug!("Cache hit for product listing");
            return Ok(page);
        }

        let envelope: PagedEnvelope<Product> =
            self.get("/products", Access::Public, &query.to_pairs()).await?;
        let page = Page::from(envelope);

        if cacheable {
            self.inner
                .cache
                .insert(cache_key, CacheValue::Products(page.clone()))
                .await;
        }

        Ok(page)
    }

    /// Get a single product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the product does not exist, or another
    /// error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        let cache_key = CacheKey::Product(id);

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let envelope: ProductEnvelope = self
            .get(&format!("/products/{id}"), Access::Public, &[])
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(envelope.product.clone())))
            .await;

        Ok(envelope.product)
    }

    // =========================================================================
    // Category Methods
    // =========================================================================

    /// List all categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let envelope: CategoriesEnvelope = self.get("/categories", Access::Public, &[]).await?;
        let categories = envelope.categories.unwrap_or_default();

        self.inner
            .cache
            .insert(CacheKey::Categories, CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    /// Get a single category.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the category does not exist, or another
    /// error if the API request fails.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn get_category(&self, id: CategoryId) -> Result<Category, ApiError> {
        let cache_key = CacheKey::Category(id);

        if let Some(CacheValue::Category(category)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for category");
            return Ok(*category);
        }

        let envelope: CategoryEnvelope = self
            .get(&format!("/categories/{id}"), Access::Public, &[])
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Category(Box::new(envelope.category.clone())))
            .await;

        Ok(envelope.category)
    }

    // =========================================================================
    // Admin Product Methods
    // =========================================================================

    /// Create a product (admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin or the request fails.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: &ProductInput) -> Result<Product, ApiError> {
        let envelope: ProductEnvelope = self
            .send_json(Method::POST, "/products", Access::Authenticated, input)
            .await?;
        self.invalidate_catalog().await;
        Ok(envelope.product)
    }

    /// Replace a product's fields (admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin, the product does not
    /// exist, or the request fails.
    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, ApiError> {
        let envelope: ProductEnvelope = self
            .send_json(
                Method::PUT,
                &format!("/products/{id}"),
                Access::Authenticated,
                input,
            )
            .await?;
        self.invalidate_catalog().await;
        Ok(envelope.product)
    }

    /// Delete a product (admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin, the product does not
    /// exist, or the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), ApiError> {
        self.send_unit(
            Method::DELETE,
            &format!("/products/{id}"),
            Access::Authenticated,
        )
        .await?;
        self.invalidate_catalog().await;
        Ok(())
    }

    // =========================================================================
    // Admin Category Methods
    // =========================================================================

    /// Create a category (admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin, the name is taken, or
    /// the request fails.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(&self, input: &CategoryInput) -> Result<Category, ApiError> {
        let envelope: CategoryEnvelope = self
            .send_json(Method::POST, "/categories", Access::Authenticated, input)
            .await?;
        self.invalidate_catalog().await;
        Ok(envelope.category)
    }

    /// Update a category's fields (admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin, the category does not
    /// exist, the new name is taken, or the request fails.
    #[instrument(skip(self, update), fields(category_id = %id))]
    pub async fn update_category(
        &self,
        id: CategoryId,
        update: &UpdateCategoryRequest,
    ) -> Result<Category, ApiError> {
        let envelope: CategoryEnvelope = self
            .send_json(
                Method::PUT,
                &format!("/categories/{id}"),
                Access::Authenticated,
                update,
            )
            .await?;
        self.invalidate_catalog().await;
        Ok(envelope.category)
    }

    /// Delete a category (admin only). The backend refuses while products
    /// still reference it.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin, the category does not
    /// exist or is in use, or the request fails.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), ApiError> {
        self.send_unit(
            Method::DELETE,
            &format!("/categories/{id}"),
            Access::Authenticated,
        )
        .await?;
        self.invalidate_catalog().await;
        Ok(())
    }

    // =========================================================================
    // Cache Management
    // =========================================================================

    /// Invalidate a cached product.
    pub async fn invalidate_product(&self, id: ProductId) {
        self.inner.cache.invalidate(&CacheKey::Product(id)).await;
    }

    /// Invalidate all cached catalog data.
    pub async fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}
