use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::product::Product;
use crate::models::user::User;

/// In-memory product catalog backing GET /api/products and the CSV import.
#[derive(Clone)]
pub struct ProductCatalog {
    inner: Arc<RwLock<Vec<Product>>>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn list(&self) -> Vec<Product> {
        self.inner.read().clone()
    }

    pub fn get(&self, product_id: &str) -> Option<Product> {
        self.inner.read().iter().find(|p| p.id == product_id).cloned()
    }

    /// Insert a product; UPI_ID must be unique across the catalog.
    pub fn insert(&self, product: Product) -> Result<(), String> {
        let mut products = self.inner.write();
        if products.iter().any(|p| p.upi_id == product.upi_id) {
            return Err(format!("Duplicate UPI_ID '{}'", product.upi_id));
        }
        products.push(product);
        Ok(())
    }
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory user directory; the recipient set for broadcast campaigns.
#[derive(Clone)]
pub struct UserDirectory {
    inner: Arc<RwLock<Vec<User>>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn list(&self) -> Vec<User> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Insert a user; email must be unique across the directory.
    pub fn insert(&self, user: User) -> Result<(), String> {
        let mut users = self.inner.write();
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(format!("Duplicate email '{}'", user.email));
        }
        users.push(user);
        Ok(())
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}
