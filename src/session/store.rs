use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::models::{PaymentMethod, Product, ShippingAddress};
use crate::pricing::{self, PriceQuote};
use crate::session::storage::StoragePort;

pub const TOKEN_KEY: &str = "token";
pub const CART_ITEMS_KEY: &str = "cartItems";
pub const WISHLIST_ITEMS_KEY: &str = "wishlistItems";
pub const SHIPPING_ADDRESS_KEY: &str = "shippingAddress";
pub const PAYMENT_METHOD_KEY: &str = "paymentMethod";

/// Cart entry with the catalog snapshot taken at add time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: Uuid,
    pub name: String,
    pub image: String,
    pub price: Decimal,
    pub count_in_stock: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistLine {
    pub product: Uuid,
    pub name: String,
    pub image: String,
    pub price: Decimal,
}

/// What the shopper intends to buy, independent of any server round-trip.
///
/// Every mutation writes the affected key back through the storage port;
/// each key is persisted on its own so one failed write never blocks the
/// others. Loading is best-effort: a missing or corrupt key falls back to
/// its default, so `open` cannot fail.
pub struct SessionStore<S> {
    storage: S,
    cart_items: Vec<CartLine>,
    wishlist_items: Vec<WishlistLine>,
    shipping_address: Option<ShippingAddress>,
    payment_method: Option<PaymentMethod>,
    token: Option<String>,
}

impl<S: StoragePort> SessionStore<S> {
    pub fn open(storage: S) -> Self {
        let cart_items = load_or_default(&storage, CART_ITEMS_KEY);
        let wishlist_items = load_or_default(&storage, WISHLIST_ITEMS_KEY);
        let shipping_address = load_or_default(&storage, SHIPPING_ADDRESS_KEY);
        let payment_method = load_or_default(&storage, PAYMENT_METHOD_KEY);
        let token = load_or_default(&storage, TOKEN_KEY);
        Self {
            storage,
            cart_items,
            wishlist_items,
            shipping_address,
            payment_method,
            token,
        }
    }

    pub fn cart_items(&self) -> &[CartLine] {
        &self.cart_items
    }

    pub fn wishlist_items(&self) -> &[WishlistLine] {
        &self.wishlist_items
    }

    pub fn shipping_address(&self) -> Option<&ShippingAddress> {
        self.shipping_address.as_ref()
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Put `quantity` of `product` in the cart. An existing line for the
    /// same product is replaced wholesale, snapshot included, so the cart
    /// always carries the price and stock seen at the latest add.
    pub fn add_item(&mut self, product: &Product, quantity: i32) {
        let line = CartLine {
            product: product.id,
            name: product.name.clone(),
            image: product.images.first().cloned().unwrap_or_default(),
            price: product.price,
            count_in_stock: product.stock,
            quantity,
        };
        match self
            .cart_items
            .iter_mut()
            .find(|existing| existing.product == line.product)
        {
            Some(existing) => *existing = line,
            None => self.cart_items.push(line),
        }
        self.persist(CART_ITEMS_KEY, &self.cart_items);
    }

    /// Removing an id that is not in the cart is a no-op.
    pub fn remove_item(&mut self, product_id: Uuid) {
        let before = self.cart_items.len();
        self.cart_items.retain(|line| line.product != product_id);
        if self.cart_items.len() != before {
            self.persist(CART_ITEMS_KEY, &self.cart_items);
        }
    }

    /// A quantity of zero or less removes the line. No stock clamping here;
    /// that is the UI's call before it gets this far.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: i32) {
        if quantity <= 0 {
            self.remove_item(product_id);
            return;
        }
        if let Some(line) = self
            .cart_items
            .iter_mut()
            .find(|line| line.product == product_id)
        {
            line.quantity = quantity;
            self.persist(CART_ITEMS_KEY, &self.cart_items);
        }
    }

    pub fn add_wishlist_item(&mut self, product: &Product) {
        if self
            .wishlist_items
            .iter()
            .any(|line| line.product == product.id)
        {
            return;
        }
        self.wishlist_items.push(WishlistLine {
            product: product.id,
            name: product.name.clone(),
            image: product.images.first().cloned().unwrap_or_default(),
            price: product.price,
        });
        self.persist(WISHLIST_ITEMS_KEY, &self.wishlist_items);
    }

    pub fn remove_wishlist_item(&mut self, product_id: Uuid) {
        let before = self.wishlist_items.len();
        self.wishlist_items
            .retain(|line| line.product != product_id);
        if self.wishlist_items.len() != before {
            self.persist(WISHLIST_ITEMS_KEY, &self.wishlist_items);
        }
    }

    /// Empty the cart and wishlist, e.g. after a placed order.
    pub fn clear(&mut self) {
        self.cart_items.clear();
        self.wishlist_items.clear();
        self.persist(CART_ITEMS_KEY, &self.cart_items);
        self.persist(WISHLIST_ITEMS_KEY, &self.wishlist_items);
    }

    pub fn save_shipping_address(&mut self, address: ShippingAddress) {
        self.shipping_address = Some(address);
        self.persist(SHIPPING_ADDRESS_KEY, &self.shipping_address);
    }

    pub fn save_payment_method(&mut self, method: PaymentMethod) {
        self.payment_method = Some(method);
        self.persist(PAYMENT_METHOD_KEY, &self.payment_method);
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
        self.persist(TOKEN_KEY, &self.token);
    }

    /// Drop the stored credential, e.g. when the server answers 401.
    pub fn clear_token(&mut self) {
        self.token = None;
        if let Err(err) = self.storage.remove(TOKEN_KEY) {
            tracing::warn!(key = TOKEN_KEY, error = %err, "session persist failed");
        }
    }

    pub fn item_count(&self) -> i32 {
        self.cart_items.iter().map(|line| line.quantity).sum()
    }

    /// Recomputed on every call from the current lines; nothing cached.
    pub fn totals(&self) -> PriceQuote {
        pricing::quote(self.cart_items.iter().map(|line| (line.price, line.quantity)))
    }

    fn persist<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => {
                if let Err(err) = self.storage.save(key, &json) {
                    tracing::warn!(key, error = %err, "session persist failed");
                }
            }
            Err(err) => tracing::warn!(key, error = %err, "session serialize failed"),
        }
    }
}

fn load_or_default<S: StoragePort, T: DeserializeOwned + Default>(storage: &S, key: &str) -> T {
    let raw = match storage.load(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(err) => {
            tracing::warn!(key, error = %err, "session load failed, using default");
            return T::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(key, error = %err, "corrupt session state, using default");
            T::default()
        }
    }
}
