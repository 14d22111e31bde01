use std::rc::Rc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use furnistore::models::{Category, PaymentMethod, Product, ShippingAddress};
use furnistore::session::{FileStorage, MemoryStorage, SessionStore, StoragePort};
use furnistore::session::store::{CART_ITEMS_KEY, TOKEN_KEY, WISHLIST_ITEMS_KEY};

fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

fn product(name: &str, price: &str, stock: i32) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: "test product".to_string(),
        price: dec(price),
        original_price: None,
        category: Category::Chair,
        brand: "TestBrand".to_string(),
        material: None,
        color: None,
        stock,
        is_available: true,
        is_featured: false,
        images: vec!["/img/one.jpg".to_string()],
        rating: Decimal::ZERO,
        num_reviews: 0,
        sold: 0,
        created_at: Utc::now(),
    }
}

fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "John Doe".into(),
        address: "1 Main St".into(),
        city: "Springfield".into(),
        state: "IL".into(),
        postal_code: "62704".into(),
        country: "United States".into(),
        phone: None,
    }
}

#[test]
fn add_item_replaces_existing_line() {
    let mut store = SessionStore::open(MemoryStorage::new());
    let mut sofa = product("Sofa", "499.00", 10);

    store.add_item(&sofa, 2);
    // catalog price and stock changed before the second add
    sofa.price = dec("459.00");
    sofa.stock = 7;
    store.add_item(&sofa, 3);

    assert_eq!(store.cart_items().len(), 1);
    let line = &store.cart_items()[0];
    assert_eq!(line.quantity, 3);
    assert_eq!(line.price, dec("459.00"));
    assert_eq!(line.count_in_stock, 7);
}

#[test]
fn cart_never_holds_two_lines_for_one_product() {
    let mut store = SessionStore::open(MemoryStorage::new());
    let sofa = product("Sofa", "499.00", 10);
    let desk = product("Desk", "250.00", 5);

    store.add_item(&sofa, 1);
    store.add_item(&desk, 2);
    store.add_item(&sofa, 4);
    store.update_quantity(desk.id, 1);
    store.add_item(&desk, 3);

    let mut ids: Vec<Uuid> = store.cart_items().iter().map(|l| l.product).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), store.cart_items().len());
    assert_eq!(store.cart_items().len(), 2);
}

#[test]
fn zero_or_negative_quantity_removes_the_line() {
    let mut store = SessionStore::open(MemoryStorage::new());
    let sofa = product("Sofa", "499.00", 10);
    let desk = product("Desk", "250.00", 5);

    store.add_item(&sofa, 2);
    store.add_item(&desk, 2);

    store.update_quantity(sofa.id, 0);
    assert!(store.cart_items().iter().all(|l| l.product != sofa.id));

    store.update_quantity(desk.id, -1);
    assert!(store.cart_items().is_empty());
}

#[test]
fn update_quantity_does_not_clamp_to_stock() {
    let mut store = SessionStore::open(MemoryStorage::new());
    let sofa = product("Sofa", "499.00", 5);
    store.add_item(&sofa, 1);
    store.update_quantity(sofa.id, 999);
    assert_eq!(store.cart_items()[0].quantity, 999);
}

#[test]
fn removing_missing_id_is_a_noop() {
    let mut store = SessionStore::open(MemoryStorage::new());
    let sofa = product("Sofa", "499.00", 10);
    store.add_item(&sofa, 1);
    store.remove_item(Uuid::new_v4());
    assert_eq!(store.cart_items().len(), 1);
}

#[test]
fn totals_above_free_shipping_threshold() {
    let mut store = SessionStore::open(MemoryStorage::new());
    store.add_item(&product("Bed", "120.00", 10), 2);

    let totals = store.totals();
    assert_eq!(totals.items_price, dec("240.00"));
    assert_eq!(totals.shipping_price, Decimal::ZERO);
    assert_eq!(totals.tax_price, dec("36.00"));
    assert_eq!(totals.total_price, dec("276.00"));
}

#[test]
fn totals_below_free_shipping_threshold() {
    let mut store = SessionStore::open(MemoryStorage::new());
    store.add_item(&product("Lamp Table", "30.00", 10), 1);

    let totals = store.totals();
    assert_eq!(totals.items_price, dec("30.00"));
    assert_eq!(totals.shipping_price, dec("10"));
    assert_eq!(totals.tax_price, dec("4.50"));
    assert_eq!(totals.total_price, dec("44.50"));
}

#[test]
fn shipping_is_charged_at_exactly_one_hundred() {
    let mut store = SessionStore::open(MemoryStorage::new());
    store.add_item(&product("Chair", "100.00", 10), 1);

    let totals = store.totals();
    assert_eq!(totals.shipping_price, dec("10"));
    assert_eq!(totals.total_price, dec("125.00"));
}

#[test]
fn tax_rounds_half_up_at_the_tax_step() {
    let mut store = SessionStore::open(MemoryStorage::new());
    // 3 x 8.50 = 25.50, tax = 3.825 -> 3.83 half-up
    store.add_item(&product("Stool", "8.50", 10), 3);

    let totals = store.totals();
    assert_eq!(totals.tax_price, dec("3.83"));
    assert_eq!(totals.total_price, dec("39.33"));
}

#[test]
fn grand_total_invariant_holds() {
    let mut store = SessionStore::open(MemoryStorage::new());
    store.add_item(&product("Sofa", "499.99", 10), 1);
    store.add_item(&product("Desk", "19.99", 10), 3);

    let totals = store.totals();
    let recomputed = (totals.items_price + totals.shipping_price + totals.tax_price)
        .round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    assert_eq!(totals.total_price, recomputed);
}

#[test]
fn reload_reproduces_the_same_state() {
    let storage = Rc::new(MemoryStorage::new());

    let mut store = SessionStore::open(Rc::clone(&storage));
    store.add_item(&product("Sofa", "499.00", 10), 2);
    store.add_item(&product("Desk", "250.00", 5), 1);
    store.add_wishlist_item(&product("Bed", "749.00", 12));
    store.save_shipping_address(address());
    store.save_payment_method(PaymentMethod::Paypal);
    store.set_token("tok-123".into());

    let lines = store.cart_items().to_vec();
    let wishlist = store.wishlist_items().to_vec();
    drop(store);

    let reloaded = SessionStore::open(Rc::clone(&storage));
    assert_eq!(reloaded.cart_items(), lines.as_slice());
    assert_eq!(reloaded.wishlist_items(), wishlist.as_slice());
    assert_eq!(reloaded.shipping_address(), Some(&address()));
    assert_eq!(reloaded.payment_method(), Some(PaymentMethod::Paypal));
    assert_eq!(reloaded.token(), Some("tok-123"));
}

#[test]
fn file_storage_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");

    let mut store = SessionStore::open(FileStorage::new(dir.path()));
    store.add_item(&product("Sofa", "499.00", 10), 2);
    store.save_payment_method(PaymentMethod::Card);
    let lines = store.cart_items().to_vec();
    drop(store);

    let reloaded = SessionStore::open(FileStorage::new(dir.path()));
    assert_eq!(reloaded.cart_items(), lines.as_slice());
    assert_eq!(reloaded.payment_method(), Some(PaymentMethod::Card));
}

#[test]
fn corrupt_key_falls_back_without_touching_others() {
    let storage = Rc::new(MemoryStorage::new());

    let mut store = SessionStore::open(Rc::clone(&storage));
    store.add_item(&product("Sofa", "499.00", 10), 2);
    store.add_wishlist_item(&product("Bed", "749.00", 12));
    drop(store);

    storage
        .save(CART_ITEMS_KEY, "{not json at all")
        .expect("save");

    let reloaded = SessionStore::open(Rc::clone(&storage));
    assert!(reloaded.cart_items().is_empty());
    assert_eq!(reloaded.wishlist_items().len(), 1);
}

#[test]
fn clear_empties_cart_and_wishlist() {
    let storage = Rc::new(MemoryStorage::new());

    let mut store = SessionStore::open(Rc::clone(&storage));
    store.add_item(&product("Sofa", "499.00", 10), 2);
    store.add_wishlist_item(&product("Bed", "749.00", 12));
    store.clear();

    assert!(store.cart_items().is_empty());
    assert!(store.wishlist_items().is_empty());
    assert_eq!(storage.load(CART_ITEMS_KEY).unwrap().as_deref(), Some("[]"));
    assert_eq!(
        storage.load(WISHLIST_ITEMS_KEY).unwrap().as_deref(),
        Some("[]")
    );
}

#[test]
fn wishlist_add_is_idempotent() {
    let mut store = SessionStore::open(MemoryStorage::new());
    let bed = product("Bed", "749.00", 12);
    store.add_wishlist_item(&bed);
    store.add_wishlist_item(&bed);
    assert_eq!(store.wishlist_items().len(), 1);

    store.remove_wishlist_item(bed.id);
    assert!(store.wishlist_items().is_empty());
}

#[test]
fn item_count_sums_quantities() {
    let mut store = SessionStore::open(MemoryStorage::new());
    store.add_item(&product("Sofa", "499.00", 10), 2);
    store.add_item(&product("Desk", "250.00", 5), 3);
    assert_eq!(store.item_count(), 5);
}

#[test]
fn clear_token_removes_the_persisted_key() {
    let storage = Rc::new(MemoryStorage::new());

    let mut store = SessionStore::open(Rc::clone(&storage));
    store.set_token("tok-123".into());
    assert!(storage.load(TOKEN_KEY).unwrap().is_some());

    store.clear_token();
    assert_eq!(store.token(), None);
    assert!(storage.load(TOKEN_KEY).unwrap().is_none());

    let reloaded = SessionStore::open(Rc::clone(&storage));
    assert_eq!(reloaded.token(), None);
}
