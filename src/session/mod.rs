//! Client-side session state: the cart, wishlist, checkout drafts and auth
//! token a shopper accumulates before anything reaches the server. State
//! lives in memory and is mirrored to a pluggable key-value store so a
//! restart (or page reload, in a browser host) picks up where it left off.

pub mod storage;
pub mod store;

pub use storage::{FileStorage, MemoryStorage, StorageError, StoragePort};
pub use store::{CartLine, SessionStore, WishlistLine};
