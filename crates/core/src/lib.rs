pub mod cart;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod scoring;
pub mod session;
pub mod storefront;

pub use cart::{
    format_price, CartEngine, CartItemInfo, CartObserver, CartSummary, InMemoryCartObserver,
};
pub use catalog::{Catalog, CatalogError, CatalogQuery, CatalogSearch, ALL_CATEGORIES};
pub use domain::cart::{CartEvent, CartLine};
pub use domain::product::{placeholder_name, CatalogItem, ItemId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use scoring::{score, Grade, PerfectCart, ScoreResult};
pub use session::{
    Clock, InMemoryMarkerStore, SessionClock, SessionDuration, SessionMarkerStore, SessionState,
    Surface, SystemClock,
};
pub use storefront::{CheckoutSummary, Storefront, VisitOutcome};
