//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod coupon;
pub mod profile;

pub use product::{Product, SizeStock};
pub use order::{Order, OrderError, OrderItem, OrderStatus, PaymentStatus, NewOrder, Issue, PaymentDetails};
pub use profile::{Profile, Role, SavedAddress};
pub use cart::{Cart, CartAvailability, CartError, CartLine, SizeQuantity};
pub use coupon::{Coupon, CouponKind};
