//! Application services wired over the repositories and remote collaborators.

pub mod access;
pub mod cart_store;
pub mod catalog;
pub mod checkout;
pub mod finalizer;
pub mod orders;

pub use access::{AccessControl, AccessError};
pub use cart_store::{CartStore, CartStoreError};
pub use catalog::{Catalog, CatalogError, CatalogSnapshot};
pub use checkout::{AddressChoice, CheckoutDeps, CheckoutError, CheckoutService, CheckoutSession, CheckoutStage, PaymentHandoff};
pub use finalizer::{FinalizationReport, FinalizeStep, FinalizerDeps, OrderFinalizer, RetryJob, RetryQueue, StepReport, StepStatus};
pub use orders::{IssueKind, OrderService, OrderServiceError};
