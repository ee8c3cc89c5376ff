//! Remote collaborators: hosted functions, courier, email and the event bus.
pub mod courier;
pub mod events;
pub mod functions;
pub mod notifications;

pub use courier::{CourierClient, Shipment, TrackingEvent, TrackingInfo};
pub use events::EventPublisher;
pub use functions::{invoke_typed, FunctionError, FunctionInvoker, HttpFunctions};
pub use notifications::Notifier;
