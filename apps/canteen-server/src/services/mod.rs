//! Service layer.
//!
//! Services own the business workflows: they validate input with
//! canteen-core, call canteen-db repositories and return [`ApiResult`].
//! Handlers only translate JSON to service calls and back.
//!
//! [`ApiResult`]: crate::error::ApiResult

pub mod ticket_service;
pub mod user_service;

pub use ticket_service::{PurchaseReceipt, PurchaseRequest, SellerStats, TicketService};
pub use user_service::UserService;
