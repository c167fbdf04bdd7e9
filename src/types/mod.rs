//! Core domain types shared by the HTTP layer, the job store and the
//! executors.

pub mod action;
pub mod ids;
pub mod request;

pub use action::{Action, UnknownAction};
pub use ids::JobId;
pub use request::WebhookRequest;
