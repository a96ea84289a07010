pub mod application;
pub mod payment;
pub mod user;

pub use application::{ApplicationStatus, APPLICATION_REQUIRED_FIELDS};
pub use payment::{PAYMENT_INTENT_REQUIRED_FIELDS, PAYMENT_REQUIRED_FIELDS};
pub use user::{new_user_document, Role};
