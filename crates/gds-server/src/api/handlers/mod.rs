//! Request handlers for the registration API

pub mod lookup;
pub mod register;
pub mod review;
pub mod verify;

pub use lookup::{lookup, search, verification};
pub use register::register;
pub use review::review;
pub use verify::verify_contact;
