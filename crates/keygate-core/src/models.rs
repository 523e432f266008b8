//! Domain models shared across all crates.

pub mod session;
pub mod user;

pub use session::Session;
pub use user::{NewUser, User, UserView};
