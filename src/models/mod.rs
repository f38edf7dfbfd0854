//! Data models for the Electrostore backend.
//!
//! Field names match the storefront client's JSON shapes.

mod product;
mod user;

pub use product::*;
pub use user::*;
