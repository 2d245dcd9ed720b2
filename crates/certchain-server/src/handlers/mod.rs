//! Route handlers, one module per resource.

pub mod admin;
pub mod certificates;
pub mod users;
