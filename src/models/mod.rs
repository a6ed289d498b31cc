// src/models/mod.rs
pub mod driver;
pub mod package;
pub mod pickup;

pub use driver::*;
pub use package::*;
pub use pickup::*;
