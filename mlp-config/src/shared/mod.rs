mod base;
mod database;
mod object_store;
mod retry;

pub use base::*;
pub use database::*;
pub use object_store::*;
pub use retry::*;
