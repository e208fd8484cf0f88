pub mod category;
pub mod filter;
#[allow(clippy::module_inception)]
pub mod tasks;
