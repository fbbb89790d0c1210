pub mod campaign;
pub mod import;
pub mod product;
pub mod user;
