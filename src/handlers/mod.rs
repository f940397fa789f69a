pub mod admin;
pub mod images;
