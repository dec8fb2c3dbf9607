pub mod description;
pub mod index;
pub mod replay;
