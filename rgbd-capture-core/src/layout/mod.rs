pub mod arena;
pub mod body;
pub mod face;
pub mod primitives;
pub mod registry;
pub mod schema;
pub mod view;
