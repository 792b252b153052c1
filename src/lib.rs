pub mod catalog;
pub mod geo;
pub mod location;
pub mod render;
pub mod search;
