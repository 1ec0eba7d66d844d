pub mod entity;
pub mod grid;
pub mod physics;
pub mod plates;
pub mod tile;
pub mod traps;
