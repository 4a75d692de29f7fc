pub mod dem;
pub mod grid;
pub mod projection;
