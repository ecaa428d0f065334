// Sphinx extension catalogue and load-order resolution

pub mod catalog;
pub mod manager;
pub mod probe;

pub use catalog::*;
pub use manager::*;
pub use probe::*;
