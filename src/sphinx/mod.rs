// Sphinx configuration model

pub mod conf;
pub mod theme;

pub use conf::*;
pub use theme::*;
