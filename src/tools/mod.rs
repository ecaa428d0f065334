// Maintenance tools: dependency fixing, log analysis, environment checks

pub mod depfix;
pub mod doctor;
pub mod logs;

pub use depfix::*;
pub use doctor::*;
pub use logs::*;
