// Running sphinx-build for one package or a whole monorepo

pub mod runner;
pub mod scheduler;
pub mod sphinx;

#[cfg(test)]
pub(crate) mod testing;

pub use runner::*;
pub use scheduler::*;
pub use sphinx::*;
