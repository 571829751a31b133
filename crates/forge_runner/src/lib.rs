mod module;
mod runner;

pub use module::Module;
pub use runner::{Builder, Runner};
