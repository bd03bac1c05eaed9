pub mod classifiers;
pub mod cli;
pub mod util;
