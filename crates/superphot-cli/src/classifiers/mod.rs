pub mod classify;
pub mod confusion_matrix;
pub mod input;
pub mod trainer;
pub mod validate;
