pub mod plots;

pub use plots::{plot_confusion_matrix, write_confusion_matrix};
