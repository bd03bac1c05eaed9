//! Small ndarray-like types used throughout the crate.
//!
//! `Array2` is a row-major matrix with the handful of methods the pipeline
//! needs, and `vector` holds slice helpers. `linalg` holds the covariance
//! and Cholesky routines used by the Gaussian resampler.
pub mod linalg;
pub mod matrix;
pub mod vector;

pub use matrix::{Array2, ShapeError};
pub use vector::argmax;
