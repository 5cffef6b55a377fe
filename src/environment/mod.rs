//! Environment Management Module
//!
//! Handles discovery of the Python interpreter that runs generated
//! dataset scripts.

pub mod python;

pub use python::{check_packages, interpreter_version, resolve_interpreter, PYTHON_PATH, REQUIRED_PACKAGES};
