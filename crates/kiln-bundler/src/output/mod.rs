//! Persisting a finished build.

pub mod writer;

pub use writer::write_files_to;
