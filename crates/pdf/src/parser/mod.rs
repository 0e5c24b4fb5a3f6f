pub mod backend;
pub mod content;
pub mod merge;
pub mod questions;
