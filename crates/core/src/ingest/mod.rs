pub mod extract;
pub mod source;
pub mod types;
