pub mod assertion;
pub mod error;
pub mod http;
pub mod logger;
pub mod parser;
pub mod runner;
pub mod script;
pub mod utils;
pub mod variable;

// Re-export commonly used types
pub use error::{RestflowError, Result};
