pub mod config;
pub mod dynamic;
pub mod resolver;
pub mod response;
pub mod types;

pub use config::ConfigLoader;
pub use dynamic::{Clock, DynamicVariables, FixedClock, SystemClock};
pub use resolver::{VariableResolver, VariableState};
pub use response::{NamedResponseRecord, NamedResponseStore, ResponseBody};
pub use types::{Environment, SandboxSettings, VariableConfig, VariableStore};
