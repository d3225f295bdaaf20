pub mod config;
pub mod error;
pub mod memory;
pub mod node;
pub mod projection;
pub mod propagation;
pub mod traits;
pub mod types;

pub use self::config::{
    ConfigManager, DatabaseConfig, LoggingConfig, SecurityConfig, ServerConfig, Settings,
};
pub use error::*;
pub use memory::*;
pub use node::*;
pub use projection::*;
pub use propagation::*;
pub use traits::*;
pub use types::*;
