pub mod config_manager;
pub mod error;
pub mod report;
pub mod retry;
pub mod traits;
pub mod types;

pub use config_manager::*;
pub use error::*;
pub use report::*;
pub use retry::*;
pub use traits::*;
pub use types::*;
