//! Server module
//!
//! Configuration, HTTP router and lifecycle of the webshell server.

pub mod config;
pub mod init;
pub mod loader;
pub mod shutdown;
pub mod system_info;
pub mod validation;

pub use config::AppConfig;
pub use init::run;
pub use loader::load_config;
