pub mod config;
pub mod error;
pub mod templates;
pub mod xml;

pub use config::Config;
pub use error::ConfigError;
pub use xml::XmlConfig;
