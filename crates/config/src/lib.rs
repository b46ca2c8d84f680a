// Configuration loading

pub mod settings;

pub use settings::{ConfigError, DispatchSettings, RemoteSettings, Settings, WindowSettings};
