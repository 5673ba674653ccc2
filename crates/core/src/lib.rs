pub mod channel;
pub mod engine;
pub mod logger;
pub mod matcher;
pub mod paths;
pub mod platform;
pub mod preflight;
pub mod region;
pub mod settings;
pub mod template;
pub mod types;
