pub mod types;
pub mod keycode;
pub mod logger;
pub mod sleep;
pub mod state;
pub mod queue;
pub mod executor;
pub mod engine;
pub mod profile;
pub mod settings;
pub mod platform;
pub mod orchestrator;
