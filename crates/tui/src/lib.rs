pub mod app;
pub mod colors;
pub mod confirm;
pub mod display;
pub mod event;
pub mod ui;

pub use app::App;
