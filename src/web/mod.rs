pub mod api;
pub mod api_doc;
pub mod mirror;
pub mod server;
pub mod ui;

pub use mirror::TextMirror;
pub use server::{run_server, AppState};
