pub mod http;
pub mod state;

pub use http::ViewerServer;
pub use state::{ReloadEvent, ViewerState};
