pub mod models;
pub mod service;
pub mod settings;
pub mod workflow;

pub use models::*;
pub use service::{AppState, build_router, create_app};
pub use settings::{LogFormat, ServiceSettings};
pub use workflow::{build_app_state, create_app_state};
