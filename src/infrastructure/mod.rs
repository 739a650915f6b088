pub mod js_executor;
pub mod session_manager;

pub use js_executor::JsExecutor;
pub use session_manager::{LaunchPolicy, PageOf, SessionManager};
