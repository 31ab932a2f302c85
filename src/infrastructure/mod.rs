//! 基础设施层：持有浏览器页面，只暴露能力

pub mod js_executor;

pub use js_executor::{js_string, JsExecutor, Locator};
