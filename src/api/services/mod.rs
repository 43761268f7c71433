pub mod callbacks;
pub mod health;
pub mod relay;

pub use callbacks::{CallbackService, callback_routes};
pub use health::{AppStartTime, HealthService, health_routes};
pub use relay::api_v1_routes;
