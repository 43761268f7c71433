//! 对外 API（/api/v1）

pub mod consent;
pub mod error_code;
pub mod helpers;
pub mod messaging;
pub mod phone;
pub mod routes;
pub mod types;

pub use error_code::ErrorCode;
pub use routes::{ApiGovernorConfig, api_governor_config, api_v1_routes, json_config};
pub use types::ApiResponse;
