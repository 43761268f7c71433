pub mod auth;
pub mod callback_auth;
pub mod request_id;

pub use auth::ApiAuth;
pub use callback_auth::CallbackAuth;
pub use request_id::{RequestId, RequestIdMiddleware};
