//! Data models delivered to request callbacks

mod rate_limit;
mod status;
mod user;

pub use rate_limit::RateLimit;
pub use status::Status;
pub(crate) use status::WireStatus;
pub use user::User;
