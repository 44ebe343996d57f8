pub mod auth;
pub mod health;
pub use self::health::health;

pub mod endpoint;
pub use self::endpoint::endpoint;
