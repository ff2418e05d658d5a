//! Bearer authentication.

mod middleware;

pub use middleware::AuthUser;
