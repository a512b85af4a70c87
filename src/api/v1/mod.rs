mod error;
mod handler;
mod router;
mod transport;

pub use error::{ApiErrorCode, recover_error};
pub use handler::ApiResponse;
pub use router::routes;
pub use transport::{ACCESS_TOKEN_HEADER, CookiePolicy, REFRESH_COOKIE};
