mod principal;
mod session;
mod token;

pub use principal::*;
pub use session::*;
pub use token::*;
