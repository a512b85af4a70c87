mod access_guard;
mod authentication_gate;
mod token_service;

pub use access_guard::*;
pub use authentication_gate::*;
pub use token_service::*;
