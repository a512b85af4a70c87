mod authentication_gate_impl;
mod clock;
mod guards;
mod jwt_token_codec;

pub use authentication_gate_impl::*;
pub use clock::*;
pub use guards::*;
pub use jwt_token_codec::*;
