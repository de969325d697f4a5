// Sessiongate: Cookie Module
//
// Session cookie model and the codec that turns a cookie set into the string
// kept in the encrypted store, and back.

mod codec;
mod error;
mod model;

pub use codec::{decode, decode_report, encode, DecodeReport};
pub use error::CodecError;
pub use model::{Cookie, CookieSet};
