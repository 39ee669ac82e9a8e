//! Wire protocol: variant negotiation, multiplexing codec, feed requests

pub mod mux;
pub mod negotiate;
pub mod request;

pub use mux::{Frame, FrameError, FrameKind};
pub use negotiate::{ProtocolVariant, ALPN_MUX, ALPN_SIMPLE};
pub use request::{Request, RequestError};
