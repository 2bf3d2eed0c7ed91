//! `roomio`: small line-oriented IO helpers for the roommud text protocol.
//!
//! - CRLF/LF/CR line framing without copying (`BytesMut::split_to(..).freeze()`),
//! - outbound text framing: every message ends with the prompt marker so clients
//!   always know where to type next.

pub mod line;
pub mod text;
