//! Outbound text framing.
//!
//! Every server message is written as `\r<text>\r\n> `: the leading `\r` returns the
//! cursor over a half-typed prompt line, and the trailing prompt marker tells the client
//! where to type next.

use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;

pub const PROMPT: &[u8] = b"> ";

/// Frame a message followed by the prompt marker.
pub fn message(text: &str) -> Bytes {
    let mut b = BytesMut::with_capacity(text.len() + 3 + PROMPT.len());
    b.put_u8(b'\r');
    b.put_slice(text.as_bytes());
    b.put_slice(b"\r\n");
    b.put_slice(PROMPT);
    b.freeze()
}

/// Frame a question that expects an answer on the same line (no newline, no marker).
pub fn prompt(text: &str) -> Bytes {
    let mut b = BytesMut::with_capacity(text.len() + 2);
    b.put_u8(b'\r');
    b.put_slice(text.as_bytes());
    b.put_u8(b' ');
    b.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ends_with_prompt_marker() {
        assert_eq!(&message("You: hi")[..], b"\rYou: hi\r\n> ");
        assert_eq!(&message("")[..], b"\r\r\n> ");
    }

    #[test]
    fn prompt_has_no_newline() {
        assert_eq!(&prompt("name:")[..], b"\rname: ");
    }
}
