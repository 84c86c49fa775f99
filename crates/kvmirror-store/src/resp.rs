//! RESP2 framing: command encoding and incremental reply decoding.
//!
//! Commands go out as an array of bulk strings. Replies are decoded from a
//! byte buffer that may hold a partial frame; [`decode`] returns `Ok(None)`
//! until a whole frame is available and reports how many bytes it consumed.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{StoreError, StoreResult};

/// Largest bulk string the decoder accepts (the Redis default limit).
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Deepest array nesting the decoder accepts. Replies to the commands this
/// crate sends nest at most one level.
pub const MAX_DEPTH: usize = 8;

/// A decoded RESP2 reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    /// Nil bulk string or nil array.
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    /// Short human-readable rendering, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Frame::Simple(s) => format!("+{s}"),
            Frame::Error(e) => format!("-{e}"),
            Frame::Integer(n) => format!(":{n}"),
            Frame::Bulk(b) => format!("${}", String::from_utf8_lossy(b)),
            Frame::Null => "(nil)".to_string(),
            Frame::Array(items) => format!("array of {}", items.len()),
        }
    }
}

/// Encode a command as a RESP array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    buf.put_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        buf.put_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.put_slice(arg);
        buf.put_slice(b"\r\n");
    }
    buf
}

/// Decode one frame from the front of `data`.
///
/// Returns `(frame, bytes_consumed)`, or `None` when `data` holds only part
/// of a frame.
pub fn decode(data: &[u8]) -> StoreResult<Option<(Frame, usize)>> {
    let mut pos = 0;
    Ok(parse_frame(data, &mut pos, 0)?.map(|frame| (frame, pos)))
}

fn parse_frame(data: &[u8], pos: &mut usize, depth: usize) -> StoreResult<Option<Frame>> {
    let Some(&tag) = data.get(*pos) else {
        return Ok(None);
    };
    *pos += 1;
    let Some(line) = read_line(data, pos) else {
        return Ok(None);
    };

    let frame = match tag {
        b'+' => Frame::Simple(line_text(line)?),
        b'-' => Frame::Error(line_text(line)?),
        b':' => Frame::Integer(line_int(line)?),
        b'$' => {
            let len = line_int(line)?;
            if len < 0 {
                Frame::Null
            } else {
                let len = len as usize;
                if len > MAX_BULK_LEN {
                    return Err(StoreError::Protocol(format!(
                        "bulk string of {len} bytes exceeds limit"
                    )));
                }
                if data.len() < *pos + len + 2 {
                    return Ok(None);
                }
                if &data[*pos + len..*pos + len + 2] != b"\r\n" {
                    return Err(StoreError::Protocol("bulk string not terminated".into()));
                }
                let body = Bytes::copy_from_slice(&data[*pos..*pos + len]);
                *pos += len + 2;
                Frame::Bulk(body)
            }
        }
        b'*' => {
            let count = line_int(line)?;
            if count < 0 {
                Frame::Null
            } else if depth >= MAX_DEPTH {
                return Err(StoreError::Protocol(format!(
                    "arrays nested deeper than {MAX_DEPTH} levels"
                )));
            } else {
                let count = count as usize;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    match parse_frame(data, pos, depth + 1)? {
                        Some(item) => items.push(item),
                        None => return Ok(None),
                    }
                }
                Frame::Array(items)
            }
        }
        other => {
            return Err(StoreError::Protocol(format!(
                "unknown frame type byte 0x{other:02x}"
            )))
        }
    };
    Ok(Some(frame))
}

fn read_line<'a>(data: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    let rest = &data[*pos..];
    let end = rest.windows(2).position(|w| w == b"\r\n")?;
    *pos += end + 2;
    Some(&rest[..end])
}

fn line_text(line: &[u8]) -> StoreResult<String> {
    std::str::from_utf8(line)
        .map(str::to_string)
        .map_err(|e| StoreError::Protocol(format!("non-UTF-8 status line: {e}")))
}

fn line_int(line: &[u8]) -> StoreResult<i64> {
    let text = line_text(line)?;
    text.parse()
        .map_err(|_| StoreError::Protocol(format!("invalid integer {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(data: &[u8]) -> Frame {
        let (frame, used) = decode(data).unwrap().expect("complete frame");
        assert_eq!(used, data.len());
        frame
    }

    #[test]
    fn encodes_command_as_bulk_array() {
        let buf = encode_command(&[b"HSET", b"scores", b"alice", b"10"]);
        assert_eq!(
            &buf[..],
            b"*4\r\n$4\r\nHSET\r\n$6\r\nscores\r\n$5\r\nalice\r\n$2\r\n10\r\n"
        );
    }

    #[test]
    fn encodes_empty_argument() {
        let buf = encode_command(&[b"SET", b"k", b""]);
        assert_eq!(&buf[..], b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$0\r\n\r\n");
    }

    #[test]
    fn decodes_simple_and_error() {
        assert_eq!(decode_all(b"+OK\r\n"), Frame::Simple("OK".into()));
        assert_eq!(
            decode_all(b"-ERR unknown command\r\n"),
            Frame::Error("ERR unknown command".into())
        );
    }

    #[test]
    fn decodes_integer() {
        assert_eq!(decode_all(b":1\r\n"), Frame::Integer(1));
        assert_eq!(decode_all(b":-42\r\n"), Frame::Integer(-42));
    }

    #[test]
    fn decodes_bulk_and_nil() {
        assert_eq!(
            decode_all(b"$5\r\nhello\r\n"),
            Frame::Bulk(Bytes::from_static(b"hello"))
        );
        assert_eq!(decode_all(b"$0\r\n\r\n"), Frame::Bulk(Bytes::new()));
        assert_eq!(decode_all(b"$-1\r\n"), Frame::Null);
        assert_eq!(decode_all(b"*-1\r\n"), Frame::Null);
    }

    #[test]
    fn bulk_may_contain_crlf() {
        assert_eq!(
            decode_all(b"$4\r\na\r\nb\r\n"),
            Frame::Bulk(Bytes::from_static(b"a\r\nb"))
        );
    }

    #[test]
    fn decodes_nested_array() {
        let frame = decode_all(b"*2\r\n$1\r\na\r\n*1\r\n:7\r\n");
        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::Bulk(Bytes::from_static(b"a")),
                Frame::Array(vec![Frame::Integer(7)]),
            ])
        );
    }

    #[test]
    fn nesting_up_to_limit_decodes() {
        let mut data = b"*1\r\n".repeat(MAX_DEPTH);
        data.extend_from_slice(b":1\r\n");
        let mut frame = decode_all(&data);
        for _ in 0..MAX_DEPTH {
            let Frame::Array(mut items) = frame else {
                panic!("expected array")
            };
            frame = items.remove(0);
        }
        assert_eq!(frame, Frame::Integer(1));
    }

    #[test]
    fn deep_nesting_is_a_protocol_error() {
        let mut data = b"*1\r\n".repeat(MAX_DEPTH + 1);
        data.extend_from_slice(b":1\r\n");
        assert!(matches!(decode(&data), Err(StoreError::Protocol(_))));

        let hostile = b"*1\r\n".repeat(1_000_000);
        assert!(matches!(decode(&hostile), Err(StoreError::Protocol(_))));
    }

    #[test]
    fn partial_input_needs_more() {
        let full: &[u8] = b"*2\r\n$5\r\nalice\r\n$2\r\n10\r\n";
        for cut in 0..full.len() {
            assert!(
                decode(&full[..cut]).unwrap().is_none(),
                "prefix of {cut} bytes decoded"
            );
        }
    }

    #[test]
    fn reports_bytes_consumed_with_trailing_data() {
        let (frame, used) = decode(b":1\r\n:2\r\n").unwrap().unwrap();
        assert_eq!(frame, Frame::Integer(1));
        assert_eq!(used, 4);
    }

    #[test]
    fn rejects_unknown_type_byte() {
        assert!(matches!(
            decode(b"!oops\r\n"),
            Err(StoreError::Protocol(_))
        ));
    }

    #[test]
    fn rejects_bad_integer() {
        assert!(matches!(decode(b":abc\r\n"), Err(StoreError::Protocol(_))));
    }

    #[test]
    fn rejects_unterminated_bulk() {
        assert!(matches!(
            decode(b"$2\r\nabXY"),
            Err(StoreError::Protocol(_))
        ));
    }

    #[test]
    fn describe_is_compact() {
        assert_eq!(Frame::Integer(3).describe(), ":3");
        assert_eq!(Frame::Null.describe(), "(nil)");
        assert_eq!(Frame::Array(vec![Frame::Null]).describe(), "array of 1");
    }
}
