//! Content-Length message framing.
//!
//! The buffer functions serve tests and in-memory clients; the adapter
//! itself reads and writes through [`read_message`] and [`write_message`].

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

const SEPARATOR: &str = "\r\n\r\n";

/// Encodes a JSON value as a framed message.
pub fn encode_message(value: &serde_json::Value) -> Vec<u8> {
    let body = serde_json::to_string(value).unwrap_or_default();
    let header = format!("Content-Length: {}{SEPARATOR}", body.len());
    let mut buf = Vec::with_capacity(header.len() + body.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(body.as_bytes());
    buf
}

/// Decodes one framed message from the front of `data`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_message(data: &[u8]) -> Result<(serde_json::Value, usize), ProtocolError> {
    let sep_pos = find_separator(data).ok_or_else(|| {
        ProtocolError::Transport("incomplete header: missing \\r\\n\\r\\n".into())
    })?;
    let header = std::str::from_utf8(&data[..sep_pos])
        .map_err(|e| ProtocolError::Transport(format!("invalid UTF-8 in header: {e}")))?;
    let body_start = sep_pos + SEPARATOR.len();

    let content_length = parse_content_length(header.split("\r\n"))?;

    let total_consumed = body_start + content_length;
    if data.len() < total_consumed {
        return Err(ProtocolError::Transport(format!(
            "incomplete body: expected {content_length} bytes, have {}",
            data.len() - body_start
        )));
    }

    let value = parse_body(&data[body_start..total_consumed])?;
    Ok((value, total_consumed))
}

/// Reads one framed message. Returns `Ok(None)` on a clean end of stream
/// before any header byte.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<serde_json::Value>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            if headers.is_empty() {
                return Ok(None);
            }
            return Err(ProtocolError::Transport(
                "stream closed inside message header".into(),
            ));
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if headers.is_empty() {
                // Stray blank line between messages.
                continue;
            }
            break;
        }
        headers.push(trimmed.to_string());
    }

    let length = parse_content_length(headers.iter().map(String::as_str))?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    parse_body(&body).map(Some)
}

/// Writes one framed message and flushes.
pub async fn write_message<W>(writer: &mut W, value: &serde_json::Value) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode_message(value)).await?;
    writer.flush().await?;
    Ok(())
}

fn find_separator(data: &[u8]) -> Option<usize> {
    data.windows(SEPARATOR.len())
        .position(|w| w == SEPARATOR.as_bytes())
}

fn parse_body(body: &[u8]) -> Result<serde_json::Value, ProtocolError> {
    serde_json::from_slice(body)
        .map_err(|e| ProtocolError::InvalidMessage(format!("JSON parse error: {e}")))
}

fn parse_content_length<'a>(lines: impl Iterator<Item = &'a str>) -> Result<usize, ProtocolError> {
    for line in lines {
        if let Some(value) = line.trim().strip_prefix("Content-Length:") {
            let value = value.trim();
            return value.parse::<usize>().map_err(|e| {
                ProtocolError::Transport(format!("invalid Content-Length value '{value}': {e}"))
            });
        }
    }
    Err(ProtocolError::Transport("missing Content-Length header".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[test]
    fn encode_then_decode_request() {
        let req = json!({
            "seq": 1,
            "type": "request",
            "command": "initialize",
            "arguments": {"adapterID": "swf"}
        });
        let encoded = encode_message(&req);
        let s = String::from_utf8(encoded.clone()).unwrap();
        assert!(s.starts_with("Content-Length: "));

        let (decoded, consumed) = decode_message(&encoded).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn content_length_counts_bytes_not_chars() {
        let msg = json!({"output": "caf\u{e9}"});
        let encoded = encode_message(&msg);
        let body = serde_json::to_string(&msg).unwrap();
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        assert!(encoded.starts_with(header.as_bytes()));
        assert_ne!(body.len(), body.chars().count());
    }

    #[test]
    fn malformed_header() {
        let err = decode_message(b"Bad-Header: 42\r\n\r\n{}").unwrap_err();
        assert!(err.to_string().contains("missing Content-Length"), "got: {err}");
    }

    #[test]
    fn incomplete_body() {
        let err = decode_message(b"Content-Length: 100\r\n\r\n{\"short\":true}").unwrap_err();
        assert!(err.to_string().contains("incomplete body"), "got: {err}");
    }

    #[test]
    fn missing_separator() {
        let err = decode_message(b"Content-Length: 2\r\n{}").unwrap_err();
        assert!(err.to_string().contains("incomplete header"), "got: {err}");
    }

    #[test]
    fn invalid_json_body() {
        let err = decode_message(b"Content-Length: 3\r\n\r\n{x}").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn multiple_messages_in_one_buffer() {
        let msg1 = json!({"seq": 1, "type": "request", "command": "threads"});
        let msg2 = json!({"seq": 2, "type": "request", "command": "disconnect"});
        let mut buf = encode_message(&msg1);
        buf.extend_from_slice(&encode_message(&msg2));

        let (decoded1, consumed1) = decode_message(&buf).unwrap();
        assert_eq!(decoded1, msg1);
        let (decoded2, consumed2) = decode_message(&buf[consumed1..]).unwrap();
        assert_eq!(decoded2, msg2);
        assert_eq!(consumed1 + consumed2, buf.len());
    }

    #[tokio::test]
    async fn read_message_sequence_then_eof() {
        let msg1 = json!({"seq": 1, "type": "request", "command": "initialize"});
        let msg2 = json!({"seq": 2, "type": "request", "command": "launch"});
        let mut buf = encode_message(&msg1);
        buf.extend_from_slice(&encode_message(&msg2));

        let mut reader = BufReader::new(buf.as_slice());
        assert_eq!(read_message(&mut reader).await.unwrap(), Some(msg1));
        assert_eq!(read_message(&mut reader).await.unwrap(), Some(msg2));
        assert_eq!(read_message(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_message_accepts_extra_headers() {
        let data = b"Content-Type: application/json\r\nContent-Length: 2\r\n\r\n{}";
        let mut reader = BufReader::new(&data[..]);
        assert_eq!(read_message(&mut reader).await.unwrap(), Some(json!({})));
    }

    #[tokio::test]
    async fn read_message_truncated_header_is_error() {
        let mut reader = BufReader::new(&b"Content-Length: 2\r\n"[..]);
        assert!(read_message(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn read_message_truncated_body_is_io_error() {
        let mut reader = BufReader::new(&b"Content-Length: 10\r\n\r\n{}"[..]);
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Io(_)));
    }

    #[tokio::test]
    async fn write_message_frames_value() {
        let mut out: Vec<u8> = Vec::new();
        let value = json!({"seq": 5, "type": "event", "event": "initialized"});
        write_message(&mut out, &value).await.unwrap();
        let (decoded, consumed) = decode_message(&out).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, out.len());
    }
}
