//! Wire codec
//!
//! Inbound framing is line-oriented except for `MSG` bodies, which are read
//! by their declared length:
//!
//! ```text
//! REG @alice\n
//! JOIN #general\n
//! MSG #general 11\r\nhello\nworld        (body starts after the line terminator)
//! MSG @bob 5 hello                        (body starts after a single space)
//! ```
//!
//! The body may contain any byte value, including `\n`. It is never scanned
//! for delimiters.
//!
//! Outbound lines:
//!
//! ```text
//! OK\n
//! ERR <reason>\n
//! <sender>: <body>\n     (channel broadcast)
//! <body>\n               (direct message)
//! ```

use std::ops::Range;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::*;
use super::error::ProtocolError;
use super::frame::{Frame, Verb};
use super::name::{ChannelName, Identity, Recipient};

/// Streaming frame decoder
///
/// Feed it the connection's read buffer; each call consumes at most one
/// frame. Malformed lines are consumed along with the error so decoding can
/// resume on the next line. A body over the size limit is skipped by its
/// declared length, across calls if needed.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_line_length: usize,
    max_body_length: usize,
    /// Bytes of a rejected body still to be skipped
    discard: usize,
}

/// Outcome of scanning the head of the buffer
enum Scan {
    /// More bytes are needed
    Incomplete,
    /// Blank line of the given length
    Skip(usize),
    /// A complete frame spanning the given number of bytes
    Frame(FrameHead, usize),
    /// A malformed frame; the given number of bytes should be discarded
    Invalid(ProtocolError, usize),
    /// A message header whose body is over the limit: drop the header bytes,
    /// then skip the body by count
    Oversized(ProtocolError, usize, usize),
}

/// Frame with the body still referring into the scanned buffer
enum FrameHead {
    Register(Identity),
    Join(ChannelName),
    Message {
        recipient: Recipient,
        body: Range<usize>,
    },
}

impl FrameHead {
    fn into_frame(self, chunk: Bytes) -> Frame {
        match self {
            FrameHead::Register(identity) => Frame::Register(identity),
            FrameHead::Join(channel) => Frame::Join(channel),
            FrameHead::Message { recipient, body } => Frame::Message {
                recipient,
                body: chunk.slice(body),
            },
        }
    }
}

impl FrameDecoder {
    /// Create a decoder with default limits
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_LINE_LENGTH, DEFAULT_MAX_BODY_LENGTH)
    }

    /// Create a decoder with explicit line and body limits
    pub fn with_limits(max_line_length: usize, max_body_length: usize) -> Self {
        Self {
            max_line_length,
            max_body_length,
            discard: 0,
        }
    }

    /// Check whether the decoder is skipping a rejected body
    pub fn is_discarding(&self) -> bool {
        self.discard > 0
    }

    /// Decode the next frame from the buffer
    ///
    /// Returns `Ok(None)` when the buffer holds no complete frame yet.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        self.decode_inner(buf, false)
    }

    /// Decode the next frame once the peer has closed its side
    ///
    /// An unterminated final line is treated as complete; a body that never
    /// fully arrived fails with `TruncatedBody`.
    pub fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        self.decode_inner(buf, true)
    }

    fn decode_inner(&mut self, buf: &mut BytesMut, eof: bool) -> Result<Option<Frame>, ProtocolError> {
        loop {
            if self.discard > 0 {
                let skip = self.discard.min(buf.len());
                buf.advance(skip);
                self.discard -= skip;
                if self.discard > 0 {
                    return Ok(None);
                }
            }

            match self.scan(buf, eof) {
                Scan::Incomplete => return Ok(None),
                Scan::Skip(len) => buf.advance(len),
                Scan::Frame(head, len) => {
                    let chunk = buf.split_to(len).freeze();
                    return Ok(Some(head.into_frame(chunk)));
                }
                Scan::Invalid(err, len) => {
                    buf.advance(len);
                    return Err(err);
                }
                Scan::Oversized(err, header_len, body_len) => {
                    buf.advance(header_len);
                    self.discard = body_len;
                    return Err(err);
                }
            }
        }
    }

    fn scan(&self, buf: &[u8], eof: bool) -> Scan {
        let newline = find_newline(buf);
        let terminated = newline.is_some() || eof;
        let line_end = newline.unwrap_or(buf.len());
        let consumed = newline.map_or(buf.len(), |nl| nl + 1);
        let line = &buf[..line_end];

        if terminated && line.trim_ascii().is_empty() {
            return if consumed == 0 {
                Scan::Incomplete
            } else {
                Scan::Skip(consumed)
            };
        }

        let start = skip_whitespace(line, 0);
        let verb_end = token_end(line, start);
        if verb_end == line.len() && !terminated {
            return self.incomplete_or_too_long(buf);
        }

        let word = &line[start..verb_end];
        match Verb::parse(word) {
            // MSG may carry an inline body that runs past the first newline
            Some(Verb::Msg) => self.scan_message(buf, verb_end, newline, eof),
            _ if !terminated => self.incomplete_or_too_long(buf),
            _ if line.len() > self.max_line_length => Scan::Invalid(
                ProtocolError::LineTooLong {
                    max: self.max_line_length,
                },
                consumed,
            ),
            Some(Verb::Reg) => complete(
                Identity::parse(&line[verb_end..]).map(FrameHead::Register),
                consumed,
            ),
            Some(Verb::Join) => complete(
                ChannelName::parse(&line[verb_end..]).map(FrameHead::Join),
                consumed,
            ),
            None => Scan::Invalid(
                ProtocolError::UnknownCommand(String::from_utf8_lossy(word).into_owned()),
                consumed,
            ),
        }
    }

    fn scan_message(&self, buf: &[u8], verb_end: usize, newline: Option<usize>, eof: bool) -> Scan {
        let terminated = newline.is_some() || eof;
        let line_end = newline.unwrap_or(buf.len());
        let consumed = newline.map_or(buf.len(), |nl| nl + 1);
        let line = &buf[..line_end];

        // Header errors are only reported once the whole line is buffered,
        // otherwise the rest of the line would be misread as a new command.
        let fail = |err: ProtocolError| {
            if terminated {
                Scan::Invalid(err, consumed)
            } else {
                self.incomplete_or_too_long(buf)
            }
        };

        let recipient_start = skip_spaces(line, verb_end);
        let recipient_end = token_end(line, recipient_start);
        if recipient_end == line.len() && !terminated {
            return self.incomplete_or_too_long(buf);
        }
        let recipient = match Recipient::parse(&line[recipient_start..recipient_end]) {
            Ok(recipient) => recipient,
            Err(err) => return fail(err),
        };

        let digits_start = skip_spaces(line, recipient_end);
        let digits_end = line[digits_start..]
            .iter()
            .position(|b| !b.is_ascii_digit())
            .map_or(line.len(), |i| digits_start + i);
        if digits_end == line.len() && !terminated {
            return self.incomplete_or_too_long(buf);
        }
        if digits_end == digits_start {
            return fail(ProtocolError::MissingLength);
        }
        if digits_end > self.max_line_length {
            return fail(ProtocolError::LineTooLong {
                max: self.max_line_length,
            });
        }

        // A length that overflows is larger than any limit
        let length = parse_length(&line[digits_start..digits_end]).unwrap_or(usize::MAX);
        if length == 0 {
            return fail(ProtocolError::EmptyBody);
        }

        // Exactly one delimiter: a space (inline body) or the line terminator
        let body_start = match &line[digits_end..] {
            [b' ', ..] => digits_end + 1,
            [] | [b'\r'] if terminated => consumed,
            _ => return fail(ProtocolError::MissingLength),
        };

        if length > self.max_body_length {
            return Scan::Oversized(
                ProtocolError::BodyTooLarge {
                    length,
                    max: self.max_body_length,
                },
                body_start,
                length,
            );
        }

        let body_end = body_start + length;
        if buf.len() < body_end {
            if eof {
                return Scan::Invalid(
                    ProtocolError::TruncatedBody {
                        expected: length,
                        available: buf.len() - body_start,
                    },
                    buf.len(),
                );
            }
            return Scan::Incomplete;
        }

        Scan::Frame(
            FrameHead::Message {
                recipient,
                body: body_start..body_end,
            },
            body_end,
        )
    }

    fn incomplete_or_too_long(&self, buf: &[u8]) -> Scan {
        if buf.len() > self.max_line_length {
            Scan::Invalid(
                ProtocolError::LineTooLong {
                    max: self.max_line_length,
                },
                buf.len(),
            )
        } else {
            Scan::Incomplete
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one complete frame
///
/// The slice must hold the whole frame; a body shorter than its declared
/// length fails with `TruncatedBody`. Bytes after the first frame are ignored.
pub fn decode_frame(frame: &[u8]) -> Result<Frame, ProtocolError> {
    let mut buf = BytesMut::from(frame);
    FrameDecoder::new()
        .decode_eof(&mut buf)?
        .ok_or_else(|| ProtocolError::UnknownCommand(String::new()))
}

/// Encode a client command (used by clients and tests)
pub fn encode_frame(frame: &Frame) -> Bytes {
    match frame {
        Frame::Register(identity) => Bytes::from(format!("REG {}\n", identity)),
        Frame::Join(channel) => Bytes::from(format!("JOIN {}\n", channel)),
        Frame::Message { recipient, body } => {
            let header = format!("MSG {} {}\r\n", recipient, body.len());
            let mut buf = BytesMut::with_capacity(header.len() + body.len());
            buf.put_slice(header.as_bytes());
            buf.put_slice(body);
            buf.freeze()
        }
    }
}

/// `OK\n`
pub fn encode_ok() -> Bytes {
    Bytes::from_static(REPLY_OK)
}

/// `ERR <message>\n`
pub fn encode_error(message: impl std::fmt::Display) -> Bytes {
    let message = message.to_string();
    let mut buf = BytesMut::with_capacity(REPLY_ERR_PREFIX.len() + message.len() + 1);
    buf.put_slice(REPLY_ERR_PREFIX);
    buf.put_slice(message.as_bytes());
    buf.put_u8(b'\n');
    buf.freeze()
}

/// `<sender>: <body>\n`
pub fn encode_channel_message(sender: &Identity, body: &[u8]) -> Bytes {
    let sender = sender.as_str().as_bytes();
    let mut buf = BytesMut::with_capacity(sender.len() + CHANNEL_SEPARATOR.len() + body.len() + 1);
    buf.put_slice(sender);
    buf.put_slice(CHANNEL_SEPARATOR);
    buf.put_slice(body);
    buf.put_u8(b'\n');
    buf.freeze()
}

/// `<body>\n`
pub fn encode_direct_message(body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(body.len() + 1);
    buf.put_slice(body);
    buf.put_u8(b'\n');
    buf.freeze()
}

fn complete(head: Result<FrameHead, ProtocolError>, consumed: usize) -> Scan {
    match head {
        Ok(head) => Scan::Frame(head, consumed),
        Err(err) => Scan::Invalid(err, consumed),
    }
}

fn find_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

fn skip_whitespace(line: &[u8], from: usize) -> usize {
    line[from..]
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(line.len(), |i| from + i)
}

fn skip_spaces(line: &[u8], from: usize) -> usize {
    line[from..]
        .iter()
        .position(|&b| b != b' ' && b != b'\t')
        .map_or(line.len(), |i| from + i)
}

fn token_end(line: &[u8], from: usize) -> usize {
    line[from..]
        .iter()
        .position(u8::is_ascii_whitespace)
        .map_or(line.len(), |i| from + i)
}

fn parse_length(digits: &[u8]) -> Option<usize> {
    digits.iter().try_fold(0usize, |acc, &d| {
        acc.checked_mul(10)?.checked_add(usize::from(d - b'0'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(data: &[u8]) -> BytesMut {
        BytesMut::from(data)
    }

    fn identity(s: &str) -> Identity {
        s.parse().unwrap()
    }

    fn channel(s: &str) -> ChannelName {
        s.parse().unwrap()
    }

    #[test]
    fn test_decode_register() {
        let frame = decode_frame(b"REG @alice\n").unwrap();
        assert_eq!(frame, Frame::Register(identity("@alice")));

        let frame = decode_frame(b"reg   @alice  \r\n").unwrap();
        assert_eq!(frame, Frame::Register(identity("@alice")));
    }

    #[test]
    fn test_decode_register_invalid() {
        assert_eq!(decode_frame(b"REG alice\n"), Err(ProtocolError::InvalidIdentity));
        assert_eq!(decode_frame(b"REG\n"), Err(ProtocolError::InvalidIdentity));
        assert_eq!(decode_frame(b"REG   \n"), Err(ProtocolError::InvalidIdentity));
    }

    #[test]
    fn test_decode_join() {
        let frame = decode_frame(b"JOIN #general\n").unwrap();
        assert_eq!(frame, Frame::Join(channel("#general")));

        assert_eq!(
            decode_frame(b"join general\n"),
            Err(ProtocolError::InvalidChannelName)
        );
        assert_eq!(decode_frame(b"JOIN\n"), Err(ProtocolError::InvalidChannelName));
    }

    #[test]
    fn test_decode_unknown_command() {
        assert_eq!(
            decode_frame(b"LEAVE #general\n"),
            Err(ProtocolError::UnknownCommand("LEAVE".into()))
        );
        assert_eq!(
            decode_frame(b"hello\n").unwrap_err().to_string(),
            "unknown command hello"
        );
    }

    #[test]
    fn test_decode_message_crlf() {
        let frame = decode_frame(b"MSG #general 5\r\nHello").unwrap();
        assert_eq!(
            frame,
            Frame::Message {
                recipient: Recipient::Channel(channel("#general")),
                body: Bytes::from_static(b"Hello"),
            }
        );
    }

    #[test]
    fn test_decode_message_inline() {
        let frame = decode_frame(b"MSG @bob 4 Hey!").unwrap();
        assert_eq!(
            frame,
            Frame::Message {
                recipient: Recipient::User(identity("@bob")),
                body: Bytes::from_static(b"Hey!"),
            }
        );
    }

    #[test]
    fn test_decode_message_body_is_opaque() {
        // Body contains newlines, spaces, a fake command and a non-UTF-8 byte
        let frame = decode_frame(b"msg #c 16\nline1\nREG @x \xff\n!").unwrap();
        match frame {
            Frame::Message { body, .. } => assert_eq!(&body[..], b"line1\nREG @x \xff\n!"),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_decode_message_errors() {
        assert_eq!(
            decode_frame(b"MSG general 5\r\nHello"),
            Err(ProtocolError::InvalidRecipient)
        );
        assert_eq!(decode_frame(b"MSG\n"), Err(ProtocolError::InvalidRecipient));
        assert_eq!(
            decode_frame(b"MSG #general\r\nHello"),
            Err(ProtocolError::MissingLength)
        );
        assert_eq!(
            decode_frame(b"MSG #general five\r\nHello"),
            Err(ProtocolError::MissingLength)
        );
        assert_eq!(
            decode_frame(b"MSG #general 5x\r\nHello"),
            Err(ProtocolError::MissingLength)
        );
        assert_eq!(
            decode_frame(b"MSG #general 0\r\n"),
            Err(ProtocolError::EmptyBody)
        );
    }

    #[test]
    fn test_decode_message_truncated() {
        assert_eq!(
            decode_frame(b"MSG #general 10\r\nHello"),
            Err(ProtocolError::TruncatedBody {
                expected: 10,
                available: 5
            })
        );
        assert_eq!(
            decode_frame(b"MSG @bob 3"),
            Err(ProtocolError::TruncatedBody {
                expected: 3,
                available: 0
            })
        );
    }

    #[test]
    fn test_decode_message_too_large() {
        let mut decoder = FrameDecoder::with_limits(64, 8);
        let mut input = buf(b"MSG #c 9\r\n123456789JOIN #c\n");
        assert_eq!(
            decoder.decode(&mut input),
            Err(ProtocolError::BodyTooLarge { length: 9, max: 8 })
        );
        assert_eq!(
            decoder.decode(&mut input).unwrap(),
            Some(Frame::Join(channel("#c")))
        );
        assert!(!decoder.is_discarding());

        let mut decoder = FrameDecoder::with_limits(64, 8);
        let mut input = buf(b"MSG #c 99999999999999999999999999\r\nREG @a\n");
        assert!(matches!(
            decoder.decode(&mut input),
            Err(ProtocolError::BodyTooLarge { .. })
        ));
        // Everything after an unbounded length belongs to the body
        assert_eq!(decoder.decode(&mut input), Ok(None));
        assert!(input.is_empty());
        assert!(decoder.is_discarding());
    }

    #[test]
    fn test_oversized_body_is_skipped_across_reads() {
        let mut decoder = FrameDecoder::with_limits(64, 16);
        let mut input = buf(b"MSG @alice 20\r\nx\nJOIN #secret\nabcd");
        assert_eq!(
            decoder.decode(&mut input),
            Err(ProtocolError::BodyTooLarge { length: 20, max: 16 })
        );
        assert_eq!(decoder.decode(&mut input), Ok(None));
        assert!(input.is_empty());
        assert!(decoder.is_discarding());

        input.extend_from_slice(b"eREG @bob\n");
        assert_eq!(
            decoder.decode(&mut input).unwrap(),
            Some(Frame::Register(identity("@bob")))
        );
    }

    #[test]
    fn test_oversized_inline_body_is_skipped() {
        let mut decoder = FrameDecoder::with_limits(16, 8);
        let mut input = buf(b"MSG #c 20 aaaa\nJOIN #x\naaaaaaaREG @b\n");
        assert_eq!(
            decoder.decode(&mut input),
            Err(ProtocolError::BodyTooLarge { length: 20, max: 8 })
        );
        assert_eq!(
            decoder.decode(&mut input).unwrap(),
            Some(Frame::Register(identity("@b")))
        );
    }

    #[test]
    fn test_streaming_waits_for_body() {
        let mut decoder = FrameDecoder::new();
        let mut input = buf(b"MSG #general 11\r\nhello");
        assert_eq!(decoder.decode(&mut input), Ok(None));

        input.extend_from_slice(b"\nworldJOIN #x\n");
        let frame = decoder.decode(&mut input).unwrap().unwrap();
        match frame {
            Frame::Message { body, .. } => assert_eq!(&body[..], b"hello\nworld"),
            other => panic!("unexpected frame: {:?}", other),
        }

        let frame = decoder.decode(&mut input).unwrap().unwrap();
        assert_eq!(frame, Frame::Join(channel("#x")));
        assert!(input.is_empty());
    }

    #[test]
    fn test_streaming_byte_by_byte() {
        let wire = b"REG @alice\r\nJOIN #general\nMSG #general 5\r\nHelloMSG @bob 2 hi\n";
        let mut decoder = FrameDecoder::new();
        let mut input = BytesMut::new();
        let mut frames = Vec::new();

        for &byte in wire.iter() {
            input.put_u8(byte);
            while let Some(frame) = decoder.decode(&mut input).unwrap() {
                frames.push(frame);
            }
        }

        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], Frame::Register(identity("@alice")));
        assert_eq!(frames[1], Frame::Join(channel("#general")));
        assert_eq!(frames[2].verb(), Verb::Msg);
        assert_eq!(
            frames[3],
            Frame::Message {
                recipient: Recipient::User(identity("@bob")),
                body: Bytes::from_static(b"hi"),
            }
        );
        // The newline after the last body was skipped as a blank line
        assert!(input.is_empty());
    }

    #[test]
    fn test_streaming_resumes_after_error() {
        let mut decoder = FrameDecoder::new();
        let mut input = buf(b"NOPE something\nMSG nobody 3\r\nREG @ok\n");

        assert_eq!(
            decoder.decode(&mut input),
            Err(ProtocolError::UnknownCommand("NOPE".into()))
        );
        assert_eq!(decoder.decode(&mut input), Err(ProtocolError::InvalidRecipient));
        assert_eq!(
            decoder.decode(&mut input).unwrap(),
            Some(Frame::Register(identity("@ok")))
        );
    }

    #[test]
    fn test_streaming_header_error_waits_for_line_end() {
        let mut decoder = FrameDecoder::new();
        let mut input = buf(b"MSG nobody 5 he");
        assert_eq!(decoder.decode(&mut input), Ok(None));

        input.extend_from_slice(b"llo\n");
        assert_eq!(decoder.decode(&mut input), Err(ProtocolError::InvalidRecipient));
        assert!(input.is_empty());
    }

    #[test]
    fn test_decode_eof_truncated_body() {
        let mut decoder = FrameDecoder::new();
        let mut input = buf(b"MSG #general 10\r\nHel");
        assert_eq!(decoder.decode(&mut input), Ok(None));
        assert_eq!(
            decoder.decode_eof(&mut input),
            Err(ProtocolError::TruncatedBody {
                expected: 10,
                available: 3
            })
        );
        assert!(input.is_empty());
        assert_eq!(decoder.decode_eof(&mut input), Ok(None));
    }

    #[test]
    fn test_decode_eof_unterminated_line() {
        let mut decoder = FrameDecoder::new();
        let mut input = buf(b"JOIN #late");
        assert_eq!(decoder.decode(&mut input), Ok(None));
        assert_eq!(
            decoder.decode_eof(&mut input).unwrap(),
            Some(Frame::Join(channel("#late")))
        );
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut decoder = FrameDecoder::new();
        let mut input = buf(b"\n\r\n   \nREG @a\n");
        assert_eq!(
            decoder.decode(&mut input).unwrap(),
            Some(Frame::Register(identity("@a")))
        );
    }

    #[test]
    fn test_line_too_long() {
        let mut decoder = FrameDecoder::with_limits(16, 1024);

        let mut input = buf(&[b'x'; 32]);
        assert_eq!(
            decoder.decode(&mut input),
            Err(ProtocolError::LineTooLong { max: 16 })
        );
        assert!(input.is_empty());

        let mut input = buf(b"REG @aaaaaaaaaaaaaaaaaaaa\nREG @b\n");
        assert_eq!(
            decoder.decode(&mut input),
            Err(ProtocolError::LineTooLong { max: 16 })
        );
        assert_eq!(
            decoder.decode(&mut input).unwrap(),
            Some(Frame::Register(identity("@b")))
        );
    }

    #[test]
    fn test_long_inline_body_is_not_a_long_line() {
        let mut decoder = FrameDecoder::with_limits(16, 1024);
        let mut input = buf(b"MSG #c 100 ");
        input.extend_from_slice(&[b'a'; 60]);
        assert_eq!(decoder.decode(&mut input), Ok(None));

        input.extend_from_slice(&[b'a'; 40]);
        let frame = decoder.decode(&mut input).unwrap().unwrap();
        match frame {
            Frame::Message { body, .. } => assert_eq!(body.len(), 100),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_encode_replies() {
        assert_eq!(&encode_ok()[..], b"OK\n");
        assert_eq!(&encode_error("username taken")[..], b"ERR username taken\n");
        assert_eq!(
            &encode_error(ProtocolError::EmptyBody)[..],
            b"ERR body length must be at least 1\n"
        );
        assert_eq!(
            &encode_channel_message(&identity("@bob"), b"Hello")[..],
            b"@bob: Hello\n"
        );
        assert_eq!(&encode_direct_message(b"Hey!")[..], b"Hey!\n");
    }

    #[test]
    fn test_encode_frame_decodes_back() {
        let frame = Frame::Message {
            recipient: Recipient::Channel(channel("#general")),
            body: Bytes::from_static(b"multi\nline body"),
        };
        let wire = encode_frame(&frame);
        assert_eq!(&wire[..], b"MSG #general 15\r\nmulti\nline body");
        assert_eq!(decode_frame(&wire).unwrap(), frame);

        assert_eq!(
            &encode_frame(&Frame::Register(identity("@alice")))[..],
            b"REG @alice\n"
        );
    }
}
