//! Line codec for the host link

use bytes::{Buf, BytesMut};
use log::debug;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::command::TX_PREFIX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostLine {
    Line(String),
    /// A terminated line that is not valid UTF-8.
    Invalid,
    /// A line longer than the limit, reported once its terminator arrives.
    /// `transmit` is set when the line started with the transmit prefix.
    Overlong { transmit: bool },
}

/// Splits host input on `\n` and reports bad lines as frames rather than
/// errors, so a `Framed` stream keeps decoding whatever follows.
///
/// A final line without a terminator is dropped at end of input.
#[derive(Debug, Clone)]
pub struct HostLineCodec {
    max_length: usize,
    // Bytes already searched for a terminator
    next_index: usize,
    // Set while skipping the rest of an overlong line
    discarding: Option<bool>,
    encoder: LinesCodec,
}

impl HostLineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: None,
            encoder: LinesCodec::new(),
        }
    }
}

fn without_carriage_return(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

impl Decoder for HostLineCodec {
    type Item = HostLine;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<HostLine>, LinesCodecError> {
        loop {
            if let Some(transmit) = self.discarding {
                match buf.iter().position(|b| *b == b'\n') {
                    Some(offset) => {
                        buf.advance(offset + 1);
                        self.discarding = None;
                        return Ok(Some(HostLine::Overlong { transmit }));
                    }
                    None => {
                        buf.clear();
                        return Ok(None);
                    }
                }
            }

            let read_to = buf.len().min(self.max_length.saturating_add(1));
            match buf[self.next_index..read_to].iter().position(|b| *b == b'\n') {
                Some(offset) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    let line = match std::str::from_utf8(without_carriage_return(&line[..end])) {
                        Ok(text) => HostLine::Line(text.to_string()),
                        Err(_) => HostLine::Invalid,
                    };
                    return Ok(Some(line));
                }
                None if buf.len() > self.max_length => {
                    self.discarding = Some(buf.starts_with(TX_PREFIX.as_bytes()));
                    self.next_index = 0;
                }
                None => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<HostLine>, LinesCodecError> {
        let line = self.decode(buf)?;
        if line.is_none() && !buf.is_empty() {
            debug!("Dropping {} unterminated bytes at end of host input", buf.len());
            buf.clear();
            self.next_index = 0;
        }
        Ok(line)
    }
}

impl<T: AsRef<str>> Encoder<T> for HostLineCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: T, buf: &mut BytesMut) -> Result<(), LinesCodecError> {
        self.encoder.encode(line, buf)
    }
}
