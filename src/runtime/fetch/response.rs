use crate::event::RelayEvent;
use crate::runtime::registry::Token;
use bytes::{Buf, BytesMut};
use serde::Deserialize;

/// One line of a relay reply: an event addressed through a reference expression.
#[derive(Debug, Deserialize)]
struct RelayInstruction {
    object: String,
    #[serde(flatten)]
    event: RelayEvent,
}

/// Parse one relay line into its target token and event.
///
/// Returns `None` for blank lines and anything that does not parse.
pub fn parse_instruction(line: &[u8]) -> Option<(Token, RelayEvent)> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    let instruction: RelayInstruction = match serde_json::from_slice(line) {
        Ok(instruction) => instruction,
        Err(e) => {
            log::warn!("Dropping malformed relay line: {}", e);
            return None;
        }
    };

    match Token::from_object_ref(&instruction.object) {
        Some(token) => Some((token, instruction.event)),
        None => {
            log::warn!(
                "Dropping relay line with unknown reference {:?}",
                instruction.object
            );
            None
        }
    }
}

/// Splits a streamed relay reply into complete lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
    /// Bytes of `buffer` already known to hold no newline.
    scanned: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every instruction it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<(Token, RelayEvent)> {
        self.buffer.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(self.scanned + offset);
            self.buffer.advance(1);
            self.scanned = 0;
            out.extend(parse_instruction(&line));
        }
        self.scanned = self.buffer.len();
        out
    }

    /// Flush a trailing line that had no newline.
    pub fn finish(&mut self) -> Option<(Token, RelayEvent)> {
        let rest = self.buffer.split();
        self.scanned = 0;
        parse_instruction(&rest)
    }
}
