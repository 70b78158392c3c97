//! Incremental parser: accept byte chunks, yield complete Messages, resync on garbage.

use crate::wire::{HEADER_LEN, START_SEQUENCE, Message};
use bytes::BytesMut;

fn find_start_sequence(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(START_SEQUENCE.len())
        .position(|w| w == START_SEQUENCE)
}

/// Stateful consumer of arbitrary byte chunks. Owned exclusively by one
/// logical connection; reconstruct on every reopen so no partial-frame state
/// survives a physical reconnect.
#[derive(Debug, Default)]
pub struct DataParser {
    buffer: BytesMut,
    pending_message: bool,
}

impl DataParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            pending_message: false,
        }
    }

    /// Feeds `chunk` into the parser and returns every complete Message that
    /// could be extracted, in the order their frames ended. Calling this
    /// repeatedly with pieces of a byte stream X yields the same sequence of
    /// Messages as a single call with the concatenation of those pieces.
    pub fn parse_data(&mut self, chunk: &[u8]) -> Vec<Message> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();

        loop {
            if self.buffer.len() < HEADER_LEN {
                break;
            }

            if !self.pending_message {
                match find_start_sequence(&self.buffer) {
                    None => {
                        // Might be a split magic prefix; keep the last 3 bytes.
                        let keep_from = self.buffer.len().saturating_sub(START_SEQUENCE.len() - 1);
                        let _ = self.buffer.split_to(keep_from);
                        break;
                    }
                    Some(idx) => {
                        let _ = self.buffer.split_to(idx);
                        self.pending_message = true;
                        continue;
                    }
                }
            }

            // pending_message: buffer[0..4] == START_SEQUENCE, buffer.len() >= HEADER_LEN.
            let length =
                u32::from_be_bytes(self.buffer[4..8].try_into().expect("4-byte slice")) as usize;
            let raw_size = HEADER_LEN + length;

            if let Some(rel_idx) = find_start_sequence(&self.buffer[4..]) {
                let abort_offset = rel_idx + 4;
                if abort_offset < raw_size {
                    let _ = self.buffer.split_to(abort_offset);
                    self.pending_message = false;
                    continue;
                }
            }

            if self.buffer.len() < raw_size {
                break;
            }

            let framed = self.buffer.split_to(raw_size).freeze();
            out.push(Message::from_framed(framed));
            self.pending_message = false;
        }

        out
    }
}
