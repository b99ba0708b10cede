//! Line splitting for streamed log chunks.
//!
//! Docker frames do not line up with lines: a frame may hold several lines
//! or a fragment of one. Complete lines are emitted as soon as their `\n`
//! arrives; the rest is carried over to the next chunk.

use std::borrow::Cow;

use tracing::warn;

/// A carried-over partial line longer than this is dropped.
pub const MAX_CARRY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug)]
pub struct LineSplitter {
    carry: Vec<u8>,
    max_carry: usize,
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::with_limit(MAX_CARRY_BYTES)
    }

    pub fn with_limit(max_carry: usize) -> Self {
        Self {
            carry: Vec::new(),
            max_carry,
        }
    }

    /// Feed one chunk; returns the lines it completed, cleaned, with empty
    /// lines skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];
            if self.carry.is_empty() {
                push_clean(&mut lines, head);
            } else {
                self.carry.extend_from_slice(head);
                let line = std::mem::take(&mut self.carry);
                push_clean(&mut lines, &line);
            }
        }

        if !rest.is_empty() {
            if self.carry.len() + rest.len() > self.max_carry {
                warn!(
                    carried = self.carry.len() + rest.len(),
                    limit = self.max_carry,
                    "Partial log line exceeds carry-over limit, dropping it"
                );
                self.carry.clear();
            } else {
                self.carry.extend_from_slice(rest);
            }
        }
        lines
    }

    /// Emit whatever partial line is left (stream end).
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.carry);
        let mut out = Vec::with_capacity(1);
        push_clean(&mut out, &line);
        out.pop()
    }

    pub fn carried(&self) -> usize {
        self.carry.len()
    }
}

fn push_clean(out: &mut Vec<String>, raw: &[u8]) {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let stripped = strip_ansi_codes(raw);
    let text = String::from_utf8_lossy(&stripped);
    if !text.trim().is_empty() {
        out.push(text.into_owned());
    }
}

/// Strip ANSI escape sequences (CSI `ESC [ … final`, OSC `ESC ] … BEL|ST`
/// and two-byte escapes). Borrows when there is nothing to strip.
pub fn strip_ansi_codes(input: &[u8]) -> Cow<'_, [u8]> {
    if !input.contains(&0x1b) {
        return Cow::Borrowed(input);
    }

    let mut output = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] != 0x1b {
            output.push(input[i]);
            i += 1;
            continue;
        }
        match input.get(i + 1) {
            None => i += 1,
            Some(b'[') => {
                i += 2;
                while i < input.len() {
                    let b = input[i];
                    i += 1;
                    if (0x40..=0x7e).contains(&b) {
                        break;
                    }
                }
            }
            Some(b']') => {
                i += 2;
                while i < input.len() {
                    if input[i] == 0x07 {
                        i += 1;
                        break;
                    }
                    if input[i] == 0x1b && input.get(i + 1) == Some(&b'\\') {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            Some(_) => i += 2,
        }
    }
    Cow::Owned(output)
}
