//! Byte-level input reader.
//!
//! The original compiler buffers the input file in 4 KiB chunks read
//! straight from the OS file descriptor (`tcc_open`/`tcc_inp` in the
//! reference sources). Here the whole input arrives as a borrowed byte
//! slice — the CLI crate memory-maps the file before handing it to the
//! library — so there is nothing to refill from disk. `ByteReader` keeps
//! the same one-byte-pushback contract and line-counting behavior as the
//! original, just over a slice instead of a file descriptor.

/// Sentinel returned by [`ByteReader::next_byte`] and [`ByteReader::peek`]
/// at end of input, matching the original's use of `CH_EOF` (-1 as an int,
/// never a valid byte value).
pub const EOF: i32 = -1;

/// Reads bytes from an in-memory source, tracking line number and
/// supporting one level of pushback.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    line: u32,
    pushback: Option<u8>,
}

impl<'a> ByteReader<'a> {
    /// Wraps `data` for reading, starting at line 1.
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader {
            data,
            pos: 0,
            line: 1,
            pushback: None,
        }
    }

    /// Current 1-based line number (incremented after each `\n` consumed).
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Consumes and returns the next byte, or [`EOF`] at end of input.
    /// A `\n` byte increments the line counter as it is returned.
    pub fn next_byte(&mut self) -> i32 {
        if let Some(b) = self.pushback.take() {
            if b == b'\n' {
                self.line += 1;
            }
            return b as i32;
        }
        if self.pos >= self.data.len() {
            return EOF;
        }
        let b = self.data[self.pos];
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        b as i32
    }

    /// Returns the next byte without consuming it.
    pub fn peek(&mut self) -> i32 {
        if let Some(b) = self.pushback {
            return b as i32;
        }
        if self.pos >= self.data.len() {
            return EOF;
        }
        self.data[self.pos] as i32
    }

    /// Pushes one byte back so the next [`next_byte`](Self::next_byte)
    /// call returns it again. Only a single level of pushback is
    /// guaranteed, matching the original `unget_char`'s contract; pushing
    /// back a line feed decrements the line counter to undo the increment
    /// applied when it was first consumed.
    pub fn unget(&mut self, byte: u8) {
        debug_assert!(self.pushback.is_none(), "pushback slot already occupied");
        if byte == b'\n' {
            self.line = self.line.saturating_sub(1);
        }
        self.pushback = Some(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_sequence() {
        let mut r = ByteReader::new(b"ab");
        assert_eq!(r.next_byte(), b'a' as i32);
        assert_eq!(r.next_byte(), b'b' as i32);
        assert_eq!(r.next_byte(), EOF);
        assert_eq!(r.next_byte(), EOF);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut r = ByteReader::new(b"x");
        assert_eq!(r.peek(), b'x' as i32);
        assert_eq!(r.peek(), b'x' as i32);
        assert_eq!(r.next_byte(), b'x' as i32);
        assert_eq!(r.peek(), EOF);
    }

    #[test]
    fn unget_replays_byte() {
        let mut r = ByteReader::new(b"hi");
        let b = r.next_byte() as u8;
        r.unget(b);
        assert_eq!(r.next_byte(), b'h' as i32);
        assert_eq!(r.next_byte(), b'i' as i32);
    }

    #[test]
    fn line_counter_tracks_newlines() {
        let mut r = ByteReader::new(b"a\nb\nc");
        assert_eq!(r.line(), 1);
        r.next_byte();
        assert_eq!(r.line(), 1);
        r.next_byte();
        assert_eq!(r.line(), 2);
        r.next_byte();
        r.next_byte();
        assert_eq!(r.line(), 3);
    }

    #[test]
    fn unget_newline_restores_line() {
        let mut r = ByteReader::new(b"\nx");
        r.next_byte();
        assert_eq!(r.line(), 2);
        r.unget(b'\n');
        assert_eq!(r.line(), 1);
    }
}
