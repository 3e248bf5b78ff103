use crate::Result;

/// Byte that replaces characters which do not fit into a single byte.
pub(crate) const SUBSTITUTE : u8 = b'?';

/**
    A source of characters - the character counterpart of `std::io::Read`.
*/
pub trait CharRead {
    /**
        Reads characters into `buf` and returns how many were read.

        Returns 0 when `buf` is empty or when the end of the stream has been reached.
    */
    fn read_chars(&mut self, buf: &mut [char]) -> Result<usize>;

    /// Reads a single character. Returns `None` at the end of the stream.
    fn read_char(&mut self) -> Result<Option<char>> {
        let mut buf = ['\0'];
        let num_read = self.read_chars(&mut buf)?;
        Ok( if num_read == 0 { None } else { Some(buf[0]) } )
    }

    /// Fails with `Error::ClosedStream` when the stream has been closed for good.
    fn check_open(&self) -> Result<()> {
        Ok(())
    }

    /**
        Reads `len` characters into `buf[off..off + len]`.

        This is the three-argument form of a bulk read. A closed stream is reported first,
        then an absent `buf`, then a range that does not fit the buffer.
    */
    fn read_into(&mut self, buf: Option<&mut [char]>, off: usize, len: usize) -> Result<usize> {
        self.check_open()?;
        let buf = buf.ok_or(crate::Error::NullArgument("buffer"))?;
        crate::lob::check_range(buf.len(), off, len)?;
        if len == 0 {
            return Ok(0);
        }
        self.read_chars(&mut buf[off..off + len])
    }

    /// Reads all remaining characters and appends them to `text`. Returns the number of characters read.
    fn read_text(&mut self, text: &mut String) -> Result<usize> {
        let mut buf = ['\0'; 1024];
        let mut total = 0;
        loop {
            let num_read = self.read_chars(&mut buf)?;
            if num_read == 0 {
                return Ok(total);
            }
            text.extend(&buf[..num_read]);
            total += num_read;
        }
    }
}

impl<R: CharRead + ?Sized> CharRead for &mut R {
    fn read_chars(&mut self, buf: &mut [char]) -> Result<usize> {
        (**self).read_chars(buf)
    }

    fn check_open(&self) -> Result<()> {
        (**self).check_open()
    }
}

impl<R: CharRead + ?Sized> CharRead for Box<R> {
    fn read_chars(&mut self, buf: &mut [char]) -> Result<usize> {
        (**self).read_chars(buf)
    }

    fn check_open(&self) -> Result<()> {
        (**self).check_open()
    }
}

/// Maps a character to a byte: code points up to U+00FF become that byte, others become `?`.
pub(crate) fn narrow(c: char) -> u8 {
    let code = c as u32;
    if code <= 0xFF { code as u8 } else { SUBSTITUTE }
}

/// Returns `len` characters of `text` starting at the 0-based character index `start`.
pub(crate) fn substr(text: &str, start: usize, len: usize) -> &str {
    let mut indices = text.char_indices().map(|(ix, _)| ix).chain(std::iter::once(text.len()));
    let from = indices.nth(start).unwrap_or(text.len());
    let to = if len == 0 { from } else { indices.nth(len - 1).unwrap_or(text.len()) };
    &text[from..to]
}

pub(crate) fn char_len(text: &str) -> u64 {
    text.chars().count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing() {
        assert_eq!(narrow('A'), 0x41);
        assert_eq!(narrow('\u{FF}'), 0xFF);
        assert_eq!(narrow('\u{100}'), 0x3F);
        assert_eq!(narrow('€'), b'?');
    }

    #[test]
    fn char_substrings() {
        let text = "añb€cd";
        assert_eq!(substr(text, 0, 3), "añb");
        assert_eq!(substr(text, 1, 3), "ñb€");
        assert_eq!(substr(text, 3, 10), "€cd");
        assert_eq!(substr(text, 6, 1), "");
        assert_eq!(substr(text, 9, 1), "");
        assert_eq!(substr(text, 2, 0), "");
        assert_eq!(char_len(text), 6);
    }
}
