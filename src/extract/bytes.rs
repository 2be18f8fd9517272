//! Fixed-pattern byte search

/// Iterator over non-overlapping occurrences of a pattern
///
/// Cloning the iterator restarts the scan from the clone's position.
#[derive(Debug, Clone)]
pub struct FindAll<'a> {
    haystack: &'a [u8],
    pattern: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Iterator for FindAll<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let plen = self.pattern.len();
        let first = *self.pattern.first()?;

        while self.pos + plen <= self.end {
            let last_start = self.end - plen;
            let hit = self.haystack[self.pos..=last_start]
                .iter()
                .position(|&b| b == first);

            match hit {
                Some(i) => {
                    let at = self.pos + i;
                    if &self.haystack[at..at + plen] == self.pattern {
                        self.pos = at + plen;
                        return Some(at);
                    }
                    self.pos = at + 1;
                }
                None => break,
            }
        }

        self.pos = self.end;
        None
    }
}

/// All occurrences of `pattern` in `buffer`, left to right
pub fn find_all<'a>(buffer: &'a [u8], pattern: &'a [u8]) -> FindAll<'a> {
    find_all_in(buffer, pattern, 0, buffer.len())
}

/// All occurrences of `pattern` fully contained in `buffer[start..end]`
///
/// `end` is clamped to the buffer length; an inverted range yields nothing.
pub fn find_all_in<'a>(buffer: &'a [u8], pattern: &'a [u8], start: usize, end: usize) -> FindAll<'a> {
    let end = end.min(buffer.len());
    FindAll {
        haystack: buffer,
        pattern,
        pos: start.min(end),
        end,
    }
}

/// First occurrence of `pattern` at or after `start`
pub fn find_first(buffer: &[u8], pattern: &[u8], start: usize) -> Option<usize> {
    find_all_in(buffer, pattern, start, buffer.len()).next()
}
