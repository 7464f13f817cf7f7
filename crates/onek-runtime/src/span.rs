use std::fmt::Display;

/// Byte range into the input buffer of a parse.
///
/// Offsets are stored as `u32`, [`Grammar::parse_with`](crate::Grammar::parse_with) rejects
/// longer inputs.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Span {
    start: u32,
    end: u32,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        debug_assert!(start <= end, "Span start after end");
        Self {
            start: offset(start),
            end: offset(end),
        }
    }
    pub fn at(pos: usize) -> Span {
        Self::new(pos, pos)
    }
    pub fn is_empty(self) -> bool {
        self.start >= self.end
    }
    /// Returns an empty string for spans outside of `src`.
    pub fn as_str(self, src: &str) -> &str {
        src.get(self.start as usize..self.end as usize)
            .unwrap_or_default()
    }
    pub fn start(self) -> usize {
        self.start as usize
    }
    pub fn end(self) -> usize {
        self.end as usize
    }
}

/// Longest input whose offsets fit a [`Span`].
pub const MAX_INPUT_LEN: usize = u32::MAX as usize;

fn offset(pos: usize) -> u32 {
    debug_assert!(pos <= MAX_INPUT_LEN, "Offset {pos} does not fit a span");
    u32::try_from(pos).unwrap_or(u32::MAX)
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[test]
fn span_slices_source() {
    let src = "12 + 3";
    assert_eq!(Span::new(0, 2).as_str(src), "12");
    assert_eq!(Span::new(5, 6).as_str(src), "3");
    assert_eq!(Span::at(3).as_str(src), "");
    assert!(Span::at(3).is_empty());
    assert_eq!(Span::new(4, 40).as_str(src), "");
}
