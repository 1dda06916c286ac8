use coord_2d::Size;
use std::{error, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A caller-supplied argument was rejected before any work started.
    InvalidParameter(&'static str),
    /// The input grid is smaller than the pattern window.
    InputTooSmall { input: Size, pattern_size: u32 },
    /// Every attempt ran into a contradiction.
    Unsolvable { attempts: u32 },
    /// The deadline elapsed before the wave collapsed.
    TimedOut,
    /// A wave with at least one non-singleton cell was passed to the renderer.
    NotFullyCollapsed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidParameter(what) => write!(f, "invalid parameter: {}", what),
            Error::InputTooSmall {
                input,
                pattern_size,
            } => write!(
                f,
                "input of size {}x{} is smaller than the {}x{} pattern window",
                input.width(),
                input.height(),
                pattern_size,
                pattern_size,
            ),
            Error::Unsolvable { attempts } => {
                write!(f, "no attempt out of {} collapsed without contradiction", attempts)
            }
            Error::TimedOut => write!(f, "deadline elapsed before the wave collapsed"),
            Error::NotFullyCollapsed => write!(f, "wave contains non-singleton cells"),
        }
    }
}

impl error::Error for Error {}
