extern crate byteorder;
#[macro_use]
extern crate log;

#[macro_use]
mod util;

pub mod format;
pub mod mixer;
pub mod module;
pub mod player;

pub use player::Player;

use std::error;
use std::fmt;
use std::io;

// [Amiga] NTSC color carrier frequency (NCCF) = 3.579545 MHz
// [Amiga] chip clock = 2 * NCCF = 7.1590905 MHz
// A channel playing at period p outputs CHIP_CLOCK / (2 * p) frames/s.
pub const CHIP_CLOCK: f32 = 7159090.5;

pub const MIN_PERIOD  : i32 = 20;
pub const MAX_PERIOD  : i32 = 20000;
pub const DEFAULT_RATE: u32 = 48000;

// largest number of frames rendered in a single mixer pass
pub const MAX_CHUNK: usize = 1024;


#[derive(Debug)]
pub enum Error {
    Format(String),
    Load(String),
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &Error::Format(ref descr) => write!(f, "{}", descr),
            &Error::Load(ref descr)   => write!(f, "{}", descr),
            &Error::Io(ref err)       => write!(f, "{}", err),
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        match *self {
            Error::Format(_)   => "Unsupported module format",
            Error::Load(_)     => "Can't load module data",
            Error::Io(ref err) => err.description(),
        }
    }

    fn cause(&self) -> Option<&error::Error> {
        match *self {
            Error::Io(ref err) => Some(err),
            _                  => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
