pub mod event;
pub mod sample;

use self::event::Event;
use self::sample::Sample;

/// A decoded pattern: 64 rows of one event per channel.
pub struct Pattern {
    channels: usize,
    events  : Vec<Event>,
}

impl Pattern {
    pub fn from_slice(b: &[u8], channels: usize) -> Self {
        let mut events = Vec::with_capacity(64 * channels);
        for i in 0..64 * channels {
            events.push(Event::from_slice(&b[i * 4..i * 4 + 4]));
        }
        Pattern { channels, events }
    }

    pub fn event(&self, row: usize, chn: usize) -> &Event {
        &self.events[row * self.channels + chn]
    }
}


/// Parsed song data. Immutable once loaded; the player keeps all of its
/// mutable state in the channel states and in the player itself.
pub struct Module {
    pub title      : String,
    pub channels   : usize,
    pub samples    : Vec<Sample>,    // 32 slots, slot 0 is a silent sentinel
    pub song_length: usize,
    pub orders     : [u8; 128],
    pub magic      : String,
    pub patterns   : Vec<Pattern>,
}

impl Module {
    /// Event at song position `pos`, row `row`, channel `chn`.
    pub fn event(&self, pos: usize, row: usize, chn: usize) -> &Event {
        self.patterns[self.orders[pos] as usize].event(row, chn)
    }

    /// Number of valid entries in the order list.
    pub fn len(&self) -> usize {
        self.song_length
    }
}
