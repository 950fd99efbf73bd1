use std::cmp;
use std::f32::consts::PI;
use std::fs::File;
use std::io::Read;
use std::mem;
use std::path::Path;

use format;
use mixer::Mixer;
use mixer::interpolator::Interpolator;
use module::Module;
use module::event::Event;
use {Error, MAX_CHUNK, MAX_PERIOD, MIN_PERIOD};

// The mixer reads the fields driving sample output; everything else
// belongs to the sequencer.
#[derive(Clone, Default)]
pub struct ChannelState {
    pub period      : i32,
    pub sample      : usize,
    pub volume      : i32,   // 0..64
    pub looped      : bool,
    pub sample_pos  : f32,
    pub pan         : f32,   // -1 hard left, +1 hard right
    pub pitch_offset: f32,   // semitones, written by vibrato and arpeggio
    pub vol_offset  : i8,    // written by tremolo

    vol_slide_on  : bool,
    pitch_slide_on: bool,
    vibrato_on    : bool,
    tremolo_on    : bool,
    arpeggio_on   : bool,

    vol_slide    : i32,
    pitch_slide  : i32,
    target_period: i32,
    vib_rate     : u8,
    vib_depth    : i32,
    vib_phase    : u8,
    arpeggio1    : u8,
    arpeggio2    : u8,
    retrig_rate  : u8,
    cut_tick     : usize,
    loop_row     : usize,
    loop_count   : u8,
}

impl ChannelState {
    pub fn new() -> Self {
        Default::default()
    }
}


/// Tick-driven sequencer and decode front-end.
///
/// Playback runs on two cadences: the row cadence latches new notes and
/// effect commands into the channel states, the tick cadence applies the
/// continuous effects (slides, vibrato, tremolo, arpeggio, retrigger and
/// note cut). Between ticks the mixer renders `frames_to_tick` frames.
pub struct Player {
    module: Module,
    state : Vec<ChannelState>,
    mixer : Mixer,

    pos : usize,    // position in the order list
    row : usize,    // 0..63
    tick: usize,
    frames_to_tick: usize,

    speed: usize,   // ticks per row
    tempo: usize,

    jump    : bool,
    jump_pos: usize,
    jump_row: usize,

    patt_delay: usize,

    fbuf: Vec<f32>,
}

impl Player {
    pub fn new(module: Module) -> Self {
        let num_channels = module.channels;
        let mut player = Player {
            state : vec![ChannelState::new(); num_channels],
            mixer : Mixer::new(),
            module,
            pos   : 0,
            row   : 0,
            tick  : 0,
            frames_to_tick: 0,
            speed : 6,
            tempo : 125,
            jump     : false,
            jump_pos : 0,
            jump_row : 0,
            patt_delay: 0,
            fbuf  : vec![0.0; MAX_CHUNK * 2],
        };
        player.reset_song_to_beginning();
        player
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self, Error> {
        Ok(Player::new(format::load(b)?))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Player::from_bytes(&data)
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn speed(&self) -> usize {
        self.speed
    }

    pub fn tempo(&self) -> usize {
        self.tempo
    }

    // default is 48000
    pub fn set_sample_rate(&mut self, rate: u32) {
        self.mixer.set_rate(rate);
    }

    pub fn set_stereo(&mut self, stereo: bool) {
        self.mixer.set_stereo(stereo);
    }

    /// Scale the hard Amiga L/R/R/L panning: 1.0 keeps it, 0.0 collapses
    /// to the same signal on both sides.
    pub fn set_stereo_width(&mut self, width: f32) {
        self.mixer.set_width(width);
    }

    pub fn set_interpolator(&mut self, interp: Interpolator) {
        self.mixer.set_interpolator(interp);
    }

    /// Rewind to a pristine position 0, row 0 and execute the first row.
    pub fn reset_song_to_beginning(&mut self) {
        for (i, st) in self.state.iter_mut().enumerate() {
            *st = ChannelState::new();
            // channels 1 and 4 hard left, 2 and 3 hard right
            st.pan = if (i + 1) & 2 == 0 { -1.0 } else { 1.0 };
        }

        self.pos = 0;
        self.row = 0;
        self.tick = 0;
        self.speed = 6;
        self.tempo = 125;
        self.jump = false;
        self.jump_pos = 0;
        self.jump_row = 0;
        self.patt_delay = 0;

        self.process_row();
    }

    /// Decode `out.len()` / output channels interleaved float frames.
    pub fn decode_frames_f(&mut self, out: &mut [f32]) {
        let chans = self.mixer.out_channels();
        let total = out.len() / chans;
        let mut done = 0;

        while done < total {
            let mut n = cmp::min(total - done, MAX_CHUNK);
            n = cmp::min(n, self.frames_to_tick);

            self.mixer.mix(&self.module.samples, &mut self.state,
                           &mut out[done * chans..(done + n) * chans], n);

            self.frames_to_tick -= n;
            done += n;

            if self.frames_to_tick == 0 {
                self.tick += 1;
                if self.tick == self.speed + self.patt_delay {
                    self.tick = 0;
                    self.next_row();
                    self.process_row();
                } else {
                    self.process_tick();
                }
            }
        }
    }

    /// Decode interleaved signed 16-bit frames.
    pub fn decode_frames(&mut self, out: &mut [i16]) {
        let chans = self.mixer.out_channels();
        let total = out.len() / chans;

        let mut fbuf = mem::replace(&mut self.fbuf, Vec::new());
        let mut done = 0;
        while done < total {
            let n = cmp::min(total - done, MAX_CHUNK);
            self.decode_frames_f(&mut fbuf[..n * chans]);
            for (o, f) in out[done * chans..(done + n) * chans].iter_mut().zip(fbuf[..n * chans].iter()) {
                *o = (f * 32767.0) as i16;
            }
            done += n;
        }
        self.fbuf = fbuf;
    }

    fn frames_per_tick(&self) -> usize {
        (self.mixer.rate() as f32 / (0.4 * self.tempo as f32)) as usize
    }

    // Latch the current row into the channel states: expire row-scoped
    // effects, trigger new notes, then run each event's effect command.
    fn process_row(&mut self) {
        for chn in 0..self.module.channels {
            let event = *self.module.event(self.pos, self.row, chn);
            {
                let st = &mut self.state[chn];

                st.vol_slide_on = false;
                st.tremolo_on = false;
                st.arpeggio_on = false;
                st.vol_offset = 0;
                st.retrig_rate = 0;
                st.cut_tick = 0;
                if event.fxt != 0x5 {       // 5xy continues the tone portamento
                    st.pitch_slide_on = false;
                }
                if event.fxt != 0x6 {       // 6xy continues the vibrato
                    st.vibrato_on = false;
                    st.pitch_offset = 0.0;
                }

                if (event.period != 0 || event.ins != 0) && event.fxt != 0x3 {
                    if event.period != 0 {
                        st.period = event.period as i32;
                    }
                    if event.ins != 0 && event.ins <= 31 {
                        st.sample = event.ins as usize;
                    }
                    st.sample_pos = 0.0;
                    st.looped = false;
                    st.volume = self.module.samples[st.sample].volume;

                    if event.fxt != 0x4 && event.fxt != 0x7 && event.fxt != 0x6 {
                        st.vib_phase = 0;
                    }
                }
            }

            self.effect(chn, &event);
        }

        self.frames_to_tick = self.frames_per_tick();
    }

    fn effect(&mut self, chn: usize, event: &Event) {
        let x = (event.fxp >> 4) as i32;
        let y = (event.fxp & 0x0f) as i32;

        match event.fxt {
            0x0 => {  // arpeggio
                if event.fxp != 0 {
                    let st = &mut self.state[chn];
                    st.arpeggio_on = true;
                    st.arpeggio1 = x as u8;
                    st.arpeggio2 = y as u8;
                }
            }
            0x1 => {  // portamento up
                let st = &mut self.state[chn];
                st.pitch_slide_on = true;
                st.pitch_slide = -(event.fxp as i32);
                st.target_period = 0;
            }
            0x2 => {  // portamento down
                let st = &mut self.state[chn];
                st.pitch_slide_on = true;
                st.pitch_slide = event.fxp as i32;
                st.target_period = 0;
            }
            0x3 => {  // tone portamento
                let st = &mut self.state[chn];
                st.pitch_slide_on = true;
                if event.period != 0 {
                    st.target_period = event.period as i32;
                }
                if event.fxp != 0 {
                    st.pitch_slide = if st.target_period > st.period {
                        event.fxp as i32
                    } else {
                        -(event.fxp as i32)
                    };
                }
            }
            0x4 => {  // vibrato
                let st = &mut self.state[chn];
                st.vibrato_on = true;
                if x != 0 {
                    st.vib_rate = x as u8;
                }
                if y != 0 {
                    st.vib_depth = y;
                }
            }
            0x5 | 0x6 | 0xa => {  // volume slide, alone or with porta/vibrato
                let st = &mut self.state[chn];
                st.vol_slide_on = true;
                st.vol_slide = if x != 0 { x } else { -y };
            }
            0x7 => {  // tremolo
                let st = &mut self.state[chn];
                st.tremolo_on = true;
                if x != 0 {
                    st.vib_rate = x as u8;
                }
                if y != 0 {
                    st.vib_depth = y * (self.speed as i32 - 1);
                }
            }
            0x8 => {}  // set pan, unimplemented
            0x9 => {  // sample offset
                if event.fxp != 0 {
                    self.state[chn].sample_pos = 256.0 * event.fxp as f32;
                }
            }
            0xb => {  // position jump; a break on the same row keeps its row
                if !self.jump {
                    self.jump_row = 0;
                }
                self.jump_pos = event.fxp as usize;
                self.jump = true;
            }
            0xc => {  // set volume
                self.state[chn].volume = cmp::min(event.fxp as i32, 64);
            }
            0xd => {  // pattern break; a jump on the same row keeps its position
                if !self.jump {
                    self.jump_pos = self.pos + 1;
                }
                let row = (x * 10 + y) as usize;
                self.jump_row = if row < 64 { row } else { 0 };
                self.jump = true;
            }
            0xe => self.extended_effect(chn, x as u8, y),
            0xf => {  // set speed (up to 32) or tempo
                let val = cmp::max(1, event.fxp as usize);
                if val <= 32 {
                    self.speed = val;
                } else {
                    self.tempo = val;
                }
            }
            _ => {}
        }
    }

    fn extended_effect(&mut self, chn: usize, fx: u8, y: i32) {
        match fx {
            0x1 => {  // fine slide up
                let st = &mut self.state[chn];
                st.period -= y;
                clamp!(st.period, MIN_PERIOD, MAX_PERIOD);
            }
            0x2 => {  // fine slide down
                let st = &mut self.state[chn];
                st.period += y;
                clamp!(st.period, MIN_PERIOD, MAX_PERIOD);
            }
            0x6 => {  // pattern loop
                if y == 0 {
                    self.state[chn].loop_row = self.row;
                } else {
                    {
                        let st = &mut self.state[chn];
                        if st.loop_count == 0 {
                            st.loop_count = y as u8;
                        } else {
                            st.loop_count -= 1;
                        }
                    }
                    if self.state[chn].loop_count > 0 {
                        self.jump_row = self.state[chn].loop_row;
                        self.jump_pos = self.pos;
                        self.jump = true;
                    }
                }
            }
            0x9 => {  // retrigger note
                self.state[chn].retrig_rate = y as u8;
            }
            0xa => {  // fine volume slide up
                let st = &mut self.state[chn];
                st.volume = cmp::min(st.volume + y, 64);
            }
            0xb => {  // fine volume slide down
                let st = &mut self.state[chn];
                st.volume = cmp::max(st.volume - y, 0);
            }
            0xc => {  // note cut
                let st = &mut self.state[chn];
                if y == 0 {
                    st.volume = 0;
                } else {
                    st.cut_tick = y as usize;
                }
            }
            0xe => {  // pattern delay
                self.patt_delay = y as usize * self.speed;
            }
            _ => {}   // filter, glissando, waveforms, finetune, pan, note delay, funk
        }
    }

    // Continuous effects, run once per tick after the first.
    fn process_tick(&mut self) {
        for st in self.state.iter_mut() {
            if st.vol_slide_on {
                st.volume += st.vol_slide;
                clamp!(st.volume, 0, 64);
            }

            if st.pitch_slide_on {
                let mut period = st.period + st.pitch_slide;
                if st.target_period != 0 {
                    // stop exactly on the target
                    period = if st.pitch_slide > 0 {
                        cmp::min(st.target_period, period)
                    } else {
                        cmp::max(st.target_period, period)
                    };
                }
                clamp!(period, MIN_PERIOD, MAX_PERIOD);
                st.period = period;
            }

            if st.arpeggio_on {
                st.pitch_offset = match self.tick % 3 {
                    1 => st.arpeggio1 as f32,
                    2 => st.arpeggio2 as f32,
                    _ => 0.0,
                };
            }

            if st.vibrato_on || st.tremolo_on {
                st.vib_phase = st.vib_phase.wrapping_add(1);
                let angle = st.vib_phase as f32 * st.vib_rate as f32 * (1.0 / 64.0) * 2.0 * PI;
                let wave = angle.sin();
                if st.vibrato_on {
                    st.pitch_offset = wave * st.vib_depth as f32 * (1.0 / 16.0);
                } else {
                    st.vol_offset = (wave * st.vib_depth as f32) as i8;
                }
            }

            if st.retrig_rate > 0 && self.tick % st.retrig_rate as usize == 0 {
                st.sample_pos = 0.0;
            }

            if st.cut_tick != 0 && st.cut_tick == self.tick {
                st.volume = 0;
            }
        }

        // tempo changes take effect from the very next tick
        self.frames_to_tick = self.frames_per_tick();
    }

    // Advance past the row that just finished: pending jumps first, then
    // the natural row/position walk, wrapping the song at the end.
    fn next_row(&mut self) {
        self.patt_delay = 0;
        self.row += 1;

        if self.jump || self.row >= 64 {
            let prev = self.pos;

            if self.jump {
                self.row = self.jump_row;
                self.pos = self.jump_pos;
                self.jump = false;
            } else {
                self.row = 0;
                self.pos += 1;
            }

            if self.pos >= self.module.len() {
                self.pos = 0;    // the song wraps around
            }

            if self.pos != prev {
                // pattern loops don't survive a position change
                for st in self.state.iter_mut() {
                    st.loop_row = 0;
                    st.loop_count = 0;
                }
            }
        }
    }
}
