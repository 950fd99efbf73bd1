pub mod interpolator;

use std::cmp;

use module::sample::Sample;
use player::ChannelState;
use self::interpolator::{Interpolate, Interpolator, Nearest, Linear};
use {CHIP_CLOCK, DEFAULT_RATE, MAX_CHUNK, MIN_PERIOD};

pub struct Mixer {
    rate   : u32,
    chans  : usize,    // 1 = mono, 2 = stereo
    width  : f32,
    interp : Interpolator,
    chn_buf: Vec<f32>,
}

impl Mixer {
    pub fn new() -> Mixer {
        Mixer {
            rate   : DEFAULT_RATE,
            chans  : 2,
            width  : 1.0,
            interp : Interpolator::Linear,
            chn_buf: vec![0.0; MAX_CHUNK],
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: u32) {
        self.rate = rate;
    }

    pub fn out_channels(&self) -> usize {
        self.chans
    }

    pub fn set_stereo(&mut self, stereo: bool) {
        self.chans = if stereo { 2 } else { 1 };
    }

    pub fn set_width(&mut self, width: f32) {
        self.width = width;
    }

    pub fn set_interpolator(&mut self, interp: Interpolator) {
        self.interp = interp;
    }

    pub fn mix(&mut self, samples: &[Sample], state: &mut [ChannelState], out: &mut [f32], num_frames: usize) {
        for s in out[..num_frames * self.chans].iter_mut() {
            *s = 0.0;
        }

        let gain = self.chans as f32 / state.len() as f32;

        for st in state.iter_mut() {
            let pan = st.pan;
            self.resample(samples, st, num_frames);

            if self.chans == 1 {
                for i in 0..num_frames {
                    out[i] += gain * self.chn_buf[i];
                }
            } else {
                let mut p = pan * self.width;
                clamp!(p, -1.0, 1.0);
                let left = gain * (0.5 - 0.5 * p);
                let right = gain * (0.5 + 0.5 * p);
                for i in 0..num_frames {
                    out[i * 2] += left * self.chn_buf[i];
                    out[i * 2 + 1] += right * self.chn_buf[i];
                }
            }
        }
    }

    // one channel to mono at the output rate
    fn resample(&mut self, samples: &[Sample], st: &mut ChannelState, num_frames: usize) {
        if st.sample == 0 || st.sample >= samples.len() || st.period <= MIN_PERIOD {
            for b in self.chn_buf[..num_frames].iter_mut() {
                *b = 0.0;
            }
            return;
        }

        let smp = &samples[st.sample];
        let data = smp.data();

        let mut rate = CHIP_CLOCK / (st.period as f32 * 2.0);
        if st.pitch_offset != 0.0 || smp.finetune != 0 {
            let semitones = st.pitch_offset + smp.finetune as f32 * (1.0 / 8.0);
            rate *= (semitones * (1.0 / 12.0)).exp2();
        }
        let step = rate / self.rate as f32;

        let mut vol = st.volume + st.vol_offset as i32;
        clamp!(vol, 0, 64);
        let vol = vol as f32 * (1.0 / 64.0);

        let mut pos = st.sample_pos;
        for i in 0..num_frames {
            let end = cmp::min(
                if st.looped { smp.loop_start + smp.loop_len } else { smp.size },
                smp.size,
            ) as usize;

            if pos < end as f32 {
                let idx = pos as usize;
                let frac = pos - idx as f32;
                let s = match self.interp {
                    Interpolator::Nearest => Nearest.get_sample(data, idx, frac, end),
                    Interpolator::Linear  => Linear.get_sample(data, idx, frac, end),
                };
                self.chn_buf[i] = s * vol;

                pos += step;
                if pos >= end as f32 && smp.has_loop {
                    pos = smp.loop_start as f32 + (pos - end as f32);
                    st.looped = true;
                }
            } else {
                self.chn_buf[i] = 0.0;
            }
        }
        st.sample_pos = pos;
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const MAX_ERROR: f32 = 10e-4;

    macro_rules! assert_delta {
        ($x:expr, $y:expr) => {
            assert!(($x - $y).abs() < MAX_ERROR, "{} != {}", $x, $y);
        }
    }

    fn sample_from(data: &[u8]) -> Sample {
        let mut smp = Sample::new();
        smp.num = 1;
        smp.size = data.len() as u32;
        smp.volume = 64;
        smp.store(data);
        smp
    }

    fn voice(sample: usize, period: i32) -> ChannelState {
        let mut st = ChannelState::new();
        st.sample = sample;
        st.period = period;
        st.volume = 64;
        st
    }

    #[test]
    fn test_silent_slot() {
        let samples = vec![Sample::new(), sample_from(&[0x40; 8])];
        let mut mixer = Mixer::new();
        let mut st = voice(0, 428);

        mixer.chn_buf[..4].copy_from_slice(&[9.0; 4]);
        mixer.resample(&samples, &mut st, 4);
        assert_eq!(&mixer.chn_buf[..4], &[0.0; 4]);
    }

    #[test]
    fn test_min_period_guard() {
        let samples = vec![Sample::new(), sample_from(&[0x40; 8])];
        let mut mixer = Mixer::new();
        let mut st = voice(1, MIN_PERIOD);

        mixer.resample(&samples, &mut st, 4);
        assert_eq!(&mixer.chn_buf[..4], &[0.0; 4]);
        assert_eq!(st.sample_pos, 0.0);
    }

    #[test]
    fn test_resample_advances_cursor() {
        let samples = vec![Sample::new(), sample_from(&[0x00, 0x20, 0x40, 0x60, 0x7f, 0x60, 0x40, 0x20])];
        let mut mixer = Mixer::new();
        mixer.set_rate(44100);
        let mut st = voice(1, 428);

        mixer.resample(&samples, &mut st, 4);

        // replicate the cursor walk at the same precision
        let step = CHIP_CLOCK / (428.0 * 2.0) / 44100.0;
        let data = samples[1].data();
        let mut pos = 0.0_f32;
        for i in 0..4 {
            let idx = pos as usize;
            let frac = pos - idx as f32;
            let s0 = data[idx];
            let s1 = data[idx + 1];
            assert_delta!(mixer.chn_buf[i], s0 + frac * (s1 - s0));
            pos += step;
        }
        assert_delta!(st.sample_pos, pos);
    }

    #[test]
    fn test_volume_scaling() {
        let samples = vec![Sample::new(), sample_from(&[0x40; 8])];
        let mut mixer = Mixer::new();
        let mut st = voice(1, 428);
        st.volume = 32;

        mixer.resample(&samples, &mut st, 2);
        assert_delta!(mixer.chn_buf[0], 0.25);

        // offsets past the limits are clamped
        st.sample_pos = 0.0;
        st.volume = 64;
        st.vol_offset = 100;
        mixer.resample(&samples, &mut st, 2);
        assert_delta!(mixer.chn_buf[0], 0.5);

        st.sample_pos = 0.0;
        st.volume = 10;
        st.vol_offset = -100;
        mixer.resample(&samples, &mut st, 2);
        assert_eq!(mixer.chn_buf[0], 0.0);
    }

    #[test]
    fn test_end_of_sample_is_silent() {
        let samples = vec![Sample::new(), sample_from(&[0x40; 4])];
        let mut mixer = Mixer::new();
        let mut st = voice(1, 428);
        st.sample_pos = 100.0;

        mixer.resample(&samples, &mut st, 4);
        assert_eq!(&mixer.chn_buf[..4], &[0.0; 4]);
        assert_eq!(st.sample_pos, 100.0);
    }

    #[test]
    fn test_loop_wrap() {
        let mut smp = sample_from(&[0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x7f]);
        smp.loop_start = 2;
        smp.loop_len = 4;
        smp.has_loop = true;
        let samples = vec![Sample::new(), smp];

        // period 100 plays at 35795.4525 Hz; close to 1:1 at this rate
        let mut mixer = Mixer::new();
        mixer.set_rate(35795);
        let mut st = voice(1, 100);

        mixer.resample(&samples, &mut st, 9);
        assert!(st.looped);
        // wrapped back into the loop region
        assert!(st.sample_pos >= 2.0 && st.sample_pos < 6.0);

        // once looped, the playable region ends at loop_start + loop_len
        mixer.resample(&samples, &mut st, 16);
        assert!(st.sample_pos >= 2.0 && st.sample_pos < 6.0);
    }

    #[test]
    fn test_pan_law() {
        let samples = vec![Sample::new(), sample_from(&[0x40; 64])];
        let mut mixer = Mixer::new();

        let mut state = vec![ChannelState::new(); 4];
        state[0] = voice(1, 428);
        state[0].pan = -1.0;

        let mut out = [7.0_f32; 8];
        mixer.mix(&samples, &mut state, &mut out, 4);

        // gain 2/4, hard left: everything on the left slot
        assert_delta!(out[0], 0.5 * 0.5);
        assert_eq!(out[1], 0.0);

        // reduced width spills onto both sides
        mixer.set_width(0.5);
        state[0].sample_pos = 0.0;
        mixer.mix(&samples, &mut state, &mut out, 4);
        assert_delta!(out[0], 0.5 * 0.75 * 0.5);
        assert_delta!(out[1], 0.5 * 0.25 * 0.5);
    }

    #[test]
    fn test_mono_mix() {
        let samples = vec![Sample::new(), sample_from(&[0x40; 64])];
        let mut mixer = Mixer::new();
        mixer.set_stereo(false);

        let mut state = vec![ChannelState::new(); 4];
        state[0] = voice(1, 428);
        state[0].pan = -1.0;

        let mut out = [7.0_f32; 4];
        mixer.mix(&samples, &mut state, &mut out, 4);
        assert_delta!(out[0], 0.25 * 0.5);
    }
}
