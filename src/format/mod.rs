use std::cmp;

use module::{Module, Pattern};
use module::sample::Sample;
use util::{self, BinaryRead};
use Error;

// Module layout:
//
//    0  song name (20 bytes)
//   20  31 instrument headers, 30 bytes each:
//       name(22) size(2,BE words) finetune(1) volume(1)
//       loop start(2,BE words) loop length(2,BE words)
//  950  order list length
//  951  restart position (ignored)
//  952  order list (128 bytes)
// 1080  magic, e.g. "M.K." (informational)
// 1084  pattern data, 1024 bytes per pattern
//  ...  sample bodies, concatenated in slot order

/// Load a 4-channel, 31-instrument Protracker module.
pub fn load(b: &[u8]) -> Result<Module, Error> {
    if b.len() < 2048 {
        return Err(Error::Format(format!("file too short ({} bytes)", b.len())));
    }

    let title = b.read_string(0, 20)?;

    // instrument slot 0 is reserved and stays silent
    let mut samples = vec![Sample::new()];
    let mut smp_size = 0;
    for i in 0..31 {
        let smp = load_sample(b, i)?;
        smp_size += smp.size as usize;
        samples.push(smp);
    }

    let song_length = cmp::min(b.read8(950)? as usize, 128);
    if song_length == 0 {
        return Err(Error::Load("empty order list".to_owned()));
    }

    let mut orders = [0_u8; 128];
    orders.copy_from_slice(b.slice(952, 128)?);
    let magic = b.read_string(1080, 4)?;

    let mut num_patterns = 0;
    orders[..song_length].iter().for_each(|&x| { num_patterns = cmp::max(num_patterns, x as usize + 1); });

    let need = 1082 + 1024 * num_patterns + smp_size;
    if b.len() < need {
        return Err(Error::Load(format!("inconsistent module size (want {}, have {})", need, b.len())));
    }

    debug!("{:?} module: {} positions, {} patterns, {} sample bytes", magic, song_length, num_patterns, smp_size);

    let mut patterns = Vec::with_capacity(num_patterns);
    for i in 0..num_patterns {
        patterns.push(Pattern::from_slice(b.slice(1084 + 1024 * i, 1024)?, 4));
    }

    let mut ofs = 1084 + 1024 * num_patterns;
    for smp in samples.iter_mut().skip(1) {
        let size = smp.size as usize;
        if size > 0 {
            smp.store(b.slice(ofs, size)?);
            ofs += size;
        }
    }

    Ok(Module {
        title,
        channels: 4,
        samples,
        song_length,
        orders,
        magic,
        patterns,
    })
}

fn load_sample(b: &[u8], i: usize) -> Result<Sample, Error> {
    let mut smp = Sample::new();

    let ofs = 20 + i * 30;
    smp.num = i + 1;
    smp.name = b.read_string(ofs, 22)?;
    smp.size = b.read16b(ofs + 22)? as u32 * 2;    // stored as word count
    smp.finetune = util::signed_nibble(b.read8(ofs + 24)?);
    smp.volume = cmp::min(b.read8(ofs + 25)? as i32, 64);
    smp.loop_start = b.read16b(ofs + 26)? as u32 * 2;
    smp.loop_len = b.read16b(ofs + 28)? as u32 * 2;
    smp.has_loop = smp.loop_len > 2;

    Ok(smp)
}

#[cfg(test)]
mod tests {
    use super::*;

    // one pattern, one 8-frame instrument
    fn image() -> Vec<u8> {
        let mut b = vec![0_u8; 1084 + 1024 + 8];
        b[0..4].copy_from_slice(b"test");

        b[20..25].copy_from_slice(b"kick ");
        b[20 + 23] = 4;      // 4 words
        b[20 + 24] = 0x0f;   // finetune -1
        b[20 + 25] = 70;     // volume, clamped to 64
        b[20 + 27] = 1;      // loop start 1 word
        b[20 + 29] = 3;      // loop length 3 words

        b[950] = 2;
        b[952] = 0;
        b[953] = 0;
        b[1080..1084].copy_from_slice(b"M.K.");

        // pattern 0, row 1, channel 2: period 0x1ab, instrument 0x12, A34
        let ofs = 1084 + (1 * 4 + 2) * 4;
        b[ofs..ofs + 4].copy_from_slice(&[0x11, 0xab, 0x2a, 0x34]);

        // sample body
        for (i, s) in b[1084 + 1024..].iter_mut().enumerate() {
            *s = (i as u8) << 4;
        }
        b
    }

    #[test]
    fn test_load() {
        let m = load(&image()).unwrap();
        assert_eq!(&m.title[..4], "test");
        assert_eq!(m.magic, "M.K.");
        assert_eq!(m.channels, 4);
        assert_eq!(m.song_length, 2);
        assert_eq!(m.patterns.len(), 1);

        let smp = &m.samples[1];
        assert_eq!(&smp.name[..5], "kick ");
        assert_eq!(smp.size, 8);
        assert_eq!(smp.finetune, -1);
        assert_eq!(smp.volume, 64);
        assert_eq!(smp.loop_start, 2);
        assert_eq!(smp.loop_len, 6);
        assert!(smp.has_loop);
        assert_eq!(smp.data().len(), 8);
        assert_eq!(smp.data()[1], 16.0 / 128.0);

        let e = m.event(0, 1, 2);
        assert_eq!(e.period, 0x1ab);
        assert_eq!(e.ins, 0x12);
        assert_eq!(e.fxt, 0xa);
        assert_eq!(e.fxp, 0x34);

        // untouched cells decode as empty
        let e = m.event(1, 0, 0);
        assert_eq!(e.period, 0);
        assert_eq!(e.ins, 0);
    }

    #[test]
    fn test_sentinel_slot() {
        let m = load(&image()).unwrap();
        assert_eq!(m.samples.len(), 32);
        assert_eq!(m.samples[0].size, 0);
        assert_eq!(m.samples[0].volume, 0);
    }

    #[test]
    fn test_too_short() {
        match load(&vec![0_u8; 100]) {
            Err(Error::Format(_)) => {},
            _                     => panic!("short file must be rejected"),
        }
    }

    #[test]
    fn test_inconsistent_size() {
        let b = image();
        match load(&b[..2050]) {
            Err(Error::Load(_)) => {},
            _                   => panic!("truncated file must be rejected"),
        }
    }

    #[test]
    fn test_empty_order_list() {
        let mut b = image();
        b[950] = 0;
        assert!(load(&b).is_err());
    }
}
