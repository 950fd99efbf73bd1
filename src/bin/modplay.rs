extern crate getopts;
extern crate memmap;
extern crate modplay;
extern crate riff_wave;

use std::cmp;
use std::env;
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use getopts::{Matches, Options};
use memmap::Mmap;
use modplay::Player;
use modplay::mixer::interpolator::Interpolator;
use modplay::module::Module;
use riff_wave::WaveWriter;

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut opts = Options::new();

    opts.optflag("h", "help", "display usage information and exit");
    opts.optflag("p", "patterns", "dump the patterns and exit");
    opts.optflag("m", "mono", "mix to a single output channel");
    opts.optflag("n", "nearest", "use nearest neighbor interpolation");
    opts.optopt("o", "output", "output file name (default out.wav)", "file");
    opts.optopt("r", "rate", "sampling rate in hertz (default 44100)", "hz");
    opts.optopt("t", "time", "length of audio to render in seconds (default 30)", "secs");
    opts.optopt("w", "width", "stereo width, 0.0 to 1.0 (default 1.0)", "val");

    let matches = match opts.parse(&args[1..]) {
        Ok(m)  => m,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };

    if matches.opt_present("h") || matches.free.len() < 1 {
        let brief = format!("Usage: {} [options] filename", args[0]);
        print!("{}", opts.usage(&brief));
        return;
    }

    match run(&matches) {
        Ok(_)  => {},
        Err(e) => eprintln!("error: {}", e),
    }
}

fn run(matches: &Matches) -> Result<(), Box<Error>> {
    let name = &matches.free[0];

    let file = File::open(name)?;
    let mmap = unsafe { Mmap::map(&file)? };

    let mut player = Player::from_bytes(&mmap[..])?;

    {
        let module = player.module();
        println!("Title : {}", module.title);
        println!("Format: {} ({} channels)", module.magic, module.channels);
        println!("Length: {} positions, {} patterns", module.len(), module.patterns.len());

        println!("Samples:");
        for smp in module.samples.iter().filter(|s| s.size > 0) {
            println!("{:3}: {:22} {:6} {:6} {:6} {}",
                smp.num, smp.name, smp.size, smp.loop_start, smp.loop_len,
                if smp.has_loop { 'L' } else { ' ' });
        }

        if matches.opt_present("p") {
            dump_patterns(module);
            return Ok(());
        }
    }

    let rate: u32 = match matches.opt_str("r") {
        Some(val) => val.parse()?,
        None      => 44100,
    };
    let secs: u32 = match matches.opt_str("t") {
        Some(val) => val.parse()?,
        None      => 30,
    };
    let width: f32 = match matches.opt_str("w") {
        Some(val) => val.parse()?,
        None      => 1.0,
    };
    let out_name = matches.opt_str("o").unwrap_or("out.wav".to_owned());
    let channels = if matches.opt_present("m") { 1 } else { 2 };

    player.set_sample_rate(rate);
    player.set_stereo(channels == 2);
    player.set_stereo_width(width);
    if matches.opt_present("n") {
        player.set_interpolator(Interpolator::Nearest);
    }

    let out_file = File::create(&out_name)?;
    let writer = BufWriter::new(out_file);
    let mut wave_writer = WaveWriter::new(channels as u16, rate, 16, writer)?;

    let mut buffer = vec![0_i16; 1024 * channels];
    let mut frames = (secs * rate) as usize;
    let total = frames;

    while frames > 0 {
        let n = cmp::min(frames, 1024);
        player.decode_frames(&mut buffer[..n * channels]);
        for s in &buffer[..n * channels] {
            wave_writer.write_sample_i16(*s)?;
        }
        frames -= n;
    }

    println!("wrote {}: {} frames ({:.1}s)", out_name, total, total as f32 / rate as f32);

    Ok(())
}

fn dump_patterns(module: &Module) {
    for (num, pattern) in module.patterns.iter().enumerate() {
        println!("pattern {:02}:", num);
        for row in 0..64 {
            print!("{:02} |", row);
            for chn in 0..module.channels {
                print!(" {} |", pattern.event(row, chn));
            }
            println!();
        }
    }
}
