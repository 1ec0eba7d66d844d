/// Sound engine: procedural chiptune effects via rodio.
///
/// Every effect is synthesised once at startup into an in-memory WAV
/// buffer; playback is fire-and-forget on a detached Sink.
///
/// Build without the "sound" feature to get the silent stub instead.

#[cfg(feature = "sound")]
mod inner {
    use std::f32::consts::TAU;
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};
    use tracing::debug;

    const SAMPLE_RATE: u32 = 22050;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sfx_trap_reveal: Arc<Vec<u8>>,
        sfx_trap_hit: Arc<Vec<u8>>,
        sfx_plate: Arc<Vec<u8>>,
        sfx_door: Arc<Vec<u8>>,
        sfx_clear: Arc<Vec<u8>>,
        sfx_fail: Arc<Vec<u8>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    debug!("no audio output: {e}");
                    return None;
                }
            };

            Some(SoundEngine {
                _stream: stream,
                handle,
                sfx_trap_reveal: Arc::new(make_wav(&gen_trap_reveal())),
                sfx_trap_hit: Arc::new(make_wav(&gen_trap_hit())),
                sfx_plate: Arc::new(make_wav(&gen_plate())),
                sfx_door: Arc::new(make_wav(&gen_door())),
                sfx_clear: Arc::new(make_wav(&gen_clear())),
                sfx_fail: Arc::new(make_wav(&gen_fail())),
            })
        }

        fn play(&self, buf: &Arc<Vec<u8>>) {
            let Ok(sink) = Sink::try_new(&self.handle) else { return };
            if let Ok(src) = rodio::Decoder::new(Cursor::new(buf.as_ref().clone())) {
                sink.append(src);
                sink.detach();
            }
        }

        pub fn play_trap_reveal(&self) { self.play(&self.sfx_trap_reveal); }
        pub fn play_trap_hit(&self) { self.play(&self.sfx_trap_hit); }
        pub fn play_plate(&self) { self.play(&self.sfx_plate); }
        pub fn play_door(&self) { self.play(&self.sfx_door); }
        pub fn play_clear(&self) { self.play(&self.sfx_clear); }
        pub fn play_fail(&self) { self.play(&self.sfx_fail); }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators: mono f32 samples in [-1, 1]
    // ════════════════════════════════════════════════════════════

    fn samples_for(seconds: f32) -> usize {
        (SAMPLE_RATE as f32 * seconds) as usize
    }

    /// Pitch sweep from `f0` to `f1` with a linear fade out.
    /// `bright` mixes in the 3rd harmonic for a squarer tone.
    fn sweep(f0: f32, f1: f32, seconds: f32, volume: f32, bright: f32) -> Vec<f32> {
        let n = samples_for(seconds);
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = f0 + (f1 - f0) * t;
                phase += freq / SAMPLE_RATE as f32;
                let wave = (phase * TAU).sin() * (1.0 - bright) + (phase * 3.0 * TAU).sin() * bright;
                wave * (1.0 - t) * volume
            })
            .collect()
    }

    /// Notes played back to back, each a flat-pitch `sweep`.
    fn arpeggio(notes: &[f32], note_seconds: f32, volume: f32, bright: f32) -> Vec<f32> {
        notes
            .iter()
            .flat_map(|&f| sweep(f, f, note_seconds, volume, bright))
            .collect()
    }

    /// Trap spotted: two quick rising warning pips
    fn gen_trap_reveal() -> Vec<f32> {
        let mut s = sweep(660.0, 880.0, 0.05, 0.2, 0.4);
        s.extend(std::iter::repeat(0.0).take(samples_for(0.03)));
        s.extend(sweep(660.0, 880.0, 0.05, 0.2, 0.4));
        s
    }

    /// Trap hit: noisy crunch falling in pitch
    fn gen_trap_hit() -> Vec<f32> {
        let n = samples_for(0.22);
        let mut rng: u32 = 0x2545_f491;
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                phase += (320.0 - t * 240.0) / SAMPLE_RATE as f32;
                // xorshift noise
                rng ^= rng << 13;
                rng ^= rng >> 17;
                rng ^= rng << 5;
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let tone = (phase * TAU).sin();
                (tone * 0.5 + noise * 0.5) * (1.0 - t).powf(1.5) * 0.35
            })
            .collect()
    }

    /// Plate pressed: a short low click
    fn gen_plate() -> Vec<f32> {
        sweep(240.0, 180.0, 0.06, 0.35, 0.5)
    }

    /// Door opens: rising major arpeggio G4→B4→D5→G5
    fn gen_door() -> Vec<f32> {
        arpeggio(&[392.0, 494.0, 587.0, 784.0], 0.07, 0.25, 0.3)
    }

    /// Level clear: fanfare C5→E5→G5 with a held C6
    fn gen_clear() -> Vec<f32> {
        let mut s = arpeggio(&[523.0, 659.0, 784.0], 0.09, 0.3, 0.2);
        s.extend(sweep(1047.0, 1047.0, 0.3, 0.3, 0.2));
        s
    }

    /// Out of lives / time: slow descending minor line
    fn gen_fail() -> Vec<f32> {
        arpeggio(&[440.0, 415.0, 392.0, 330.0], 0.14, 0.3, 0.1)
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder: 16-bit PCM mono
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        const CHANNELS: u16 = 1;
        const BITS: u16 = 16;
        let block_align = CHANNELS * BITS / 8;
        let byte_rate = SAMPLE_RATE * block_align as u32;
        let data_len = samples.len() as u32 * block_align as u32;

        let mut buf = Vec::with_capacity(44 + data_len as usize);
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_len).to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&CHANNELS.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&BITS.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_len.to_le_bytes());
        for &s in samples {
            let pcm = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            buf.extend_from_slice(&pcm.to_le_bytes());
        }
        buf
    }

}

// ════════════════════════════════════════════════════════════
//  Public API: compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play_trap_reveal(&self) {}
    pub fn play_trap_hit(&self) {}
    pub fn play_plate(&self) {}
    pub fn play_door(&self) {}
    pub fn play_clear(&self) {}
    pub fn play_fail(&self) {}
}
