//! Mono PCM16 audio frames exchanged with the microphone, the remote tutor and the speaker.

use std::time::Duration;

/// Microphone capture rate.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Rate of synthesized speech from the tutor.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Samples per captured microphone frame.
pub const CAPTURE_FRAME_SAMPLES: usize = 4096;

/// A block of mono, signed 16-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Decodes little-endian PCM16 bytes. A trailing odd byte is dropped.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self { samples, sample_rate }
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Playback length of the frame.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_follows_sample_rate() {
        let one_second = AudioFrame::new(vec![0; OUTPUT_SAMPLE_RATE as usize], OUTPUT_SAMPLE_RATE);
        assert_eq!(one_second.duration(), Duration::from_secs(1));

        let capture = AudioFrame::new(vec![0; CAPTURE_FRAME_SAMPLES], INPUT_SAMPLE_RATE);
        assert_eq!(capture.duration(), Duration::from_millis(256));

        assert_eq!(AudioFrame::new(vec![1, 2], 0).duration(), Duration::ZERO);
    }

    #[test]
    fn little_endian_bytes() {
        let frame = AudioFrame::new(vec![1, -2, i16::MAX], INPUT_SAMPLE_RATE);
        let bytes = frame.to_le_bytes();
        assert_eq!(&bytes[..4], &[0x01, 0x00, 0xFE, 0xFF]);

        let mut odd = bytes.clone();
        odd.push(0x7F);
        assert_eq!(AudioFrame::from_le_bytes(&odd, INPUT_SAMPLE_RATE), frame);
    }
}
