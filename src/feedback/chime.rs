use rodio::Source;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;

/// Short sine tone with an exponential decay, the building block of cues.
pub struct Chime {
    sample_rate: u32,
    frequency: f32,
    amplitude: f32,
    index: u32,
    total: u32,
}

impl Chime {
    pub fn new(frequency: f32, duration: Duration) -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            frequency,
            amplitude: 0.25,
            index: 0,
            total: (duration.as_secs_f32() * SAMPLE_RATE as f32) as u32,
        }
    }
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.total {
            return None;
        }

        let t = self.index as f32 / self.sample_rate as f32;
        let progress = self.index as f32 / self.total as f32;
        self.index += 1;

        // Fast attack, then decay to silence by the last sample.
        let attack = (progress * 50.0).min(1.0);
        let envelope = attack * (1.0 - progress).powi(2);

        Some((t * self.frequency * std::f32::consts::TAU).sin() * self.amplitude * envelope)
    }
}

impl Source for Chime {
    fn current_frame_len(&self) -> Option<usize> {
        Some((self.total - self.index.min(self.total)) as usize)
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total as f32 / self.sample_rate as f32,
        ))
    }
}
