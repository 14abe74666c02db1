#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use avr_lib::capture::{CaptureArtifact, ScreenCapturer};
use avr_lib::error::{CaptureError, ConfigError, OcrError};
use avr_lib::ocr::{ExtractedText, OcrEngine};
use avr_lib::pipeline::Clock;
use avr_lib::shortcut::{KeyListener, ShortcutBinding, TriggerCallback};
use chrono::{NaiveDate, NaiveDateTime};
use image::{ImageFormat, Rgb, RgbImage};
use tokio::sync::{mpsc, Semaphore};

pub fn png_of(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

/// Hands out `times` in order, then keeps returning the last one.
pub fn fixed_clock(times: Vec<NaiveDateTime>) -> Clock {
    let times = Mutex::new(VecDeque::from(times));
    Arc::new(move || {
        let mut times = times.lock().unwrap();
        if times.len() > 1 {
            times.pop_front().unwrap()
        } else {
            *times.front().expect("clock needs at least one time")
        }
    })
}

#[derive(Debug, Clone, Copy)]
pub enum CaptureStep {
    Ok,
    Denied,
    Hang,
}

/// Follows a script of outcomes, capturing successfully once it runs out.
#[derive(Default)]
pub struct ScriptedCapturer {
    steps: Mutex<VecDeque<CaptureStep>>,
    calls: AtomicUsize,
}

impl ScriptedCapturer {
    pub fn new(steps: impl IntoIterator<Item = CaptureStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenCapturer for ScriptedCapturer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn capture(&self) -> Result<CaptureArtifact, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(CaptureStep::Ok);
        match step {
            CaptureStep::Ok => CaptureArtifact::from_png(png_of(8, 8), None),
            CaptureStep::Denied => Err(CaptureError::PermissionDenied {
                reason: "screen recording not allowed".into(),
            }),
            CaptureStep::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                CaptureArtifact::from_png(png_of(8, 8), None)
            }
        }
    }
}

/// Blocks every capture until the test releases a permit.
pub struct GatedCapturer {
    started: mpsc::UnboundedSender<()>,
    gate: Arc<Semaphore>,
}

impl GatedCapturer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<()>, Arc<Semaphore>) {
        let (started, started_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                started,
                gate: Arc::clone(&gate),
            },
            started_rx,
            gate,
        )
    }
}

#[async_trait]
impl ScreenCapturer for GatedCapturer {
    fn name(&self) -> &str {
        "gated"
    }

    async fn capture(&self) -> Result<CaptureArtifact, CaptureError> {
        let _ = self.started.send(());
        self.gate.acquire().await.unwrap().forget();
        CaptureArtifact::from_png(png_of(8, 8), None)
    }
}

#[derive(Debug, Clone)]
pub enum OcrStep {
    Text(String),
    Fail,
}

pub struct ScriptedOcr {
    steps: Mutex<VecDeque<OcrStep>>,
    fallback: String,
}

impl ScriptedOcr {
    pub fn new(steps: impl IntoIterator<Item = OcrStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback: "recognized text".into(),
        }
    }
}

#[async_trait]
impl OcrEngine for ScriptedOcr {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn recognize(&self, artifact: CaptureArtifact) -> Result<ExtractedText, OcrError> {
        assert!(!artifact.png_bytes().is_empty());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| OcrStep::Text(self.fallback.clone()));
        match step {
            OcrStep::Text(text) => Ok(ExtractedText::new(text)),
            OcrStep::Fail => Err(OcrError::UnreadableImage {
                reason: "corrupt buffer".into(),
            }),
        }
    }
}

/// Records what the service registers and lets the test press the chord.
#[derive(Default)]
pub struct FakeListener {
    pub registered: Option<ShortcutBinding>,
    callback: Option<TriggerCallback>,
    pub fail_with: Option<String>,
}

impl FakeListener {
    pub fn failing(reason: &str) -> Self {
        Self {
            fail_with: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn fire(&self) {
        (self.callback.as_ref().expect("listener not started"))();
    }
}

impl KeyListener for FakeListener {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn start(
        &mut self,
        binding: ShortcutBinding,
        on_trigger: TriggerCallback,
    ) -> Result<(), ConfigError> {
        if let Some(reason) = &self.fail_with {
            return Err(ConfigError::ListenerUnavailable {
                reason: reason.clone(),
            });
        }
        self.registered = Some(binding);
        self.callback = Some(on_trigger);
        Ok(())
    }
}

/// Polls `cond` for up to five seconds.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
