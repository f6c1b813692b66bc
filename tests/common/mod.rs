#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use parking_lot::Mutex;

use scoreboard_reader_lib::models::recognition::Recognition;
use scoreboard_reader_lib::{
    CancellationFlag, EngineError, EngineFactory, EngineParams, RecognitionEngine, Region,
};

/// Scripted text that makes the fake engine fail the call
pub const FAIL: &str = "!fail";

/// Scripted text that makes the fake engine panic mid-call
pub const PANIC: &str = "!panic";

const CELL_WIDTH: u32 = 40;
const CELL_HEIGHT: u32 = 12;
const COLUMNS: u32 = 10;

/// Shared bookkeeping for every engine a factory hands out
#[derive(Default)]
pub struct EngineStats {
    pub created: AtomicUsize,
    pub create_attempts: AtomicUsize,
    pub terminated: AtomicUsize,
    pub recognized: AtomicUsize,
    pub calls_after_terminate: AtomicUsize,
    pub whitelists: Mutex<Vec<String>>,
}

impl EngineStats {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn recognized(&self) -> usize {
        self.recognized.load(Ordering::SeqCst)
    }
}

/// Engine factory whose engines "read" a region by the color of its
/// top-left pixel
pub struct FakeEngineFactory {
    pub stats: Arc<EngineStats>,
    script: Arc<HashMap<[u8; 3], String>>,
    cancel_after: Option<(usize, CancellationFlag)>,
    fail_from_attempt: Option<usize>,
    delay: Option<Duration>,
}

impl FakeEngineFactory {
    pub fn new(script: HashMap<[u8; 3], String>) -> Self {
        Self {
            stats: Arc::new(EngineStats::default()),
            script: Arc::new(script),
            cancel_after: None,
            fail_from_attempt: None,
            delay: None,
        }
    }

    /// Cancel `flag` once `count` recognitions have completed
    pub fn cancel_after(mut self, count: usize, flag: CancellationFlag) -> Self {
        self.cancel_after = Some((count, flag));
        self
    }

    /// Creation attempt number `attempt` (1-based) and every later one fail
    pub fn fail_from_attempt(mut self, attempt: usize) -> Self {
        self.fail_from_attempt = Some(attempt);
        self
    }

    /// Every recognition call takes at least `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl EngineFactory for FakeEngineFactory {
    async fn create(&self) -> Result<Box<dyn RecognitionEngine>, EngineError> {
        tokio::task::yield_now().await;
        let attempt = self.stats.create_attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if self.fail_from_attempt.is_some_and(|first| attempt >= first) {
            return Err(EngineError::Provisioning(format!(
                "fake engine {} refused to start",
                attempt
            )));
        }

        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEngine {
            stats: Arc::clone(&self.stats),
            script: Arc::clone(&self.script),
            cancel_after: self.cancel_after.clone(),
            delay: self.delay,
            terminated: false,
        }))
    }
}

struct FakeEngine {
    stats: Arc<EngineStats>,
    script: Arc<HashMap<[u8; 3], String>>,
    cancel_after: Option<(usize, CancellationFlag)>,
    delay: Option<Duration>,
    terminated: bool,
}

#[async_trait]
impl RecognitionEngine for FakeEngine {
    async fn configure(&mut self, params: &EngineParams) -> Result<(), EngineError> {
        if self.terminated {
            self.stats.calls_after_terminate.fetch_add(1, Ordering::SeqCst);
        }
        self.stats.whitelists.lock().push(params.whitelist.clone());
        Ok(())
    }

    async fn recognize(&mut self, image: &DynamicImage) -> Result<Recognition, EngineError> {
        if self.terminated {
            self.stats.calls_after_terminate.fetch_add(1, Ordering::SeqCst);
        }
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        let pixel = image.get_pixel(0, 0);
        let key = [pixel[0], pixel[1], pixel[2]];
        let text = self.script.get(&key).cloned().unwrap_or_default();

        let done = self.stats.recognized.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((count, flag)) = &self.cancel_after {
            if done >= *count {
                flag.cancel();
            }
        }

        if text == PANIC {
            panic!("scripted panic");
        }
        if text == FAIL {
            return Err(EngineError::Recognition("scripted failure".to_string()));
        }
        Ok(Recognition::new(format!("{}\n", text), 95.0))
    }

    async fn terminate(&mut self) {
        if !self.terminated {
            self.terminated = true;
            self.stats.terminated.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Screenshot with one solid cell per text region and gradient cells for
/// portraits
pub struct Fixture {
    pub regions: Vec<Region>,
    pub script: HashMap<[u8; 3], String>,
    cells: Vec<Cell>,
}

enum Cell {
    Solid([u8; 3]),
    Rising,
    Falling,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
            script: HashMap::new(),
            cells: Vec::new(),
        }
    }

    fn next_region(&self, name: &str) -> Region {
        let index = self.cells.len() as u32;
        Region::new(
            name,
            (index % COLUMNS) * CELL_WIDTH,
            (index / COLUMNS) * CELL_HEIGHT,
            CELL_WIDTH,
            CELL_HEIGHT,
        )
    }

    /// Text region the fake engine reads as `text`
    pub fn text(&mut self, name: &str, char_set: &str, text: &str) -> &mut Self {
        let mut region = self.next_region(name);
        if !char_set.is_empty() {
            region = region.with_char_set(char_set);
        }

        let index = self.cells.len() + 1;
        let color = [(index % 256) as u8, (index / 256) as u8, 77];
        self.script.insert(color, text.to_string());
        self.cells.push(Cell::Solid(color));
        self.regions.push(region);
        self
    }

    /// Italic text region
    pub fn italic_text(&mut self, name: &str, char_set: &str, text: &str) -> &mut Self {
        self.text(name, char_set, text);
        if let Some(region) = self.regions.pop() {
            self.regions.push(region.with_italic(true));
        }
        self
    }

    /// Portrait region painted with a left-to-right (or right-to-left) gradient
    pub fn portrait(&mut self, name: &str, hash_set: &str, rising: bool) -> &mut Self {
        let region = self.next_region(name).with_hash_set(hash_set);
        self.cells.push(if rising { Cell::Rising } else { Cell::Falling });
        self.regions.push(region);
        self
    }

    pub fn image(&self) -> DynamicImage {
        let rows = (self.cells.len() as u32).div_ceil(COLUMNS).max(1);
        let mut canvas = RgbImage::new(COLUMNS * CELL_WIDTH, rows * CELL_HEIGHT);

        for (index, cell) in self.cells.iter().enumerate() {
            let index = index as u32;
            let origin_x = (index % COLUMNS) * CELL_WIDTH;
            let origin_y = (index / COLUMNS) * CELL_HEIGHT;

            for dy in 0..CELL_HEIGHT {
                for dx in 0..CELL_WIDTH {
                    let pixel = match cell {
                        Cell::Solid(color) => Rgb(*color),
                        Cell::Rising => gradient_pixel(dx),
                        Cell::Falling => gradient_pixel(CELL_WIDTH - 1 - dx),
                    };
                    canvas.put_pixel(origin_x + dx, origin_y + dy, pixel);
                }
            }
        }

        DynamicImage::ImageRgb8(canvas)
    }

    pub fn factory(&self) -> FakeEngineFactory {
        FakeEngineFactory::new(self.script.clone())
    }
}

fn gradient_pixel(step: u32) -> Rgb<u8> {
    let value = (step * 6) as u8;
    Rgb([value, value, value])
}

/// Standalone rising/falling thumbnails for building hash set entries
pub fn portrait_thumbnail(rising: bool) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(CELL_WIDTH, CELL_HEIGHT, |x, _| {
        if rising {
            gradient_pixel(x)
        } else {
            gradient_pixel(CELL_WIDTH - 1 - x)
        }
    }))
}
