//! Worker threads that fetch and decode frames.
//!
//! [`FrameLoader`] owns a small pool of named threads sharing one request
//! channel. Each job carries the loader generation it was issued in;
//! [`FrameLoader::cleanup`] bumps the generation so queued jobs are skipped
//! and late results are dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use web_time::Instant;

use crate::config::FrameLoaderConfig;
use crate::frames::{
    FetchRequest, FrameBitmap, FrameError, FrameScheduler, FrameSection, FrameSource,
    LoaderEvent, Quality, Step,
};

struct FetchJob {
    generation: u64,
    request: FetchRequest,
}

enum WorkerMessage {
    Fetch(FetchJob),
    Shutdown,
}

struct FetchResult {
    generation: u64,
    index: u32,
    quality: Quality,
    outcome: Result<image::RgbaImage, FrameError>,
}

type FrameLoadedCallback = Box<dyn FnMut(&FrameBitmap)>;
type SectionCallback = Box<dyn FnMut(u32)>;

/// Streams frames of one media file off the interaction thread.
pub struct FrameLoader {
    scheduler: FrameScheduler,
    request_tx: Sender<WorkerMessage>,
    result_rx: Receiver<FetchResult>,
    workers: Vec<JoinHandle<()>>,
    generation: Arc<AtomicU64>,
    cache: HashMap<u32, FrameBitmap>,
    pending_events: Vec<LoaderEvent>,
    frame_loaded: Option<FrameLoadedCallback>,
    get_section: Option<SectionCallback>,
}

impl FrameLoader {
    /// Spawn the worker pool.
    pub fn spawn(source: Arc<dyn FrameSource>, config: &FrameLoaderConfig) -> Result<Self, FrameError> {
        let (request_tx, request_rx) = mpsc::channel::<WorkerMessage>();
        let (result_tx, result_rx) = mpsc::channel::<FetchResult>();
        let request_rx = Arc::new(Mutex::new(request_rx));
        let generation = Arc::new(AtomicU64::new(0));
        let concurrency = config.concurrency.max(1);

        let mut workers = Vec::with_capacity(concurrency);
        for n in 0..concurrency {
            let request_rx = Arc::clone(&request_rx);
            let result_tx = result_tx.clone();
            let source = Arc::clone(&source);
            let generation = Arc::clone(&generation);
            let handle = thread::Builder::new()
                .name(format!("frame-loader-{}", n))
                .spawn(move || {
                    log::info!("Frame loader thread {} started", n);
                    Self::thread_loop(&request_rx, &result_tx, source.as_ref(), &generation);
                    log::info!("Frame loader thread {} exiting", n);
                })
                .map_err(|e| FrameError::Spawn(e.to_string()))?;
            workers.push(handle);
        }

        Ok(Self {
            scheduler: FrameScheduler::new(concurrency, config.lq_first),
            request_tx,
            result_rx,
            workers,
            generation,
            cache: HashMap::new(),
            pending_events: Vec::new(),
            frame_loaded: None,
            get_section: None,
        })
    }

    fn thread_loop(
        request_rx: &Mutex<Receiver<WorkerMessage>>,
        result_tx: &Sender<FetchResult>,
        source: &dyn FrameSource,
        generation: &AtomicU64,
    ) {
        loop {
            let message = match request_rx.lock() {
                Ok(rx) => rx.recv(),
                Err(_) => break,
            };
            match message {
                Ok(WorkerMessage::Fetch(job)) => {
                    if job.generation != generation.load(Ordering::Acquire) {
                        log::debug!("Skipping cancelled fetch of frame {}", job.request.index);
                        continue;
                    }
                    let FetchRequest { index, quality, url } = job.request;
                    let outcome = Self::fetch_and_decode(source, index, &url);
                    let result = FetchResult {
                        generation: job.generation,
                        index,
                        quality,
                        outcome,
                    };
                    if result_tx.send(result).is_err() {
                        log::warn!("Result channel closed, frame loader thread exiting");
                        break;
                    }
                }
                Ok(WorkerMessage::Shutdown) => {
                    log::debug!("Received shutdown signal");
                    break;
                }
                Err(_) => {
                    log::debug!("Request channel closed, frame loader thread exiting");
                    break;
                }
            }
        }
    }

    fn fetch_and_decode(
        source: &dyn FrameSource,
        index: u32,
        url: &str,
    ) -> Result<image::RgbaImage, FrameError> {
        let bytes = source.fetch(url)?;
        let start = Instant::now();
        let decoded = image::load_from_memory(&bytes).map_err(|e| FrameError::Decode {
            index,
            message: e.to_string(),
        })?;
        log::debug!(
            "Decoded frame {} ({} bytes) in {:.1}ms",
            index,
            bytes.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(decoded.to_rgba8())
    }

    /// Register the handler called for every frame that gets new pixels.
    pub fn on_frame_loaded(&mut self, callback: impl FnMut(&FrameBitmap) + 'static) {
        self.frame_loaded = Some(Box::new(callback));
    }

    /// Register the handler called when a frame's section is needed.
    pub fn on_get_section(&mut self, callback: impl FnMut(u32) + 'static) {
        self.get_section = Some(Box::new(callback));
    }

    pub fn push_sections(&mut self, sections: impl IntoIterator<Item = FrameSection>) {
        self.scheduler.push_sections(sections);
        self.pump();
    }

    /// Replace the working set of frames.
    pub fn set_frames_to_load(&mut self, frames: impl IntoIterator<Item = u32>) {
        self.scheduler.set_frames_to_load(frames);
        self.pump();
    }

    pub fn add_frames_to_load(&mut self, frames: impl IntoIterator<Item = u32>) {
        self.scheduler.add_frames_to_load(frames);
        self.pump();
    }

    /// Prioritize `index` and continue the working set from there.
    pub fn set_next_frame_to_load(&mut self, index: u32) {
        self.scheduler.set_next_frame_to_load(index);
        self.pump();
    }

    /// Any cached version of the frame, requesting an LQ fetch if there is none.
    pub fn load_lq_frame(&mut self, index: u32) -> Option<FrameBitmap> {
        if let Some(frame) = self.cache.get(&index) {
            return Some(frame.clone());
        }
        if self.scheduler.request(index, Quality::Lq) {
            self.pump();
        }
        None
    }

    /// The HQ frame if cached, requesting it otherwise.
    pub fn load_hq_frame(&mut self, index: u32) -> Option<FrameBitmap> {
        if let Some(frame) = self.cache.get(&index).filter(|f| f.quality == Quality::Hq) {
            return Some(frame.clone());
        }
        if self.scheduler.request(index, Quality::Hq) {
            self.pump();
        }
        None
    }

    pub fn frame(&self, index: u32) -> Option<&FrameBitmap> {
        self.cache.get(&index)
    }

    pub fn is_loaded(&self, index: u32) -> bool {
        self.cache.contains_key(&index)
    }

    pub fn pending_count(&self) -> usize {
        self.scheduler.pending_count() + self.scheduler.in_flight_count()
    }

    fn pump(&mut self) {
        let generation = self.generation.load(Ordering::Acquire);
        for step in self.scheduler.next_steps() {
            match step {
                Step::Fetch(request) => {
                    let (index, quality) = (request.index, request.quality);
                    let job = FetchJob {
                        generation,
                        request,
                    };
                    if self.request_tx.send(WorkerMessage::Fetch(job)).is_err() {
                        log::error!("Failed to send fetch request: channel closed");
                        self.scheduler.on_completed(index, quality, false);
                        self.pending_events.push(LoaderEvent::FrameFailed {
                            index,
                            error: FrameError::WorkerGone.to_string(),
                        });
                    } else {
                        log::debug!("Requested {} frame {}", quality, index);
                    }
                }
                Step::RequestSection(index) => {
                    self.pending_events.push(LoaderEvent::SectionRequested { index });
                }
                Step::Unavailable(index) => {
                    log::warn!("{}", FrameError::NoUrl(index));
                    self.pending_events.push(LoaderEvent::FrameFailed {
                        index,
                        error: FrameError::NoUrl(index).to_string(),
                    });
                }
            }
        }
    }

    fn handle_result(&mut self, result: FetchResult) {
        if result.generation != self.generation.load(Ordering::Acquire) {
            return;
        }
        let FetchResult {
            index,
            quality,
            outcome,
            ..
        } = result;
        match outcome {
            Ok(pixels) => {
                if !self.scheduler.on_completed(index, quality, true) {
                    return;
                }
                let frame = FrameBitmap {
                    index,
                    quality,
                    bitmap: Arc::new(pixels),
                };
                if let Some(callback) = self.frame_loaded.as_mut() {
                    callback(&frame);
                }
                self.cache.insert(index, frame);
                self.pending_events
                    .push(LoaderEvent::FrameLoaded { index, quality });
            }
            Err(e) => {
                log::warn!("Loading frame {} failed: {}", index, e);
                self.scheduler.on_completed(index, quality, false);
                self.pending_events.push(LoaderEvent::FrameFailed {
                    index,
                    error: e.to_string(),
                });
            }
        }
    }

    fn drain_events(&mut self) -> Vec<LoaderEvent> {
        let events = std::mem::take(&mut self.pending_events);
        if let Some(callback) = self.get_section.as_mut() {
            for event in &events {
                if let LoaderEvent::SectionRequested { index } = event {
                    callback(*index);
                }
            }
        }
        events
    }

    /// Collect finished work without blocking and schedule more.
    pub fn poll(&mut self) -> Vec<LoaderEvent> {
        loop {
            match self.result_rx.try_recv() {
                Ok(result) => self.handle_result(result),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("Frame loader threads disconnected");
                    break;
                }
            }
        }
        self.pump();
        self.drain_events()
    }

    /// Like [`poll`](Self::poll), but waits up to `timeout` for the first result.
    pub fn wait(&mut self, timeout: Duration) -> Vec<LoaderEvent> {
        if self.pending_events.is_empty() {
            match self.result_rx.recv_timeout(timeout) {
                Ok(result) => self.handle_result(result),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("Frame loader threads disconnected");
                }
            }
        }
        self.poll()
    }

    /// Cancel outstanding loads and drop every cached frame.
    pub fn cleanup(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.scheduler.cleanup();
        self.cache.clear();
        self.pending_events.clear();
        log::debug!("Frame loader cleaned up");
    }
}

impl std::fmt::Debug for FrameLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoader")
            .field("workers", &self.workers.len())
            .field("cached", &self.cache.len())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Drop for FrameLoader {
    fn drop(&mut self) {
        log::debug!("Shutting down frame loader threads");
        self.generation.fetch_add(1, Ordering::AcqRel);
        for _ in &self.workers {
            let _ = self.request_tx.send(WorkerMessage::Shutdown);
        }
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.join() {
                log::warn!("Frame loader thread panicked: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::MemoryFrameSource;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    fn png(shade: u8) -> Vec<u8> {
        let img = RgbaImage::from_pixel(4, 3, Rgba([shade, 0, 0, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    fn source(frames: u32) -> Arc<MemoryFrameSource> {
        let source = MemoryFrameSource::new();
        for i in 0..frames {
            source.insert(&format!("lq/{}", i), png(i as u8));
            source.insert(&format!("hq/{}", i), png(100 + i as u8));
        }
        Arc::new(source)
    }

    fn sections(frames: u32) -> Vec<FrameSection> {
        (0..frames)
            .map(|i| FrameSection::new(i, Some(&format!("lq/{}", i)), Some(&format!("hq/{}", i))))
            .collect()
    }

    fn config() -> FrameLoaderConfig {
        FrameLoaderConfig {
            concurrency: 2,
            lq_first: true,
        }
    }

    fn wait_until(loader: &mut FrameLoader, mut done: impl FnMut(&FrameLoader) -> bool) -> Vec<LoaderEvent> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = Vec::new();
        while !done(loader) {
            assert!(Instant::now() < deadline, "timed out waiting for frames");
            events.extend(loader.wait(Duration::from_millis(50)));
        }
        events
    }

    #[test]
    fn test_loads_working_set() {
        let mut loader = FrameLoader::spawn(source(5), &config()).unwrap();
        loader.push_sections(sections(5));
        loader.set_frames_to_load(0..5);
        wait_until(&mut loader, |l| (0..5).all(|i| l.is_loaded(i)));

        let frame = loader.frame(3).unwrap();
        assert_eq!(frame.quality, Quality::Lq);
        assert_eq!((frame.width(), frame.height()), (4, 3));
        assert_eq!(frame.bitmap.get_pixel(0, 0).0, [3, 0, 0, 255]);
    }

    #[test]
    fn test_hq_refines_lq() {
        let mut loader = FrameLoader::spawn(source(2), &config()).unwrap();
        loader.push_sections(sections(2));
        assert!(loader.load_lq_frame(1).is_none());
        wait_until(&mut loader, |l| l.is_loaded(1));
        assert!(loader.load_hq_frame(1).is_none());
        wait_until(&mut loader, |l| {
            l.frame(1).is_some_and(|f| f.quality == Quality::Hq)
        });
        assert_eq!(loader.frame(1).unwrap().bitmap.get_pixel(0, 0).0[0], 101);
        assert!(loader.load_hq_frame(1).is_some());
    }

    #[test]
    fn test_section_request_callback() {
        let mut loader = FrameLoader::spawn(source(3), &config()).unwrap();
        let requested = Rc::new(RefCell::new(Vec::new()));
        let seen = requested.clone();
        loader.on_get_section(move |index| seen.borrow_mut().push(index));

        loader.set_frames_to_load([2]);
        let events = loader.poll();
        assert!(matches!(events[..], [LoaderEvent::SectionRequested { index: 2 }]));
        assert_eq!(*requested.borrow(), vec![2]);

        loader.push_sections(sections(3));
        wait_until(&mut loader, |l| l.is_loaded(2));
    }

    #[test]
    fn test_frame_loaded_callback() {
        let mut loader = FrameLoader::spawn(source(1), &config()).unwrap();
        let loaded = Rc::new(RefCell::new(Vec::new()));
        let seen = loaded.clone();
        loader.on_frame_loaded(move |frame| seen.borrow_mut().push(frame.index));
        loader.push_sections(sections(1));
        loader.set_next_frame_to_load(0);
        wait_until(&mut loader, |l| l.is_loaded(0));
        assert_eq!(*loaded.borrow(), vec![0]);
    }

    #[test]
    fn test_undecodable_frame_fails() {
        let source = MemoryFrameSource::new();
        source.insert("lq/0", vec![1, 2, 3]);
        let mut loader = FrameLoader::spawn(Arc::new(source), &config()).unwrap();
        loader.push_sections([FrameSection::new(0, Some("lq/0"), None)]);
        loader.set_frames_to_load([0]);

        let mut failed = false;
        let deadline = Instant::now() + Duration::from_secs(10);
        while !failed {
            assert!(Instant::now() < deadline);
            failed = loader
                .wait(Duration::from_millis(50))
                .iter()
                .any(|e| matches!(e, LoaderEvent::FrameFailed { index: 0, .. }));
        }
        assert!(!loader.is_loaded(0));
    }

    #[test]
    fn test_cleanup_drops_cache() {
        let mut loader = FrameLoader::spawn(source(3), &config()).unwrap();
        loader.push_sections(sections(3));
        loader.set_frames_to_load(0..3);
        wait_until(&mut loader, |l| l.is_loaded(0));
        loader.cleanup();
        assert!(!loader.is_loaded(0));
        assert_eq!(loader.pending_count(), 0);
        // Late results from before the cleanup are ignored
        std::thread::sleep(Duration::from_millis(50));
        loader.poll();
        assert!(!loader.is_loaded(1));
    }
}
