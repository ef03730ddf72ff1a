// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The inference-render loop.
//!
//! An overlay is set up in three steps: [`OverlayContext::initialize`] waits for the source
//! and sizes the canvas, [`load_inference_engine`] builds the engine, and
//! [`OverlayContext::run_loop`] starts a fixed-period timer. Every tick takes the current
//! frame, runs the engine on it and redraws the canvas from scratch with the result.
//!
//! Ticks never wait for each other: a slow inference call overlaps with the ones started
//! after it. Under [`OrderingPolicy::DropStale`] a completion that arrives after a newer
//! tick has already drawn is discarded, so the overlay never goes back in time.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use ultralytics_overlay::{HttpEngine, Preset, RecordingCanvas, Source, Task, start};
//!
//! # async fn run() -> ultralytics_overlay::Result<()> {
//! let source = Source::from("http://192.168.1.20:81/stream").open()?;
//! let canvas = Arc::new(Mutex::new(RecordingCanvas::new()));
//! let engine = HttpEngine::new("http://localhost:3000").load(Task::Detect);
//!
//! if let Some(handle) = start(source, canvas, engine, Preset::StreamDetect.config()).await {
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     println!("{:?}", handle.stats());
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use crate::annotate::{Annotator, DetectionStyle, PoseStyle};
use crate::canvas::Canvas;
use crate::engine::{Engine, load_inference_engine};
use crate::error::Result;
use crate::frame::Resolution;
use crate::results::Prediction;
use crate::source::FrameSource;
use crate::task::Task;
use crate::utils::summarize_detections;
use crate::{error, info, section, verbose, warn};

/// What to do with a completion that finishes after a newer one was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderingPolicy {
    /// Discard it; the overlay only moves forward.
    #[default]
    DropStale,
    /// Draw it anyway; the last call to finish wins.
    Unordered,
}

impl OrderingPolicy {
    /// Returns the policy name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DropStale => "drop-stale",
            Self::Unordered => "unordered",
        }
    }
}

impl fmt::Display for OrderingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderingPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop-stale" | "drop_stale" | "latest" => Ok(Self::DropStale),
            "unordered" | "any" => Ok(Self::Unordered),
            _ => Err(format!(
                "unknown ordering '{s}', expected 'drop-stale' or 'unordered'"
            )),
        }
    }
}

/// Configuration for an overlay loop.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use ultralytics_overlay::{LoopConfig, OrderingPolicy, Resolution};
///
/// let config = LoopConfig::new()
///     .with_interval(Duration::from_millis(250))
///     .with_fixed_resolution(Resolution::new(320, 240))
///     .with_ordering(OrderingPolicy::Unordered);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Time between two ticks.
    pub interval: Duration,
    /// Canvas size. Frames are scaled to it before inference, so result coordinates match
    /// the canvas. `None` keeps the source's native resolution.
    pub fixed_resolution: Option<Resolution>,
    /// Give up on a source that has not delivered a frame after this long. `None` waits
    /// forever.
    pub ready_timeout: Option<Duration>,
    /// Handling of out-of-order completions.
    pub ordering: OrderingPolicy,
    /// Drawing styles.
    pub annotator: Annotator,
    /// Log a summary of detected labels on the verbose channel.
    pub log_detections: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            fixed_resolution: None,
            ready_timeout: Some(Duration::from_secs(30)),
            ordering: OrderingPolicy::DropStale,
            annotator: Annotator::default(),
            log_detections: false,
        }
    }
}

impl LoopConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick period.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Draw at a fixed size instead of the source's native one.
    #[must_use]
    pub const fn with_fixed_resolution(mut self, resolution: Resolution) -> Self {
        self.fixed_resolution = Some(resolution);
        self
    }

    /// Set or clear the source ready timeout.
    #[must_use]
    pub const fn with_ready_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Set the ordering policy.
    #[must_use]
    pub const fn with_ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.ordering = ordering;
        self
    }

    /// Set the detection style.
    #[must_use]
    pub const fn with_detection_style(mut self, style: DetectionStyle) -> Self {
        self.annotator.detection = style;
        self
    }

    /// Set the pose style.
    #[must_use]
    pub const fn with_pose_style(mut self, style: PoseStyle) -> Self {
        self.annotator.pose = style;
        self
    }

    /// Enable or disable the per-tick detection summary.
    #[must_use]
    pub const fn with_log_detections(mut self, enabled: bool) -> Self {
        self.log_detections = enabled;
        self
    }
}

/// Ready-made loop setups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Object detection over a 240x240 Motion JPEG stream, twice a second.
    StreamDetect,
    /// Object detection over a webcam at its native size, ten times a second.
    WebcamDetect,
    /// Pose estimation over a webcam at its native size, ten times a second.
    WebcamPose,
}

impl Preset {
    /// Returns the preset name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StreamDetect => "stream-detect",
            Self::WebcamDetect => "webcam-detect",
            Self::WebcamPose => "webcam-pose",
        }
    }

    /// Task the preset's engine must perform.
    #[must_use]
    pub const fn task(&self) -> Task {
        match self {
            Self::StreamDetect | Self::WebcamDetect => Task::Detect,
            Self::WebcamPose => Task::Pose,
        }
    }

    /// Default preset for `task`.
    #[must_use]
    pub const fn for_task(task: Task) -> Self {
        match task {
            Task::Detect => Self::WebcamDetect,
            Task::Pose => Self::WebcamPose,
        }
    }

    /// Loop configuration for this preset.
    #[must_use]
    pub fn config(&self) -> LoopConfig {
        match self {
            Self::StreamDetect => LoopConfig::new()
                .with_interval(Duration::from_millis(500))
                .with_fixed_resolution(Resolution::new(240, 240))
                .with_detection_style(DetectionStyle::stream())
                .with_log_detections(true),
            Self::WebcamDetect => LoopConfig::new()
                .with_interval(Duration::from_millis(100))
                .with_detection_style(DetectionStyle::webcam()),
            Self::WebcamPose => LoopConfig::new()
                .with_interval(Duration::from_millis(100))
                .with_pose_style(PoseStyle::webcam()),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stream-detect" | "stream" => Ok(Self::StreamDetect),
            "webcam-detect" | "webcam" => Ok(Self::WebcamDetect),
            "webcam-pose" | "pose" => Ok(Self::WebcamPose),
            _ => Err(format!(
                "unknown preset '{s}', expected one of: stream-detect, webcam-detect, webcam-pose"
            )),
        }
    }
}

/// Snapshot of a loop's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Timer ticks fired.
    pub ticks: u64,
    /// Completions drawn onto the canvas.
    pub rendered: u64,
    /// Inference calls that returned an error.
    pub failed: u64,
    /// Completions discarded because a newer tick had already drawn.
    pub stale: u64,
    /// Ticks skipped because the source had no frame.
    pub no_frame: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    rendered: AtomicU64,
    failed: AtomicU64,
    stale: AtomicU64,
    no_frame: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> LoopStats {
        LoopStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            rendered: self.rendered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            no_frame: self.no_frame.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Canvas plus the sequence number of the tick that last drew on it.
///
/// Ticks lock `last_rendered` before `canvas` and hold both while drawing, so the stale
/// check and the redraw cannot interleave.
struct Target<C> {
    canvas: Arc<Mutex<C>>,
    last_rendered: Mutex<u64>,
}

/// A running overlay loop.
///
/// Dropping the handle stops the timer and cancels in-flight ticks.
#[derive(Debug)]
pub struct LoopHandle {
    task: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl LoopHandle {
    /// Stop the timer and cancel in-flight ticks. The canvas keeps its last drawing.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Whether the timer is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> LoopStats {
        self.counters.snapshot()
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A source and canvas that are ready for a loop.
pub struct OverlayContext<C: Canvas + 'static> {
    source: Arc<dyn FrameSource>,
    canvas: Arc<Mutex<C>>,
    resolution: Resolution,
    config: LoopConfig,
}

impl<C: Canvas + 'static> fmt::Debug for OverlayContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayContext")
            .field("source", &self.source.describe())
            .field("resolution", &self.resolution)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Canvas + 'static> OverlayContext<C> {
    /// Wait for `source` to deliver its first frame, then size `canvas`.
    ///
    /// The canvas takes `config.fixed_resolution` if set, else the source's native size. A
    /// source that is already complete resolves at once.
    ///
    /// Returns `None`, after logging why, if the source fails or misses
    /// `config.ready_timeout`.
    pub async fn initialize(
        source: Arc<dyn FrameSource>,
        canvas: Arc<Mutex<C>>,
        config: LoopConfig,
    ) -> Option<Self> {
        let name = source.describe();
        section!("Waiting for {name}...");

        let ready = match config.ready_timeout {
            Some(limit) => match tokio::time::timeout(limit, source.ready()).await {
                Ok(result) => result,
                Err(_) => {
                    error!("{name} delivered no frame within {limit:?}");
                    return None;
                }
            },
            None => source.ready().await,
        };
        let native = match ready {
            Ok(resolution) => resolution,
            Err(e) => {
                error!("Source unavailable: {e}");
                return None;
            }
        };

        let resolution = config.fixed_resolution.unwrap_or(native);
        canvas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resize(resolution);

        if resolution == native {
            info!("{name} ready at {native}");
        } else {
            info!("{name} ready at {native}, drawing at {resolution}");
        }

        Some(Self {
            source,
            canvas,
            resolution,
            config,
        })
    }

    /// Canvas size chosen during initialization.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Loop configuration.
    #[must_use]
    pub const fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Shared canvas.
    #[must_use]
    pub fn canvas(&self) -> Arc<Mutex<C>> {
        Arc::clone(&self.canvas)
    }

    /// Start the timer.
    ///
    /// Returns `None` and starts nothing when `engine` is `None` or the interval is zero.
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn run_loop(&self, engine: Option<Engine>) -> Option<LoopHandle> {
        let Some(engine) = engine else {
            warn!("No inference engine, overlay loop not started");
            return None;
        };
        if self.config.interval.is_zero() {
            error!("Overlay interval must be greater than zero, loop not started");
            return None;
        }

        let counters = Arc::new(Counters::default());
        let tick = Arc::new(Tick {
            source: Arc::clone(&self.source),
            target: Target {
                canvas: Arc::clone(&self.canvas),
                last_rendered: Mutex::new(0),
            },
            engine,
            config: self.config.clone(),
            counters: Arc::clone(&counters),
        });

        let period = self.config.interval;
        verbose!(
            "Overlay loop every {period:?} ({}, {})",
            tick.engine.task(),
            self.config.ordering
        );

        let task = tokio::spawn(async move {
            // The first tick fires one period after start, not immediately.
            let mut timer = tokio::time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut in_flight = JoinSet::new();
            let mut seq = 0_u64;

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        seq += 1;
                        bump(&tick.counters.ticks);
                        in_flight.spawn(Arc::clone(&tick).run(seq));
                    }
                    Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                        if let Err(e) = joined
                            && e.is_panic()
                        {
                            error!("Overlay tick panicked: {e}");
                        }
                    }
                }
            }
        });

        Some(LoopHandle { task, counters })
    }
}

/// Everything one tick needs, shared by all ticks of a loop.
struct Tick<C> {
    source: Arc<dyn FrameSource>,
    target: Target<C>,
    engine: Engine,
    config: LoopConfig,
    counters: Arc<Counters>,
}

impl<C: Canvas + 'static> Tick<C> {
    async fn run(self: Arc<Self>, seq: u64) {
        let Some(frame) = self.source.current_frame() else {
            bump(&self.counters.no_frame);
            return;
        };
        let frame = match self.config.fixed_resolution {
            Some(resolution) => frame.fit_to(resolution),
            None => frame,
        };

        let prediction = match self.engine.infer(&frame).await {
            Ok(prediction) => prediction,
            Err(e) => {
                bump(&self.counters.failed);
                error!("Inference failed on tick {seq}: {e}");
                return;
            }
        };

        if self.config.log_detections
            && let Prediction::Detections(detections) = &prediction
            && !detections.is_empty()
        {
            verbose!("Detected: {}", summarize_detections(detections));
        }

        let mut last_rendered = self
            .target
            .last_rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.config.ordering == OrderingPolicy::DropStale && seq < *last_rendered {
            bump(&self.counters.stale);
            return;
        }

        let mut canvas = self
            .target
            .canvas
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self
            .config
            .annotator
            .render(&mut *canvas, Some(&frame), &prediction)
        {
            *last_rendered = seq;
            bump(&self.counters.rendered);
        }
    }
}

/// Initialize, load the engine, and start the loop.
///
/// Returns `None` if any step fails; each failure is logged where it happens. The engine is
/// only built once the source is ready.
pub async fn start<C, F>(
    source: Arc<dyn FrameSource>,
    canvas: Arc<Mutex<C>>,
    engine: F,
    config: LoopConfig,
) -> Option<LoopHandle>
where
    C: Canvas + 'static,
    F: Future<Output = Result<Engine>>,
{
    let context = OverlayContext::initialize(source, canvas, config).await?;
    let engine = load_inference_engine(engine).await;
    context.run_loop(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let stream = Preset::StreamDetect.config();
        assert_eq!(stream.interval, Duration::from_millis(500));
        assert_eq!(stream.fixed_resolution, Some(Resolution::new(240, 240)));
        assert!(!stream.annotator.detection.draw_frame);
        assert!(stream.log_detections);

        let webcam = Preset::WebcamDetect.config();
        assert_eq!(webcam.interval, Duration::from_millis(100));
        assert!(webcam.fixed_resolution.is_none());
        assert_eq!(webcam.annotator.detection, DetectionStyle::webcam());

        let pose = Preset::WebcamPose.config();
        assert!((pose.annotator.pose.keypoint_threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(Preset::WebcamPose.task(), Task::Pose);
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!("stream-detect".parse::<Preset>(), Ok(Preset::StreamDetect));
        assert_eq!("Webcam-Pose".parse::<Preset>(), Ok(Preset::WebcamPose));
        assert!("desktop".parse::<Preset>().is_err());
        assert_eq!(Preset::for_task(Task::Pose), Preset::WebcamPose);
        assert_eq!(Preset::WebcamDetect.to_string(), "webcam-detect");
    }

    #[test]
    fn test_ordering_parse() {
        assert_eq!(OrderingPolicy::default(), OrderingPolicy::DropStale);
        assert_eq!(
            "unordered".parse::<OrderingPolicy>(),
            Ok(OrderingPolicy::Unordered)
        );
        assert_eq!(
            "drop-stale".parse::<OrderingPolicy>(),
            Ok(OrderingPolicy::DropStale)
        );
        assert!("fifo".parse::<OrderingPolicy>().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = LoopConfig::new()
            .with_interval(Duration::from_millis(250))
            .with_ready_timeout(None)
            .with_ordering(OrderingPolicy::Unordered);
        assert_eq!(config.interval, Duration::from_millis(250));
        assert!(config.ready_timeout.is_none());
        assert_eq!(config.ordering, OrderingPolicy::Unordered);
        assert_eq!(LoopConfig::default().ordering, OrderingPolicy::DropStale);
    }
}
