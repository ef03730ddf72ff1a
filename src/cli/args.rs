// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use ultralytics_overlay::{Color, LoopConfig, OrderingPolicy, Preset, Resolution, Task};

/// Default inference server.
pub const DEFAULT_ENGINE: &str = "http://localhost:3000";

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Overlay Options:
    --source, -s <SOURCE>    Image, image URL, MJPEG URL, video file or stream
    --engine, -e <URL>       Inference server base URL [default: http://localhost:3000]
    --preset <PRESET>        stream-detect, webcam-detect or webcam-pose
    --interval <MS>          Tick period in milliseconds
    --imgsz <WxH>            Fixed canvas size
    --conf <CONF>            Confidence threshold sent to the server
    --max-det <N>            Maximum results per frame sent to the server
    --jpeg-quality <Q>       JPEG quality of uploaded frames (1-100) [default: 85]
    --threshold <T>          Keypoint confidence threshold
    --color <COLOR>          Box, label and skeleton color (name or #rrggbb)
    --ordering <POLICY>      drop-stale or unordered [default: drop-stale]
    --save                   Save redraws to runs/<task>/overlay
    --show                   Display the overlay in a window
    --verbose                Show verbose output

Examples:
    ultralytics-overlay detect --source http://192.168.1.20:81/stream --preset stream-detect
    ultralytics-overlay detect -s video.mp4 -e http://gpu-box:3000 --show
    ultralytics-overlay pose --source rtsp://camera.local/live --interval 200 --save
    ultralytics-overlay pose -s person.jpg --threshold 0.5 --ordering unordered"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Draw detected boxes and labels over a source
    Detect(OverlayArgs),
    /// Draw pose keypoints and skeletons over a source
    Pose(OverlayArgs),
}

impl Commands {
    /// Task and arguments of the chosen subcommand.
    #[must_use]
    pub const fn split(&self) -> (Task, &OverlayArgs) {
        match self {
            Self::Detect(args) => (Task::Detect, args),
            Self::Pose(args) => (Task::Pose, args),
        }
    }
}

/// Arguments shared by every overlay command.
#[derive(Args, Debug)]
pub struct OverlayArgs {
    /// Input source (image, image URL, MJPEG URL, video file or stream)
    #[arg(short, long)]
    pub source: String,

    /// Inference server base URL
    #[arg(short, long, default_value = DEFAULT_ENGINE)]
    pub engine: String,

    /// Loop preset (defaults to the webcam preset of the command's task)
    #[arg(long)]
    pub preset: Option<Preset>,

    /// Tick period in milliseconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Fixed canvas size, `WxH` or a single side
    #[arg(long)]
    pub imgsz: Option<Resolution>,

    /// Confidence threshold sent to the server
    #[arg(long)]
    pub conf: Option<f32>,

    /// Maximum results per frame sent to the server
    #[arg(long)]
    pub max_det: Option<usize>,

    /// JPEG quality of uploaded frames
    #[arg(long, default_value_t = 85, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Keypoint confidence threshold
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Box, label and skeleton color (name or #rrggbb)
    #[arg(long)]
    pub color: Option<Color>,

    /// What to do with inference results that finish out of order
    #[arg(long, default_value_t = OrderingPolicy::DropStale)]
    pub ordering: OrderingPolicy,

    /// Save redraws to runs/<task>/overlay
    #[arg(long, default_value_t = false)]
    pub save: bool,

    /// Display the overlay in a window
    #[arg(long, default_value_t = false)]
    pub show: bool,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

impl OverlayArgs {
    /// Preset to start from for `task`.
    #[must_use]
    pub fn preset_for(&self, task: Task) -> Preset {
        self.preset.unwrap_or_else(|| Preset::for_task(task))
    }

    /// Loop configuration: the preset with command-line overrides applied.
    #[must_use]
    pub fn loop_config(&self, preset: Preset) -> LoopConfig {
        let mut config = preset.config().with_ordering(self.ordering);
        if let Some(ms) = self.interval {
            config = config.with_interval(Duration::from_millis(ms.max(1)));
        }
        if let Some(resolution) = self.imgsz {
            config = config.with_fixed_resolution(resolution);
        }
        if let Some(threshold) = self.threshold {
            config.annotator.pose.keypoint_threshold = threshold;
        }
        if let Some(color) = self.color {
            config.annotator.detection.box_stroke.color = color;
            config.annotator.detection.label.color = color;
            config.annotator.pose.edge_stroke.color = color;
        }
        config
    }
}
