// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use image::RgbImage;

use ultralytics_overlay::utils::find_next_run_dir;
#[cfg(feature = "visualize")]
use ultralytics_overlay::visualizer::Viewer;
use ultralytics_overlay::{
    Frame, FrameSource, HttpEngine, ImageCanvas, LoopHandle, OverlayError, Resolution, Result,
    Source, Task, VERSION, start,
};
use ultralytics_overlay::{error, info, section, verbose, warn};

use crate::cli::args::OverlayArgs;

/// How often the presenter checks for a fresh redraw.
const PRESENT_PERIOD: Duration = Duration::from_millis(15);

/// Run an overlay until Ctrl-C or the window is closed.
///
/// # Errors
///
/// Returns an error for setup failures: bad arguments, an unopenable source, or an overlay
/// that could not start.
pub fn run_overlay(task: Task, args: &OverlayArgs) -> Result<()> {
    let preset = args.preset_for(task);
    if preset.task() != task {
        return Err(OverlayError::ConfigError(format!(
            "preset '{preset}' is for {}, not {task}",
            preset.task()
        )));
    }
    #[cfg(not(feature = "visualize"))]
    if args.show {
        warn!("--show requires the 'visualize' feature, ignoring");
    }

    let config = args.loop_config(preset);
    section!("Ultralytics Overlay {VERSION} ({preset}, {})", config.ordering);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let source = Source::from(args.source.as_str());
    if source.is_image() {
        verbose!("{} is a still image, every tick sees the same frame", args.source);
    }
    let source = source.open()?;
    // Overlay-only styles leave the canvas transparent; the live source goes underneath.
    let backdrop = (!config.annotator.draws_frame(task)).then(|| Arc::clone(&source));
    // Sized by the overlay once the source is ready.
    let canvas = Arc::new(Mutex::new(ImageCanvas::with_default_font(Resolution::new(
        1, 1,
    ))));

    let mut engine = HttpEngine::new(&args.engine).with_jpeg_quality(args.jpeg_quality);
    if let Some(conf) = args.conf {
        engine = engine.with_confidence(conf);
    }
    if let Some(max_det) = args.max_det {
        engine = engine.with_max_det(max_det);
    }

    let handle = runtime
        .block_on(start(
            source,
            Arc::clone(&canvas),
            engine.load(task),
            config,
        ))
        .ok_or_else(|| OverlayError::ConfigError("overlay did not start".to_string()))?;

    let save_dir = if args.save {
        let dir = find_next_run_dir(format!("runs/{task}"), "overlay");
        fs::create_dir_all(&dir)?;
        Some(dir)
    } else {
        None
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupted.store(true, Ordering::Relaxed);
            }
        });
    }

    info!("Press Ctrl-C to stop");
    let mut presenter = Presenter::new(save_dir, args.show, backdrop);
    presenter.run(&handle, &canvas, &interrupted);

    handle.stop();
    let stats = handle.stats();
    verbose!(
        "Ticks: {}, rendered {}, failed {}, stale {}, no frame {}",
        stats.ticks,
        stats.rendered,
        stats.failed,
        stats.stale,
        stats.no_frame
    );
    if let Some(dir) = &presenter.save_dir {
        verbose!("{} redraws saved to {}", presenter.saved, dir.display());
    }
    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}

/// Pulls finished redraws off the shared canvas on the main thread.
///
/// With a backdrop, the overlay is composed over the source's latest frame and the window
/// also refreshes when only the frame changed.
struct Presenter {
    save_dir: Option<PathBuf>,
    saved: u64,
    backdrop: Option<Arc<dyn FrameSource>>,
    #[cfg(feature = "visualize")]
    show: bool,
    #[cfg(feature = "visualize")]
    viewer: Option<Viewer>,
}

impl Presenter {
    #[cfg_attr(not(feature = "visualize"), allow(unused_variables))]
    fn new(
        save_dir: Option<PathBuf>,
        show: bool,
        backdrop: Option<Arc<dyn FrameSource>>,
    ) -> Self {
        Self {
            save_dir,
            saved: 0,
            backdrop,
            #[cfg(feature = "visualize")]
            show,
            #[cfg(feature = "visualize")]
            viewer: None,
        }
    }

    fn run(&mut self, handle: &LoopHandle, canvas: &Mutex<ImageCanvas>, stop: &AtomicBool) {
        let mut last_rendered = 0;
        let mut last_frame = None;
        while !stop.load(Ordering::Relaxed) && handle.is_running() {
            let rendered = handle.stats().rendered;
            let frame = self.backdrop.as_ref().and_then(|s| s.current_frame());
            let frame_index = frame.as_ref().map(Frame::index);
            let redrawn = rendered != last_rendered;
            if redrawn || frame_index != last_frame {
                last_rendered = rendered;
                last_frame = frame_index;
                if !self.refresh(canvas, frame.as_ref(), redrawn) {
                    break;
                }
            } else if !self.idle() {
                break;
            }
            std::thread::sleep(PRESENT_PERIOD);
        }
    }

    /// Compose the canvas over `frame`, show it, and save it if `save`. Returns `false` once
    /// the window is closed.
    fn refresh(
        &mut self,
        canvas: &Mutex<ImageCanvas>,
        frame: Option<&Frame>,
        save: bool,
    ) -> bool {
        let composed = canvas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .compose(frame);
        self.present(&composed, save)
    }

    fn present(&mut self, image: &RgbImage, save: bool) -> bool {
        if save && let Some(dir) = &self.save_dir {
            let path = dir.join(format!("overlay_{:06}.jpg", self.saved));
            match save_jpeg(image, &path) {
                Ok(()) => self.saved += 1,
                Err(e) => error!("Failed to save {}: {e}", path.display()),
            }
        }

        #[cfg(feature = "visualize")]
        if self.show {
            if self.viewer.is_none() {
                let (w, h) = (image.width() as usize, image.height() as usize);
                match Viewer::new("Ultralytics Overlay", w, h) {
                    Ok(v) => self.viewer = Some(v),
                    Err(e) => {
                        warn!("{e}, continuing without a window");
                        self.show = false;
                    }
                }
            }
            if let Some(viewer) = &mut self.viewer {
                match viewer.update(image) {
                    Ok(open) => return open,
                    Err(e) => warn!("{e}"),
                }
            }
        }
        true
    }

    /// Keep the window responsive between redraws. Returns `false` once it is closed.
    fn idle(&mut self) -> bool {
        #[cfg(feature = "visualize")]
        if let Some(viewer) = &mut self.viewer {
            return viewer.pump();
        }
        true
    }
}

fn save_jpeg(image: &RgbImage, path: &Path) -> Result<()> {
    image.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use ultralytics_overlay::{Canvas, Color};


    #[test]
    fn test_saved_redraw_shows_source_under_overlay() {
        let dir = std::env::temp_dir().join(format!("overlay-present-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let mut canvas = ImageCanvas::new(Resolution::new(32, 32));
        canvas.clear();
        canvas.fill_circle(4.0, 4.0, 3.0, Color::RED);
        let canvas = Mutex::new(canvas);
        let frame = Frame::new(RgbImage::from_pixel(64, 64, Rgb([0, 0, 200])), 0);

        let mut presenter = Presenter::new(Some(dir.clone()), false, None);
        assert!(presenter.refresh(&canvas, Some(&frame), true));
        // A frame-only refresh is shown but not saved.
        assert!(presenter.refresh(&canvas, Some(&frame), false));
        assert_eq!(presenter.saved, 1);

        let saved = image::open(dir.join("overlay_000000.jpg")).unwrap().to_rgb8();
        assert_eq!(saved.dimensions(), (32, 32));
        // JPEG is lossy, so only check which channel dominates.
        let Rgb([r, _, b]) = *saved.get_pixel(4, 4);
        assert!(r > 150 && b < 100);
        let Rgb([r, _, b]) = *saved.get_pixel(24, 24);
        assert!(b > 150 && r < 50);

        fs::remove_dir_all(&dir).unwrap();
    }
}
