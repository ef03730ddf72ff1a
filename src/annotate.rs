// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Drawing inference results onto a [`Canvas`].
//!
//! Every redraw starts from a cleared canvas, so drawing the same result twice produces the
//! same picture. Detections are drawn unconditionally; keypoints and skeleton edges are
//! gated on confidence.

use crate::canvas::{Canvas, Stroke, TextStyle};
use crate::frame::Frame;
use crate::results::{Detection, Keypoint, Prediction};
use crate::task::Task;
use crate::visualizer::{Color, SKELETON};

/// How boxes and labels are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionStyle {
    /// Box outline.
    pub box_stroke: Stroke,
    /// Label text.
    pub label: TextStyle,
    /// Boxes with their top edge at `y >= label_threshold` get their label above the box;
    /// a box exactly at the threshold still gets it above.
    pub label_threshold: f32,
    /// Distance from the box top to a label placed above it.
    pub label_offset_above: f32,
    /// Distance below the box top for labels that would not fit above it.
    pub label_offset_below: f32,
    /// Decimals of the percentage shown in labels.
    pub score_decimals: usize,
    /// Blit the source frame before drawing.
    pub draw_frame: bool,
}

impl DetectionStyle {
    /// Small labels and thin boxes for 240x240 Motion JPEG streams drawn over the stream.
    #[must_use]
    pub const fn stream() -> Self {
        Self {
            box_stroke: Stroke::new(Color::LIME, 2.0),
            label: TextStyle::new(Color::LIME, 10.0),
            label_threshold: 10.0,
            label_offset_above: 5.0,
            label_offset_below: 10.0,
            score_decimals: 0,
            draw_frame: false,
        }
    }

    /// Webcam-sized boxes and labels drawn over a copy of the frame.
    #[must_use]
    pub const fn webcam() -> Self {
        Self {
            box_stroke: Stroke::new(Color::LIME, 3.0),
            label: TextStyle::new(Color::LIME, 16.0),
            label_threshold: 20.0,
            label_offset_above: 5.0,
            label_offset_below: 15.0,
            score_decimals: 1,
            draw_frame: true,
        }
    }

    /// Baseline y of the label for a box whose top edge is at `top`.
    ///
    /// Labels sit above the box unless that would push them off the top of the canvas.
    #[must_use]
    pub fn label_y(&self, top: f32) -> f32 {
        if top >= self.label_threshold {
            top - self.label_offset_above
        } else {
            top + self.label_offset_below
        }
    }

    /// Label text, e.g. `"person (87%)"`.
    #[must_use]
    pub fn label_text(&self, detection: &Detection) -> String {
        format!(
            "{} ({:.*}%)",
            detection.label,
            self.score_decimals,
            detection.confidence * 100.0
        )
    }
}

impl Default for DetectionStyle {
    fn default() -> Self {
        Self::webcam()
    }
}

/// How keypoints and skeleton edges are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseStyle {
    /// Keypoints must score strictly above this to be drawn.
    pub keypoint_threshold: f32,
    /// Keypoint circle radius.
    pub keypoint_radius: f32,
    /// Keypoint fill.
    pub keypoint_color: Color,
    /// Skeleton edge style.
    pub edge_stroke: Stroke,
    /// Blit the source frame before drawing.
    pub draw_frame: bool,
}

impl PoseStyle {
    /// Red joints and lime bones over a copy of the frame.
    #[must_use]
    pub const fn webcam() -> Self {
        Self {
            keypoint_threshold: 0.3,
            keypoint_radius: 5.0,
            keypoint_color: Color::RED,
            edge_stroke: Stroke::new(Color::LIME, 3.0),
            draw_frame: true,
        }
    }
}

impl Default for PoseStyle {
    fn default() -> Self {
        Self::webcam()
    }
}

/// Draw detections over a cleared canvas.
pub fn draw_detections<C: Canvas + ?Sized>(
    canvas: &mut C,
    frame: Option<&Frame>,
    detections: &[Detection],
    style: &DetectionStyle,
) {
    canvas.clear();
    if style.draw_frame
        && let Some(frame) = frame
    {
        canvas.draw_frame(frame);
    }

    for detection in detections {
        let b = detection.bbox;
        canvas.stroke_rect(b, style.box_stroke);
        canvas.text(
            &style.label_text(detection),
            b.x,
            style.label_y(b.y),
            style.label,
        );
    }
}

/// Draw one pose over a cleared canvas: keypoints first, then skeleton edges.
pub fn draw_pose<C: Canvas + ?Sized>(
    canvas: &mut C,
    frame: Option<&Frame>,
    keypoints: &[Keypoint],
    style: &PoseStyle,
) {
    canvas.clear();
    if style.draw_frame
        && let Some(frame) = frame
    {
        canvas.draw_frame(frame);
    }

    let threshold = style.keypoint_threshold;
    for k in keypoints.iter().filter(|k| k.is_visible(threshold)) {
        canvas.fill_circle(k.x, k.y, style.keypoint_radius, style.keypoint_color);
    }

    for [a, b] in SKELETON {
        let (Some(start), Some(end)) = (keypoints.get(a), keypoints.get(b)) else {
            continue;
        };
        if start.is_visible(threshold) && end.is_visible(threshold) {
            canvas.line((start.x, start.y), (end.x, end.y), style.edge_stroke);
        }
    }
}

/// Styles for both tasks; renders whichever prediction a tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Annotator {
    /// Detection style.
    pub detection: DetectionStyle,
    /// Pose style.
    pub pose: PoseStyle,
}

impl Annotator {
    /// Create an annotator from both styles.
    #[must_use]
    pub const fn new(detection: DetectionStyle, pose: PoseStyle) -> Self {
        Self { detection, pose }
    }

    /// Whether redraws for `task` start with a copy of the frame. When they don't, the canvas
    /// is an overlay meant to sit on top of the live source.
    #[must_use]
    pub const fn draws_frame(&self, task: Task) -> bool {
        match task {
            Task::Detect => self.detection.draw_frame,
            Task::Pose => self.pose.draw_frame,
        }
    }

    /// Redraw the canvas for `prediction`.
    ///
    /// Detection results always replace the overlay, even when empty. Pose results only
    /// replace it when at least one person was found, and only the first pose is drawn.
    /// Returns whether the canvas was touched.
    pub fn render<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        frame: Option<&Frame>,
        prediction: &Prediction,
    ) -> bool {
        match prediction {
            Prediction::Detections(detections) => {
                draw_detections(canvas, frame, detections, &self.detection);
                true
            }
            Prediction::Poses(poses) => match poses.first() {
                Some(pose) => {
                    draw_pose(canvas, frame, &pose.keypoints, &self.pose);
                    true
                }
                None => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawCommand, RecordingCanvas};
    use crate::frame::Resolution;
    use crate::results::{BoundingBox, Pose};

    fn canvas() -> RecordingCanvas {
        let mut c = RecordingCanvas::new();
        c.resize(Resolution::new(640, 480));
        c
    }

    #[allow(clippy::cast_precision_loss)]
    fn confident_pose() -> Vec<Keypoint> {
        (0..17)
            .map(|i| Keypoint::new(i as f32 * 10.0, i as f32 * 5.0, 0.9))
            .collect()
    }

    fn circles(c: &RecordingCanvas) -> Vec<(f32, f32)> {
        c.commands()
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCommand::FillCircle { x, y, .. } => Some((*x, *y)),
                _ => None,
            })
            .collect()
    }

    fn lines(c: &RecordingCanvas) -> Vec<((f32, f32), (f32, f32))> {
        c.commands()
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCommand::Line { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_label_placement() {
        let stream = DetectionStyle::stream();
        assert!((stream.label_y(9.0) - 19.0).abs() < f32::EPSILON);
        assert!((stream.label_y(10.0) - 5.0).abs() < f32::EPSILON);
        assert!((stream.label_y(50.0) - 45.0).abs() < f32::EPSILON);

        let webcam = DetectionStyle::webcam();
        assert!((webcam.label_y(19.5) - 34.5).abs() < f32::EPSILON);
        assert!((webcam.label_y(20.0) - 15.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_label_text() {
        let d = Detection::new("person", 0.8732, BoundingBox::default());
        assert_eq!(DetectionStyle::stream().label_text(&d), "person (87%)");
        assert_eq!(DetectionStyle::webcam().label_text(&d), "person (87.3%)");
    }

    #[test]
    fn test_draws_frame_per_task() {
        let overlay = Annotator::new(DetectionStyle::stream(), PoseStyle::webcam());
        assert!(!overlay.draws_frame(Task::Detect));
        assert!(overlay.draws_frame(Task::Pose));
        assert!(Annotator::default().draws_frame(Task::Detect));
    }

    #[test]
    fn test_detections_are_not_gated() {
        let mut c = canvas();
        let detections = vec![
            Detection::new("cup", 0.01, BoundingBox::new(1.0, 30.0, 5.0, 5.0)),
            Detection::new("dog", 0.99, BoundingBox::new(100.0, 5.0, 50.0, 50.0)),
        ];
        draw_detections(&mut c, None, &detections, &DetectionStyle::webcam());
        let rects = c
            .commands()
            .iter()
            .filter(|cmd| matches!(cmd, DrawCommand::StrokeRect { .. }))
            .count();
        assert_eq!(rects, 2);
        assert_eq!(
            c.texts().collect::<Vec<_>>(),
            vec!["cup (1.0%)", "dog (99.0%)"]
        );
    }

    #[test]
    fn test_detection_label_positions() {
        let mut c = canvas();
        let detections = vec![Detection::new("a", 0.5, BoundingBox::new(7.0, 3.0, 5.0, 5.0))];
        draw_detections(&mut c, None, &detections, &DetectionStyle::stream());
        assert!(c.commands().iter().any(|cmd| matches!(
            cmd,
            DrawCommand::Text { x, y, .. } if (*x - 7.0).abs() < f32::EPSILON && (*y - 13.0).abs() < f32::EPSILON
        )));
    }

    #[test]
    fn test_redraw_is_idempotent() {
        let mut c = canvas();
        let frame = Frame::new(image::RgbImage::new(640, 480), 4);
        let detections = vec![Detection::new("bus", 0.7, BoundingBox::new(10.0, 40.0, 90.0, 60.0))];
        let style = DetectionStyle::webcam();

        draw_detections(&mut c, Some(&frame), &detections, &style);
        let first = c.commands().to_vec();
        draw_detections(&mut c, Some(&frame), &detections, &style);
        assert_eq!(c.commands(), first.as_slice());
        assert_eq!(first[0], DrawCommand::Frame { index: 4 });
    }

    #[test]
    fn test_stream_style_skips_frame() {
        let mut c = canvas();
        let frame = Frame::new(image::RgbImage::new(240, 240), 0);
        draw_detections(&mut c, Some(&frame), &[], &DetectionStyle::stream());
        assert!(c.commands().is_empty());
    }

    #[test]
    fn test_confident_keypoints_are_circled_exactly() {
        let mut c = canvas();
        let keypoints = confident_pose();
        draw_pose(&mut c, None, &keypoints, &PoseStyle::webcam());
        let drawn = circles(&c);
        assert_eq!(drawn.len(), 17);
        for (k, (x, y)) in keypoints.iter().zip(drawn) {
            assert!((k.x - x).abs() < f32::EPSILON && (k.y - y).abs() < f32::EPSILON);
        }
        assert_eq!(lines(&c).len(), SKELETON.len());
    }

    #[test]
    fn test_low_confidence_keypoint_hides_its_edges() {
        let mut c = canvas();
        let mut keypoints = confident_pose();
        keypoints[5].confidence = 0.3; // left shoulder, exactly at threshold
        let hidden = (keypoints[5].x, keypoints[5].y);
        draw_pose(&mut c, None, &keypoints, &PoseStyle::webcam());

        assert!(!circles(&c).contains(&hidden));
        assert_eq!(circles(&c).len(), 16);
        let touching = SKELETON.iter().filter(|e| e[0] == 5 || e[1] == 5).count();
        assert_eq!(lines(&c).len(), SKELETON.len() - touching);
        assert!(lines(&c).iter().all(|(a, b)| *a != hidden && *b != hidden));
    }

    #[test]
    fn test_keypoints_drawn_before_edges() {
        let mut c = canvas();
        draw_pose(&mut c, None, &confident_pose(), &PoseStyle::webcam());
        let first_line = c
            .commands()
            .iter()
            .position(|cmd| matches!(cmd, DrawCommand::Line { .. }))
            .unwrap();
        assert!(c.commands()[..first_line]
            .iter()
            .all(|cmd| matches!(cmd, DrawCommand::FillCircle { .. })));
    }

    #[test]
    fn test_short_pose_skips_missing_edges() {
        let mut c = canvas();
        draw_pose(&mut c, None, &confident_pose()[..7], &PoseStyle::webcam());
        assert_eq!(circles(&c).len(), 7);
        // face edges plus the shoulder-to-shoulder edge
        assert_eq!(lines(&c).len(), 5);
    }

    #[test]
    fn test_empty_pose_result_keeps_overlay() {
        let mut c = canvas();
        let annotator = Annotator::default();
        let pose = Prediction::Poses(vec![Pose::new(confident_pose())]);
        assert!(annotator.render(&mut c, None, &pose));
        let before = c.commands().to_vec();

        assert!(!annotator.render(&mut c, None, &Prediction::Poses(vec![])));
        assert_eq!(c.commands(), before.as_slice());

        assert!(annotator.render(&mut c, None, &Prediction::Detections(vec![])));
        assert!(c.commands().is_empty());
    }
}
