use std::time::{Duration, Instant};

use super::{
    camera::FrameSource,
    inference::{InferenceEngine, InferenceError},
    overlay::OverlayRenderer,
    scheduler::Scheduler,
};
use crate::types::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopTask {
    Capture,
    ReportFps,
}

/// Where row zero of a published frame ends up on the display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOrigin {
    TopLeft,
    BottomLeft,
}

pub trait DisplaySurface {
    fn origin(&self) -> FrameOrigin {
        FrameOrigin::TopLeft
    }

    fn publish(&mut self, frame: Frame);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    CaptureFailed,
    NoResult,
    Published,
    /// Captured before the current session started.
    Stale,
    Failed,
}

#[derive(Debug, Default, PartialEq)]
pub struct PollReport {
    pub ticks: Vec<TickOutcome>,
    pub fps: Option<f64>,
}

/// Mutable loop state for one start/stop cycle.
#[derive(Clone, Debug)]
pub struct Session {
    detecting: bool,
    frame_count: u64,
    fps_anchor: Instant,
    started_at: Option<Instant>,
    last_fps: Option<f64>,
}

impl Session {
    fn new(now: Instant) -> Self {
        Self {
            detecting: false,
            frame_count: 0,
            fps_anchor: now,
            started_at: None,
            last_fps: None,
        }
    }

    fn begin(&mut self, now: Instant) {
        *self = Self {
            detecting: true,
            started_at: Some(now),
            ..Self::new(now)
        };
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }
}

pub fn compute_fps(frame_count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    frame_count as f64 / secs
}

pub struct CaptureController<S, E> {
    source: S,
    engine: E,
    overlay: OverlayRenderer,
    scheduler: Scheduler<LoopTask>,
    session: Session,
    tick_interval: Duration,
    fps_interval: Duration,
}

impl<S: FrameSource, E: InferenceEngine> CaptureController<S, E> {
    pub fn new(
        source: S,
        engine: E,
        overlay: OverlayRenderer,
        tick_interval: Duration,
        fps_interval: Duration,
    ) -> Self {
        Self {
            source,
            engine,
            overlay,
            scheduler: Scheduler::new(),
            session: Session::new(Instant::now()),
            tick_interval,
            fps_interval,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_detecting(&self) -> bool {
        self.session.detecting
    }

    /// Enters the detecting state. A no-op returning `false` when already
    /// detecting, so the loop is never scheduled twice.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.session.detecting {
            return false;
        }
        self.session.begin(now);
        self.scheduler
            .schedule_interval(LoopTask::Capture, self.tick_interval, now);
        self.scheduler
            .schedule_interval(LoopTask::ReportFps, self.fps_interval, now);
        log::info!("detection started");
        true
    }

    /// Leaves the detecting state. A no-op returning `false` when idle.
    pub fn stop(&mut self) -> bool {
        if !self.session.detecting {
            return false;
        }
        self.session.detecting = false;
        self.scheduler.unschedule(LoopTask::Capture);
        self.scheduler.unschedule(LoopTask::ReportFps);
        log::info!("detection stopped");
        true
    }

    /// Runs every task due at `now`. A failing tick is logged and abandoned;
    /// later tasks in the same poll still run.
    pub fn poll<D: DisplaySurface>(&mut self, now: Instant, surface: &mut D) -> PollReport {
        let mut report = PollReport::default();
        for task in self.scheduler.due(now) {
            match task {
                LoopTask::Capture => {
                    let outcome = self.tick(surface).unwrap_or_else(|err| {
                        log::error!("capture tick aborted: {err:?}");
                        TickOutcome::Failed
                    });
                    report.ticks.push(outcome);
                }
                LoopTask::ReportFps => report.fps = Some(self.report_fps(now)),
            }
        }
        report
    }

    fn tick<D: DisplaySurface>(&mut self, surface: &mut D) -> Result<TickOutcome, InferenceError> {
        if !self.session.detecting {
            return Ok(TickOutcome::Idle);
        }

        let mut frame = match self.source.read() {
            Ok(frame) => frame,
            Err(err) => {
                log::debug!("skipping tick: {err}");
                return Ok(TickOutcome::CaptureFailed);
            }
        };
        self.session.frame_count += 1;

        let Some(result) = self.engine.infer(&frame)? else {
            return Ok(TickOutcome::NoResult);
        };

        if self
            .session
            .started_at
            .is_some_and(|started| frame.timestamp < started)
        {
            return Ok(TickOutcome::Stale);
        }

        self.overlay.render(&mut frame, &result);
        if surface.origin() == FrameOrigin::BottomLeft {
            frame.flip_vertical();
        }
        surface.publish(frame);
        Ok(TickOutcome::Published)
    }

    fn report_fps(&mut self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.session.fps_anchor);
        let fps = compute_fps(self.session.frame_count, elapsed);
        log::info!("FPS: {fps:.2}");
        self.session.frame_count = 0;
        self.session.fps_anchor = now;
        self.session.last_fps = Some(fps);
        fps
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, collections::VecDeque, rc::Rc};

    use super::*;
    use crate::{
        pipeline::{camera::CaptureError, inference::parse_response},
        types::{Attributes, BoundingBox, InferenceResult},
    };

    const TICK: Duration = Duration::from_millis(10);
    const SECOND: Duration = Duration::from_secs(1);

    fn frame_at(timestamp: Instant) -> Frame {
        let (width, height) = (4, 2);
        let rgba = (0..height)
            .flat_map(|row| std::iter::repeat_n(row as u8 + 1, width * 4))
            .collect();
        Frame {
            rgba,
            width: width as u32,
            height: height as u32,
            timestamp,
        }
    }

    /// Yields scripted reads first, then fresh frames forever.
    #[derive(Default)]
    struct ScriptedSource {
        script: VecDeque<Result<Frame, CaptureError>>,
    }

    impl FrameSource for ScriptedSource {
        fn read(&mut self) -> Result<Frame, CaptureError> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Ok(frame_at(Instant::now())))
        }
    }

    enum Reply {
        Result(InferenceResult),
        /// A 200 reply carrying this body.
        Body(&'static [u8]),
        Status,
        Malformed,
    }

    struct FakeEngine {
        replies: VecDeque<Reply>,
        calls: Rc<Cell<usize>>,
    }

    impl FakeEngine {
        fn new(replies: impl IntoIterator<Item = Reply>) -> (Self, Rc<Cell<usize>>) {
            let calls = Rc::new(Cell::new(0));
            let engine = Self {
                replies: replies.into_iter().collect(),
                calls: calls.clone(),
            };
            (engine, calls)
        }
    }

    impl InferenceEngine for FakeEngine {
        fn infer(&mut self, _frame: &Frame) -> Result<Option<InferenceResult>, InferenceError> {
            self.calls.set(self.calls.get() + 1);
            match self.replies.pop_front().unwrap_or(Reply::Result(detection())) {
                Reply::Result(result) => Ok(Some(result)),
                Reply::Body(body) => Ok(parse_response(body)?),
                Reply::Status => Ok(None),
                Reply::Malformed => Err(serde_json::from_str::<serde_json::Value>("{")
                    .unwrap_err()
                    .into()),
            }
        }
    }

    struct RecordingSurface {
        origin: FrameOrigin,
        frames: Vec<Frame>,
    }

    impl RecordingSurface {
        fn top_left() -> Self {
            Self {
                origin: FrameOrigin::TopLeft,
                frames: Vec::new(),
            }
        }
    }

    impl DisplaySurface for RecordingSurface {
        fn origin(&self) -> FrameOrigin {
            self.origin
        }

        fn publish(&mut self, frame: Frame) {
            self.frames.push(frame);
        }
    }

    fn detection() -> InferenceResult {
        InferenceResult {
            bounding_box: Some(BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 0.5,
                height: 0.5,
            }),
            attributes: Attributes {
                age: "30".into(),
                ..Default::default()
            },
        }
    }

    fn controller(
        source: ScriptedSource,
        engine: FakeEngine,
    ) -> CaptureController<ScriptedSource, FakeEngine> {
        CaptureController::new(source, engine, OverlayRenderer::without_font(), TICK, SECOND)
    }

    #[test]
    fn fps_is_frames_over_elapsed_seconds() {
        let fps = compute_fps(60, Duration::from_secs_f64(2.0));
        assert_eq!(format!("{fps:.2}"), "30.00");
        assert_eq!(compute_fps(10, Duration::ZERO), 0.0);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let (engine, _) = FakeEngine::new([]);
        let mut ctl = controller(ScriptedSource::default(), engine);
        let t0 = Instant::now();

        assert!(!ctl.stop());
        assert!(ctl.start(t0));
        assert!(!ctl.start(t0 + TICK));
        assert!(ctl.is_detecting());

        // A second start must not double the tick rate.
        let mut surface = RecordingSurface::top_left();
        let report = ctl.poll(t0 + TICK, &mut surface);
        assert_eq!(report.ticks, vec![TickOutcome::Published]);

        assert!(ctl.stop());
        assert!(!ctl.stop());
    }

    #[test]
    fn idle_controller_never_infers() {
        let (engine, calls) = FakeEngine::new([]);
        let mut ctl = controller(ScriptedSource::default(), engine);
        let mut surface = RecordingSurface::top_left();
        let t0 = Instant::now();

        assert_eq!(ctl.poll(t0 + SECOND, &mut surface), PollReport::default());

        ctl.start(t0);
        ctl.poll(t0 + TICK, &mut surface);
        ctl.stop();
        ctl.poll(t0 + 2 * TICK, &mut surface);
        ctl.poll(t0 + SECOND, &mut surface);

        assert_eq!(calls.get(), 1);
        assert_eq!(surface.frames.len(), 1);
    }

    #[test]
    fn capture_failure_skips_tick() {
        let source = ScriptedSource {
            script: VecDeque::from([Err(CaptureError::NotOpen)]),
        };
        let (engine, calls) = FakeEngine::new([]);
        let mut ctl = controller(source, engine);
        let mut surface = RecordingSurface::top_left();
        let t0 = Instant::now();

        ctl.start(t0);
        let report = ctl.poll(t0 + TICK, &mut surface);
        assert_eq!(report.ticks, vec![TickOutcome::CaptureFailed]);
        assert_eq!(calls.get(), 0);
        assert_eq!(ctl.session().frame_count(), 0);
        assert!(surface.frames.is_empty());
    }

    #[test]
    fn missing_or_empty_result_publishes_nothing() {
        let (engine, calls) = FakeEngine::new([Reply::Status, Reply::Body(b"{}")]);
        let mut ctl = controller(ScriptedSource::default(), engine);
        let mut surface = RecordingSurface::top_left();
        let t0 = Instant::now();

        ctl.start(t0);
        let first = ctl.poll(t0 + TICK, &mut surface);
        let second = ctl.poll(t0 + 2 * TICK, &mut surface);

        assert_eq!(first.ticks, vec![TickOutcome::NoResult]);
        assert_eq!(second.ticks, vec![TickOutcome::NoResult]);
        assert_eq!(calls.get(), 2);
        assert_eq!(ctl.session().frame_count(), 2);
        assert!(surface.frames.is_empty());
    }

    #[test]
    fn blank_but_non_empty_reply_is_still_published() {
        let (engine, _) =
            FakeEngine::new([Reply::Body(br#"{"result": {}, "bounding_box": {}}"#)]);
        let mut ctl = controller(ScriptedSource::default(), engine);
        let mut surface = RecordingSurface::top_left();
        let t0 = Instant::now();

        ctl.start(t0);
        let report = ctl.poll(t0 + TICK, &mut surface);

        assert_eq!(report.ticks, vec![TickOutcome::Published]);
        assert_eq!(surface.frames.len(), 1);
        // No box means the overlay leaves the frame untouched.
        assert_eq!(surface.frames[0].rgba, frame_at(t0).rgba);
    }

    #[test]
    fn malformed_response_aborts_only_that_tick() {
        let (engine, _) = FakeEngine::new([Reply::Malformed]);
        let mut ctl = controller(ScriptedSource::default(), engine);
        let mut surface = RecordingSurface::top_left();
        let t0 = Instant::now();

        ctl.start(t0);
        assert_eq!(ctl.poll(t0 + TICK, &mut surface).ticks, vec![TickOutcome::Failed]);
        assert_eq!(
            ctl.poll(t0 + 2 * TICK, &mut surface).ticks,
            vec![TickOutcome::Published]
        );
        assert!(ctl.is_detecting());
    }

    #[test]
    fn frame_from_before_start_is_not_shown() {
        let t0 = Instant::now();
        let earlier = t0.checked_sub(SECOND).unwrap_or(t0);
        let source = ScriptedSource {
            script: VecDeque::from([Ok(frame_at(earlier))]),
        };
        let (engine, _) = FakeEngine::new([]);
        let mut ctl = controller(source, engine);
        let mut surface = RecordingSurface::top_left();

        ctl.start(t0 + Duration::from_millis(1));
        let report = ctl.poll(t0 + SECOND, &mut surface);
        assert_eq!(report.ticks, vec![TickOutcome::Stale]);
        assert!(surface.frames.is_empty());
    }

    #[test]
    fn bottom_left_surface_gets_flipped_frame() {
        let (engine, _) = FakeEngine::new([Reply::Result(InferenceResult {
            bounding_box: None,
            attributes: Attributes {
                gender: "male".into(),
                ..Default::default()
            },
        })]);
        let mut ctl = controller(ScriptedSource::default(), engine);
        let mut surface = RecordingSurface {
            origin: FrameOrigin::BottomLeft,
            frames: Vec::new(),
        };
        let t0 = Instant::now();

        ctl.start(t0);
        ctl.poll(t0 + TICK, &mut surface);

        let published = &surface.frames[0];
        assert_eq!(published.rgba[0], 2);
        assert_eq!(published.rgba[published.rgba.len() - 1], 1);
    }

    #[test]
    fn fps_reported_once_per_second_and_counter_resets() {
        let (engine, _) = FakeEngine::new([]);
        let mut ctl = controller(ScriptedSource::default(), engine);
        let mut surface = RecordingSurface::top_left();
        let t0 = Instant::now();

        ctl.start(t0);
        let mut reports = Vec::new();
        for step in 1..=100u32 {
            let report = ctl.poll(t0 + step * TICK, &mut surface);
            if let Some(fps) = report.fps {
                reports.push(fps);
            }
        }

        assert_eq!(reports.len(), 1);
        assert!((reports[0] - 100.0).abs() < 1e-6);
        assert_eq!(ctl.session().frame_count(), 0);
        assert_eq!(ctl.session().last_fps(), Some(reports[0]));
    }

    #[test]
    fn restart_resets_session() {
        let (engine, _) = FakeEngine::new([]);
        let mut ctl = controller(ScriptedSource::default(), engine);
        let mut surface = RecordingSurface::top_left();
        let t0 = Instant::now();

        ctl.start(t0);
        ctl.poll(t0 + TICK, &mut surface);
        assert_eq!(ctl.session().frame_count(), 1);
        ctl.stop();

        ctl.start(t0 + SECOND);
        assert_eq!(ctl.session().frame_count(), 0);
        assert!(ctl.session().last_fps().is_none());
        assert!(ctl.poll(t0 + SECOND, &mut surface).ticks.is_empty());
    }
}
