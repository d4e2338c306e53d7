use std::{sync::Arc, time::Instant};

use gpui::{
    AnyElement, App, AppContext, Context, IntoElement, ObjectFit, ParentElement, Render,
    RenderImage, SharedString, Styled, StyledImage, TitlebarOptions, Window, WindowOptions, div,
    img,
};
use gpui_component::{
    ActiveTheme, Root, StyledExt,
    button::{Button, ButtonVariants},
    h_flex,
    tag::Tag,
    v_flex,
};
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::{
    pipeline::{CaptureController, DisplaySurface, HttpInferenceClient, NokhwaSource, TickOutcome},
    types::Frame,
};

mod main_view;
mod render_util;

pub type LiveController = CaptureController<NokhwaSource, HttpInferenceClient>;

pub fn launch_ui(
    app: &mut App,
    controller: LiveController,
    endpoint: String,
    labels_enabled: bool,
) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Face Lens".into()),
            appears_transparent: false,
            traffic_light_position: None,
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(controller, endpoint, labels_enabled));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

/// The processed slot: the latest frame published by the capture loop, waiting
/// for the next repaint, and the image currently shown. Both belong to one
/// detection session.
#[derive(Default)]
struct ProcessedView {
    pending: Option<Frame>,
    image: Option<Arc<RenderImage>>,
}

impl DisplaySurface for ProcessedView {
    fn publish(&mut self, frame: Frame) {
        self.pending = Some(frame);
    }
}

impl ProcessedView {
    /// Shows `image`, handing back the one it replaces.
    fn show(&mut self, image: Arc<RenderImage>) -> Option<Arc<RenderImage>> {
        self.image.replace(image)
    }

    /// Forgets everything from the previous session, handing back the shown image.
    fn reset(&mut self) -> Option<Arc<RenderImage>> {
        self.pending = None;
        self.image.take()
    }
}

struct AppView {
    controller: LiveController,
    processed: ProcessedView,
    endpoint: String,
    labels_enabled: bool,
    // Passthrough slot kept in the layout; nothing publishes into it.
    raw_image: Option<Arc<RenderImage>>,
}

impl AppView {
    fn new(controller: LiveController, endpoint: String, labels_enabled: bool) -> Self {
        Self {
            controller,
            processed: ProcessedView::default(),
            endpoint,
            labels_enabled,
            raw_image: None,
        }
    }

    fn start_detection(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        if !self.controller.start(Instant::now()) {
            return;
        }
        // A new session starts from the placeholder, not the last session's frame.
        if let Some(old_image) = self.processed.reset() {
            cx.drop_image(old_image, Some(window));
        }
    }

    fn stop_detection(&mut self) {
        self.controller.stop();
    }

    fn drive_capture_loop(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let report = self.controller.poll(Instant::now(), &mut self.processed);

        if let Some(fps) = report.fps {
            window.set_window_title(&format!("Face Lens ({fps:.1} FPS)"));
        }
        if !report.ticks.contains(&TickOutcome::Published) {
            return;
        }
        if let Some(frame) = self.processed.pending.take() {
            if let Some(image) = render_util::frame_to_image(&frame) {
                self.replace_processed_image(image, window, cx);
            }
        }
    }

    fn replace_processed_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.processed.show(new_image) {
            // Explicitly drop the previous GPU texture; otherwise the sprite atlas keeps
            // every frame and memory will climb rapidly while the camera is running.
            cx.drop_image(old_image, Some(window));
        }
    }
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        if self.controller.is_detecting() {
            // Keep repainting so every frame polls the capture schedule.
            cx.defer_in(window, |_, _, cx| {
                cx.notify();
            });
        }

        self.drive_capture_loop(window, cx);
        self.render_main(cx)
    }
}
