use super::{
    ActiveTheme, AnyElement, AppView, Arc, Button, ButtonVariants, Context, IntoElement,
    ObjectFit, ParentElement, RenderImage, SharedString, Styled, StyledExt, StyledImage, Tag, div,
    h_flex, img, v_flex,
};

impl AppView {
    pub(super) fn render_main(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let detecting = self.controller.is_detecting();
        let session = self.controller.session();
        let fps_text = session
            .last_fps()
            .map(|fps| format!("FPS: {fps:.2}"))
            .unwrap_or_else(|| "FPS: --".to_string());
        let frames_text = format!("Frames this second: {}", session.frame_count());
        let camera_error = self.controller.source().open_error().map(str::to_string);

        let processed_slot = image_slot(
            self.processed.image.as_ref(),
            if detecting {
                "Waiting for inference..."
            } else {
                "Press Start to begin detection"
            },
        );
        let raw_slot = image_slot(self.raw_image.as_ref(), "");

        let (success, muted_foreground, foreground, background) = {
            let theme = cx.theme();
            (
                theme.success,
                theme.muted_foreground,
                theme.foreground,
                theme.background,
            )
        };
        let mut status_row = h_flex()
            .gap_3()
            .items_center()
            .child(
                div()
                    .text_sm()
                    .font_semibold()
                    .text_color(if detecting { success } else { muted_foreground })
                    .child(if detecting { "● Detecting" } else { "○ Idle" }),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(foreground)
                    .child(fps_text),
            )
            .child(
                div()
                    .text_xs()
                    .text_color(muted_foreground)
                    .child(frames_text),
            )
            .child(
                div()
                    .text_xs()
                    .text_color(muted_foreground)
                    .overflow_hidden()
                    .text_ellipsis()
                    .whitespace_nowrap()
                    .child(format!("Endpoint: {}", self.endpoint)),
            );

        if let Some(err) = camera_error {
            status_row = status_row.child(Tag::danger().rounded_full().child(err));
        }
        if !self.labels_enabled {
            status_row = status_row.child(
                Tag::warning()
                    .rounded_full()
                    .child("No label font, drawing boxes only"),
            );
        }

        let start_label = if detecting { "Detecting..." } else { "Start" };
        let buttons = v_flex()
            .gap_2()
            .w_full()
            .child(
                Button::new(SharedString::from("start-detection"))
                    .primary()
                    .label(start_label)
                    .w_full()
                    .on_click(cx.listener(|this, _, window, cx| {
                        this.start_detection(window, cx);
                        cx.notify();
                    })),
            )
            .child(
                Button::new(SharedString::from("stop-detection"))
                    .label("Stop")
                    .w_full()
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.stop_detection();
                        cx.notify();
                    })),
            );

        v_flex()
            .size_full()
            .gap_3()
            .p_4()
            .bg(background)
            .child(div().flex_1().w_full().child(processed_slot))
            .child(div().flex_1().w_full().child(raw_slot))
            .child(status_row)
            .child(buttons)
            .into_any_element()
    }
}

fn image_slot(image: Option<&Arc<RenderImage>>, placeholder: &'static str) -> AnyElement {
    match image {
        Some(image) => img(image.clone())
            .size_full()
            .object_fit(ObjectFit::Contain)
            .rounded_lg()
            .into_any_element(),
        None => div()
            .size_full()
            .flex()
            .items_center()
            .justify_center()
            .rounded_lg()
            .bg(gpui::rgb(0x000000))
            .text_sm()
            .text_color(gpui::rgb(0x8b95a5))
            .child(placeholder)
            .into_any_element(),
    }
}
