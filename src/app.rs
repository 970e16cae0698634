//! Voice chat widget: egui/eframe application.
//!
//! [`VoiceChatApp`] is the top-level [`eframe::App`].  It never touches the
//! controllers directly: it reads [`SharedState`] every frame and posts
//! [`UiCommand`]s to the assistant task.
//!
//! # Layout
//!
//! | Area | Content |
//! |------|---------|
//! | Chat log | User messages right-aligned, assistant messages word by word with the spoken word highlighted |
//! | Attachments | Image links under structured replies |
//! | Input row | Text box (Enter submits) and Send |
//! | Control row | Voice / "Listening..." and Stop Speaking |

use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::assistant::UiCommand;
use crate::chat::{lock_state, Attachment, Message, Sender, SharedState};
use crate::config::AppConfig;

const HIGHLIGHT: egui::Color32 = egui::Color32::from_rgb(255, 221, 87);
const USER_BUBBLE: egui::Color32 = egui::Color32::from_rgb(52, 98, 170);
const ASSISTANT_BUBBLE: egui::Color32 = egui::Color32::from_rgb(48, 48, 52);
const ERROR_TEXT: egui::Color32 = egui::Color32::from_rgb(255, 136, 68);

/// Label of the Voice button.
pub fn voice_button_label(listening: bool) -> &'static str {
    if listening {
        "Listening..."
    } else {
        "Voice"
    }
}

// ---------------------------------------------------------------------------
// VoiceChatApp
// ---------------------------------------------------------------------------

pub struct VoiceChatApp {
    state: SharedState,
    commands: mpsc::UnboundedSender<UiCommand>,

    // ── Snapshot of the shared state, refreshed when its revision moves ──
    revision: Option<u64>,
    messages: Vec<Message>,
    listening: bool,
    stop_speaking_enabled: bool,
    awaiting_reply: bool,

    /// Text typed into the input box.
    draft: String,
}

impl VoiceChatApp {
    pub fn new(state: SharedState, commands: mpsc::UnboundedSender<UiCommand>) -> Self {
        Self {
            state,
            commands,
            revision: None,
            messages: Vec::new(),
            listening: false,
            stop_speaking_enabled: false,
            awaiting_reply: false,
            draft: String::new(),
        }
    }

    // ── State / commands ─────────────────────────────────────────────────

    /// Copy the shared state when it changed since the last frame.
    ///
    /// Returns `true` when the snapshot was refreshed.
    fn refresh(&mut self) -> bool {
        let st = lock_state(&self.state);
        if self.revision == Some(st.revision()) {
            return false;
        }

        self.revision = Some(st.revision());
        self.messages = st.chat().messages().to_vec();
        self.listening = st.listening();
        self.stop_speaking_enabled = st.stop_speaking_enabled();
        self.awaiting_reply = st.awaiting_reply();
        true
    }

    fn send(&self, command: UiCommand) {
        if self.commands.send(command).is_err() {
            log::error!("ui: assistant task is gone, command dropped");
        }
    }

    /// Post the draft unless a reply is still pending; the draft is kept
    /// until it can be sent.
    fn submit_draft(&mut self) {
        if self.awaiting_reply {
            return;
        }
        let text = std::mem::take(&mut self.draft);
        if text.trim().is_empty() {
            return;
        }
        self.send(UiCommand::Submit(text));
    }

    // ── Renderers ────────────────────────────────────────────────────────

    fn draw_message(ui: &mut egui::Ui, message: &Message) {
        match message.sender {
            Sender::User => {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::TOP), |ui| {
                    egui::Frame::new()
                        .fill(USER_BUBBLE)
                        .corner_radius(egui::CornerRadius::same(8))
                        .inner_margin(egui::Margin::same(6))
                        .show(ui, |ui| {
                            ui.label(egui::RichText::new(&message.text).color(egui::Color32::WHITE));
                        });
                });
            }
            Sender::Assistant | Sender::AssistantError => {
                egui::Frame::new()
                    .fill(ASSISTANT_BUBBLE)
                    .corner_radius(egui::CornerRadius::same(8))
                    .inner_margin(egui::Margin::same(6))
                    .show(ui, |ui| {
                        Self::draw_tokens(ui, message);
                        if let Some(attachment) = &message.attachment {
                            Self::draw_attachment(ui, attachment);
                        }
                    });
            }
        }
        ui.add_space(4.0);
    }

    /// One label per word so the spoken word can carry its own background.
    fn draw_tokens(ui: &mut egui::Ui, message: &Message) {
        let color = if message.sender == Sender::AssistantError {
            ERROR_TEXT
        } else {
            egui::Color32::from_rgb(220, 220, 220)
        };

        ui.horizontal_wrapped(|ui| {
            ui.spacing_mut().item_spacing.x = 4.0;
            for token in &message.tokens {
                let mut text = egui::RichText::new(&token.text).color(color);
                if token.highlighted {
                    text = text.background_color(HIGHLIGHT).color(egui::Color32::BLACK);
                }
                ui.label(text);
            }
        });
    }

    fn draw_attachment(ui: &mut egui::Ui, attachment: &Attachment) {
        ui.add_space(4.0);
        match attachment {
            Attachment::Image { url } => {
                ui.hyperlink_to("Open image", url);
            }
            Attachment::ImageList(items) => {
                ui.separator();
                for item in items {
                    let title = item.title.as_deref().unwrap_or(&item.url);
                    ui.hyperlink_to(title, &item.url);
                }
            }
        }
    }

    fn draw_input_row(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let send_width = 60.0;
            let edit = ui.add_sized(
                [ui.available_width() - send_width, 24.0],
                egui::TextEdit::singleline(&mut self.draft).hint_text("Type a command..."),
            );
            let entered = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            let clicked = ui
                .add_enabled(!self.awaiting_reply, egui::Button::new("Send"))
                .clicked();

            if entered || clicked {
                self.submit_draft();
                edit.request_focus();
            }
        });
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let voice = egui::Button::new(voice_button_label(self.listening)).fill(if self.listening {
                egui::Color32::from_rgb(200, 60, 60)
            } else {
                egui::Color32::from_rgb(60, 140, 80)
            });
            if ui
                .add(voice)
                .on_hover_text(if self.listening {
                    "Click to stop listening"
                } else {
                    "Click to start voice command"
                })
                .clicked()
            {
                self.send(UiCommand::ToggleVoice);
            }

            if ui
                .add_enabled(self.stop_speaking_enabled, egui::Button::new("Stop Speaking"))
                .clicked()
            {
                self.send(UiCommand::StopSpeaking);
            }

            if self.awaiting_reply {
                ui.spinner();
            }
        });
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for VoiceChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.refresh();

        // The assistant task mutates shared state off the UI thread.
        let busy = self.listening || self.stop_speaking_enabled || self.awaiting_reply;
        ctx.request_repaint_after(Duration::from_millis(if busy { 33 } else { 250 }));

        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            self.draw_input_row(ui);
            ui.add_space(2.0);
            self.draw_controls(ui);
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for message in &self.messages {
                        Self::draw_message(ui, message);
                    }
                });
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("ui: voice chat widget closing");
    }
}

/// Window options derived from [`AppConfig::ui`].
pub fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    let mut vp = egui::ViewportBuilder::default()
        .with_title("Voice Chat")
        .with_inner_size([width, height])
        .with_min_inner_size([320.0, 360.0]);

    if config.ui.always_on_top {
        vp = vp.with_always_on_top();
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::new_shared_state;

    fn app() -> (VoiceChatApp, SharedState, mpsc::UnboundedReceiver<UiCommand>) {
        let state = new_shared_state();
        let (tx, rx) = mpsc::unbounded_channel();
        (VoiceChatApp::new(state.clone(), tx), state, rx)
    }

    #[test]
    fn voice_label_follows_listening() {
        assert_eq!(voice_button_label(false), "Voice");
        assert_eq!(voice_button_label(true), "Listening...");
    }

    #[test]
    fn snapshot_refreshes_only_on_new_revision() {
        let (mut app, state, _rx) = app();
        assert!(app.refresh());
        assert!(!app.refresh());

        {
            let mut st = lock_state(&state);
            st.chat_mut().push(Sender::Assistant, "hello there", None);
            st.set_listening(true);
        }
        assert!(app.refresh());
        assert_eq!(app.messages.len(), 1);
        assert!(app.listening);
        assert!(!app.refresh());
    }

    #[test]
    fn submit_draft_posts_and_clears() {
        let (mut app, _state, mut rx) = app();
        app.draft = "find cats".into();
        app.submit_draft();

        assert!(app.draft.is_empty());
        assert_eq!(rx.try_recv().ok(), Some(UiCommand::Submit("find cats".into())));
    }

    #[test]
    fn blank_draft_is_not_posted() {
        let (mut app, _state, mut rx) = app();
        app.draft = "   ".into();
        app.submit_draft();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn draft_is_held_while_awaiting_reply() {
        let (mut app, state, mut rx) = app();
        lock_state(&state).set_awaiting_reply(true);
        app.refresh();

        app.draft = "find dogs".into();
        app.submit_draft();
        assert_eq!(app.draft, "find dogs");
        assert!(rx.try_recv().is_err());

        lock_state(&state).set_awaiting_reply(false);
        app.refresh();
        app.submit_draft();
        assert!(app.draft.is_empty());
        assert_eq!(rx.try_recv().ok(), Some(UiCommand::Submit("find dogs".into())));
    }

    #[test]
    fn window_uses_configured_size() {
        let config = AppConfig::default();
        let options = native_options(&config);
        let (w, h) = config.ui.window_size;
        assert_eq!(options.viewport.inner_size, Some(egui::vec2(w, h)));
    }
}
