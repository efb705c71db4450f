mod classify;
mod client;
mod config;
mod question;
mod render;
mod session;
mod toast;
mod widgets;

use iced::{
    widget::{button, column, container, row, scrollable, text, text_input, text_input::Id},
    Element, Length, Task, Theme, Font, Subscription, Size,
    time, clipboard,
    keyboard::{self, Key},
    event::{self, Event as IcedEvent},
    alignment, task,
    window,
};
use std::future::Future;
use std::process::Command;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use classify::Classifier;
use client::{AnswerClient, AnswerPayload, FailureReason};
use render::RenderedAnswer;
use session::{Rejected, Session, Settled, SubmissionState, Ticket};
use toast::Toasts;

const LOG_ENV: &str = "CHAI_LOG";
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = config::Config::load();
    let client = AnswerClient::with_config(&config.backend)?;
    info!(backend = client.base_url(), "Starting ChAI");

    let window_settings = window::Settings {
        size: Size::new(config.window.width as f32, config.window.height as f32),
        min_size: Some(Size::new(
            config.window.min_width as f32,
            config.window.min_height as f32,
        )),
        position: window::Position::Centered,
        ..Default::default()
    };

    iced::application("ChAI", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window_settings)
        .default_font(Font::MONOSPACE)
        .run_with(move || App::new(config, client))
        .map_err(|e| anyhow!("Failed to run application: {}", e))
}

#[derive(Debug, Clone)]
pub enum Message {
    InputChanged(String),
    Submit,
    Settled(Ticket, Result<AnswerPayload, FailureReason>),
    HealthChecked(Result<String, FailureReason>),
    OpenLink(String),
    DismissToast(u64),
    Tick(Instant),
    CopyAnswer,
    Escape,
}

#[derive(Debug, Clone, PartialEq)]
enum Health {
    Unknown,
    Online,
    Offline,
}

struct App {
    session: Session,
    rendered: Option<RenderedAnswer>,
    toasts: Toasts,
    client: AnswerClient,
    in_flight: Option<task::Handle>,
    health: Health,
    loading_frame: usize,
    input_id: Id,
}

impl App {
    fn new(config: config::Config, client: AnswerClient) -> (Self, Task<Message>) {
        let input_id = Id::unique();

        let health_task = if client.base_url().is_empty() {
            Task::none()
        } else {
            let probe = client.clone();
            Task::perform(async move { probe.health().await }, Message::HealthChecked)
        };

        let app = App {
            session: Session::new(Classifier::new(config.notifications.report_unclassified)),
            rendered: None,
            toasts: Toasts::new(&config.notifications),
            client,
            in_flight: None,
            health: Health::Unknown,
            loading_frame: 0,
            input_id: input_id.clone(),
        };

        let focus_task = text_input::focus(input_id);

        (app, Task::batch([focus_task, health_task]))
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::InputChanged(value) => {
                self.session.set_input(value);
                Task::none()
            }
            Message::Submit => match self.begin_request() {
                Ok((ticket, request)) => {
                    let (request, handle) =
                        Task::perform(request, move |outcome| Message::Settled(ticket, outcome))
                            .abortable();
                    self.in_flight = Some(handle);
                    request
                }
                Err(Rejected::Invalid(_)) => text_input::focus(self.input_id.clone()),
                Err(Rejected::Busy) => Task::none(),
            },
            Message::Settled(ticket, outcome) => {
                match self.session.settle(ticket, outcome) {
                    Settled::Answered => {
                        self.in_flight = None;
                        self.rendered = self.session.result().map(render::render);
                    }
                    Settled::Failed(notification) => {
                        self.in_flight = None;
                        if let Some(notification) = notification {
                            self.toasts.push(notification, Instant::now());
                        }
                    }
                    Settled::Stale => {}
                }
                Task::none()
            }
            Message::HealthChecked(result) => {
                self.health = match result {
                    Ok(greeting) => {
                        info!(greeting = %greeting, "backend is up");
                        Health::Online
                    }
                    Err(e) => {
                        warn!(error = %e, "backend health probe failed");
                        Health::Offline
                    }
                };
                Task::none()
            }
            Message::OpenLink(url) => {
                if let Err(e) = open_link(&url) {
                    warn!(url = %url, "Failed to open link: {:#}", e);
                }
                Task::none()
            }
            Message::DismissToast(id) => {
                self.toasts.dismiss(id);
                Task::none()
            }
            Message::Tick(now) => {
                if self.session.is_submitting() {
                    self.loading_frame = (self.loading_frame + 1) % SPINNER_FRAMES.len();
                }
                self.toasts.expire(now);
                Task::none()
            }
            Message::CopyAnswer => match self.session.result() {
                Some(result) => clipboard::write(result.answer.clone()),
                None => Task::none(),
            },
            Message::Escape => {
                if self.cancel_in_flight() {
                    Task::none()
                } else {
                    iced::exit()
                }
            }
        }
    }

    /// Move the session to Submitting and build the single request for it.
    fn begin_request(
        &mut self,
    ) -> Result<
        (
            Ticket,
            impl Future<Output = Result<AnswerPayload, FailureReason>> + Send + 'static,
        ),
        Rejected,
    > {
        let (ticket, question) = self.session.begin()?;
        self.loading_frame = 0;
        let client = self.client.clone();
        Ok((ticket, async move { client.ask(&question).await }))
    }

    /// Returns false when nothing was in flight.
    fn cancel_in_flight(&mut self) -> bool {
        if !self.session.cancel() {
            return false;
        }
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        true
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.session.is_submitting() {
            time::every(Duration::from_millis(80)).map(Message::Tick)
        } else if !self.toasts.is_empty() {
            time::every(Duration::from_millis(250)).map(Message::Tick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| {
            if let IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) = event
            {
                Some(Message::Escape)
            } else {
                None
            }
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<Message> {
        let submitting = self.session.state() == SubmissionState::Submitting;

        let health = match &self.health {
            Health::Unknown => text("● checking").size(13),
            Health::Online => text("● online").size(13).style(text::success),
            Health::Offline => text("● offline").size(13).style(text::danger),
        };
        let header = row![text("ChAI").size(26).style(text::primary), health]
            .spacing(12)
            .align_y(alignment::Vertical::Center);

        let mut input = text_input("What would you like to know?", self.session.input())
            .on_input(Message::InputChanged)
            .padding(15)
            .size(18)
            .id(self.input_id.clone());
        if !submitting {
            input = input.on_submit(Message::Submit);
        }

        let ask_label = if submitting {
            format!("{} Ask", SPINNER_FRAMES[self.loading_frame])
        } else {
            "Ask".to_string()
        };
        let ask = button(text(ask_label).size(16))
            .on_press_maybe((!submitting).then_some(Message::Submit))
            .padding(15);

        let mut form = column![row![input, ask].spacing(10)].spacing(6);
        if let Some(error) = self.session.field_error() {
            form = form.push(text(error.to_string()).size(14).style(text::danger));
        }

        let output: Element<Message> = match &self.rendered {
            Some(rendered) => {
                let copy_button = container(
                    button(text("[Copy]").size(14))
                        .on_press(Message::CopyAnswer)
                        .padding(10),
                )
                .width(Length::Fill)
                .align_x(alignment::Horizontal::Right);

                scrollable(
                    column![widgets::answer(rendered), copy_button]
                        .spacing(10)
                        .padding(15),
                )
                .height(Length::Fill)
                .into()
            }
            None => container(text("Ask a question to get started.").size(15))
                .width(Length::Fill)
                .height(Length::Fill)
                .align_x(alignment::Horizontal::Center)
                .align_y(alignment::Vertical::Center)
                .into(),
        };

        let content = column![header, form, output, widgets::toasts(&self.toasts)]
            .spacing(16)
            .padding(20);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}

/// Open `url` in the user's browser.
fn open_link(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    let mut command = Command::new("open");
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = Command::new("xdg-open");

    command
        .arg(url)
        .spawn()
        .with_context(|| format!("could not launch a browser for {}", url))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RATE_LIMITED;
    use crate::config::Config;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Counts hits on `/api/question` and answers with `status`.
    fn counting_router(hits: Arc<AtomicUsize>, status: StatusCode) -> Router {
        Router::new().route(
            "/api/question",
            post(move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    if status.is_success() {
                        Json(json!({
                            "data": {
                                "answer": "**Paris**",
                                "relevant_links": ["https://example.com/docs/geo"]
                            }
                        }))
                        .into_response()
                    } else {
                        (status, "slow down").into_response()
                    }
                }
            }),
        )
    }

    fn app_for(base_url: String) -> App {
        let mut config = Config::default();
        config.backend.base_url = base_url;
        config.backend.request_timeout_secs = 5;
        let client = AnswerClient::with_config(&config.backend).unwrap();
        let (app, _) = App::new(config, client);
        app
    }

    #[tokio::test]
    async fn test_one_request_per_submit() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut app = app_for(serve(counting_router(hits.clone(), StatusCode::OK)).await);

        let _ = app.update(Message::InputChanged(
            "What is the capital of France?".to_string(),
        ));
        let (ticket, request) = app.begin_request().unwrap();
        assert!(matches!(app.begin_request(), Err(Rejected::Busy)));
        let _ = app.update(Message::Submit);
        assert!(app.session.is_submitting());

        let outcome = request.await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let _ = app.update(Message::Settled(ticket, outcome));
        assert!(!app.session.is_submitting());
        assert_eq!(app.session.input(), "");
        let rendered = app.rendered.as_ref().unwrap();
        assert_eq!(rendered.links[0].label, "docs › geo");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_keeps_input_and_shows_toast() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut app = app_for(
            serve(counting_router(hits.clone(), StatusCode::TOO_MANY_REQUESTS)).await,
        );

        let _ = app.update(Message::InputChanged("Why is the sky blue?".to_string()));
        let (ticket, request) = app.begin_request().unwrap();
        let outcome = request.await;
        let _ = app.update(Message::Settled(ticket, outcome));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!app.session.is_submitting());
        assert_eq!(app.session.input(), "Why is the sky blue?");
        assert!(app.rendered.is_none());
        let messages: Vec<&str> = app.toasts.iter().map(|t| t.message.as_str()).collect();
        assert_eq!(messages, vec![RATE_LIMITED]);
    }

    #[tokio::test]
    async fn test_escape_cancels_instead_of_exiting() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut app = app_for(serve(counting_router(hits.clone(), StatusCode::OK)).await);

        let _ = app.update(Message::InputChanged(
            "What is the capital of France?".to_string(),
        ));
        let (ticket, _request) = app.begin_request().unwrap();

        assert!(app.cancel_in_flight());
        assert!(!app.session.is_submitting());
        assert_eq!(app.session.input(), "What is the capital of France?");

        // A late answer for the cancelled ticket is ignored.
        let late = AnswerPayload {
            answer: "late".to_string(),
            relevant_links: Vec::new(),
        };
        let _ = app.update(Message::Settled(ticket, Ok(late)));
        assert!(app.rendered.is_none());

        // With nothing in flight, Escape falls through to exiting.
        assert!(!app.cancel_in_flight());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
