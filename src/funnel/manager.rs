//! FunnelManager: coordinates screens, answers, step transitions and the
//! submission pipeline for one funnel session.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analytics::{AnalyticsSink, props};
use crate::api::RegistrationApi;
use crate::config::FunnelConfig;
use crate::error::FunnelError;
use crate::storage::SlotStorage;

use super::answers::{AnswerKey, AnswerStore, OnboardingAnswers, join_selection};
use super::schema::{THANK_YOU, TOTAL_STEPS};
use super::screens::{Choice, Screen, ScreenView};
use super::state::{DisplayState, StepController};
use super::submission::SubmissionPipeline;

/// Transient error notification shown after a failed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: String,
    pub message: String,
}

impl From<&FunnelError> for Notification {
    fn from(err: &FunnelError) -> Self {
        let message = match err {
            FunnelError::Submission(e) => e.user_message(),
            other => other.to_string(),
        };
        Self {
            kind: err.kind().to_string(),
            message,
        }
    }
}

/// Thank-you screen content, with the redirect taken from the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThankYouView {
    pub title: String,
    pub subtext: String,
    pub redirect_url: String,
    pub redirect_after_ms: u64,
}

/// Everything a front end needs to draw the funnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunnelView {
    pub session_id: Uuid,
    pub display: DisplayState,
    pub step: usize,
    pub total_steps: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<ScreenView>,
    pub answered: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thank_you: Option<ThankYouView>,
}

struct FunnelInner {
    session_id: Uuid,
    controller: StepController,
    answers: AnswerStore,
    screen: Screen,
    display: DisplayState,
    notification: Option<Notification>,
}

impl FunnelInner {
    /// Move to whatever step the controller now holds, with a fresh screen.
    fn enter_current_step(&mut self) {
        let step = self.controller.step();
        self.screen = Screen::for_step(step);
        self.display = DisplayState::Step { step };
    }

    fn ensure_interactive(&self, action: &str) -> Result<(), FunnelError> {
        match self.display {
            DisplayState::Step { .. } => Ok(()),
            DisplayState::Submitting => Err(FunnelError::Busy),
            DisplayState::Submitted(_) => Err(FunnelError::invalid(action, &self.display)),
        }
    }

    fn view(&self) -> FunnelView {
        let step = self.controller.step();
        let screen = match self.display {
            DisplayState::Step { .. } => Some(self.screen.render(step)),
            _ => None,
        };
        let thank_you = match &self.display {
            DisplayState::Submitted(success) => Some(ThankYouView {
                title: THANK_YOU.title.to_string(),
                subtext: THANK_YOU.subtext.to_string(),
                redirect_url: success.redirect_url.clone(),
                redirect_after_ms: THANK_YOU.delay_ms,
            }),
            _ => None,
        };
        FunnelView {
            session_id: self.session_id,
            display: self.display.clone(),
            step,
            total_steps: self.controller.total_steps(),
            screen,
            answered: self.answers.get_all().len(),
            notification: self.notification.clone(),
            thank_you,
        }
    }
}

/// Coordinates one funnel session.
///
/// Shared behind `Arc` by the HTTP routes. The state lock is never held
/// across the submission's network calls, so `view()` stays responsive and a
/// second submit sees `Busy` instead of queueing.
pub struct FunnelManager {
    inner: Arc<RwLock<FunnelInner>>,
    pipeline: SubmissionPipeline,
    analytics: Arc<dyn AnalyticsSink>,
    advance_delay: Duration,
    resume_session: bool,
}

impl FunnelManager {
    pub fn new(
        config: &FunnelConfig,
        storage: Arc<dyn SlotStorage>,
        api: Arc<dyn RegistrationApi>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        let inner = FunnelInner {
            session_id: Uuid::new_v4(),
            controller: StepController::new(TOTAL_STEPS, Arc::clone(&analytics)),
            answers: AnswerStore::new(storage),
            screen: Screen::for_step(0),
            display: DisplayState::Step { step: 0 },
            notification: None,
        };
        Self {
            inner: Arc::new(RwLock::new(inner)),
            pipeline: SubmissionPipeline::new(api, Arc::clone(&analytics), config.source.clone()),
            analytics,
            advance_delay: config.advance_delay,
            resume_session: config.resume_session,
        }
    }

    /// Current view model.
    pub async fn view(&self) -> FunnelView {
        self.inner.read().await.view()
    }

    /// Snapshot of the collected answers.
    pub async fn answers(&self) -> OnboardingAnswers {
        self.inner.read().await.answers.get_all()
    }

    /// Begin a new session at the landing screen.
    ///
    /// Stored answers are cleared unless session resume is enabled, in which
    /// case they are reloaded (the step still restarts at 0).
    pub async fn start_session(&self) -> Result<FunnelView, FunnelError> {
        let mut inner = self.inner.write().await;
        if inner.display == DisplayState::Submitting {
            return Err(FunnelError::Busy);
        }

        inner.session_id = Uuid::new_v4();
        inner.notification = None;
        if self.resume_session {
            inner.answers.restore().await;
        } else {
            inner.answers.clear().await;
        }
        inner.controller.reset();
        inner.enter_current_step();

        self.analytics.page_view(
            "Home Page",
            props(json!({
                "session_id": inner.session_id.to_string(),
                "resumed": self.resume_session,
            })),
        );
        info!(
            session_id = %inner.session_id,
            resumed = self.resume_session,
            "Funnel session started"
        );
        Ok(inner.view())
    }

    /// Landing screen "continue".
    pub async fn continue_from_landing(&self) -> Result<FunnelView, FunnelError> {
        let mut inner = self.inner.write().await;
        inner.notification = None;
        inner.ensure_interactive("continue")?;
        if !matches!(inner.screen, Screen::Landing(_)) {
            return Err(FunnelError::invalid("continue", inner.screen.kind()));
        }

        self.analytics.button_click(
            "Try for Free",
            props(json!({ "step": 0, "action": "landing_screen_continue" })),
        );
        self.apply(&mut inner, Choice::Continue).await;
        inner.controller.advance();
        inner.enter_current_step();
        Ok(inner.view())
    }

    /// Pick an option on a single-select screen. Advances after the
    /// visual-feedback delay.
    pub async fn select_option(&self, index: usize) -> Result<FunnelView, FunnelError> {
        let (session, step) = {
            let mut inner = self.inner.write().await;
            inner.notification = None;
            inner.ensure_interactive("select")?;
            let choice = match &mut inner.screen {
                Screen::SingleSelect(screen) => screen.select(index)?,
                other => return Err(FunnelError::invalid("select", other.kind())),
            };
            self.apply(&mut inner, choice).await;
            (inner.session_id, inner.controller.step())
        };

        self.finish_advance(session, step).await;
        Ok(self.view().await)
    }

    /// Flip an option on a multi-select screen.
    pub async fn toggle_option(&self, index: usize) -> Result<FunnelView, FunnelError> {
        let mut inner = self.inner.write().await;
        inner.notification = None;
        inner.ensure_interactive("toggle")?;
        match &mut inner.screen {
            Screen::MultiSelect(screen) => screen.toggle(index)?,
            other => return Err(FunnelError::invalid("toggle", other.kind())),
        }
        Ok(inner.view())
    }

    /// Submit the toggled set of a multi-select screen. Advances after the
    /// visual-feedback delay.
    pub async fn submit_selection(&self) -> Result<FunnelView, FunnelError> {
        let (session, step) = {
            let mut inner = self.inner.write().await;
            inner.notification = None;
            inner.ensure_interactive("submit_selection")?;
            let choice = match &inner.screen {
                Screen::MultiSelect(screen) => screen.submit()?,
                other => return Err(FunnelError::invalid("submit_selection", other.kind())),
            };
            self.apply(&mut inner, choice).await;
            (inner.session_id, inner.controller.step())
        };

        self.finish_advance(session, step).await;
        Ok(self.view().await)
    }

    /// Submit a plain text input (the name). Advances immediately.
    ///
    /// The email step must go through [`submit_email`](Self::submit_email).
    pub async fn submit_text(&self, value: &str) -> Result<FunnelView, FunnelError> {
        let mut inner = self.inner.write().await;
        inner.notification = None;
        inner.ensure_interactive("submit_text")?;
        let choice = match &mut inner.screen {
            Screen::TextInput(screen) if !screen.requires_token() => screen.submit(value, None)?,
            other => return Err(FunnelError::invalid("submit_text", other.kind())),
        };
        self.apply(&mut inner, choice).await;
        inner.controller.advance();
        inner.enter_current_step();
        Ok(inner.view())
    }

    /// Submit the email with its verification token and run the submission
    /// pipeline.
    ///
    /// On success the funnel ends in `Submitted`. On failure it stays on the
    /// email step with a notification and the error is returned.
    pub async fn submit_email(
        &self,
        email: &str,
        token: Option<&str>,
    ) -> Result<FunnelView, FunnelError> {
        let (session, answers, token) = {
            let mut inner = self.inner.write().await;
            inner.notification = None;
            inner.ensure_interactive("submit_email")?;
            let choice = match &mut inner.screen {
                Screen::TextInput(screen) if screen.requires_token() => {
                    screen.submit(email, token)?
                }
                other => return Err(FunnelError::invalid("submit_email", other.kind())),
            };
            let token = match &choice {
                Choice::Text { token, .. } => token.clone(),
                _ => None,
            };
            self.apply(&mut inner, choice).await;
            inner
                .answers
                .stamp(chrono::Utc::now().timestamp_millis())
                .await;
            inner.answers.save_submission().await;
            inner.display = DisplayState::Submitting;
            (inner.session_id, inner.answers.get_all(), token)
        };

        let result = self.pipeline.submit(&answers, token.as_deref()).await;

        let mut inner = self.inner.write().await;
        if inner.session_id != session {
            debug!("Session changed during submission, dropping result");
            return result.map(|_| inner.view());
        }
        match result {
            Ok(success) => {
                inner.display = DisplayState::Submitted(success);
                Ok(inner.view())
            }
            Err(e) => {
                inner.display = DisplayState::Step {
                    step: inner.controller.step(),
                };
                inner.notification = Some(Notification::from(&e));
                Err(e)
            }
        }
    }

    /// Go back one step without touching any answer.
    pub async fn back(&self) -> Result<FunnelView, FunnelError> {
        let mut inner = self.inner.write().await;
        inner.notification = None;
        inner.ensure_interactive("back")?;
        if !inner.screen.has_back() {
            return Err(FunnelError::invalid("back", inner.screen.kind()));
        }
        inner.controller.retreat();
        inner.enter_current_step();
        Ok(inner.view())
    }

    /// Record the answer carried by a choice and emit the matching event.
    async fn apply(&self, inner: &mut FunnelInner, choice: Choice) {
        let step = inner.controller.step();
        match choice {
            Choice::Continue => {}
            Choice::Single { key, value, .. } => {
                inner.answers.set(key, value.clone()).await;
                self.analytics.track(
                    "Question Answered",
                    props(json!({
                        "question_key": key.as_str(),
                        "question_value": value,
                        "step": step,
                        "total_answers": inner.answers.get_all().len(),
                    })),
                );
            }
            Choice::Multi { key, values } => {
                let joined = join_selection(&values);
                inner.answers.set(key, joined.clone()).await;
                self.analytics.track(
                    "Question Answered",
                    props(json!({
                        "question_key": key.as_str(),
                        "question_values": values,
                        "question_value": joined,
                        "step": step,
                        "total_answers": inner.answers.get_all().len(),
                        "selection_count": values.len(),
                    })),
                );
            }
            Choice::Text { key, value, token, .. } => {
                let has_value = !value.is_empty();
                inner.answers.set(key, value).await;
                let mut event = json!({
                    "step": step,
                    "field_name": key.as_str(),
                });
                event[format!("has_{key}")] = json!(has_value);
                if key == AnswerKey::Email {
                    event["has_recaptcha"] = json!(token.is_some());
                }
                self.analytics
                    .form_event("submitted", &format!("{key}_form"), props(event));
            }
        }
    }

    /// Wait for the scheduled advance. Dropping this future (a client that
    /// disconnects mid-delay) leaves the advance running.
    async fn finish_advance(&self, session: Uuid, step: usize) {
        if let Err(e) = self.schedule_advance(session, step).await {
            warn!(error = %e, "Delayed advance task failed");
        }
    }

    /// Spawn the visual-feedback delay followed by the advance. The advance
    /// only happens if nothing else moved the funnel in the meantime.
    fn schedule_advance(&self, session: Uuid, step: usize) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let delay = self.advance_delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let mut inner = inner.write().await;
            let unchanged = inner.session_id == session
                && inner.controller.step() == step
                && matches!(inner.display, DisplayState::Step { .. });
            if unchanged {
                inner.controller.advance();
                inner.enter_current_step();
            } else {
                debug!(step, "Funnel moved during advance delay, not advancing");
            }
        })
    }
}
