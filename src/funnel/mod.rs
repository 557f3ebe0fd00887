//! Onboarding funnel: landing screen, quiz questions, name and email
//! inputs, then registration and sign-in.
//!
//! Screens report choices to the manager, which records answers, moves the
//! step controller and, on the email step, runs the submission pipeline. The
//! result becomes the terminal display state.

pub mod answers;
pub mod manager;
pub mod routes;
pub mod schema;
pub mod screens;
pub mod state;
pub mod submission;

pub use answers::{AnswerKey, AnswerStore, OnboardingAnswers};
pub use manager::{FunnelManager, FunnelView, Notification, ThankYouView};
pub use routes::{FunnelRouteState, funnel_routes};
pub use screens::{Choice, Screen, ScreenKind, ScreenView, email_validator};
pub use state::{DisplayState, StepController};
pub use submission::{SubmissionPipeline, SubmissionResult, SubmissionSuccess};
