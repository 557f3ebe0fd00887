//! Submission pipeline: validate, register, sign in.
//!
//! One attempt runs at a time. Registration always resolves before sign-in is
//! issued, and sign-in is skipped entirely when registration fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::analytics::{AnalyticsSink, props};
use crate::api::{RegisterRequest, RegistrationApi, SigninRequest};
use crate::error::{FunnelError, GENERIC_FAILURE_MESSAGE, SubmissionError};

use super::answers::OnboardingAnswers;
use super::schema::{TOTAL_STEPS, map_how_soon, map_schooling_mode};

/// `error_type` the backend uses for an already-registered address.
pub const DUPLICATE_EMAIL_ERROR_TYPE: &str = "duplicate_email";

/// Terminal success: where to send the user next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionSuccess {
    pub redirect_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Outcome of one submission attempt.
pub type SubmissionResult = Result<SubmissionSuccess, SubmissionError>;

/// Clears the in-flight flag when the attempt ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SubmissionPipeline {
    api: Arc<dyn RegistrationApi>,
    analytics: Arc<dyn AnalyticsSink>,
    source: String,
    in_flight: AtomicBool,
}

impl SubmissionPipeline {
    pub fn new(
        api: Arc<dyn RegistrationApi>,
        analytics: Arc<dyn AnalyticsSink>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            api,
            analytics,
            source: source.into(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether an attempt is currently running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the in-flight slot. `None` when another attempt holds it.
    fn claim(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    /// Run one attempt. Returns [`FunnelError::Busy`] without touching the
    /// network if another attempt is still in flight.
    pub async fn submit(
        &self,
        answers: &OnboardingAnswers,
        token: Option<&str>,
    ) -> Result<SubmissionSuccess, FunnelError> {
        let Some(_guard) = self.claim() else {
            warn!("Submission ignored: another submission is in flight");
            return Err(FunnelError::Busy);
        };

        let result = self.run(answers, token).await;
        if let Err(ref e) = result {
            self.analytics.track(
                "Onboarding Error",
                props(json!({
                    "step": TOTAL_STEPS,
                    "error_type": e.kind(),
                    "error_message": e.user_message(),
                    "has_email": answers.email.is_some(),
                })),
            );
        }
        result.map_err(FunnelError::from)
    }

    async fn run(&self, answers: &OnboardingAnswers, token: Option<&str>) -> SubmissionResult {
        let (name, email, token) = validate(answers, token)?;

        let how_soon = answers.q1.as_deref().map(map_how_soon);
        let preferred_topics = answers.q2.as_deref().map(map_schooling_mode);

        // ── Registration ────────────────────────────────────────────────
        self.analytics.track(
            "Registration Started",
            props(json!({
                "email": email,
                "source": self.source,
                "how_soon": how_soon,
                "preferred_topics": preferred_topics,
            })),
        );

        let request = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            source: self.source.clone(),
            how_soon: how_soon.clone(),
            preferred_topics: preferred_topics.clone(),
            recaptcha_token: token.to_string(),
        };

        let registered = match self.api.register(&request).await {
            Ok(resp) if resp.success => resp,
            Ok(resp) => {
                let error_type = resp.error_type.clone().unwrap_or_else(|| "unknown".into());
                let reason = resp
                    .error
                    .clone()
                    .unwrap_or_else(|| "Registration failed".into());
                self.analytics.track(
                    "Registration Failed",
                    props(json!({
                        "email": email,
                        "error": reason,
                        "error_type": error_type,
                    })),
                );
                warn!(error_type = %error_type, reason = %reason, "Registration rejected");
                return Err(if error_type == DUPLICATE_EMAIL_ERROR_TYPE {
                    SubmissionError::DuplicateEmail
                } else {
                    SubmissionError::Registration { reason }
                });
            }
            Err(e) => {
                self.analytics.track(
                    "Registration Failed",
                    props(json!({
                        "email": email,
                        "error": e.to_string(),
                        "error_type": e.kind(),
                    })),
                );
                warn!(error = %e, "Registration request failed");
                return Err(e);
            }
        };

        self.analytics.track(
            "Registration Successful",
            props(json!({
                "email": email,
                "user_id": registered.user_id,
                "account_created": registered.account_created,
                "how_soon": how_soon,
                "preferred_topics": preferred_topics,
            })),
        );

        if let Some(user_id) = registered.user_id.as_deref() {
            self.analytics.identify(
                user_id,
                props(json!({
                    "email": email,
                    "name": name,
                    "how_soon": how_soon,
                    "preferred_topics": preferred_topics,
                    "source": self.source,
                    "account_created": registered.account_created,
                })),
            );
        }

        // ── Sign-in ─────────────────────────────────────────────────────
        self.analytics.track(
            "Signin Started",
            props(json!({ "email": email, "step": TOTAL_STEPS })),
        );

        let signin = SigninRequest {
            email: email.to_string(),
            recaptcha_token: token.to_string(),
        };

        let signed_in = match self.api.signin(&signin).await {
            Ok(resp) => resp,
            Err(e) => {
                self.track_signin_failed(e.kind(), &e.user_message());
                warn!(error = %e, "Sign-in request failed");
                return Err(e);
            }
        };

        let Some(link) = signed_in.redirect_link() else {
            self.track_signin_failed("signin_failed", GENERIC_FAILURE_MESSAGE);
            warn!(success = signed_in.success, "Sign-in returned no magic link");
            return Err(SubmissionError::SignIn {
                reason: GENERIC_FAILURE_MESSAGE.to_string(),
            });
        };

        let user_id = signed_in.user_id.clone().or(registered.user_id);

        self.analytics.track(
            "Signin Successful",
            props(json!({
                "email": email,
                "user_id": user_id,
                "has_magic_link": true,
            })),
        );
        self.analytics.track(
            "Onboarding Completed",
            props(json!({
                "step": TOTAL_STEPS,
                "email": email,
                "has_magic_link": true,
                "redirect_url": link,
            })),
        );
        info!(user_id = ?user_id, "Onboarding submission completed");

        Ok(SubmissionSuccess {
            redirect_url: link.to_string(),
            user_id,
        })
    }

    fn track_signin_failed(&self, error_type: &str, message: &str) {
        self.analytics.track(
            "Signin Failed",
            props(json!({
                "step": TOTAL_STEPS,
                "error_type": error_type,
                "error_message": message,
            })),
        );
    }
}

/// Name, email and token, all required and non-empty.
fn validate<'a>(
    answers: &'a OnboardingAnswers,
    token: Option<&'a str>,
) -> Result<(&'a str, &'a str, &'a str), SubmissionError> {
    let name = answers.name.as_deref().filter(|s| !s.trim().is_empty());
    let email = answers.email.as_deref().filter(|s| !s.trim().is_empty());
    let (Some(name), Some(email)) = (name, email) else {
        return Err(SubmissionError::Validation(
            "Name and email are required".to_string(),
        ));
    };
    let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
        return Err(SubmissionError::Validation(
            "reCAPTCHA verification is required. Please complete the verification.".to_string(),
        ));
    };
    Ok((name, email, token))
}
