//! Registration API: request/response shapes and the reqwest client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{ConfigError, SubmissionError};

/// Body of the registration call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub source: String,
    pub how_soon: Option<String>,
    pub preferred_topics: Option<String>,
    #[serde(rename = "recaptchaToken")]
    pub recaptcha_token: String,
}

/// Registration reply. `success: false` carries `error` / `error_type`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_created: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

/// Body of the sign-in call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    #[serde(rename = "recaptchaToken")]
    pub recaptcha_token: String,
}

/// Sign-in reply. The link arrives as either `magic_link` or `magicLink`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigninResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, alias = "magicLink", skip_serializing_if = "Option::is_none")]
    pub magic_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl SigninResponse {
    /// The redirect link, ignoring empty strings.
    pub fn redirect_link(&self) -> Option<&str> {
        self.magic_link.as_deref().filter(|l| !l.is_empty())
    }
}

/// The two remote operations the submission pipeline needs.
///
/// Implementations return `Err` only for transport or decoding failures;
/// server-side rejections come back as `Ok` responses with `success: false`.
#[async_trait]
pub trait RegistrationApi: Send + Sync {
    async fn register(
        &self,
        request: &RegisterRequest,
    ) -> Result<RegisterResponse, SubmissionError>;

    async fn signin(&self, request: &SigninRequest) -> Result<SigninResponse, SubmissionError>;
}

/// HTTP client for the ad-campaign registration backend.
pub struct HttpRegistrationClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRegistrationClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// POST a JSON body and decode the JSON reply.
    ///
    /// Error statuses whose body still decodes as `R` are returned as `R`, so
    /// a 409 carrying `error_type: "duplicate_email"` reaches the pipeline.
    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, SubmissionError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(format!("{path}: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SubmissionError::Transport(format!("{path}: {e}")))?;

        match serde_json::from_str::<R>(&text) {
            Ok(parsed) => {
                if !status.is_success() {
                    tracing::debug!(
                        path,
                        %status,
                        "API returned error status with a decodable body"
                    );
                }
                Ok(parsed)
            }
            Err(e) if status.is_success() => Err(SubmissionError::Transport(format!(
                "{path}: invalid response body: {e}"
            ))),
            Err(_) => Err(SubmissionError::Transport(format!(
                "{path}: HTTP {status}"
            ))),
        }
    }
}

#[async_trait]
impl RegistrationApi for HttpRegistrationClient {
    async fn register(
        &self,
        request: &RegisterRequest,
    ) -> Result<RegisterResponse, SubmissionError> {
        self.post("register", request).await
    }

    async fn signin(&self, request: &SigninRequest) -> Result<SigninResponse, SubmissionError> {
        self.post("signin", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_request_uses_camel_case_token() {
        let req = RegisterRequest {
            name: "Alex".into(),
            email: "alex@example.com".into(),
            source: "ITW_Quiz_Page".into(),
            how_soon: Some("Right Away".into()),
            preferred_topics: None,
            recaptcha_token: "tok".into(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["recaptchaToken"], "tok");
        assert_eq!(value["how_soon"], "Right Away");
        assert!(value["preferred_topics"].is_null());
        assert!(value.get("recaptcha_token").is_none());
    }

    #[test]
    fn register_response_failure_fields() {
        let resp: RegisterResponse = serde_json::from_value(json!({
            "success": false,
            "error": "Email exists",
            "error_type": "duplicate_email"
        }))
        .unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error_type.as_deref(), Some("duplicate_email"));
        assert!(resp.user_id.is_none());
    }

    #[test]
    fn signin_response_accepts_both_link_spellings() {
        let snake: SigninResponse =
            serde_json::from_value(json!({"success": true, "magic_link": "https://a"})).unwrap();
        let camel: SigninResponse =
            serde_json::from_value(json!({"success": true, "magicLink": "https://b"})).unwrap();
        assert_eq!(snake.redirect_link(), Some("https://a"));
        assert_eq!(camel.redirect_link(), Some("https://b"));
    }

    #[test]
    fn empty_link_is_not_a_redirect() {
        let resp: SigninResponse =
            serde_json::from_value(json!({"success": true, "magic_link": ""})).unwrap();
        assert_eq!(resp.redirect_link(), None);
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client =
            HttpRegistrationClient::new("http://localhost:9/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url("register"), "http://localhost:9/api/register");
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        // Port 9 (discard) is almost never listening on loopback.
        let client =
            HttpRegistrationClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client
            .signin(&SigninRequest {
                email: "a@b.com".into(),
                recaptcha_token: "t".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transport");
    }
}
