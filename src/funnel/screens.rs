//! Screens: per-step UI state built from the content schema.
//!
//! A screen owns only what the user is doing on it right now (the highlighted
//! option, the toggled set, the typed value). It is rebuilt from scratch on
//! every step change, so returning to a screen never restores old toggles.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::FunnelError;

use super::answers::AnswerKey;
use super::schema::{ScreenDef, TextKind, screen_for_step};

/// Synchronous input validator: `Some(message)` rejects the value.
pub type Validator = fn(&str) -> Option<String>;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

/// Reject anything that is not shaped like `local@domain.tld`.
pub fn email_validator(value: &str) -> Option<String> {
    if EMAIL_RE.is_match(value) {
        None
    } else {
        Some("Please enter a valid email address".to_string())
    }
}

/// What a screen reports back when the user commits to something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// Landing screen "continue".
    Continue,
    Single {
        key: AnswerKey,
        index: usize,
        value: String,
    },
    Multi {
        key: AnswerKey,
        values: Vec<String>,
    },
    Text {
        key: AnswerKey,
        kind: TextKind,
        value: String,
        token: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenKind {
    Landing,
    SingleSelect,
    MultiSelect,
    TextInput,
}

impl std::fmt::Display for ScreenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Landing => "landing",
            Self::SingleSelect => "single_select",
            Self::MultiSelect => "multi_select",
            Self::TextInput => "text_input",
        };
        write!(f, "{s}")
    }
}

/// One option as rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub index: usize,
    pub text: String,
    pub selected: bool,
}

/// Serializable view model of the current screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenView {
    pub kind: ScreenKind,
    pub step: usize,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtext: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<TextKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
    pub submit_enabled: bool,
    pub back_available: bool,
    pub requires_token: bool,
}

impl ScreenView {
    fn new(kind: ScreenKind, step: usize, title: &str) -> Self {
        Self {
            kind,
            step,
            title: title.to_string(),
            subtext: None,
            options: Vec::new(),
            label: None,
            input_type: None,
            value: None,
            error: None,
            button: None,
            submit_enabled: false,
            back_available: step > 0,
            requires_token: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LandingScreen {
    title: &'static str,
    subtext: &'static str,
    button: &'static str,
}

/// Options with one current selection; selecting reports immediately.
#[derive(Debug, Clone)]
pub struct SingleSelectScreen {
    key: AnswerKey,
    title: &'static str,
    subtext: Option<&'static str>,
    options: &'static [&'static str],
    selected: Option<usize>,
}

impl SingleSelectScreen {
    pub fn select(&mut self, index: usize) -> Result<Choice, FunnelError> {
        let value = option_at(self.options, index)?;
        self.selected = Some(index);
        Ok(Choice::Single {
            key: self.key,
            index,
            value: value.to_string(),
        })
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }
}

/// Independent toggles, reported together on submit.
#[derive(Debug, Clone)]
pub struct MultiSelectScreen {
    key: AnswerKey,
    title: &'static str,
    subtext: Option<&'static str>,
    options: &'static [&'static str],
    button: &'static str,
    /// Toggled option indices in the order they were turned on.
    toggled: Vec<usize>,
}

impl MultiSelectScreen {
    /// Flip one option. Toggling twice leaves it off.
    pub fn toggle(&mut self, index: usize) -> Result<(), FunnelError> {
        option_at(self.options, index)?;
        match self.toggled.iter().position(|&i| i == index) {
            Some(pos) => {
                self.toggled.remove(pos);
            }
            None => self.toggled.push(index),
        }
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        !self.toggled.is_empty()
    }

    pub fn is_toggled(&self, index: usize) -> bool {
        self.toggled.contains(&index)
    }

    pub fn submit(&self) -> Result<Choice, FunnelError> {
        if !self.can_submit() {
            return Err(FunnelError::Validation(
                "Select at least one option".to_string(),
            ));
        }
        Ok(Choice::Multi {
            key: self.key,
            values: self
                .toggled
                .iter()
                .map(|&i| self.options[i].to_string())
                .collect(),
        })
    }
}

/// One text field with an optional validator.
#[derive(Debug, Clone)]
pub struct TextInputScreen {
    key: AnswerKey,
    kind: TextKind,
    title: &'static str,
    label: &'static str,
    button: &'static str,
    validator: Option<Validator>,
    value: String,
    error: Option<String>,
}

impl TextInputScreen {
    /// The email field also needs a bot-verification token.
    pub fn requires_token(&self) -> bool {
        self.kind == TextKind::Email
    }

    /// Check a value without submitting it.
    pub fn validate(&self, value: &str) -> Option<String> {
        if value.trim().is_empty() {
            return Some(format!("{} is required", field_name(self.key)));
        }
        self.validator.and_then(|v| v(value.trim()))
    }

    pub fn can_submit(&self) -> bool {
        self.validate(&self.value).is_none()
    }

    /// Validate and report the value. A rejected value stays in the field
    /// with its error message.
    pub fn submit(&mut self, value: &str, token: Option<&str>) -> Result<Choice, FunnelError> {
        self.value = value.to_string();
        if let Some(message) = self.validate(value) {
            self.error = Some(message.clone());
            return Err(FunnelError::Validation(message));
        }
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        if self.requires_token() && token.is_none() {
            let message =
                "reCAPTCHA verification is required. Please complete the verification.".to_string();
            self.error = Some(message.clone());
            return Err(FunnelError::Validation(message));
        }
        self.error = None;
        Ok(Choice::Text {
            key: self.key,
            kind: self.kind,
            value: value.trim().to_string(),
            token: token.map(String::from),
        })
    }
}

fn field_name(key: AnswerKey) -> &'static str {
    match key {
        AnswerKey::Name => "Name",
        AnswerKey::Email => "Email",
        AnswerKey::Q1 | AnswerKey::Q2 => "Answer",
    }
}

fn option_at(options: &[&'static str], index: usize) -> Result<&'static str, FunnelError> {
    options.get(index).copied().ok_or_else(|| {
        FunnelError::Validation(format!(
            "Option {index} does not exist ({} options)",
            options.len()
        ))
    })
}

/// The screen for the current step.
#[derive(Debug, Clone)]
pub enum Screen {
    Landing(LandingScreen),
    SingleSelect(SingleSelectScreen),
    MultiSelect(MultiSelectScreen),
    TextInput(TextInputScreen),
}

impl Screen {
    /// Fresh screen state for a step.
    pub fn for_step(step: usize) -> Self {
        match *screen_for_step(step) {
            ScreenDef::Landing {
                title,
                subtext,
                button,
            } => Self::Landing(LandingScreen {
                title,
                subtext,
                button,
            }),
            ScreenDef::SingleSelect {
                key,
                title,
                subtext,
                options,
            } => Self::SingleSelect(SingleSelectScreen {
                key,
                title,
                subtext,
                options,
                selected: None,
            }),
            ScreenDef::MultiSelect {
                key,
                title,
                subtext,
                options,
                button,
            } => Self::MultiSelect(MultiSelectScreen {
                key,
                title,
                subtext,
                options,
                button,
                toggled: Vec::new(),
            }),
            ScreenDef::TextInput {
                key,
                kind,
                title,
                label,
                button,
            } => Self::TextInput(TextInputScreen {
                key,
                kind,
                title,
                label,
                button,
                validator: match kind {
                    TextKind::Email => Some(email_validator),
                    TextKind::Text => None,
                },
                value: String::new(),
                error: None,
            }),
        }
    }

    pub fn kind(&self) -> ScreenKind {
        match self {
            Self::Landing(_) => ScreenKind::Landing,
            Self::SingleSelect(_) => ScreenKind::SingleSelect,
            Self::MultiSelect(_) => ScreenKind::MultiSelect,
            Self::TextInput(_) => ScreenKind::TextInput,
        }
    }

    /// Every screen but the landing one offers "back".
    pub fn has_back(&self) -> bool {
        !matches!(self, Self::Landing(_))
    }

    pub fn render(&self, step: usize) -> ScreenView {
        match self {
            Self::Landing(s) => {
                let mut view = ScreenView::new(ScreenKind::Landing, step, s.title);
                view.subtext = Some(s.subtext.to_string());
                view.button = Some(s.button.to_string());
                view.submit_enabled = true;
                view.back_available = false;
                view
            }
            Self::SingleSelect(s) => {
                let mut view = ScreenView::new(ScreenKind::SingleSelect, step, s.title);
                view.subtext = s.subtext.map(String::from);
                view.options = render_options(s.options, |i| s.selected == Some(i));
                view.submit_enabled = true;
                view
            }
            Self::MultiSelect(s) => {
                let mut view = ScreenView::new(ScreenKind::MultiSelect, step, s.title);
                view.subtext = s.subtext.map(String::from);
                view.options = render_options(s.options, |i| s.is_toggled(i));
                view.button = Some(s.button.to_string());
                view.submit_enabled = s.can_submit();
                view
            }
            Self::TextInput(s) => {
                let mut view = ScreenView::new(ScreenKind::TextInput, step, s.title);
                view.label = Some(s.label.to_string());
                view.input_type = Some(s.kind);
                view.value = Some(s.value.clone()).filter(|v| !v.is_empty());
                view.error = s.error.clone();
                view.button = Some(s.button.to_string());
                view.submit_enabled = s.can_submit();
                view.requires_token = s.requires_token();
                view
            }
        }
    }
}

fn render_options(options: &[&str], selected: impl Fn(usize) -> bool) -> Vec<OptionView> {
    options
        .iter()
        .enumerate()
        .map(|(index, text)| OptionView {
            index,
            text: text.to_string(),
            selected: selected(index),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multi() -> MultiSelectScreen {
        match Screen::for_step(2) {
            Screen::MultiSelect(s) => s,
            other => panic!("expected multi-select, got {:?}", other.kind()),
        }
    }

    fn text(step: usize) -> TextInputScreen {
        match Screen::for_step(step) {
            Screen::TextInput(s) => s,
            other => panic!("expected text input, got {:?}", other.kind()),
        }
    }

    #[test]
    fn email_validator_cases() {
        assert_eq!(email_validator("a@b.com"), None);
        assert!(email_validator("not-an-email").is_some());
        assert!(email_validator("").is_some());
        assert!(email_validator("a b@c.com").is_some());
        assert!(email_validator("a@b").is_some());
    }

    #[test]
    fn single_select_reports_immediately() {
        let Screen::SingleSelect(mut s) = Screen::for_step(1) else {
            panic!("step 1 should be single-select");
        };
        let choice = s.select(0).unwrap();
        assert_eq!(
            choice,
            Choice::Single {
                key: AnswerKey::Q1,
                index: 0,
                value: "Right away".into()
            }
        );
        s.select(2).unwrap();
        assert_eq!(s.selected(), Some(2));
        assert!(s.select(17).is_err());
        assert_eq!(s.selected(), Some(2));
    }

    #[test]
    fn multi_submit_disabled_iff_empty() {
        let mut s = multi();
        assert!(!s.can_submit());
        assert!(s.submit().is_err());

        s.toggle(1).unwrap();
        assert!(s.can_submit());

        s.toggle(1).unwrap();
        assert!(!s.can_submit());
        assert!(!s.is_toggled(1));
    }

    #[test]
    fn multi_submit_reports_in_toggle_order() {
        let mut s = multi();
        s.toggle(1).unwrap();
        s.toggle(0).unwrap();
        assert_eq!(
            s.submit().unwrap(),
            Choice::Multi {
                key: AnswerKey::Q2,
                values: vec!["Homeschooling".into(), "Public/Private schooling".into()],
            }
        );
    }

    #[test]
    fn multi_toggle_out_of_range() {
        let mut s = multi();
        assert!(matches!(s.toggle(5), Err(FunnelError::Validation(_))));
        assert!(!s.can_submit());
    }

    #[test]
    fn name_input_rejects_empty() {
        let mut s = text(3);
        assert!(!s.can_submit());
        assert!(matches!(s.submit("  ", None), Err(FunnelError::Validation(_))));
        let choice = s.submit(" Alex ", None).unwrap();
        assert!(matches!(
            choice,
            Choice::Text { key: AnswerKey::Name, ref value, .. } if value == "Alex"
        ));
    }

    #[test]
    fn email_input_needs_valid_address_and_token() {
        let mut s = text(4);
        assert!(s.requires_token());

        let err = s.submit("not-an-email", Some("tok")).unwrap_err();
        assert_eq!(
            err,
            FunnelError::Validation("Please enter a valid email address".into())
        );
        assert_eq!(s.error.as_deref(), Some("Please enter a valid email address"));

        assert!(s.submit("a@b.com", None).is_err());
        assert!(s.submit("a@b.com", Some("  ")).is_err());

        let choice = s.submit("a@b.com", Some("tok")).unwrap();
        assert_eq!(
            choice,
            Choice::Text {
                key: AnswerKey::Email,
                kind: TextKind::Email,
                value: "a@b.com".into(),
                token: Some("tok".into()),
            }
        );
        assert!(s.error.is_none());
        assert!(s.can_submit());
    }

    #[test]
    fn render_reflects_selection_state() {
        let mut screen = Screen::for_step(2);
        let view = screen.render(2);
        assert_eq!(view.kind, ScreenKind::MultiSelect);
        assert!(!view.submit_enabled);
        assert!(view.back_available);

        if let Screen::MultiSelect(s) = &mut screen {
            s.toggle(0).unwrap();
        }
        let view = screen.render(2);
        assert!(view.submit_enabled);
        assert!(view.options[0].selected);
        assert!(!view.options[1].selected);
    }

    #[test]
    fn landing_has_no_back() {
        let screen = Screen::for_step(0);
        assert!(!screen.has_back());
        assert!(!screen.render(0).back_available);
        assert!(Screen::for_step(1).has_back());
    }
}
