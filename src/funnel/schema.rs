//! Static content schema: one screen definition per step, plus the
//! answer-text → backend-value lookup tables.

use serde::Serialize;

use super::answers::AnswerKey;

/// Number of steps after the landing screen. Step `TOTAL_STEPS` is the email
/// input.
pub const TOTAL_STEPS: usize = 4;

/// How long the thank-you screen shows before redirecting.
pub const THANK_YOU_DELAY_MS: u64 = 1800;

/// Which input a text screen collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    Text,
    Email,
}

/// Definition of one screen in the funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenDef {
    Landing {
        title: &'static str,
        subtext: &'static str,
        button: &'static str,
    },
    SingleSelect {
        key: AnswerKey,
        title: &'static str,
        subtext: Option<&'static str>,
        options: &'static [&'static str],
    },
    MultiSelect {
        key: AnswerKey,
        title: &'static str,
        subtext: Option<&'static str>,
        options: &'static [&'static str],
        button: &'static str,
    },
    TextInput {
        key: AnswerKey,
        kind: TextKind,
        title: &'static str,
        label: &'static str,
        button: &'static str,
    },
}

/// Copy for the terminal thank-you screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThankYouContent {
    pub title: &'static str,
    pub subtext: &'static str,
    pub delay_ms: u64,
}

pub const THANK_YOU: ThankYouContent = ThankYouContent {
    title: "Thanks! You're all set.",
    subtext: "Taking you to the class page…",
    delay_ms: THANK_YOU_DELAY_MS,
};

const HOW_SOON_OPTIONS: &[&str] = &["Right away", "In 1–2 weeks", "Next month", "Just exploring"];

const SCHOOLING_OPTIONS: &[&str] = &["Public/Private schooling", "Homeschooling"];

static SCREENS: [ScreenDef; TOTAL_STEPS + 1] = [
    ScreenDef::Landing {
        title: "Into the Wild: Exploring Reptiles & Amphibians",
        subtext: "Live, interactive science classes where kids meet real reptiles and amphibians.",
        button: "Try for Free",
    },
    ScreenDef::SingleSelect {
        key: AnswerKey::Q1,
        title: "How soon are you looking to try our free classes?",
        subtext: Some("Let your child explore the world of reptiles and amphibians"),
        options: HOW_SOON_OPTIONS,
    },
    ScreenDef::MultiSelect {
        key: AnswerKey::Q2,
        title: "What's your child's current schooling style?",
        subtext: None,
        options: SCHOOLING_OPTIONS,
        button: "Submit",
    },
    ScreenDef::TextInput {
        key: AnswerKey::Name,
        kind: TextKind::Text,
        title: "What's your name?",
        label: "Enter your name",
        button: "Next",
    },
    ScreenDef::TextInput {
        key: AnswerKey::Email,
        kind: TextKind::Email,
        title: "Kindly share your email address",
        label: "Enter your email",
        button: "Submit",
    },
];

/// Screen definition for a step. Steps past the end clamp to the last screen.
pub fn screen_for_step(step: usize) -> &'static ScreenDef {
    &SCREENS[step.min(TOTAL_STEPS)]
}

/// Map the Q1 answer to the backend's `how_soon` value. Unknown text passes
/// through unchanged.
pub fn map_how_soon(answer: &str) -> String {
    match answer {
        "Right away" => "Right Away",
        "In 1–2 weeks" => "1-2 Weeks",
        "Next month" => "next month",
        "Just exploring" => "just exploring",
        other => other,
    }
    .to_string()
}

/// Map the Q2 answer to the backend's `preferred_topics` value. Unknown text
/// passes through unchanged.
pub fn map_schooling_mode(answer: &str) -> String {
    match answer {
        "Public/Private schooling" => "Public/private schooling",
        "Homeschooling" => "homeschooling",
        other => other,
    }
    .to_string()
}
