//! Block-page detection.
//!
//! A 200 response is not proof of real content: retailers serve CAPTCHA
//! and "robot check" pages with a success status. The classifier looks for
//! known indicator phrases anywhere in the body, ignoring case.

/// Phrases whose presence marks a page as a block or CAPTCHA page.
pub const BOT_INDICATORS: [&str; 9] = [
    "robot check",
    "blocked",
    "captcha",
    "unusual traffic",
    "automated queries",
    "sorry, we just need to make sure you're not a robot",
    "enter the characters you see below",
    "type the characters you see in this image",
    "please enter the characters you see in this image",
];

/// Verdict on a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClass {
    Clean,
    /// Carries the first indicator that matched.
    Blocked(&'static str),
}

impl PageClass {
    pub fn is_blocked(self) -> bool {
        matches!(self, PageClass::Blocked(_))
    }
}

/// Classify a page body against [`BOT_INDICATORS`].
pub fn classify(body: &str) -> PageClass {
    let lower = body.to_lowercase();
    BOT_INDICATORS
        .iter()
        .copied()
        .find(|indicator| lower.contains(indicator))
        .map_or(PageClass::Clean, PageClass::Blocked)
}
