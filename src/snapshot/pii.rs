use crate::config::PiiConfig;
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

static RE_EMAIL: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    RE_EMAIL.get_or_init(|| {
        Regex::new(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid e-mail pattern")
    })
}

/// Replaces e-mail addresses in extracted HTML with a placeholder
///
/// `mailto:` anchors are rewritten while the fragment is serialized (see
/// [`EmailRedactor::is_mailto`]); free-standing addresses are then replaced in
/// the serialized HTML by [`EmailRedactor::redact`].
#[derive(Debug, Clone)]
pub struct EmailRedactor {
    placeholder: String,
}

impl EmailRedactor {
    /// Returns a redactor, or `None` when redaction is switched off
    pub fn from_config(config: &PiiConfig) -> Option<Self> {
        config.redact_email.then(|| Self::new(&config.placeholder))
    }

    pub fn new(placeholder: &str) -> Self {
        Self {
            placeholder: placeholder.to_string(),
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// True for hrefs that must be disabled
    pub fn is_mailto(href: &str) -> bool {
        href.trim_start()
            .get(..7)
            .map_or(false, |scheme| scheme.eq_ignore_ascii_case("mailto:"))
    }

    /// Replaces every e-mail address in the text
    pub fn redact<'t>(&self, text: &'t str) -> Cow<'t, str> {
        email_regex().replace_all(text, regex::NoExpand(self.placeholder.as_str()))
    }
}
