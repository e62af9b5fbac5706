use serde::Serialize;

/// Longest message the composer accepts, counted in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Draft text and send state of one open transcript.
///
/// At most one send is outstanding at a time: [`Composer::begin`] hands out the
/// content to deliver and refuses further sends until [`Composer::succeed`] or
/// [`Composer::fail`] settles it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    draft: String,
    sending: bool,
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposerView {
    pub draft: String,
    pub sending: bool,
    pub error: Option<String>,
    pub max_chars: usize,
}

impl Composer {
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Replaces the draft, cut to [`MAX_MESSAGE_CHARS`].
    pub fn set_draft(&mut self, text: &str) {
        self.draft = truncate_chars(text, MAX_MESSAGE_CHARS).to_owned();
    }

    /// Starts sending `text`. Returns the trimmed content to deliver, or
    /// `None` when the text is blank or another send is still in flight.
    pub fn begin(&mut self, text: &str) -> Option<String> {
        let content = text.trim();
        if content.is_empty() || self.sending {
            return None;
        }

        self.set_draft(text);
        self.sending = true;
        self.error = None;
        Some(truncate_chars(content, MAX_MESSAGE_CHARS).to_owned())
    }

    /// The server accepted the message: the draft is cleared.
    pub fn succeed(&mut self) {
        self.draft.clear();
        self.error = None;
        self.sending = false;
    }

    /// The send failed: the draft stays so the user can retry.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.sending = false;
    }

    /// Releases the in-flight flag without touching the draft or error.
    pub(crate) fn settle(&mut self) {
        self.sending = false;
    }

    pub fn view(&self) -> ComposerView {
        ComposerView {
            draft: self.draft.clone(),
            sending: self.sending,
            error: self.error.clone(),
            max_chars: MAX_MESSAGE_CHARS,
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
