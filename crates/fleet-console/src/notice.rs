use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const MAX_NOTICES: usize = 32;

/// Sink for operator-facing outcomes. The engine asks; the host decides how
/// to present.
pub trait Reporter: Send + Sync {
    fn report_error(&self, title: &str, message: &str);
    fn report_success(&self, title: &str, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Error,
    Success,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
    pub at: DateTime<Local>,
}

#[derive(Debug, Default)]
struct NoticeState {
    notices: VecDeque<Notice>,
    revision: u64,
}

/// Shared notice list rendered by the UI: errors as a modal overlay, the
/// latest success in the footer.
#[derive(Debug, Clone, Default)]
pub struct NoticeQueue {
    inner: Arc<Mutex<NoticeState>>,
}

impl NoticeQueue {
    fn push(&self, level: NoticeLevel, title: &str, message: &str) {
        let Ok(mut state) = self.inner.lock() else {
            return;
        };
        state.notices.push_back(Notice {
            level,
            title: title.to_string(),
            message: message.to_string(),
            at: Local::now(),
        });
        while state.notices.len() > MAX_NOTICES {
            state.notices.pop_front();
        }
        state.revision = state.revision.wrapping_add(1);
    }

    pub fn revision(&self) -> u64 {
        self.inner.lock().map(|state| state.revision).unwrap_or(0)
    }

    /// Oldest error still waiting for the operator to dismiss it.
    pub fn pending_error(&self) -> Option<Notice> {
        let state = self.inner.lock().ok()?;
        state
            .notices
            .iter()
            .find(|notice| notice.level == NoticeLevel::Error)
            .cloned()
    }

    pub fn dismiss_error(&self) -> bool {
        let Ok(mut state) = self.inner.lock() else {
            return false;
        };
        let Some(index) = state
            .notices
            .iter()
            .position(|notice| notice.level == NoticeLevel::Error)
        else {
            return false;
        };
        state.notices.remove(index);
        state.revision = state.revision.wrapping_add(1);
        true
    }

    pub fn latest_success(&self) -> Option<Notice> {
        let state = self.inner.lock().ok()?;
        state
            .notices
            .iter()
            .rev()
            .find(|notice| notice.level == NoticeLevel::Success)
            .cloned()
    }
}

impl Reporter for NoticeQueue {
    fn report_error(&self, title: &str, message: &str) {
        self.push(NoticeLevel::Error, title, message);
    }

    fn report_success(&self, title: &str, message: &str) {
        self.push(NoticeLevel::Success, title, message);
    }
}
