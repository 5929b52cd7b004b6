use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop flag shared between a run and whoever may want to stop it.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancels and reports whether a stop had already been requested.
    pub fn request_stop(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// Hooks for a host that renders a run while it is in progress.
pub trait RunObserver {
    fn verse_started(&mut self, _current: usize, _total: usize, _reference: &str) {}
    fn line_committed(&mut self, _line: &str) {}
}

pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// State of one chapter or batch run. Dropped when the run is over.
#[derive(Debug)]
pub struct RunContext {
    history: Vec<HistoryEntry>,
    collected: String,
    committed: usize,
    context_pairs: usize,
    cancel: CancelToken,
}

impl RunContext {
    pub fn new(context_pairs: usize) -> Self {
        Self::with_cancel_token(context_pairs, CancelToken::new())
    }

    pub fn with_cancel_token(context_pairs: usize, cancel: CancelToken) -> Self {
        Self {
            history: Vec::new(),
            collected: String::new(),
            committed: 0,
            context_pairs,
            cancel,
        }
    }

    pub fn context_pairs(&self) -> usize {
        self.context_pairs
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn assistant_lines(&self) -> impl Iterator<Item = &str> {
        self.history()
            .iter()
            .filter(|e| e.role == Role::Assistant)
            .map(|e| e.content.as_str())
    }

    /// Appends one user/assistant pair, evicting the oldest entries past `2 * context_pairs`.
    pub fn record_exchange(&mut self, user_prompt: String, line: String) {
        self.history.push(HistoryEntry {
            role: Role::User,
            content: user_prompt,
        });
        self.history.push(HistoryEntry {
            role: Role::Assistant,
            content: line,
        });
        let cap = self.context_pairs.saturating_mul(2);
        if self.history.len() > cap {
            let excess = self.history.len() - cap;
            self.history.drain(..excess);
        }
    }

    pub fn commit_line(&mut self, line: &str) {
        self.collected.push_str(line);
        self.collected.push('\n');
        self.committed += 1;
    }

    pub fn collected(&self) -> &str {
        &self.collected
    }

    pub fn committed_lines(&self) -> usize {
        self.committed
    }

    pub fn into_transcript(self) -> String {
        self.collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_capped_oldest_first() {
        let mut ctx = RunContext::new(2);
        for i in 1..=5 {
            ctx.record_exchange(format!("u{i}"), format!("a{i}"));
            assert!(ctx.history().len() <= 4);
        }
        let contents: Vec<&str> = ctx.history().iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, ["u4", "a4", "u5", "a5"]);
        assert_eq!(ctx.assistant_lines().collect::<Vec<_>>(), ["a4", "a5"]);
    }

    #[test]
    fn zero_pairs_keeps_no_history() {
        let mut ctx = RunContext::new(0);
        ctx.record_exchange("u".to_string(), "a".to_string());
        assert!(ctx.history().is_empty());
    }

    #[test]
    fn cancel_token_is_shared() {
        let ctx = RunContext::new(1);
        let token = ctx.cancel_token();
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn second_stop_request_is_reported() {
        let token = CancelToken::new();
        assert!(!token.request_stop());
        assert!(token.is_cancelled());
        assert!(token.request_stop());
    }

    #[test]
    fn committed_lines_accumulate() {
        let mut ctx = RunContext::new(1);
        ctx.commit_line("[A 1:1] one");
        ctx.commit_line("[A 1:2] two");
        assert_eq!(ctx.committed_lines(), 2);
        assert_eq!(ctx.into_transcript(), "[A 1:1] one\n[A 1:2] two\n");
    }
}
