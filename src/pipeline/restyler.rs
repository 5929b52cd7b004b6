use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Result, StylerError};
use crate::gateway::{ChatGateway, GenerationRequest};
use crate::quality::{body_ok, RepetitionGuard, OPENING_NGRAM_SIZE};
use crate::textutil::truncate_for_log;
use crate::verses::{chapter_verses, filter_verses, find_verse, reference, Verse};

use super::context::{RunContext, RunObserver, RunStatus};
use super::postprocess::postprocess_line;
use super::prompts::{build_user_prompt, expected_prefix};
use super::trace::TraceWriter;
use super::PipelineConfig;

const STAGE_DRAFT: &str = "draft";
const STAGE_RETRY_SHORT: &str = "retry_short";
const STAGE_RETRY_REPEAT: &str = "retry_repeat";

/// Which verse a single run restyles. `text_override` replaces the loaded text.
#[derive(Clone, Debug, Default)]
pub struct VerseSelection {
    pub book: String,
    pub chapter: Option<u32>,
    pub verse: Option<u32>,
    pub text_override: Option<String>,
}

/// Filter lists plus a `[start, end)` window over the filtered verses.
#[derive(Clone, Debug, Default)]
pub struct BatchSelection {
    pub volumes: Option<Vec<String>>,
    pub books: Option<Vec<String>>,
    pub start: usize,
    pub end: Option<usize>,
}

pub struct Restyler {
    gateway: Arc<dyn ChatGateway>,
    cfg: PipelineConfig,
    trace: TraceWriter,
    seq: AtomicUsize,
}

impl Restyler {
    pub fn new(gateway: Arc<dyn ChatGateway>, cfg: PipelineConfig) -> Self {
        let trace = match TraceWriter::new(cfg.trace_dir.clone(), cfg.trace_prompts) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("trace disabled: {e:#}");
                TraceWriter::disabled()
            }
        };
        Self {
            gateway,
            cfg,
            trace,
            seq: AtomicUsize::new(0),
        }
    }

    /// One verse through draft, short-body retry and (with a context) repeated-opening retry.
    pub async fn restyle_verse(
        &self,
        reference: &str,
        source_text: &str,
        ctx: Option<&RunContext>,
    ) -> Result<String> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let prefix = expected_prefix(reference);
        let user_prompt = build_user_prompt(reference, source_text);
        let base = self.cfg.temperature;
        let min_chars = self.cfg.min_body_chars;

        let mut line = self
            .attempt(seq, reference, &prefix, &user_prompt, base, STAGE_DRAFT)
            .await?;

        if !body_ok(&line, &prefix, min_chars) {
            line = self
                .attempt(
                    seq,
                    reference,
                    &prefix,
                    &user_prompt,
                    base.max(1.0),
                    STAGE_RETRY_SHORT,
                )
                .await?;
        }

        if let Some(ctx) = ctx.filter(|c| c.context_pairs() > 0) {
            let guard = RepetitionGuard::from_lines(ctx.assistant_lines(), OPENING_NGRAM_SIZE);
            if guard.collides(&line) {
                let alt = self
                    .attempt(
                        seq,
                        reference,
                        &prefix,
                        &user_prompt,
                        (base + 0.1).max(1.05),
                        STAGE_RETRY_REPEAT,
                    )
                    .await?;
                if body_ok(&alt, &prefix, min_chars) {
                    line = alt;
                } else {
                    tracing::debug!(reference, "repeat retry too short; keeping earlier line");
                }
            }
        }

        self.trace_text(seq, reference, "final", "line", &line);
        Ok(line)
    }

    async fn attempt(
        &self,
        seq: usize,
        reference: &str,
        prefix: &str,
        user_prompt: &str,
        temperature: f32,
        stage: &str,
    ) -> Result<String> {
        let request = GenerationRequest {
            system_prompt: self.cfg.system_prompt.clone(),
            user_prompt: user_prompt.to_string(),
            temperature,
            stop: self.cfg.stop.clone(),
        };
        tracing::debug!(reference, stage, temperature, "restyle attempt");
        self.trace_text(seq, reference, stage, "prompt", user_prompt);

        let raw = self.gateway.chat(&request).await?;
        tracing::debug!(
            reference,
            stage,
            reply = %truncate_for_log(&raw, self.cfg.log_max_chars),
            "model reply"
        );
        self.trace_text(seq, reference, stage, "raw", &raw);

        let line = postprocess_line(&raw, prefix);
        self.trace_text(seq, reference, stage, "line", &line);
        Ok(line)
    }

    fn trace_text(&self, seq: usize, reference: &str, stage: &str, kind: &str, text: &str) {
        if let Err(e) = self.trace.write_verse_text(seq, reference, stage, kind, text) {
            tracing::warn!("{e:#}");
        }
    }

    /// Restyles one verse. No history, so no repeated-opening check.
    pub async fn run_single(&self, verses: &[Verse], sel: &VerseSelection) -> Result<String> {
        let text_override = sel
            .text_override
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if verses.is_empty() && text_override.is_none() {
            return Err(StylerError::selection("Load a scripture JSON source first."));
        }
        let book = sel.book.trim();
        let (chapter, verse) = match (sel.chapter, sel.verse) {
            (Some(c), Some(v)) if !book.is_empty() && c > 0 && v > 0 => (c, v),
            _ => return Err(StylerError::selection("Select book, chapter, and verse.")),
        };
        let source_text = match text_override {
            Some(t) => t,
            None => find_verse(verses, book, chapter, verse)
                .map(|v| v.scripture_text.as_str())
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    StylerError::selection("No verse text found. Provide override or load JSON.")
                })?,
        };
        self.restyle_verse(&reference(book, chapter, verse), source_text, None)
            .await
    }

    /// Every verse of one chapter, in verse order.
    pub async fn run_chapter(
        &self,
        ctx: &mut RunContext,
        verses: &[Verse],
        book: &str,
        chapter: u32,
        observer: &mut dyn RunObserver,
    ) -> Result<RunStatus> {
        if verses.is_empty() {
            return Err(StylerError::selection("Load a scripture JSON source first."));
        }
        if book.trim().is_empty() || chapter == 0 {
            return Err(StylerError::selection("Select book and chapter."));
        }
        let rows = chapter_verses(verses, book, chapter);
        if rows.is_empty() {
            return Err(StylerError::selection("No verses for this chapter."));
        }
        self.run_sequence(ctx, &rows, observer).await
    }

    /// Filtered verses in source order, sliced to `[start, end)`.
    pub async fn run_batch(
        &self,
        ctx: &mut RunContext,
        verses: &[Verse],
        sel: &BatchSelection,
        observer: &mut dyn RunObserver,
    ) -> Result<RunStatus> {
        if verses.is_empty() {
            return Err(StylerError::selection("Load a scripture JSON source first."));
        }
        let filtered = filter_verses(verses, sel.volumes.as_deref(), sel.books.as_deref());
        if filtered.is_empty() {
            return Err(StylerError::FilterExhausted);
        }
        let end = sel.end.map_or(filtered.len(), |e| e.min(filtered.len()));
        let start = sel.start.min(end);
        self.run_sequence(ctx, &filtered[start..end], observer).await
    }

    async fn run_sequence(
        &self,
        ctx: &mut RunContext,
        rows: &[&Verse],
        observer: &mut dyn RunObserver,
    ) -> Result<RunStatus> {
        let total = rows.len();
        for (i, row) in rows.iter().enumerate() {
            if ctx.is_cancelled() {
                tracing::info!(committed = ctx.committed_lines(), "run cancelled");
                return Ok(RunStatus::Cancelled);
            }
            let reference = row.reference();
            observer.verse_started(i + 1, total, &reference);

            let line = self
                .restyle_verse(&reference, &row.scripture_text, Some(&*ctx))
                .await?;

            ctx.record_exchange(build_user_prompt(&reference, &row.scripture_text), line.clone());
            ctx.commit_line(&line);
            observer.line_committed(&line);

            if !self.cfg.pace.is_zero() {
                tokio::time::sleep(self.cfg.pace).await;
            }
        }
        Ok(RunStatus::Completed)
    }
}
