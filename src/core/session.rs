// Interactive resolution of candidate pairs
// One pair at a time: validate, render, prompt, apply. Files are re-checked
// at every step because earlier decisions (or the user) may have moved them.

use crate::core::archive::{ArchiveOutcome, ArchiveStore};
use crate::core::candidates::SimilarityEdge;
use crate::core::decision::{Decision, DECISION_PROMPT};
use crate::core::image_ref::{ImageRef, PairKey};
use crate::services::console::Console;
use crate::services::history::{HistoryLog, HistoryRecord};
use crate::services::renderer::{caption, ComparisonRenderer};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Console error: {0}")]
    Console(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionOutcome {
    /// Every candidate was presented or dropped.
    Exhausted,
    /// The user quit; later candidates were never looked at.
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Ready,
    Presenting(SimilarityEdge),
    AwaitingDecision(SimilarityEdge),
    Terminated(SessionOutcome),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionReport {
    pub outcome: Option<SessionOutcome>,
    pub presented: usize,
    pub archived: Vec<PathBuf>,
    pub skipped: usize,
    pub already_gone: usize,
    pub vanished_before_review: usize,
    pub render_failures: usize,
    pub archive_failures: usize,
}

pub struct ResolutionSession<R, C> {
    queue: VecDeque<SimilarityEdge>,
    seen: HashSet<PairKey>,
    archive: ArchiveStore,
    history: Option<HistoryLog>,
    renderer: R,
    console: C,
    state: SessionState,
    report: SessionReport,
    total: usize,
}

impl<R: ComparisonRenderer, C: Console> ResolutionSession<R, C> {
    pub fn new(candidates: Vec<SimilarityEdge>, archive: ArchiveStore, renderer: R, console: C) -> Self {
        let total = candidates.len();
        Self {
            queue: candidates.into(),
            seen: HashSet::new(),
            archive,
            history: None,
            renderer,
            console,
            state: SessionState::Ready,
            report: SessionReport::default(),
            total,
        }
    }

    /// Record every archive action in `history`.
    pub fn with_history(mut self, history: HistoryLog) -> Self {
        self.history = Some(history);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    pub fn has_seen(&self, first: &ImageRef, second: &ImageRef) -> bool {
        self.seen.contains(&PairKey::new(first, second))
    }

    pub fn into_parts(self) -> (SessionReport, R, C) {
        (self.report, self.renderer, self.console)
    }

    /// Drive the session until it terminates.
    pub fn run(&mut self) -> Result<SessionOutcome, SessionError> {
        loop {
            if let SessionState::Terminated(outcome) = self.step()? {
                return Ok(*outcome);
            }
        }
    }

    /// Perform exactly one state transition.
    pub fn step(&mut self) -> Result<&SessionState, SessionError> {
        let next = match std::mem::replace(&mut self.state, SessionState::Ready) {
            SessionState::Ready => match self.next_candidate() {
                Some(edge) => SessionState::Presenting(edge),
                None => self.terminate(SessionOutcome::Exhausted),
            },
            SessionState::Presenting(edge) => {
                self.present(&edge)?;
                SessionState::AwaitingDecision(edge)
            }
            SessionState::AwaitingDecision(edge) => match self.console.read_choice(DECISION_PROMPT)? {
                None => {
                    log::info!("Input closed; ending session");
                    self.terminate(SessionOutcome::Quit)
                }
                Some(input) => match Decision::parse(&input) {
                    None => {
                        self.console.show("Invalid choice")?;
                        SessionState::AwaitingDecision(edge)
                    }
                    Some(Decision::Quit) => self.terminate(SessionOutcome::Quit),
                    Some(decision) => {
                        self.apply(&edge, decision)?;
                        SessionState::Ready
                    }
                },
            },
            SessionState::Terminated(outcome) => SessionState::Terminated(outcome),
        };
        self.state = next;
        Ok(&self.state)
    }

    fn terminate(&mut self, outcome: SessionOutcome) -> SessionState {
        self.report.outcome = Some(outcome);
        SessionState::Terminated(outcome)
    }

    /// Pop edges until one has both files on disk and has not been shown yet.
    fn next_candidate(&mut self) -> Option<SimilarityEdge> {
        while let Some(edge) = self.queue.pop_front() {
            let key = edge.key();
            if self.seen.contains(&key) {
                continue;
            }
            if !edge.first.exists() || !edge.second.exists() {
                log::debug!(
                    "Dropping {} ↔ {}: file no longer present",
                    edge.first,
                    edge.second
                );
                self.report.vanished_before_review += 1;
                continue;
            }
            self.seen.insert(key);
            return Some(edge);
        }
        None
    }

    fn present(&mut self, edge: &SimilarityEdge) -> Result<(), SessionError> {
        self.report.presented += 1;
        self.console.show(&format!(
            "\n🔍 Potential duplicates {} of ≤{} (similarity score: {:.3}):",
            self.report.presented, self.total, edge.score
        ))?;
        self.console
            .show(&format!("   Image 1: {}", caption(edge.first.path())))?;
        self.console
            .show(&format!("   Image 2: {}", caption(edge.second.path())))?;

        if let Err(e) = self
            .renderer
            .render_and_display(edge.first.path(), edge.second.path())
        {
            log::warn!("Rendering {} ↔ {} failed: {}", edge.first, edge.second, e);
            self.report.render_failures += 1;
            self.console
                .show(&format!("⚠️  Could not display comparison: {}", e))?;
        }
        Ok(())
    }

    fn apply(&mut self, edge: &SimilarityEdge, decision: Decision) -> Result<(), SessionError> {
        let (keep, lose) = match decision {
            Decision::KeepFirst => (&edge.first, &edge.second),
            Decision::KeepSecond => (&edge.second, &edge.first),
            Decision::Skip => {
                self.report.skipped += 1;
                return Ok(());
            }
            Decision::Quit => return Ok(()),
        };

        if !keep.exists() && !lose.exists() {
            log::warn!("Both {} and {} vanished before the decision", keep, lose);
            self.report.already_gone += 1;
            self.console.show(&format!(
                "⚠️  Neither {} nor {} exists anymore; nothing to do",
                keep, lose
            ))?;
            return Ok(());
        }
        if !keep.exists() {
            log::warn!("Kept file {} is gone; archiving {} anyway", keep, lose);
        }

        match self.archive.archive(lose.path()) {
            Ok(ArchiveOutcome::Archived(dest)) => {
                self.console
                    .show(&format!("📦 Moved to archive directory: {}", dest.display()))?;
                if let Some(history) = &self.history {
                    let record = HistoryRecord::archived(keep.path(), lose.path(), &dest, edge.score);
                    if let Err(e) = history.append(&record) {
                        log::warn!("Failed to record history in {}: {}", history.path().display(), e);
                    }
                }
                self.report.archived.push(dest);
            }
            Ok(ArchiveOutcome::AlreadyAbsent) => {
                self.report.already_gone += 1;
                self.console
                    .show(&format!("ℹ️  {} is already gone; nothing to archive", lose))?;
            }
            Err(e) => {
                log::warn!("Archiving {} failed: {}", lose, e);
                self.report.archive_failures += 1;
                self.console.show(&format!("❌ Could not archive {}: {}", lose, e))?;
            }
        }
        Ok(())
    }
}
