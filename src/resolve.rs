use crate::config::{ConfigError, SessionConfig};
use crate::core::archive::ArchiveStore;
use crate::core::candidates::{normalize, resolve_raw_map, SimilarityEdge};
use crate::core::session::{ResolutionSession, SessionError, SessionReport};
use crate::services::console::Console;
use crate::services::history::HistoryLog;
use crate::services::renderer::ComparisonRenderer;
use crate::services::similarity::{SimilarityError, SimilarityProvider};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Similarity lookup failed: {0}")]
    Similarity(#[from] SimilarityError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Ask `provider` about the target directory and normalize its answer.
pub fn find_candidates<P: SimilarityProvider + ?Sized>(
    config: &SessionConfig,
    provider: &P,
) -> Result<Vec<SimilarityEdge>, SimilarityError> {
    let raw = provider.find_similar(&config.target_dir)?;
    log::info!("Provider reported {} image(s) with matches", raw.len());
    let resolved = resolve_raw_map(raw, &config.target_dir);
    Ok(normalize(&resolved, config.threshold))
}

/// Run one full interactive session over `config.target_dir`.
///
/// An empty candidate list is not an error; the returned report simply has
/// nothing presented.
pub fn resolve<P, R, C>(
    config: &SessionConfig,
    provider: &P,
    renderer: R,
    mut console: C,
) -> Result<SessionReport, ResolveError>
where
    P: SimilarityProvider + ?Sized,
    R: ComparisonRenderer,
    C: Console,
{
    let candidates = find_candidates(config, provider)?;
    if candidates.is_empty() {
        console.show("No matching images found.").map_err(SessionError::from)?;
    }

    let mut session = ResolutionSession::new(
        candidates,
        ArchiveStore::new(config.archive_dir()),
        renderer,
        console,
    );
    if config.record_history {
        session = session.with_history(HistoryLog::new(config.history_path()));
    }
    session.run()?;

    let (report, _, _) = session.into_parts();
    Ok(report)
}
