//! CLI route: builds the runtime context and dispatches each command to the engine.

use super::parse::{Cli, Commands, FilterArgs};
use super::presentation::{
    format_config, format_dispatch_json, format_dispatch_text, format_listing_json, format_listing_text,
    format_record_text,
};
use crate::access::{ReviewerIdentity, ReviewerRole};
use crate::config::{ConfigLoader, DocketConfig, RefreshConfig};
use crate::engine::{DispatchOutcome, QueueEngine};
use crate::error::{AppError, QueueError};
use crate::record::{CanonicalRecord, RecordStatus};
use crate::refresh::RefreshOutcome;
use crate::review::ReviewAction;
use crate::store::{HttpQueueStore, InMemoryQueueStore, QueueStore};
use crate::types::{QueueKind, ScopeKey};
use crate::view::{QueueFilters, SortKey};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How often `watch` checks for a newly published snapshot
const WATCH_POLL: Duration = Duration::from_millis(250);

/// Runtime context for CLI execution: config, reviewer and store.
pub struct RunContext {
    config: DocketConfig,
    reviewer: ReviewerIdentity,
    store: Arc<dyn QueueStore>,
    json: bool,
}

/// Load configuration from `--config` or the workspace layers, then validate it
pub fn load_config(cli: &Cli) -> Result<DocketConfig, AppError> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load(&cli.workspace)?,
    };
    config.ensure_valid()?;
    Ok(config)
}

/// Run one parsed command line to completion
pub async fn run(cli: &Cli) -> Result<String, AppError> {
    if let Commands::Config = cli.command {
        // Needs no reviewer and no store
        return Ok(format_config(&load_config(cli)?)?);
    }
    let context = RunContext::new(cli)?;
    context.execute(&cli.command).await
}

impl RunContext {
    pub fn new(cli: &Cli) -> Result<Self, AppError> {
        let config = load_config(cli)?;

        let reviewer = resolve_reviewer(cli, &config)?;
        let store: Arc<dyn QueueStore> = match &cli.seed {
            Some(path) => Arc::new(load_fixture(path)?),
            None => Arc::new(HttpQueueStore::from_config(&config.store).map_err(QueueError::from)?),
        };
        info!(
            reviewer = %reviewer.id,
            role = reviewer.role.as_str(),
            store = store.store_name(),
            "CLI context initialized"
        );

        Ok(Self {
            config,
            reviewer,
            store,
            json: cli.json,
        })
    }

    /// Context over an existing store, for embedding and tests
    pub fn with_store(
        config: DocketConfig,
        reviewer: ReviewerIdentity,
        store: Arc<dyn QueueStore>,
        json: bool,
    ) -> Self {
        Self {
            config,
            reviewer,
            store,
            json,
        }
    }

    pub fn reviewer(&self) -> &ReviewerIdentity {
        &self.reviewer
    }

    fn engine(&self, kind: QueueKind, refresh: RefreshConfig) -> QueueEngine {
        QueueEngine::new(kind, Arc::clone(&self.store), refresh)
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, AppError> {
        match command {
            Commands::List { queue, filters } => self.handle_list(*queue, filters).await,
            Commands::Watch {
                queue,
                filters,
                interval_secs,
                cycles,
            } => {
                self.handle_watch(*queue, filters, *interval_secs, *cycles)
                    .await
            }
            Commands::Show { queue, id } => self.handle_show(*queue, id).await,
            Commands::Transition { queue, id, to } => {
                let to = parse_status(*queue, to)?;
                self.handle_dispatch(*queue, id, ReviewAction::Transition { to })
                    .await
            }
            Commands::Answer { queue, id, text } => {
                self.handle_dispatch(*queue, id, ReviewAction::AppendAnswer { text: text.clone() })
                    .await
            }
            Commands::Review {
                queue,
                id,
                outcome,
                note,
            } => {
                let outcome = parse_status(*queue, outcome)?;
                self.handle_dispatch(
                    *queue,
                    id,
                    ReviewAction::Review {
                        outcome,
                        note: note.clone(),
                    },
                )
                .await
            }
            Commands::Config => Ok(format_config(&self.config)?),
        }
    }

    async fn handle_list(&self, kind: QueueKind, args: &FilterArgs) -> Result<String, AppError> {
        let filters = build_filters(kind, args)?;
        let engine = self.engine(kind, self.config.refresh.clone());
        if let RefreshOutcome::Failed { kind: error, .. } = engine.refresh().await {
            let state = engine.output();
            return Err(AppError::Refresh {
                kind: error,
                message: state.error_message.unwrap_or_default(),
            });
        }
        let records = engine.visible(&self.reviewer, &filters);
        self.render_listing(&engine, &records)
    }

    async fn handle_watch(
        &self,
        kind: QueueKind,
        args: &FilterArgs,
        interval_secs: Option<u64>,
        cycles: Option<usize>,
    ) -> Result<String, AppError> {
        self.watch_until(kind, args, interval_secs, cycles, tokio::signal::ctrl_c())
            .await
    }

    /// Print each newly published listing until `cycles` updates or `stop` resolves
    async fn watch_until<F: Future>(
        &self,
        kind: QueueKind,
        args: &FilterArgs,
        interval_secs: Option<u64>,
        cycles: Option<usize>,
        stop: F,
    ) -> Result<String, AppError> {
        let filters = build_filters(kind, args)?;
        let mut refresh = self.config.refresh.clone();
        if let Some(secs) = interval_secs {
            refresh.interval_secs = secs.max(1);
        }
        let engine = self.engine(kind, refresh);
        let polling = engine.start_polling();

        let mut ticker = tokio::time::interval(WATCH_POLL);
        tokio::pin!(stop);
        let mut last_seen = None;
        let mut printed = 0usize;
        loop {
            tokio::select! {
                _ = &mut stop => {
                    debug!("Interrupted; stopping watch");
                    break;
                }
                _ = ticker.tick() => {}
            }
            let state = engine.output();
            let marker = (state.snapshot.version(), state.error);
            if state.last_refreshed_at.is_none() && state.error.is_none() {
                continue;
            }
            if last_seen == Some(marker) {
                continue;
            }
            last_seen = Some(marker);
            let records = engine.visible(&self.reviewer, &filters);
            println!("{}", self.render_listing(&engine, &records)?);
            printed += 1;
            if cycles.is_some_and(|limit| printed >= limit) {
                break;
            }
        }
        polling.stop();
        Ok(format!("Stopped watching {} after {} update(s)", kind, printed))
    }

    async fn handle_show(&self, kind: QueueKind, id: &str) -> Result<String, AppError> {
        let engine = self.engine(kind, self.config.refresh.clone());
        let record = engine.record(&self.reviewer, id).await?;
        self.render_record(&record)
    }

    async fn handle_dispatch(
        &self,
        kind: QueueKind,
        id: &str,
        action: ReviewAction,
    ) -> Result<String, AppError> {
        let engine = self.engine(kind, self.config.refresh.clone());
        let outcome = engine.dispatch(&self.reviewer, id, action).await?;
        self.render_dispatch(&outcome)
    }

    fn render_listing(&self, engine: &QueueEngine, records: &[CanonicalRecord]) -> Result<String, AppError> {
        let state = engine.output();
        if self.json {
            Ok(format_listing_json(engine.kind(), &state, records)?)
        } else {
            Ok(format_listing_text(engine.kind(), &state, records))
        }
    }

    fn render_record(&self, record: &CanonicalRecord) -> Result<String, AppError> {
        if self.json {
            Ok(serde_json::to_string_pretty(record)?)
        } else {
            Ok(format_record_text(record))
        }
    }

    fn render_dispatch(&self, outcome: &DispatchOutcome) -> Result<String, AppError> {
        if self.json {
            Ok(format_dispatch_json(outcome)?)
        } else {
            Ok(format_dispatch_text(outcome))
        }
    }
}

/// Reviewer from flags, falling back to the configured reviewer
fn resolve_reviewer(cli: &Cli, config: &DocketConfig) -> Result<ReviewerIdentity, AppError> {
    let mut reviewer = match (&cli.reviewer_id, &config.reviewer) {
        (Some(id), _) => ReviewerIdentity::scoped(id.trim(), Vec::<ScopeKey>::new()),
        (None, Some(configured)) => configured.identity(),
        (None, None) => {
            return Err(AppError::Usage(
                "no reviewer configured; set [reviewer] in config or pass --reviewer-id"
                    .to_string(),
            ))
        }
    };
    if reviewer.id.is_empty() {
        return Err(AppError::Usage("reviewer id cannot be empty".to_string()));
    }
    if let Some(role) = &cli.role {
        reviewer.role = ReviewerRole::parse(role)
            .ok_or_else(|| AppError::Usage(format!("unknown reviewer role '{}'", role)))?;
    }
    if !cli.scopes.is_empty() {
        reviewer.scopes = cli
            .scopes
            .iter()
            .map(|scope| ScopeKey::new(scope.trim()))
            .collect();
    }
    Ok(reviewer)
}

fn load_fixture(path: &Path) -> Result<InMemoryQueueStore, AppError> {
    let content = std::fs::read_to_string(path)?;
    let fixture: serde_json::Value = serde_json::from_str(&content)?;
    Ok(InMemoryQueueStore::from_fixture(&fixture).map_err(QueueError::from)?)
}

fn parse_status(kind: QueueKind, value: &str) -> Result<RecordStatus, AppError> {
    RecordStatus::parse(kind, value).ok_or_else(|| {
        let expected: Vec<&str> = RecordStatus::all(kind)
            .into_iter()
            .map(RecordStatus::as_wire)
            .collect();
        AppError::Usage(format!(
            "unknown {} status '{}' (expected one of: {})",
            kind,
            value,
            expected.join(", ")
        ))
    })
}

fn build_filters(kind: QueueKind, args: &FilterArgs) -> Result<QueueFilters, AppError> {
    let sort = SortKey::parse(&args.sort)
        .ok_or_else(|| AppError::Usage(format!("unknown sort key '{}'", args.sort)))?;
    let status = args
        .status
        .as_deref()
        .map(|status| parse_status(kind, status))
        .transpose()?;
    Ok(QueueFilters {
        search: args.search.clone(),
        status,
        sort,
    })
}
