//! End-to-end run: departments × institutions → fetch → repair → walk → merge.
//!
//! Every (institution, department) query is isolated: a transport failure, a
//! payload that cannot be repaired, or a document without an articulation
//! list is logged, counted in [`RunSummary`] and skipped. Nothing a single
//! query does aborts the run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, instrument, warn};

use articulate_assist::AgreementFetcher;
use articulate_decoder::{EquivalenceMap, extract_facts, repair};
use articulate_shared::{
    AgreementKey, ArticulateError, CourseEquivalenceFact, DedupPolicy, DepartmentDirectory,
    Institution, Result, RunConfig,
};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to a single agreement query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The payload was decoded.
    ///
    /// `appended` counts entries added to the department's own partial map.
    /// Under [`DedupPolicy::Distinct`] the run-wide fold may still drop some
    /// of them as repeats of another department; [`RunSummary::facts`] has the
    /// final count.
    Extracted { appended: usize },
    /// The fetch collaborator failed.
    TransportFailed,
    /// The payload could not be repaired into JSON.
    Malformed,
    /// The document had no articulation list.
    SchemaMismatch,
}

/// A finished query, as reported to [`ProgressReporter::query_finished`].
#[derive(Debug, Clone)]
pub struct QueryEvent {
    pub department: String,
    pub institution: String,
    pub outcome: QueryOutcome,
}

/// Per-kind query counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    pub queries: usize,
    pub succeeded: usize,
    pub transport_failures: usize,
    pub malformed: usize,
    pub schema_mismatches: usize,
    /// Queries of a department whose task died before reporting.
    pub lost: usize,
    /// Entries appended to the run's map, after the run-wide dedup.
    pub facts: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: QueryOutcome) {
        self.queries += 1;
        match outcome {
            QueryOutcome::Extracted { appended } => {
                self.succeeded += 1;
                self.facts += appended;
            }
            QueryOutcome::TransportFailed => self.transport_failures += 1,
            QueryOutcome::Malformed => self.malformed += 1,
            QueryOutcome::SchemaMismatch => self.schema_mismatches += 1,
        }
    }

    /// Count `queries` planned queries that never produced an outcome.
    pub fn record_lost(&mut self, queries: usize) {
        self.queries += queries;
        self.lost += queries;
    }

    pub fn failed(&self) -> usize {
        self.transport_failures + self.malformed + self.schema_mismatches + self.lost
    }

    fn absorb(&mut self, other: &RunSummary) {
        self.queries += other.queries;
        self.lost += other.lost;
        self.succeeded += other.succeeded;
        self.transport_failures += other.transport_failures;
        self.malformed += other.malformed;
        self.schema_mismatches += other.schema_mismatches;
    }
}

/// Result of [`run_pipeline`].
#[derive(Debug)]
pub struct RunResult {
    /// The merged equivalence map, ready to persist.
    pub map: EquivalenceMap,
    pub summary: RunSummary,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each agreement query, with a running count.
    fn query_finished(&self, event: &QueryEvent, completed: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn query_finished(&self, _event: &QueryEvent, _completed: usize, _total: usize) {}
    fn done(&self, _result: &RunResult) {}
}

// ---------------------------------------------------------------------------
// Single payload
// ---------------------------------------------------------------------------

/// Repair and walk `raw`, returning its facts in document order.
///
/// Unlike [`ingest_payload`] nothing is deduplicated or grouped.
pub fn decode_payload(raw: &str, institution_name: &str) -> Result<Vec<CourseEquivalenceFact>> {
    let doc = repair(raw)?;
    Ok(extract_facts(&doc, institution_name)?.collect())
}

/// Repair `raw`, walk it, and merge the facts into `map`.
///
/// Returns the number of entries appended. Fails only with
/// [`ArticulateError::MalformedResponse`] or [`ArticulateError::SchemaMismatch`].
pub fn ingest_payload(raw: &str, institution_name: &str, map: &mut EquivalenceMap) -> Result<usize> {
    let doc = repair(raw)?;
    let facts = extract_facts(&doc, institution_name)?;
    Ok(map.merge(facts))
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run every selected department against every sending institution.
///
/// Up to `config.concurrency` departments are in flight at once. Each
/// department builds its own partial map; partial maps are folded into the
/// run's map one at a time, in department-code order, so the output does not
/// depend on scheduling.
#[instrument(skip_all, fields(
    departments = directory.departments.len(),
    institutions = institutions.len(),
    concurrency = config.concurrency,
))]
pub async fn run_pipeline(
    config: &RunConfig,
    directory: &DepartmentDirectory,
    institutions: &[Institution],
    fetcher: Arc<dyn AgreementFetcher>,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();
    let started_at = Utc::now();

    let departments = select_departments(directory, &config.departments)?;
    let total = departments.len() * institutions.len();

    info!(
        year = directory.year,
        receiving = directory.receiving_institution_id,
        departments = departments.len(),
        queries = total,
        dedup = %config.dedup,
        "starting articulation run"
    );
    progress.phase("Querying agreements");

    let institutions: Arc<[Institution]> = institutions.into();
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<QueryEvent>();

    let mut handles = Vec::with_capacity(departments.len());
    for (code, department_id) in departments {
        let job = DepartmentJob {
            code: code.clone(),
            department_id,
            year: directory.year,
            receiving_institution_id: directory.receiving_institution_id,
            policy: config.dedup,
        };
        let task = tokio::spawn(run_department(
            job,
            institutions.clone(),
            fetcher.clone(),
            semaphore.clone(),
            events_tx.clone(),
        ));
        handles.push((code, task));
    }
    drop(events_tx);

    let mut completed = 0;
    while let Some(event) = events_rx.recv().await {
        completed += 1;
        progress.query_finished(&event, completed, total);
    }

    progress.phase("Merging results");
    let mut map = EquivalenceMap::with_policy(config.dedup);
    let mut summary = RunSummary::default();

    for (code, task) in handles {
        match task.await {
            Ok(partial) => {
                summary.absorb(&partial.summary);
                summary.facts += map.absorb(partial.map);
            }
            Err(e) => {
                error!(
                    department = %code,
                    error = %e,
                    lost = institutions.len(),
                    "department task failed, its queries are counted as lost"
                );
                summary.record_lost(institutions.len());
            }
        }
    }

    let result = RunResult {
        map,
        summary,
        started_at,
        elapsed: start.elapsed(),
    };

    info!(
        queries = result.summary.queries,
        succeeded = result.summary.succeeded,
        failed = result.summary.failed(),
        courses = result.map.len(),
        facts = result.summary.facts,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "articulation run complete"
    );
    progress.done(&result);

    Ok(result)
}

/// Resolve the department filter against the directory.
///
/// An empty filter selects every department. Codes match case-insensitively.
fn select_departments(
    directory: &DepartmentDirectory,
    filter: &[String],
) -> Result<Vec<(String, u32)>> {
    if filter.is_empty() {
        return Ok(directory
            .departments
            .iter()
            .map(|(code, id)| (code.clone(), *id))
            .collect());
    }

    let mut selected: Vec<(String, u32)> = Vec::with_capacity(filter.len());
    for wanted in filter {
        let (code, id) = directory
            .departments
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ArticulateError::validation(format!("unknown department code '{wanted}'"))
            })?;
        if !selected.iter().any(|(c, _)| c == code) {
            selected.push((code.clone(), *id));
        }
    }
    selected.sort();
    Ok(selected)
}

// ---------------------------------------------------------------------------
// Department worker
// ---------------------------------------------------------------------------

struct DepartmentJob {
    code: String,
    department_id: u32,
    year: u32,
    receiving_institution_id: u32,
    policy: DedupPolicy,
}

struct DepartmentResult {
    map: EquivalenceMap,
    summary: RunSummary,
}

/// Query one department against every institution, sequentially.
#[instrument(skip_all, fields(department = %job.code))]
async fn run_department(
    job: DepartmentJob,
    institutions: Arc<[Institution]>,
    fetcher: Arc<dyn AgreementFetcher>,
    semaphore: Arc<Semaphore>,
    events: mpsc::UnboundedSender<QueryEvent>,
) -> DepartmentResult {
    let mut result = DepartmentResult {
        map: EquivalenceMap::with_policy(job.policy),
        summary: RunSummary::default(),
    };

    let Ok(_permit) = semaphore.acquire().await else {
        warn!("semaphore closed before department started");
        return result;
    };

    for institution in institutions.iter() {
        let key = AgreementKey {
            year: job.year,
            sending_institution_id: institution.id,
            receiving_institution_id: job.receiving_institution_id,
            department_id: job.department_id,
        };

        let outcome = run_query(fetcher.as_ref(), &key, institution, &mut result.map).await;
        result.summary.record(outcome);

        // The receiver only disappears if the run itself was dropped.
        let _ = events.send(QueryEvent {
            department: job.code.clone(),
            institution: institution.name.clone(),
            outcome,
        });
    }

    debug!(
        queries = result.summary.queries,
        facts = result.summary.facts,
        "department finished"
    );
    result
}

/// Fetch, decode and merge one agreement, classifying any failure.
async fn run_query(
    fetcher: &dyn AgreementFetcher,
    key: &AgreementKey,
    institution: &Institution,
    map: &mut EquivalenceMap,
) -> QueryOutcome {
    let raw = match fetcher.fetch_agreement(key).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(%key, institution = %institution.name, error = %e, "agreement fetch failed, skipping");
            return QueryOutcome::TransportFailed;
        }
    };

    match ingest_payload(&raw, &institution.name, map) {
        Ok(appended) => {
            debug!(%key, institution = %institution.name, appended, "agreement decoded");
            QueryOutcome::Extracted { appended }
        }
        Err(e @ ArticulateError::SchemaMismatch { .. }) => {
            error!(%key, institution = %institution.name, error = %e, "agreement has unexpected shape, skipping");
            QueryOutcome::SchemaMismatch
        }
        Err(e) => {
            warn!(%key, institution = %institution.name, error = %e, "agreement payload malformed, skipping");
            QueryOutcome::Malformed
        }
    }
}
