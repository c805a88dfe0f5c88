use tracing::{debug, info, warn};

use crate::corpus::PromptPicker;
use crate::error::SessionError;
use crate::metrics::{self, Metrics};
use crate::prefs::{AggregateStats, Identity, PreferenceCache};
use crate::runtime::{Generation, Scheduler, TimerLease};
use crate::scores::{AttemptRecord, SaveReport, ScoreUploader};
use crate::session::{Phase, SessionConfig, SessionState, SyncStatus, TickUpdate};
use crate::tier::{Catalog, DifficultyTier, TierId};
use crate::time_series::WpmSample;

/// Receives progress of the attempt as the countdown advances
pub trait SessionObserver {
    fn on_tick(&mut self, _update: &TickUpdate) {}
    fn on_complete(&mut self, _record: &AttemptRecord) {}
}

/// What a call to [`TypingSession::tick`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Stale generation, or no attempt running
    Ignored,
    Ticked(TickUpdate),
    /// The countdown hit zero on this tick
    Completed(TickUpdate, AttemptRecord),
}

/// Collaborators the engine talks to
pub struct SessionPorts {
    pub picker: Box<dyn PromptPicker>,
    pub scheduler: Box<dyn Scheduler>,
    pub prefs: Box<dyn PreferenceCache>,
    pub uploader: ScoreUploader,
}

/// One timed typing attempt at a time: countdown, input capture and scoring
pub struct TypingSession {
    catalog: Catalog,
    config: SessionConfig,
    tier: DifficultyTier,
    phase: Phase,
    state: SessionState,
    timer: Option<TimerLease>,
    generation: Generation,
    identity: Option<Identity>,
    stats: AggregateStats,
    sync: SyncStatus,
    last_record: Option<AttemptRecord>,
    observers: Vec<Box<dyn SessionObserver>>,
    picker: Box<dyn PromptPicker>,
    scheduler: Box<dyn Scheduler>,
    prefs: Box<dyn PreferenceCache>,
    uploader: ScoreUploader,
}

impl TypingSession {
    pub fn new(
        catalog: Catalog,
        config: SessionConfig,
        ports: SessionPorts,
    ) -> Result<Self, SessionError> {
        let tier = validate(&catalog, config.tier, config.duration_secs)?;
        let SessionPorts {
            mut picker,
            scheduler,
            prefs,
            uploader,
        } = ports;

        let prompt = picker.pick(&tier);
        let state = SessionState::new(prompt, config.duration_secs);
        let identity = prefs.identity();
        let stats = prefs.aggregate_stats();
        info!(
            tier = %config.tier,
            duration = config.duration_secs,
            has_identity = identity.is_some(),
            "typing session ready"
        );

        Ok(Self {
            catalog,
            config,
            tier,
            phase: Phase::Idle,
            state,
            timer: None,
            generation: 0,
            identity,
            stats,
            sync: SyncStatus::Idle,
            last_record: None,
            observers: Vec::new(),
            picker,
            scheduler,
            prefs,
            uploader,
        })
    }

    pub fn add_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Change tier and duration. Only accepted while idle.
    pub fn configure(&mut self, tier: TierId, duration_secs: u32) -> Result<(), SessionError> {
        if self.phase != Phase::Idle {
            return Err(SessionError::NotIdle);
        }
        self.tier = validate(&self.catalog, tier, duration_secs)?;
        self.config.tier = tier;
        self.config.duration_secs = duration_secs;
        self.state = SessionState::new(self.picker.pick(&self.tier), duration_secs);
        debug!(%tier, duration = duration_secs, "session configured");
        Ok(())
    }

    /// Begin the countdown without typing. Returns false unless idle.
    pub fn start(&mut self) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.begin(String::new());
        true
    }

    pub fn type_character(&mut self, c: char) {
        match self.phase {
            Phase::Idle => self.begin(c.to_string()),
            Phase::Running => self.state.typed.push(c),
            Phase::Completed => {}
        }
    }

    /// Replace the typed text wholesale
    pub fn set_input(&mut self, text: &str) {
        match self.phase {
            Phase::Idle if !text.is_empty() => self.begin(text.to_string()),
            Phase::Running => self.state.typed = text.to_string(),
            _ => {}
        }
    }

    pub fn backspace(&mut self) {
        if self.phase == Phase::Running {
            self.state.typed.pop();
        }
    }

    /// Abandon any attempt and return to idle with a fresh prompt
    pub fn reset(&mut self) {
        if self.timer.take().is_some() {
            debug!(generation = self.generation, "attempt abandoned");
        }
        self.phase = Phase::Idle;
        self.state = SessionState::new(self.picker.pick(&self.tier), self.config.duration_secs);
    }

    /// Advance the countdown by one second for the given timer generation
    pub fn tick(&mut self, generation: Generation) -> TickOutcome {
        if self.phase != Phase::Running || generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                phase = ?self.phase,
                "ignoring stale tick"
            );
            return TickOutcome::Ignored;
        }

        self.state.remaining_secs = self.state.remaining_secs.saturating_sub(1);
        let elapsed = self.state.elapsed_secs(self.config.duration_secs);
        if let Some(live) = self.score(elapsed) {
            self.state.live = live;
            self.state
                .wpm_samples
                .push(WpmSample::new(elapsed, live.wpm));
        }

        if self.state.remaining_secs == 0 {
            let record = self.complete();
            let update = self.tick_update();
            for observer in self.observers.iter_mut() {
                observer.on_tick(&update);
                observer.on_complete(&record);
            }
            return TickOutcome::Completed(update, record);
        }

        let update = self.tick_update();
        for observer in self.observers.iter_mut() {
            observer.on_tick(&update);
        }
        TickOutcome::Ticked(update)
    }

    /// Store a validated identity for this and later attempts
    pub fn set_identity(&mut self, identity: Identity) -> Result<(), SessionError> {
        identity.validate().map_err(SessionError::InvalidIdentity)?;
        info!(email = %identity.email, "identity set");
        self.identity = Some(identity.clone());
        self.prefs
            .set_identity(&identity)
            .map_err(|e| SessionError::Persist(e.to_string()))
    }

    pub fn set_sessions_target(&mut self, target: u32) {
        if self.stats.sessions_target == target {
            return;
        }
        self.stats.sessions_target = target;
        if let Err(e) = self.prefs.set_aggregate_stats(&self.stats) {
            warn!(error = %e, "failed to persist sessions target");
        }
    }

    /// Fold in the result of a background save of the last attempt
    pub fn apply_save_report(&mut self, report: &SaveReport) {
        let is_last = self
            .last_record
            .as_ref()
            .is_some_and(|r| r.completed_at_ms == report.completed_at_ms);
        if !is_last || self.sync != SyncStatus::Pending {
            debug!(
                completed_at_ms = report.completed_at_ms,
                "save report for an older attempt"
            );
            return;
        }
        self.sync = report.status();
        info!(status = ?self.sync, "leaderboard save finished");
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn tier(&self) -> &DifficultyTier {
        &self.tier
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn stats(&self) -> &AggregateStats {
        &self.stats
    }

    pub fn sync(&self) -> &SyncStatus {
        &self.sync
    }

    pub fn last_record(&self) -> Option<&AttemptRecord> {
        self.last_record.as_ref()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn uploader(&self) -> &ScoreUploader {
        &self.uploader
    }

    fn begin(&mut self, typed: String) {
        self.generation += 1;
        self.phase = Phase::Running;
        self.state.typed = typed;
        self.state.remaining_secs = self.config.duration_secs;
        self.state.is_running = true;
        self.state.live = Metrics::default();
        self.state.wpm_samples.clear();
        self.sync = SyncStatus::Idle;
        self.last_record = None;
        self.timer = Some(self.scheduler.start(self.generation));
        info!(
            generation = self.generation,
            tier = %self.config.tier,
            duration = self.config.duration_secs,
            "attempt started"
        );
    }

    fn score(&self, elapsed_secs: u32) -> Option<Metrics> {
        metrics::compute(
            &self.state.typed,
            &self.state.prompt,
            elapsed_secs,
            self.config.overflow,
        )
    }

    fn tick_update(&self) -> TickUpdate {
        TickUpdate {
            remaining_secs: self.state.remaining_secs,
            live_wpm: self.state.live.wpm,
            live_accuracy: self.state.live.accuracy,
        }
    }

    fn complete(&mut self) -> AttemptRecord {
        self.timer = None;
        self.phase = Phase::Completed;
        self.state.is_running = false;

        let result = self.score(self.config.duration_secs).unwrap_or_default();
        self.state.live = result;

        let tester = self.identity.clone().unwrap_or_else(Identity::anonymous);
        let record = AttemptRecord {
            name: tester.name,
            email: tester.email,
            wpm: result.wpm,
            accuracy: result.accuracy,
            difficulty: self.tier.display_name.clone(),
            duration_secs: self.config.duration_secs,
            completed_at_ms: chrono::Utc::now().timestamp_millis(),
        };

        self.sync = match self.identity {
            Some(_) => self.uploader.submit(record.clone()),
            None => SyncStatus::Skipped,
        };

        self.stats = self.stats.record(result.wpm, result.accuracy);
        if let Err(e) = self.prefs.set_aggregate_stats(&self.stats) {
            warn!(error = %e, "failed to persist aggregate stats");
        }

        info!(
            wpm = record.wpm,
            accuracy = record.accuracy,
            difficulty = %record.difficulty,
            sync = ?self.sync,
            "attempt completed"
        );
        self.last_record = Some(record.clone());
        record
    }
}

fn validate(
    catalog: &Catalog,
    tier: TierId,
    duration_secs: u32,
) -> Result<DifficultyTier, SessionError> {
    let tier = catalog
        .tier(tier)
        .cloned()
        .ok_or(SessionError::UnknownTier(tier))?;
    if !catalog.allows_duration(duration_secs) {
        return Err(SessionError::UnsupportedDuration(duration_secs));
    }
    Ok(tier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::FixedPicker;
    use crate::error::{PrefsError, StoreError};
    use crate::metrics::OverflowPolicy;
    use crate::prefs::MemoryPreferenceCache;
    use crate::runtime::ManualScheduler;
    use crate::scores::{ScoreStore, SqliteScoreStore};
    use assert_matches::assert_matches;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    struct Harness {
        session: TypingSession,
        scheduler: ManualScheduler,
        store: Arc<SqliteScoreStore>,
    }

    fn harness(prompt: &str, identity: Option<Identity>) -> Harness {
        let scheduler = ManualScheduler::new();
        let store = Arc::new(SqliteScoreStore::open_in_memory().unwrap());
        let prefs = match identity {
            Some(identity) => MemoryPreferenceCache::with_identity(identity),
            None => MemoryPreferenceCache::new(),
        };
        let session = TypingSession::new(
            Catalog::default(),
            SessionConfig {
                tier: TierId::Beginner,
                duration_secs: 60,
                overflow: OverflowPolicy::Penalize,
            },
            SessionPorts {
                picker: Box::new(FixedPicker::new(prompt)),
                scheduler: Box::new(scheduler.clone()),
                prefs: Box::new(prefs),
                uploader: ScoreUploader::inline(store.clone()),
            },
        )
        .unwrap();
        Harness {
            session,
            scheduler,
            store,
        }
    }

    fn ada() -> Identity {
        Identity::new("Ada", "ada@example.com")
    }

    fn run_out(session: &mut TypingSession) -> Vec<TickOutcome> {
        let generation = session.generation();
        (0..session.config().duration_secs)
            .map(|_| session.tick(generation))
            .collect()
    }

    #[derive(Default)]
    struct Recorded {
        ticks: Vec<TickUpdate>,
        completions: Vec<AttemptRecord>,
    }

    struct Recorder(Rc<RefCell<Recorded>>);

    impl SessionObserver for Recorder {
        fn on_tick(&mut self, update: &TickUpdate) {
            self.0.borrow_mut().ticks.push(*update);
        }
        fn on_complete(&mut self, record: &AttemptRecord) {
            self.0.borrow_mut().completions.push(record.clone());
        }
    }

    struct FailingStore;

    impl ScoreStore for FailingStore {
        fn save(&self, _record: &AttemptRecord) -> Result<(), StoreError> {
            Err(StoreError::InvalidRecord("backend unavailable".into()))
        }
        fn list_all(&self) -> Result<Vec<AttemptRecord>, StoreError> {
            Ok(Vec::new())
        }
        fn list_by_identity(&self, _email: &str) -> Result<Vec<AttemptRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    struct ReadOnlyPrefs;

    impl PreferenceCache for ReadOnlyPrefs {
        fn identity(&self) -> Option<Identity> {
            Some(ada())
        }
        fn set_identity(&mut self, _identity: &Identity) -> Result<(), PrefsError> {
            Err(PrefsError::Io {
                path: "/nowhere".into(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
        fn aggregate_stats(&self) -> AggregateStats {
            AggregateStats::default()
        }
        fn set_aggregate_stats(&mut self, _stats: &AggregateStats) -> Result<(), PrefsError> {
            Err(PrefsError::Io {
                path: "/nowhere".into(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
    }

    #[test]
    fn test_new_session_is_idle() {
        let h = harness("cat", None);

        assert_eq!(h.session.phase(), Phase::Idle);
        assert_eq!(h.session.state().prompt, "cat");
        assert_eq!(h.session.state().remaining_secs, 60);
        assert!(!h.session.state().is_running);
        assert!(!h.session.has_timer());
        assert_eq!(h.scheduler.started(), 0);
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let ports = || SessionPorts {
            picker: Box::new(FixedPicker::new("cat")),
            scheduler: Box::new(ManualScheduler::new()),
            prefs: Box::new(MemoryPreferenceCache::new()),
            uploader: ScoreUploader::inline(Arc::new(FailingStore)),
        };
        let config = SessionConfig {
            tier: TierId::Beginner,
            duration_secs: 45,
            overflow: OverflowPolicy::Penalize,
        };

        assert_matches!(
            TypingSession::new(Catalog::default(), config, ports()).err(),
            Some(SessionError::UnsupportedDuration(45))
        );

        let only_expert = Catalog::new(
            vec![DifficultyTier::standard_for(TierId::Expert)],
            vec![60],
        );
        let config = SessionConfig {
            tier: TierId::Beginner,
            duration_secs: 60,
            overflow: OverflowPolicy::Penalize,
        };
        assert_matches!(
            TypingSession::new(only_expert, config, ports()).err(),
            Some(SessionError::UnknownTier(TierId::Beginner))
        );
    }

    #[test]
    fn test_first_character_starts_attempt() {
        let mut h = harness("cat", None);
        h.session.type_character('c');

        assert_eq!(h.session.phase(), Phase::Running);
        assert_eq!(h.session.state().typed, "c");
        assert!(h.session.state().is_running);
        assert_eq!(h.session.generation(), 1);
        assert_eq!(h.scheduler.started(), 1);
        assert_eq!(h.scheduler.active(), 1);
    }

    #[test]
    fn test_keystrokes_do_not_restart_timer() {
        let mut h = harness("cat", None);
        h.session.type_character('c');
        h.session.type_character('a');
        h.session.set_input("cab");
        h.session.backspace();

        assert_eq!(h.session.state().typed, "ca");
        assert!(h.session.state().is_running);
        assert_eq!(h.scheduler.started(), 1);
    }

    #[test]
    fn test_explicit_start_has_empty_input() {
        let mut h = harness("cat", None);
        assert!(h.session.start());
        assert!(!h.session.start());

        assert_eq!(h.session.phase(), Phase::Running);
        assert_eq!(h.session.state().typed, "");
        assert_eq!(h.scheduler.started(), 1);
    }

    #[test]
    fn test_empty_set_input_while_idle_does_not_start() {
        let mut h = harness("cat", None);
        h.session.set_input("");
        assert_eq!(h.session.phase(), Phase::Idle);

        h.session.set_input("ca");
        assert_eq!(h.session.phase(), Phase::Running);
        assert_eq!(h.session.state().typed, "ca");
    }

    #[test]
    fn test_backspace_while_idle_is_ignored() {
        let mut h = harness("cat", None);
        h.session.backspace();
        assert_eq!(h.session.phase(), Phase::Idle);
        assert_eq!(h.scheduler.started(), 0);
    }

    #[test]
    fn test_tick_decrements_and_recomputes() {
        let mut h = harness("cat", None);
        h.session.set_input("cat");
        let generation = h.session.generation();

        let outcome = h.session.tick(generation);
        assert_matches!(
            outcome,
            TickOutcome::Ticked(TickUpdate {
                remaining_secs: 59,
                live_wpm: 60,
                live_accuracy: 100,
            })
        );
        for _ in 0..5 {
            h.session.tick(generation);
        }

        // 1 word over 6 seconds
        assert_eq!(h.session.state().remaining_secs, 54);
        assert_eq!(h.session.state().live, Metrics { wpm: 10, accuracy: 100 });
        assert_eq!(h.session.state().wpm_samples.len(), 6);
        assert_eq!(h.session.state().wpm_samples[5], WpmSample::new(6, 10));
    }

    #[test]
    fn test_live_accuracy_counts_mismatches() {
        let mut h = harness("cat", None);
        h.session.set_input("cab");
        h.session.tick(h.session.generation());

        assert_eq!(h.session.state().live.accuracy, 67);
    }

    #[test]
    fn test_completes_exactly_once_after_duration_ticks() {
        let mut h = harness("cat", Some(ada()));
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        h.session.add_observer(Box::new(Recorder(recorded.clone())));
        h.session.start();

        let outcomes = run_out(&mut h.session);
        assert!(outcomes[..59]
            .iter()
            .all(|o| matches!(o, TickOutcome::Ticked(_))));
        let record = match &outcomes[59] {
            TickOutcome::Completed(update, record) => {
                assert_eq!(update.remaining_secs, 0);
                record.clone()
            }
            other => panic!("expected completion, got {other:?}"),
        };

        assert_eq!(record.wpm, 0);
        assert_eq!(record.accuracy, 0);
        assert_eq!(record.difficulty, "Beginner");
        assert_eq!(record.duration_secs, 60);
        assert_eq!(record.email, "ada@example.com");
        assert_eq!(h.session.phase(), Phase::Completed);
        assert!(!h.session.state().is_running);

        // later ticks from the same countdown change nothing
        assert_eq!(h.session.tick(h.session.generation()), TickOutcome::Ignored);

        let recorded = recorded.borrow();
        assert_eq!(recorded.ticks.len(), 60);
        assert_eq!(recorded.completions, vec![record]);
        assert_eq!(h.scheduler.active(), 0);
    }

    #[test]
    fn test_completion_saves_and_updates_stats() {
        let mut h = harness("the cat sat", Some(ada()));
        h.session.set_input("the cat sat");
        run_out(&mut h.session);

        assert_eq!(h.session.sync(), &SyncStatus::Saved);
        let stored = h.store.list_all().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].wpm, 3);
        assert_eq!(stored[0].accuracy, 100);

        let stats = h.session.stats();
        assert_eq!(stats.sessions_completed, 1);
        assert_eq!(stats.average_wpm, 3);
        assert_eq!(stats.average_accuracy, 100);
    }

    #[test]
    fn test_save_failure_keeps_local_stats() {
        let mut session = TypingSession::new(
            Catalog::default(),
            SessionConfig {
                tier: TierId::Expert,
                duration_secs: 30,
                overflow: OverflowPolicy::Penalize,
            },
            SessionPorts {
                picker: Box::new(FixedPicker::new("cat")),
                scheduler: Box::new(ManualScheduler::new()),
                prefs: Box::new(MemoryPreferenceCache::with_identity(ada())),
                uploader: ScoreUploader::inline(Arc::new(FailingStore)),
            },
        )
        .unwrap();
        session.set_input("cat");
        run_out(&mut session);

        assert_eq!(session.phase(), Phase::Completed);
        assert_matches!(session.sync(), SyncStatus::Failed(reason) if reason.contains("backend unavailable"));
        assert_eq!(session.stats().sessions_completed, 1);
        assert_eq!(session.stats().average_wpm, 2);
    }

    #[test]
    fn test_prefs_write_failure_is_not_fatal() {
        let mut session = TypingSession::new(
            Catalog::default(),
            SessionConfig {
                tier: TierId::Beginner,
                duration_secs: 30,
                overflow: OverflowPolicy::Penalize,
            },
            SessionPorts {
                picker: Box::new(FixedPicker::new("cat")),
                scheduler: Box::new(ManualScheduler::new()),
                prefs: Box::new(ReadOnlyPrefs),
                uploader: ScoreUploader::inline(Arc::new(SqliteScoreStore::open_in_memory().unwrap())),
            },
        )
        .unwrap();
        session.start();
        run_out(&mut session);

        assert_eq!(session.phase(), Phase::Completed);
        assert_eq!(session.stats().sessions_completed, 1);
        assert_matches!(
            session.set_identity(Identity::new("Bo", "bo@x.io")),
            Err(SessionError::Persist(_))
        );
        assert_eq!(session.identity().map(|i| i.name.as_str()), Some("Bo"));
    }

    #[test]
    fn test_completion_without_identity_is_skipped() {
        let mut h = harness("cat", None);
        h.session.set_input("cat");
        let outcomes = run_out(&mut h.session);

        assert_matches!(outcomes.last(), Some(TickOutcome::Completed(_, record)) if record.name == "Anonymous");
        assert_eq!(h.session.sync(), &SyncStatus::Skipped);
        assert!(h.store.list_all().unwrap().is_empty());
        assert_eq!(h.session.stats().sessions_completed, 1);
    }

    #[test]
    fn test_reset_from_running_releases_timer() {
        let mut h = harness("cat", Some(ada()));
        h.session.set_input("ca");
        let stale = h.session.generation();
        h.session.tick(stale);

        h.session.reset();
        assert_eq!(h.session.phase(), Phase::Idle);
        assert_eq!(h.session.state().typed, "");
        assert_eq!(h.session.state().remaining_secs, 60);
        assert!(!h.session.state().is_running);
        assert!(!h.session.has_timer());
        assert_eq!(h.scheduler.active(), 0);

        // a tick already queued for the abandoned attempt is ignored
        assert_eq!(h.session.tick(stale), TickOutcome::Ignored);
        assert_eq!(h.session.state().remaining_secs, 60);
        assert!(h.session.last_record().is_none());
        assert!(h.store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_stale_generation_ignored_in_new_attempt() {
        let mut h = harness("cat", None);
        h.session.start();
        let first = h.session.generation();
        h.session.reset();
        h.session.start();

        assert_ne!(h.session.generation(), first);
        assert_eq!(h.session.tick(first), TickOutcome::Ignored);
        assert_eq!(h.session.state().remaining_secs, 60);
        assert_matches!(h.session.tick(h.session.generation()), TickOutcome::Ticked(_));
        assert_eq!(h.scheduler.started(), 2);
        assert_eq!(h.scheduler.active(), 1);
    }

    #[test]
    fn test_reset_after_completion() {
        let mut h = harness("cat", None);
        h.session.start();
        run_out(&mut h.session);
        h.session.type_character('x');
        assert_eq!(h.session.state().typed, "");

        h.session.reset();
        assert_eq!(h.session.phase(), Phase::Idle);
        assert_eq!(h.session.state().remaining_secs, 60);
        assert!(h.session.state().wpm_samples.is_empty());
    }

    #[test]
    fn test_configure_only_while_idle() {
        let mut h = harness("cat", None);
        h.session.configure(TierId::Expert, 90).unwrap();
        assert_eq!(h.session.config().tier, TierId::Expert);
        assert_eq!(h.session.tier().display_name, "Expert");
        assert_eq!(h.session.state().remaining_secs, 90);

        h.session.start();
        assert_eq!(
            h.session.configure(TierId::Beginner, 60),
            Err(SessionError::NotIdle)
        );
        assert_eq!(h.session.config().tier, TierId::Expert);

        let generation = h.session.generation();
        for _ in 0..90 {
            h.session.tick(generation);
        }
        assert_eq!(h.session.phase(), Phase::Completed);
        assert_eq!(
            h.session.configure(TierId::Beginner, 60),
            Err(SessionError::NotIdle)
        );
    }

    #[test]
    fn test_configure_rejects_unknown_duration() {
        let mut h = harness("cat", None);
        assert_eq!(
            h.session.configure(TierId::Beginner, 61),
            Err(SessionError::UnsupportedDuration(61))
        );
        assert_eq!(h.session.config().duration_secs, 60);
    }

    #[test]
    fn test_clamp_policy_ignores_overflow() {
        let mut h = harness("cat", None);
        h.session.config.overflow = OverflowPolicy::Clamp;
        h.session.set_input("catss");
        h.session.tick(h.session.generation());
        assert_eq!(h.session.state().live.accuracy, 100);
    }

    #[test]
    fn test_set_identity_validates() {
        let mut h = harness("cat", None);
        assert_matches!(
            h.session.set_identity(Identity::new("", "a@b")),
            Err(SessionError::InvalidIdentity(_))
        );
        assert!(h.session.identity().is_none());

        h.session.set_identity(ada()).unwrap();
        assert_eq!(h.session.identity(), Some(&ada()));
    }

    #[test]
    fn test_apply_save_report_only_for_pending_last_attempt() {
        let (tx, _rx) = std::sync::mpsc::channel();
        let mut session = TypingSession::new(
            Catalog::default(),
            SessionConfig {
                tier: TierId::Beginner,
                duration_secs: 30,
                overflow: OverflowPolicy::Penalize,
            },
            SessionPorts {
                picker: Box::new(FixedPicker::new("cat")),
                scheduler: Box::new(ManualScheduler::new()),
                prefs: Box::new(MemoryPreferenceCache::with_identity(ada())),
                uploader: ScoreUploader::background(
                    Arc::new(SqliteScoreStore::open_in_memory().unwrap()),
                    tx,
                ),
            },
        )
        .unwrap();
        session.start();
        run_out(&mut session);
        assert_eq!(session.sync(), &SyncStatus::Pending);

        let completed_at_ms = session.last_record().unwrap().completed_at_ms;
        session.apply_save_report(&SaveReport {
            completed_at_ms: completed_at_ms - 1,
            result: Ok(()),
        });
        assert_eq!(session.sync(), &SyncStatus::Pending);

        session.apply_save_report(&SaveReport {
            completed_at_ms,
            result: Err("offline".into()),
        });
        assert_eq!(session.sync(), &SyncStatus::Failed("offline".into()));
    }

    #[test]
    fn test_sessions_target() {
        let mut h = harness("cat", None);
        h.session.set_sessions_target(25);
        assert_eq!(h.session.stats().sessions_target, 25);
    }

    #[test]
    fn test_drop_releases_timer() {
        let h = harness("cat", None);
        let scheduler = h.scheduler.clone();
        let mut session = h.session;
        session.start();
        assert_eq!(scheduler.active(), 1);

        drop(session);
        assert_eq!(scheduler.active(), 0);
    }
}
