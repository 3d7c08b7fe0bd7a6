//! # Stage Supervisor
//!
//! Owns the single-instance lock and the run loop of one stage.
//!
//! - `start` acquires the lock without blocking; a second start while a run
//!   is live fails with [`PipelineError::LockConflict`].
//! - Settings are loaded and the stage plan is prepared before the run task
//!   is spawned, so configuration problems are reported to the caller.
//! - An interval of zero runs a single pass. Otherwise passes repeat with a
//!   sleep in between, cut into ticks so a stop request lands within one tick.
//! - The lock is released by a drop guard, on every exit path of the run
//!   task including a panic inside the stage.
//!
//! `force_unlock` is the operator escape hatch for a run that never
//! finishes: it cancels the run's token and bumps the generation so the
//! detached run can no longer touch the stage state.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::run::{RunId, RunMode, StagePhase, StageStatus};
use crate::stage::{CycleContext, Stage};
use crate::stats::{CycleStats, RunReport};
use chrono::{DateTime, Utc};
use core_async::sync::CancellationToken;
use core_async::task::{self, JoinHandle};
use core_async::time::{sleep_or_cancel, Duration, Instant};
use core_runtime::{ActivityLog, Settings, SettingsSource};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, instrument};

#[derive(Debug)]
struct StageState {
    phase: StagePhase,
    generation: u64,
    token: Option<CancellationToken>,
    current_run: Option<RunId>,
    last_run: Option<DateTime<Utc>>,
}

impl Default for StageState {
    fn default() -> Self {
        Self {
            phase: StagePhase::Idle,
            generation: 0,
            token: None,
            current_run: None,
            last_run: None,
        }
    }
}

fn lock(state: &Mutex<StageState>) -> MutexGuard<'_, StageState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Releases the stage when the run that acquired it ends.
struct RunGuard {
    state: Arc<Mutex<StageState>>,
    generation: u64,
    ran: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        // A force unlock moved on to a newer generation.
        if state.generation != self.generation {
            return;
        }
        state.phase = StagePhase::Idle;
        state.token = None;
        state.current_run = None;
        if self.ran {
            state.last_run = Some(Utc::now());
        }
    }
}

/// Handle to a spawned run. Await [`RunHandle::wait`] for the report, or
/// drop it to detach.
#[derive(Debug)]
pub struct RunHandle<S> {
    run_id: RunId,
    stage: &'static str,
    handle: JoinHandle<RunReport<S>>,
}

impl<S> RunHandle<S> {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end.
    ///
    /// A panic inside the stage surfaces as [`PipelineError::Task`]; the
    /// stage lock has already been released by then.
    pub async fn wait(self) -> Result<RunReport<S>> {
        self.handle
            .await
            .map_err(|e| PipelineError::Task(format!("{} run ended abnormally: {}", self.stage, e)))
    }
}

pub struct StageSupervisor<S: Stage> {
    stage: Arc<S>,
    settings: Arc<dyn SettingsSource>,
    activity: ActivityLog,
    config: PipelineConfig,
    state: Arc<Mutex<StageState>>,
}

impl<S: Stage> StageSupervisor<S> {
    pub fn new(
        stage: S,
        settings: Arc<dyn SettingsSource>,
        activity: ActivityLog,
        config: PipelineConfig,
    ) -> Self {
        Self {
            stage: Arc::new(stage),
            settings,
            activity: activity.scoped(S::NAME),
            config,
            state: Arc::new(Mutex::new(StageState::default())),
        }
    }

    pub fn name(&self) -> &'static str {
        S::NAME
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    /// Start a run. A zero `interval` performs exactly one pass.
    pub async fn start(&self, interval: Duration) -> Result<RunHandle<S::Stats>> {
        self.start_inner(Some(interval)).await
    }

    /// Start a run using the interval from the current settings.
    pub async fn start_configured(&self) -> Result<RunHandle<S::Stats>> {
        self.start_inner(None).await
    }

    /// Run a single pass and wait for its report.
    pub async fn run_once(&self) -> Result<RunReport<S::Stats>> {
        self.start(Duration::ZERO).await?.wait().await
    }

    #[instrument(skip(self), fields(stage = S::NAME))]
    async fn start_inner(&self, interval: Option<Duration>) -> Result<RunHandle<S::Stats>> {
        let Some((guard, token, run_id)) = self.try_acquire() else {
            self.activity
                .info(format!("{} is already running", S::NAME))
                .await;
            return Err(PipelineError::LockConflict {
                stage: S::NAME.to_string(),
            });
        };

        let activity = self.activity.clone().with_span_id(run_id.to_string());

        // On failure the guard drops here and releases the stage.
        let (plan, interval) = match self.load_plan(interval).await {
            Ok(prepared) => prepared,
            Err(err) => {
                activity
                    .error(format!("{} run aborted", S::NAME), err.to_string())
                    .await;
                return Err(err);
            }
        };

        let ctx = CycleContext {
            run_id,
            mode: RunMode::from_interval(interval),
            token,
            activity,
        };
        let stage = Arc::clone(&self.stage);
        let tick = self.config.tick;

        let handle = task::spawn(async move {
            let mut guard = guard;
            guard.ran = true;
            run_loop(stage, plan, ctx, interval, tick).await
        });

        Ok(RunHandle {
            run_id,
            stage: S::NAME,
            handle,
        })
    }

    fn try_acquire(&self) -> Option<(RunGuard, CancellationToken, RunId)> {
        let mut state = lock(&self.state);
        if state.phase.is_active() {
            return None;
        }

        let token = CancellationToken::new();
        let run_id = RunId::new();
        state.generation += 1;
        state.phase = StagePhase::Running;
        state.token = Some(token.clone());
        state.current_run = Some(run_id);

        let guard = RunGuard {
            state: Arc::clone(&self.state),
            generation: state.generation,
            ran: false,
        };
        Some((guard, token, run_id))
    }

    async fn load_plan(&self, interval: Option<Duration>) -> Result<(S::Plan, Duration)> {
        let settings: Settings = self.settings.load().await?.ok_or_else(|| {
            PipelineError::Validation("Connection settings are not configured".to_string())
        })?;
        settings.validate()?;
        let plan = self.stage.prepare(&settings)?;
        Ok((plan, interval.unwrap_or_else(|| S::interval(&settings))))
    }

    /// Ask the live run to stop after its current item.
    pub async fn request_stop(&self) -> Result<()> {
        let newly_requested = {
            let mut state = lock(&self.state);
            match state.phase {
                StagePhase::Idle => None,
                StagePhase::StopRequested => Some(false),
                StagePhase::Running => {
                    state.phase = StagePhase::StopRequested;
                    if let Some(token) = &state.token {
                        token.cancel();
                    }
                    Some(true)
                }
            }
        };

        match newly_requested {
            None => Err(PipelineError::NotRunning {
                stage: S::NAME.to_string(),
            }),
            Some(true) => {
                self.activity
                    .info(format!("Stop requested for {}", S::NAME))
                    .await;
                Ok(())
            }
            Some(false) => Ok(()),
        }
    }

    pub fn status(&self) -> StageStatus {
        let state = lock(&self.state);
        StageStatus {
            stage: S::NAME,
            phase: state.phase,
            running: state.phase.is_active(),
            stop_requested: state.phase == StagePhase::StopRequested,
            current_run: state.current_run,
            last_run: state.last_run,
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).phase.is_active()
    }

    /// Release the lock regardless of the run's state.
    ///
    /// Returns `true` if a run was detached.
    pub async fn force_unlock(&self) -> bool {
        let detached = {
            let mut state = lock(&self.state);
            let detached = state.current_run.take();
            if let Some(token) = state.token.take() {
                token.cancel();
            }
            state.generation += 1;
            state.phase = StagePhase::Idle;
            detached
        };

        let detail = match detached {
            Some(run_id) => format!("detached run {run_id}"),
            None => "stage was idle".to_string(),
        };
        self.activity
            .warn(format!("{} lock forcibly released", S::NAME), detail)
            .await;
        detached.is_some()
    }
}

#[instrument(skip_all, fields(stage = S::NAME, run_id = %ctx.run_id, mode = ?ctx.mode))]
async fn run_loop<S: Stage>(
    stage: Arc<S>,
    plan: S::Plan,
    ctx: CycleContext,
    interval: Duration,
    tick: Duration,
) -> RunReport<S::Stats> {
    let started_at = Utc::now();
    let mut stats = S::Stats::default();
    let mut cycles = 0u64;

    ctx.activity.info(format!("{} started", S::NAME)).await;

    'run: loop {
        if ctx.is_cancelled() {
            break;
        }

        if ctx.mode == RunMode::Watch {
            while !stage.ready(&plan, &ctx).await {
                if !sleep_or_cancel(tick, &ctx.token).await {
                    break 'run;
                }
            }
        }

        match stage.run_cycle(&plan, &ctx).await {
            Ok(cycle) => {
                cycles += 1;
                if ctx.mode == RunMode::OneShot || cycle.did_work() {
                    ctx.activity
                        .info_with(format!("{} cycle finished", S::NAME), cycle.summary())
                        .await;
                } else {
                    debug!(summary = %cycle.summary(), "Cycle found nothing to do");
                }
                stats.absorb(cycle);
            }
            Err(PipelineError::Cancelled) => break,
            Err(err) => {
                ctx.activity
                    .error(format!("{} cycle failed", S::NAME), err.to_string())
                    .await;
            }
        }

        if ctx.mode == RunMode::OneShot {
            break;
        }
        if !wait_interval(interval, tick, &ctx.token).await {
            break;
        }
    }

    let stopped_by_request = ctx.is_cancelled();
    ctx.activity
        .info_with(
            if stopped_by_request {
                format!("{} stopped", S::NAME)
            } else {
                format!("{} finished", S::NAME)
            },
            stats.summary(),
        )
        .await;

    RunReport {
        run_id: ctx.run_id,
        cycles,
        stats,
        stopped_by_request,
        started_at,
        finished_at: Utc::now(),
    }
}

/// Sleep `interval` in `tick` steps. `false` if the token fired.
async fn wait_interval(interval: Duration, tick: Duration, token: &CancellationToken) -> bool {
    let deadline = Instant::now() + interval;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        if !sleep_or_cancel((deadline - now).min(tick), token).await {
            return false;
        }
    }
}
