//! Lifecycle shared by every recurring job.
//!
//! Each job kind is a record stored under its own key that embeds a
//! [`JobLifecycle`]. The free functions here drive the state machine
//! (`Disabled -> Enabled -> Paused/Completed`) and own the pending
//! schedule handle, so a job never holds more than one armed tick.

use soroban_sdk::{contracttype, Bytes, Env, String, Symbol};

use crate::clock;
use crate::error::VaultError;
use crate::events::{JobEvent, ScheduleEvent, JOB, SCHEDULE};
use crate::gas::{self, OperationKind};
use crate::scheduler::{self, Frequency};

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum JobStatus {
    Disabled = 0,
    Enabled = 1,
    Paused = 2,
    Completed = 3,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum JobKind {
    Purchase = 1,
    PullDeposit = 2,
    Savings = 3,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum PauseReason {
    /// The job is not paused
    None = 0,
    Manual = 1,
    GasExhausted = 2,
    SystemicFailure = 3,
    MaxRetries = 4,
    ScheduleRejected = 5,
    AmountOverflow = 6,
}

/// Result of one deferred tick.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum TickOutcome {
    Executed = 1,
    PartialFailure = 2,
    /// Nothing was done; the next tick is armed
    Deferred = 3,
    RetryScheduled = 4,
    Completed = 5,
    Paused = 6,
    /// The vault is globally paused; the tick was absorbed and re-armed
    Skipped = 7,
    /// The action failed transiently; the next regular tick is armed
    Failed = 8,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobLifecycle {
    pub status: JobStatus,
    pub frequency: Frequency,
    pub start_time: u64,
    /// 0 for open-ended jobs
    pub end_time: u64,
    /// 0 uses the operation estimate
    pub gas_per_execution: u64,
    pub next_execution_time: u64,
    pub schedule_handle: Option<String>,
    pub pause_reason: PauseReason,
}

impl JobLifecycle {
    pub fn new(frequency: Frequency, start_time: u64, end_time: u64, gas_per_execution: u64) -> Self {
        JobLifecycle {
            status: JobStatus::Disabled,
            frequency,
            start_time,
            end_time,
            gas_per_execution,
            next_execution_time: 0,
            schedule_handle: None,
            pause_reason: PauseReason::None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == JobStatus::Enabled
    }

    /// True once `now_ms` has reached the job's end.
    pub fn is_past_end(&self, now_ms: u64) -> bool {
        self.end_time > 0 && now_ms >= self.end_time
    }
}

/// Validate the timing half of a job configuration.
pub fn validate_window(env: &Env, start_time: u64, end_time: u64) -> Result<(), VaultError> {
    if start_time <= clock::now_ms(env) {
        return Err(VaultError::InvalidConfig);
    }
    if end_time != 0 && end_time <= start_time {
        return Err(VaultError::InvalidConfig);
    }
    Ok(())
}

pub trait RecurringJob: Sized {
    const KIND: JobKind;
    /// Function name the job's deferred calls carry.
    const ENTRY_POINT: Symbol;
    const OPERATION: OperationKind;

    fn lifecycle(&self) -> &JobLifecycle;
    fn lifecycle_mut(&mut self) -> &mut JobLifecycle;

    fn load(env: &Env) -> Option<Self>;
    fn save(&self, env: &Env);

    /// Hook run when a paused job is resumed.
    fn on_resume(&mut self) {}
}

pub fn load_required<J: RecurringJob>(env: &Env) -> Result<J, VaultError> {
    J::load(env).ok_or(VaultError::JobNotFound)
}

/// Fail with `JobAlreadyActive` while a job of this kind is running.
pub fn ensure_not_active<J: RecurringJob>(env: &Env) -> Result<(), VaultError> {
    match J::load(env) {
        Some(job) if job.lifecycle().is_enabled() => Err(VaultError::JobAlreadyActive),
        _ => Ok(()),
    }
}

fn arm_at<J: RecurringJob>(env: &Env, job: &mut J, target_ms: u64) -> Result<(), VaultError> {
    let limit = gas::call_limit(J::OPERATION, job.lifecycle().gas_per_execution);
    let handle = scheduler::arm(env, &J::ENTRY_POINT, Bytes::new(env), target_ms, limit, 0)?;

    let lifecycle = job.lifecycle_mut();
    lifecycle.next_execution_time = target_ms;
    lifecycle.schedule_handle = Some(handle);
    Ok(())
}

/// Enable a freshly configured job and arm its first tick at `start_time`.
pub fn start<J: RecurringJob>(env: &Env, mut job: J) -> Result<J, VaultError> {
    let start_time = job.lifecycle().start_time;
    arm_at(env, &mut job, start_time)?;

    let lifecycle = job.lifecycle_mut();
    lifecycle.status = JobStatus::Enabled;
    lifecycle.pause_reason = PauseReason::None;
    job.save(env);

    env.events()
        .publish((JOB, JobEvent::Started), (J::KIND, start_time));
    Ok(job)
}

/// Cancel the pending tick and park the job.
pub fn pause<J: RecurringJob>(env: &Env) -> Result<J, VaultError> {
    let mut job: J = load_required(env)?;
    if !job.lifecycle().is_enabled() {
        return Err(VaultError::JobNotActive);
    }

    if let Some(handle) = job.lifecycle().schedule_handle.clone() {
        if scheduler::is_armed(env, &handle)? {
            scheduler::disarm(env, &handle)?;
        }
    }

    let lifecycle = job.lifecycle_mut();
    lifecycle.status = JobStatus::Paused;
    lifecycle.pause_reason = PauseReason::Manual;
    lifecycle.schedule_handle = None;
    job.save(env);

    env.events()
        .publish((JOB, JobEvent::Paused), (J::KIND, PauseReason::Manual));
    Ok(job)
}

/// Re-enable a paused job, arming from the current time.
pub fn resume<J: RecurringJob>(env: &Env) -> Result<J, VaultError> {
    let mut job: J = load_required(env)?;
    if job.lifecycle().status != JobStatus::Paused {
        return Err(VaultError::JobNotPaused);
    }

    let now = clock::now_ms(env);
    let lifecycle = job.lifecycle();
    let target = if now < lifecycle.start_time {
        lifecycle.start_time
    } else {
        scheduler::next_occurrence(lifecycle.frequency, now)
    };

    job.on_resume();
    arm_at(env, &mut job, target)?;

    let lifecycle = job.lifecycle_mut();
    lifecycle.status = JobStatus::Enabled;
    lifecycle.pause_reason = PauseReason::None;
    job.save(env);

    env.events()
        .publish((JOB, JobEvent::Resumed), (J::KIND, target));
    Ok(job)
}

/// Load the job a claimed call belongs to. The call must be the one the job
/// is currently waiting on; its handle is cleared because the host has
/// already consumed it.
pub fn begin_tick<J: RecurringJob>(env: &Env, call_id: &String) -> Result<J, VaultError> {
    let mut job = J::load(env).ok_or(VaultError::UnauthorizedInvocation)?;
    let lifecycle = job.lifecycle_mut();
    if lifecycle.status != JobStatus::Enabled
        || lifecycle.schedule_handle.as_ref() != Some(call_id)
    {
        return Err(VaultError::UnauthorizedInvocation);
    }
    lifecycle.schedule_handle = None;
    Ok(job)
}

/// Timing checks run before a claimed tick does any work. A call released
/// ahead of the job's scheduled time is re-armed for that time; a tick at or
/// past the end time completes the job.
pub fn check_timing<J: RecurringJob>(env: &Env, job: &mut J) -> Option<TickOutcome> {
    let now = clock::now_ms(env);
    let lifecycle = job.lifecycle();
    let target = lifecycle.next_execution_time;

    if now < target {
        env.events()
            .publish((SCHEDULE, ScheduleEvent::Early), (J::KIND, now, target));
        return Some(rearm_at(env, job, target, TickOutcome::Deferred));
    }
    if lifecycle.is_past_end(now) {
        return Some(complete(env, job));
    }
    None
}

/// Arm the next regular tick, or complete the job once that tick would land
/// past its end time.
pub fn rearm_or_complete<J: RecurringJob>(env: &Env, job: &mut J, outcome: TickOutcome) -> TickOutcome {
    let lifecycle = job.lifecycle();
    let next = scheduler::next_occurrence(lifecycle.frequency, clock::now_ms(env));
    if lifecycle.end_time > 0 && next > lifecycle.end_time {
        return complete(env, job);
    }
    rearm_at(env, job, next, outcome)
}

/// Arm a tick at an explicit time. A rejected schedule parks the job.
pub fn rearm_at<J: RecurringJob>(
    env: &Env,
    job: &mut J,
    target_ms: u64,
    outcome: TickOutcome,
) -> TickOutcome {
    match arm_at(env, job, target_ms) {
        Ok(()) => {
            job.save(env);
            outcome
        }
        Err(_) => halt(env, job, PauseReason::ScheduleRejected),
    }
}

pub fn complete<J: RecurringJob>(env: &Env, job: &mut J) -> TickOutcome {
    let lifecycle = job.lifecycle_mut();
    lifecycle.status = JobStatus::Completed;
    lifecycle.schedule_handle = None;
    job.save(env);

    env.events().publish((JOB, JobEvent::Completed), J::KIND);
    TickOutcome::Completed
}

/// Park the job without arming another tick.
pub fn halt<J: RecurringJob>(env: &Env, job: &mut J, reason: PauseReason) -> TickOutcome {
    let lifecycle = job.lifecycle_mut();
    lifecycle.status = JobStatus::Paused;
    lifecycle.pause_reason = reason;
    lifecycle.schedule_handle = None;
    job.save(env);

    env.events()
        .publish((JOB, JobEvent::Paused), (J::KIND, reason));
    TickOutcome::Paused
}

/// Consume a due tick without acting on it and arm the next one.
pub fn absorb<J: RecurringJob>(env: &Env, call_id: &String) -> Result<TickOutcome, VaultError> {
    let mut job: J = begin_tick(env, call_id)?;
    if let Some(outcome) = check_timing(env, &mut job) {
        return Ok(outcome);
    }
    env.events().publish((JOB, JobEvent::Skipped), J::KIND);
    Ok(rearm_or_complete(env, &mut job, TickOutcome::Skipped))
}

/// Which job a deferred call's function name targets.
pub fn kind_for_entry_point(entry_point: &Symbol) -> Option<JobKind> {
    if *entry_point == crate::purchase::ENTRY_POINT {
        Some(JobKind::Purchase)
    } else if *entry_point == crate::pull_deposit::ENTRY_POINT {
        Some(JobKind::PullDeposit)
    } else if *entry_point == crate::savings::ENTRY_POINT {
        Some(JobKind::Savings)
    } else {
        None
    }
}
