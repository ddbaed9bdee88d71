//! The Redis-backed job queue
//!
//! Jobs live as JSON records under `<topic>:job:<id>`; sorted sets index
//! them by state. The waiting set is scored priority-major / id-minor so
//! ZPOPMIN yields the next eligible job and guarantees exactly one
//! winner when several slots race for it. The active set is scored by
//! lease deadline; entries past their deadline are put back into
//! waiting, which is how redelivery after a crashed slot happens.

use crate::error::QueueError;
use crate::job::{Job, JobOptions, JobState};
use crate::topic::{TopicDef, TopicKeys};
use chrono::Utc;
use redis::aio::ConnectionManager;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Waiting-set scores pack (inverted) priority into the high bits and
/// the job id into the low bits, so ZPOPMIN pops highest priority first
/// and FIFO within a priority class. Holds as long as ids stay below
/// 2^40 (~10^12 jobs per topic).
const PRIORITY_BAND: f64 = (1u64 << 40) as f64;

/// How many due/expired entries are rescheduled per lease call
const RESCHEDULE_BATCH: usize = 128;

fn waiting_score(priority: u8, id: u64) -> f64 {
    f64::from(255 - priority) * PRIORITY_BAND + id as f64
}

/// Durable job queue over one topic
///
/// Cheap to clone; clones share the connection and the closed flag.
pub struct JobQueue<P> {
    redis: Arc<ConnectionManager>,
    keys: TopicKeys,
    lease_timeout_ms: u64,
    closed: Arc<AtomicBool>,
    _payload: PhantomData<fn() -> P>,
}

impl<P> JobQueue<P>
where
    P: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Create a queue for a topic with the default lease timeout
    pub fn new(redis: ConnectionManager, topic: impl Into<String>) -> Self {
        Self {
            redis: Arc::new(redis),
            keys: TopicKeys::new(topic),
            lease_timeout_ms: 30_000,
            closed: Arc::new(AtomicBool::new(false)),
            _payload: PhantomData,
        }
    }

    /// Create a queue from a `TopicDef`
    ///
    /// This is the recommended constructor: it keeps the topic name and
    /// lease timeout consistent between producers and workers.
    pub fn from_topic_def<T: TopicDef>(redis: ConnectionManager) -> Self {
        Self {
            redis: Arc::new(redis),
            keys: TopicKeys::new(T::NAME),
            lease_timeout_ms: T::LEASE_TIMEOUT_MS,
            closed: Arc::new(AtomicBool::new(false)),
            _payload: PhantomData,
        }
    }

    /// Set the lease timeout
    pub fn with_lease_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.lease_timeout_ms = timeout_ms;
        self
    }

    /// Get the topic name
    pub fn topic(&self) -> &str {
        self.keys.topic()
    }

    /// Get a clone of the underlying connection (for health checks)
    pub fn redis(&self) -> Arc<ConnectionManager> {
        self.redis.clone()
    }

    fn conn(&self) -> ConnectionManager {
        (*self.redis).clone()
    }

    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    /// Enqueue a single job
    pub async fn enqueue(
        &self,
        name: impl Into<String>,
        payload: P,
        opts: JobOptions,
    ) -> Result<Job<P>, QueueError> {
        self.ensure_open()?;
        let mut conn = self.conn();

        let id: u64 = redis::cmd("INCR")
            .arg(self.keys.id_counter())
            .query_async(&mut conn)
            .await?;

        let job = Job::new(id, name, payload, opts);
        self.place(&mut conn, &job).await?;

        debug!(
            topic = %self.keys.topic(),
            job_id = %job.id,
            state = %job.state,
            priority = %job.opts.priority,
            "Enqueued job"
        );

        Ok(job)
    }

    /// Write the record and index the job in its initial state
    async fn place(&self, conn: &mut ConnectionManager, job: &Job<P>) -> Result<(), QueueError> {
        let record = serde_json::to_string(job)?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("SET").arg(self.keys.job(job.id)).arg(record).ignore();

        match job.state {
            JobState::Delayed => {
                let ready_at = job.created_at.timestamp_millis() + job.opts.delay_ms as i64;
                pipe.cmd("ZADD")
                    .arg(self.keys.state(JobState::Delayed))
                    .arg(ready_at)
                    .arg(job.id)
                    .ignore();
            }
            _ => {
                pipe.cmd("ZADD")
                    .arg(self.keys.state(JobState::Waiting))
                    .arg(waiting_score(job.opts.priority, job.id))
                    .arg(job.id)
                    .ignore();
            }
        }

        pipe.query_async::<()>(conn).await?;
        Ok(())
    }

    /// Enqueue multiple jobs with default options in one pipeline
    ///
    /// The pipeline is a single failure unit: either every job is
    /// submitted or the whole call errors.
    pub async fn enqueue_bulk(&self, items: Vec<(String, P)>) -> Result<Vec<Job<P>>, QueueError> {
        self.ensure_open()?;
        if items.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.conn();
        let count = items.len() as u64;

        let last_id: u64 = redis::cmd("INCRBY")
            .arg(self.keys.id_counter())
            .arg(count)
            .query_async(&mut conn)
            .await?;
        let first_id = last_id - count + 1;

        let mut pipe = redis::pipe();
        pipe.atomic();
        let mut jobs = Vec::with_capacity(items.len());

        for (offset, (name, payload)) in items.into_iter().enumerate() {
            let job = Job::new(first_id + offset as u64, name, payload, JobOptions::default());
            let record = serde_json::to_string(&job)?;
            pipe.cmd("SET").arg(self.keys.job(job.id)).arg(record).ignore();
            pipe.cmd("ZADD")
                .arg(self.keys.state(JobState::Waiting))
                .arg(waiting_score(job.opts.priority, job.id))
                .arg(job.id)
                .ignore();
            jobs.push(job);
        }

        pipe.query_async::<()>(&mut conn).await?;

        debug!(
            topic = %self.keys.topic(),
            count = jobs.len(),
            "Enqueued batch of jobs"
        );

        Ok(jobs)
    }

    /// Point-in-time job counts per state
    ///
    /// Not transactionally consistent with concurrent enqueues or
    /// completions.
    pub async fn counts(&self, states: &[JobState]) -> Result<HashMap<JobState, u64>, QueueError> {
        self.ensure_open()?;
        let mut conn = self.conn();

        let mut pipe = redis::pipe();
        for state in states {
            pipe.cmd("ZCARD").arg(self.keys.state(*state));
        }
        let counts: Vec<u64> = pipe.query_async(&mut conn).await?;

        Ok(states.iter().copied().zip(counts).collect())
    }

    /// Fetch a job record by id
    pub async fn job(&self, id: u64) -> Result<Option<Job<P>>, QueueError> {
        self.ensure_open()?;
        let mut conn = self.conn();

        let raw: Option<String> = redis::cmd("GET")
            .arg(self.keys.job(id))
            .query_async(&mut conn)
            .await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Stop leasing new jobs; in-flight jobs are unaffected
    pub async fn pause(&self) -> Result<(), QueueError> {
        self.ensure_open()?;
        let mut conn = self.conn();
        let _: () = redis::cmd("SET")
            .arg(self.keys.paused())
            .arg(1)
            .query_async(&mut conn)
            .await?;
        info!(topic = %self.keys.topic(), "Queue paused");
        Ok(())
    }

    /// Resume leasing
    pub async fn resume(&self) -> Result<(), QueueError> {
        self.ensure_open()?;
        let mut conn = self.conn();
        let _: () = redis::cmd("DEL")
            .arg(self.keys.paused())
            .query_async(&mut conn)
            .await?;
        info!(topic = %self.keys.topic(), "Queue resumed");
        Ok(())
    }

    /// Check whether the topic is paused
    pub async fn is_paused(&self) -> Result<bool, QueueError> {
        self.ensure_open()?;
        let mut conn = self.conn();
        let paused: bool = redis::cmd("EXISTS")
            .arg(self.keys.paused())
            .query_async(&mut conn)
            .await?;
        Ok(paused)
    }

    /// Remove up to `limit` terminal jobs older than `max_age_ms`
    ///
    /// Age is measured from the finish timestamp. Returns the removed
    /// job ids; best-effort, no ordering guarantee among candidates
    /// beyond oldest-first.
    pub async fn clean(
        &self,
        max_age_ms: u64,
        limit: usize,
        state: JobState,
    ) -> Result<Vec<u64>, QueueError> {
        self.ensure_open()?;
        if !state.is_terminal() {
            return Err(QueueError::Config(format!(
                "clean is only supported for terminal states, got '{state}'"
            )));
        }

        let mut conn = self.conn();
        let key = self.keys.state(state);
        let cutoff = Utc::now().timestamp_millis() - max_age_ms as i64;

        let ids: Vec<u64> = redis::cmd("ZRANGEBYSCORE")
            .arg(&key)
            .arg("-inf")
            .arg(cutoff)
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async(&mut conn)
            .await?;

        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in &ids {
            pipe.cmd("ZREM").arg(&key).arg(id).ignore();
            pipe.cmd("DEL").arg(self.keys.job(*id)).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;

        info!(
            topic = %self.keys.topic(),
            state = %state,
            count = ids.len(),
            "Cleaned old jobs"
        );

        Ok(ids)
    }

    /// Close the queue handle
    ///
    /// Idempotent; every subsequent operation fails with
    /// `QueueError::Closed`. The shared connection is released when the
    /// last clone drops.
    pub async fn close(&self) -> Result<(), QueueError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(topic = %self.keys.topic(), "Queue closed");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Worker-facing operations
    // ------------------------------------------------------------------

    /// Lease up to `max` jobs for processing
    ///
    /// Promotes due delayed jobs and reclaims expired leases first, then
    /// pops from the waiting set. Each returned job is owned by this
    /// caller until it is acked, failed, or its lease expires.
    pub async fn lease(&self, max: usize) -> Result<Vec<Job<P>>, QueueError> {
        self.ensure_open()?;
        let mut conn = self.conn();

        self.promote_due(&mut conn).await?;
        self.reclaim_expired(&mut conn).await?;

        let paused: bool = redis::cmd("EXISTS")
            .arg(self.keys.paused())
            .query_async(&mut conn)
            .await?;
        if paused {
            return Ok(vec![]);
        }

        let popped: Vec<(u64, f64)> = redis::cmd("ZPOPMIN")
            .arg(self.keys.state(JobState::Waiting))
            .arg(max)
            .query_async(&mut conn)
            .await?;

        if popped.is_empty() {
            return Ok(vec![]);
        }

        let now = Utc::now();
        let deadline = now.timestamp_millis() + self.lease_timeout_ms as i64;
        let mut jobs = Vec::with_capacity(popped.len());

        for (id, _) in popped {
            let key = self.keys.job(id);
            let raw: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;

            let Some(raw) = raw else {
                warn!(job_id = %id, "Job record missing, dropping");
                continue;
            };

            match serde_json::from_str::<Job<P>>(&raw) {
                Ok(mut job) => {
                    job.state = JobState::Active;
                    job.processed_at = Some(now);
                    let record = serde_json::to_string(&job)?;

                    let mut pipe = redis::pipe();
                    pipe.atomic();
                    pipe.cmd("SET").arg(&key).arg(record).ignore();
                    pipe.cmd("ZADD")
                        .arg(self.keys.state(JobState::Active))
                        .arg(deadline)
                        .arg(job.id)
                        .ignore();
                    pipe.query_async::<()>(&mut conn).await?;

                    jobs.push(job);
                }
                Err(e) => {
                    // An unparseable record can never be processed; drop
                    // it instead of cycling it through the queue forever.
                    warn!(job_id = %id, error = %e, "Failed to parse job record, discarding");
                    let _: () = redis::cmd("DEL").arg(&key).query_async(&mut conn).await?;
                }
            }
        }

        Ok(jobs)
    }

    /// Acknowledge successful processing
    pub async fn ack(&self, job: &Job<P>) -> Result<(), QueueError> {
        self.ensure_open()?;
        let mut conn = self.conn();

        let now = Utc::now();
        let mut done = job.clone();
        done.state = JobState::Completed;
        done.attempts_made = job.attempts_made + 1;
        done.finished_at = Some(now);
        let record = serde_json::to_string(&done)?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("SET").arg(self.keys.job(job.id)).arg(record).ignore();
        pipe.cmd("ZREM")
            .arg(self.keys.state(JobState::Active))
            .arg(job.id)
            .ignore();
        pipe.cmd("ZADD")
            .arg(self.keys.state(JobState::Completed))
            .arg(now.timestamp_millis())
            .arg(job.id)
            .ignore();
        pipe.query_async::<()>(&mut conn).await?;

        debug!(topic = %self.keys.topic(), job_id = %job.id, "Job completed");
        Ok(())
    }

    /// Report a failed processing attempt
    ///
    /// Charges one attempt, then either schedules a retry (per the
    /// job's backoff policy) or moves the job to the terminal failed
    /// state. Returns the state the job ended up in.
    pub async fn fail(&self, job: &Job<P>, error: &str) -> Result<JobState, QueueError> {
        self.ensure_open()?;
        let mut conn = self.conn();

        let now = Utc::now();
        let mut next = job.clone();
        next.attempts_made = job.attempts_made + 1;
        next.last_error = Some(error.to_string());

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("ZREM")
            .arg(self.keys.state(JobState::Active))
            .arg(job.id)
            .ignore();

        let outcome = if next.exhausted() {
            next.state = JobState::Failed;
            next.finished_at = Some(now);
            pipe.cmd("ZADD")
                .arg(self.keys.state(JobState::Failed))
                .arg(now.timestamp_millis())
                .arg(job.id)
                .ignore();
            JobState::Failed
        } else {
            let delay = next.opts.backoff.delay_for_attempt(next.attempts_made);
            next.state = JobState::Delayed;
            pipe.cmd("ZADD")
                .arg(self.keys.state(JobState::Delayed))
                .arg(now.timestamp_millis() + delay.as_millis() as i64)
                .arg(job.id)
                .ignore();
            JobState::Delayed
        };

        let record = serde_json::to_string(&next)?;
        pipe.cmd("SET").arg(self.keys.job(job.id)).arg(record).ignore();
        pipe.query_async::<()>(&mut conn).await?;

        match outcome {
            JobState::Failed => warn!(
                topic = %self.keys.topic(),
                job_id = %job.id,
                attempts_made = %next.attempts_made,
                error = %error,
                "Job failed permanently"
            ),
            _ => info!(
                topic = %self.keys.topic(),
                job_id = %job.id,
                attempts_made = %next.attempts_made,
                "Job scheduled for retry"
            ),
        }

        Ok(outcome)
    }

    /// Move delayed jobs whose ready time has passed into waiting
    async fn promote_due(&self, conn: &mut ConnectionManager) -> Result<(), QueueError> {
        let now_ms = Utc::now().timestamp_millis();

        let due: Vec<u64> = redis::cmd("ZRANGEBYSCORE")
            .arg(self.keys.state(JobState::Delayed))
            .arg("-inf")
            .arg(now_ms)
            .arg("LIMIT")
            .arg(0)
            .arg(RESCHEDULE_BATCH)
            .query_async(conn)
            .await?;

        for id in due {
            self.move_to_waiting(conn, id, JobState::Delayed).await?;
        }

        Ok(())
    }

    /// Put jobs with expired leases back into waiting for redelivery
    async fn reclaim_expired(&self, conn: &mut ConnectionManager) -> Result<(), QueueError> {
        let now_ms = Utc::now().timestamp_millis();

        let expired: Vec<u64> = redis::cmd("ZRANGEBYSCORE")
            .arg(self.keys.state(JobState::Active))
            .arg("-inf")
            .arg(now_ms)
            .arg("LIMIT")
            .arg(0)
            .arg(RESCHEDULE_BATCH)
            .query_async(conn)
            .await?;

        for id in expired {
            warn!(topic = %self.keys.topic(), job_id = %id, "Reclaiming expired lease");
            self.move_to_waiting(conn, id, JobState::Active).await?;
        }

        Ok(())
    }

    /// Move one job from `from` into waiting
    ///
    /// The ZREM is the claim: when several callers race, only the one
    /// that removed the entry performs the move.
    async fn move_to_waiting(
        &self,
        conn: &mut ConnectionManager,
        id: u64,
        from: JobState,
    ) -> Result<(), QueueError> {
        let removed: i64 = redis::cmd("ZREM")
            .arg(self.keys.state(from))
            .arg(id)
            .query_async(conn)
            .await?;
        if removed == 0 {
            return Ok(());
        }

        let key = self.keys.job(id);
        let raw: Option<String> = redis::cmd("GET").arg(&key).query_async(conn).await?;
        let Some(raw) = raw else {
            warn!(job_id = %id, "Job record missing while rescheduling");
            return Ok(());
        };

        let mut job: Job<P> = match serde_json::from_str(&raw) {
            Ok(job) => job,
            Err(e) => {
                warn!(job_id = %id, error = %e, "Failed to parse job record, discarding");
                let _: () = redis::cmd("DEL").arg(&key).query_async(conn).await?;
                return Ok(());
            }
        };

        job.state = JobState::Waiting;
        let record = serde_json::to_string(&job)?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("SET").arg(&key).arg(record).ignore();
        pipe.cmd("ZADD")
            .arg(self.keys.state(JobState::Waiting))
            .arg(waiting_score(job.opts.priority, job.id))
            .arg(job.id)
            .ignore();
        pipe.query_async::<()>(conn).await?;

        Ok(())
    }
}

impl<P> Clone for JobQueue<P> {
    fn clone(&self) -> Self {
        Self {
            redis: self.redis.clone(),
            keys: self.keys.clone(),
            lease_timeout_ms: self.lease_timeout_ms,
            closed: self.closed.clone(),
            _payload: PhantomData,
        }
    }
}
