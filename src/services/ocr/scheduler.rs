use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use image::DynamicImage;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::engine::{EngineFactory, EngineParams};
use super::partition::RegionGroup;
use super::registry::{terminate_shared, EngineRegistry, SharedEngine};
use crate::error::{EngineError, PipelineError, PipelineResult};
use crate::models::config::PageSegMode;
use crate::models::recognition::RecognitionResult;
use crate::utils::{CancellationFlag, ProgressCounter};

/// One region waiting for an engine
struct Job {
    region_name: String,
    image: Arc<DynamicImage>,
}

/// Fixed-size set of engines configured for one whitelist
pub struct EnginePool {
    engines: Vec<SharedEngine>,
}

impl EnginePool {
    /// Create and configure `size` engines, registering each as soon as it
    /// exists. Engines created before a failure are terminated before the
    /// error is returned.
    pub async fn provision(
        factory: &dyn EngineFactory,
        size: usize,
        params: &EngineParams,
        registry: &EngineRegistry,
    ) -> Result<Self, EngineError> {
        let mut engines: Vec<SharedEngine> = Vec::with_capacity(size);

        for _ in 0..size {
            let outcome = match factory.create().await {
                Ok(engine) => {
                    let slot = registry.register(engine);
                    let configured = configure_shared(&slot, params).await;
                    engines.push(slot);
                    configured
                }
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                for slot in &engines {
                    terminate_shared(slot).await;
                }
                return Err(e);
            }
        }

        Ok(Self { engines })
    }

    pub fn size(&self) -> usize {
        self.engines.len()
    }

    /// Load-balance jobs over the pool's engines through a shared queue, then
    /// terminate every engine, including those whose worker panicked.
    /// Results arrive in completion order, tagged by region. `abort` stops
    /// workers between jobs; a job in flight finishes.
    async fn run(
        self,
        jobs: Vec<Job>,
        abort: &CancellationFlag,
        progress: &ProgressCounter,
    ) -> PipelineResult<Vec<RecognitionResult>> {
        let total = jobs.len();
        let queue = Arc::new(Mutex::new(VecDeque::from(jobs)));
        let (tx, mut rx) = mpsc::unbounded_channel::<RecognitionResult>();
        let mut workers = JoinSet::new();

        for (worker_id, slot) in self.engines.iter().enumerate() {
            let slot = Arc::clone(slot);
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let abort = abort.clone();
            let progress = progress.clone();

            workers.spawn(async move {
                let mut guard = slot.lock().await;
                let Some(engine) = guard.as_mut() else {
                    return;
                };

                loop {
                    if abort.is_cancelled() {
                        break;
                    }
                    let next = { queue.lock().pop_front() };
                    let Some(job) = next else {
                        break;
                    };

                    match engine.recognize(&job.image).await {
                        Ok(recognition) => {
                            debug!(
                                "Worker {} recognized '{}': {:?} ({:.1}%)",
                                worker_id, job.region_name, recognition.text, recognition.confidence
                            );
                            // Receiver outlives every worker
                            let _ = tx.send(recognition.into_result(job.region_name));
                        }
                        Err(e) => {
                            warn!("Recognition failed for '{}': {}", job.region_name, e);
                        }
                    }
                    progress.increment();
                }
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Recognition worker failed: {}", e);
                abort.cancel();
                failure.get_or_insert_with(|| PipelineError::Task(e.to_string()));
            }
        }

        for slot in &self.engines {
            terminate_shared(slot).await;
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}

async fn configure_shared(slot: &SharedEngine, params: &EngineParams) -> Result<(), EngineError> {
    let mut guard = slot.lock().await;
    match guard.as_mut() {
        Some(engine) => engine.configure(params).await,
        None => Err(EngineError::Configuration("engine already terminated".to_string())),
    }
}

/// Runs every large group on its own engine pool, all pools concurrently
pub struct Scheduler {
    factory: Arc<dyn EngineFactory>,
    pool_size: usize,
    page_seg_mode: PageSegMode,
    registry: EngineRegistry,
}

impl Scheduler {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        pool_size: usize,
        page_seg_mode: PageSegMode,
        registry: EngineRegistry,
    ) -> Self {
        Self {
            factory,
            pool_size: pool_size.max(1),
            page_seg_mode,
            registry,
        }
    }

    /// Provision, run and tear down one pool for one group
    pub async fn recognize_group(
        &self,
        group: &RegionGroup,
        buffers: &HashMap<String, Arc<DynamicImage>>,
        abort: &CancellationFlag,
        progress: &ProgressCounter,
    ) -> PipelineResult<Vec<RecognitionResult>> {
        let jobs = collect_jobs(group, buffers);
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let params = EngineParams {
            whitelist: group.char_set.clone(),
            page_seg_mode: self.page_seg_mode,
        };
        let pool = EnginePool::provision(self.factory.as_ref(), self.pool_size, &params, &self.registry)
            .await
            .map_err(PipelineError::EngineProvisioning)?;

        info!(
            "Engine pool of {} started for {} regions (whitelist {:?})",
            pool.size(),
            jobs.len(),
            group.char_set
        );
        pool.run(jobs, abort, progress).await
    }

    /// Run all large groups concurrently. No pool is created once `stop` is
    /// set. If one pool fails, `stop` and `abort` are raised so the other
    /// branches and pools wind down.
    pub async fn run(
        self: Arc<Self>,
        groups: Vec<RegionGroup>,
        buffers: Arc<HashMap<String, Arc<DynamicImage>>>,
        stop: CancellationFlag,
        abort: CancellationFlag,
        progress: ProgressCounter,
    ) -> PipelineResult<Vec<RecognitionResult>> {
        let mut tasks = JoinSet::new();

        for group in groups {
            if stop.is_cancelled() {
                debug!("Skipping pool for whitelist {:?}: stopped", group.char_set);
                continue;
            }

            let scheduler = Arc::clone(&self);
            let buffers = Arc::clone(&buffers);
            let stop = stop.clone();
            let abort = abort.clone();
            let progress = progress.clone();

            tasks.spawn(async move {
                if stop.is_cancelled() {
                    return Ok(Vec::new());
                }
                let outcome = scheduler.recognize_group(&group, &buffers, &abort, &progress).await;
                if outcome.is_err() {
                    stop.cancel();
                    abort.cancel();
                }
                outcome
            });
        }

        let mut results = Vec::new();
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(group_results)) => results.extend(group_results),
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(e) => {
                    stop.cancel();
                    abort.cancel();
                    failure.get_or_insert_with(|| PipelineError::Task(e.to_string()));
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}

fn collect_jobs(group: &RegionGroup, buffers: &HashMap<String, Arc<DynamicImage>>) -> Vec<Job> {
    group
        .regions
        .iter()
        .filter_map(|region| match buffers.get(&region.name) {
            Some(image) => Some(Job {
                region_name: region.name.clone(),
                image: Arc::clone(image),
            }),
            None => {
                warn!("No pixels extracted for region '{}'", region.name);
                None
            }
        })
        .collect()
}
