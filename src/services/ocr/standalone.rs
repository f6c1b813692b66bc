use std::collections::HashMap;
use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, info, warn};

use super::engine::{EngineFactory, EngineParams, RecognitionEngine};
use super::partition::RegionGroup;
use super::registry::{terminate_shared, EngineRegistry};
use crate::error::{PipelineError, PipelineResult};
use crate::models::config::PageSegMode;
use crate::models::recognition::RecognitionResult;
use crate::utils::{CancellationFlag, ProgressCounter};

/// Single engine reused across all small groups, one call at a time
pub struct StandaloneRecognizer {
    factory: Arc<dyn EngineFactory>,
    page_seg_mode: PageSegMode,
    registry: EngineRegistry,
}

impl StandaloneRecognizer {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        page_seg_mode: PageSegMode,
        registry: EngineRegistry,
    ) -> Self {
        Self {
            factory,
            page_seg_mode,
            registry,
        }
    }

    /// Create the engine once, walk every group, then terminate it.
    /// The engine is registered before use, so the registry still reaches it
    /// if this future panics or is dropped.
    /// `stop` is checked before each region; once set, the remaining regions
    /// are skipped and stay unresolved. On failure both `stop` and `abort`
    /// are raised so the engine pools wind down too.
    pub async fn run(
        &self,
        groups: &[RegionGroup],
        buffers: &HashMap<String, Arc<DynamicImage>>,
        stop: &CancellationFlag,
        abort: &CancellationFlag,
        progress: &ProgressCounter,
    ) -> PipelineResult<Vec<RecognitionResult>> {
        if groups.iter().all(RegionGroup::is_empty) || stop.is_cancelled() {
            return Ok(Vec::new());
        }

        let slot = match self.factory.create().await {
            Ok(engine) => self.registry.register(engine),
            Err(e) => {
                stop.cancel();
                abort.cancel();
                return Err(PipelineError::EngineProvisioning(e));
            }
        };
        info!("Standalone engine started for {} small groups", groups.len());

        let outcome = {
            let mut guard = slot.lock().await;
            match guard.as_mut() {
                Some(engine) => {
                    self.recognize_groups(&mut **engine, groups, buffers, stop, progress)
                        .await
                }
                None => Ok(Vec::new()),
            }
        };
        terminate_shared(&slot).await;

        if outcome.is_err() {
            stop.cancel();
            abort.cancel();
        }
        outcome
    }

    async fn recognize_groups(
        &self,
        engine: &mut dyn RecognitionEngine,
        groups: &[RegionGroup],
        buffers: &HashMap<String, Arc<DynamicImage>>,
        stop: &CancellationFlag,
        progress: &ProgressCounter,
    ) -> PipelineResult<Vec<RecognitionResult>> {
        let mut results = Vec::new();

        for group in groups {
            let params = EngineParams {
                whitelist: group.char_set.clone(),
                page_seg_mode: self.page_seg_mode,
            };
            engine
                .configure(&params)
                .await
                .map_err(PipelineError::EngineProvisioning)?;

            for region in &group.regions {
                if stop.is_cancelled() {
                    debug!("Standalone loop stopped before '{}'", region.name);
                    return Ok(results);
                }

                let Some(image) = buffers.get(&region.name) else {
                    warn!("No pixels extracted for region '{}'", region.name);
                    continue;
                };

                match engine.recognize(image).await {
                    Ok(recognition) => {
                        debug!(
                            "Recognized '{}': {:?} ({:.1}%)",
                            region.name, recognition.text, recognition.confidence
                        );
                        results.push(recognition.into_result(&region.name));
                    }
                    Err(e) => {
                        warn!("Recognition failed for '{}': {}", region.name, e);
                    }
                }
                progress.increment();
            }
        }

        Ok(results)
    }
}
