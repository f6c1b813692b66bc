use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

use crate::error::{PipelineError, PipelineResult};
use crate::models::config::PipelineConfig;
use crate::models::hash_set::HashLibrary;
use crate::models::match_record::MatchRecord;
use crate::models::recognition::RecognitionResult;
use crate::models::region::{resolve_regions, Region, Resolution};
use crate::services::diagnostics::{DebugImageWriter, Diagnostics};
use crate::services::ocr::engine::EngineFactory;
use crate::services::ocr::http_engine::HttpEngineFactory;
use crate::services::ocr::image_hash::ImageHashMatcher;
use crate::services::ocr::parser::parse_match_record;
use crate::services::ocr::partition::{partition_regions, Partition};
use crate::services::ocr::preprocessing::{PreprocessingService, RegionBuffer};
use crate::services::ocr::registry::EngineRegistry;
use crate::services::ocr::scheduler::Scheduler;
use crate::services::ocr::standalone::StandaloneRecognizer;
use crate::services::store::MatchStore;
use crate::utils::{CancellationFlag, ProgressCounter};

/// Decode a PNG/JPEG/... screenshot
pub fn decode_image(bytes: &[u8]) -> PipelineResult<DynamicImage> {
    image::load_from_memory(bytes).map_err(PipelineError::ImageDecode)
}

/// Everything one successful run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub record: MatchRecord,
    /// One entry per resolved region, in no particular order
    pub results: Vec<RecognitionResult>,
    pub diagnostics: Diagnostics,
    /// Regions submitted to the run
    pub total_regions: usize,
    /// Where debug images went, when enabled
    pub debug_dir: Option<PathBuf>,
}

impl PipelineOutput {
    /// Regions with no result (skipped or failed individually)
    pub fn unresolved(&self) -> usize {
        self.total_regions.saturating_sub(self.results.len())
    }
}

/// Output of [`ScoreboardPipeline::process_and_store`]
#[derive(Debug, Clone)]
pub struct StoredMatch {
    pub id: String,
    pub output: PipelineOutput,
}

/// Screenshot → match record orchestrator.
///
/// Each call to [`process`](Self::process) is independent: engines are created
/// for the run and terminated before it returns. A call dropped mid-run hands
/// its engines to a background task that terminates them.
pub struct ScoreboardPipeline {
    config: PipelineConfig,
    factory: Arc<dyn EngineFactory>,
    matcher: Arc<ImageHashMatcher>,
    preprocessor: PreprocessingService,
    progress: ProgressCounter,
}

impl ScoreboardPipeline {
    pub fn new(config: PipelineConfig, factory: Arc<dyn EngineFactory>) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::InvalidConfig)?;

        Ok(Self {
            matcher: Arc::new(ImageHashMatcher::from_config(&config.image_hash)),
            preprocessor: PreprocessingService::new(config.preprocessing.clone()),
            progress: ProgressCounter::new(),
            factory,
            config,
        })
    }

    /// Pipeline backed by the local OCR server from `config.engine`
    pub fn with_http_engine(config: PipelineConfig) -> PipelineResult<Self> {
        let factory = Arc::new(HttpEngineFactory::new(config.engine.clone()));
        Self::new(config, factory)
    }

    /// Swap the portrait matcher (e.g. a different hash scheme)
    pub fn with_matcher(mut self, matcher: ImageHashMatcher) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Same matcher the pipeline uses, for building hash set entries
    pub fn matcher(&self) -> &ImageHashMatcher {
        &self.matcher
    }

    /// Regions completed so far in the current run
    pub fn progress(&self) -> &ProgressCounter {
        &self.progress
    }

    /// Scale regions authored at the reference resolution to this image
    pub fn resolve_for_image(&self, regions: &[Region], image: &DynamicImage) -> Vec<Region> {
        let (width, height) = image.dimensions();
        resolve_regions(
            regions,
            self.config.reference_resolution,
            Resolution::new(width, height),
        )
    }

    /// Decode then [`process`](Self::process). Decode failures surface before
    /// any region work.
    pub async fn process_bytes(
        &self,
        bytes: &[u8],
        regions: &[Region],
        library: &HashLibrary,
        cancel: &CancellationFlag,
    ) -> PipelineResult<Option<PipelineOutput>> {
        let image = decode_image(bytes)?;
        self.process(&image, regions, library, cancel).await
    }

    /// Run one recognition pass.
    ///
    /// `regions` must already be resolved to the image's size. Returns
    /// `Ok(None)` when `cancel` was set during the run; no partial record is
    /// ever produced.
    #[instrument(skip_all, fields(regions = regions.len()))]
    pub async fn process(
        &self,
        image: &DynamicImage,
        regions: &[Region],
        library: &HashLibrary,
        cancel: &CancellationFlag,
    ) -> PipelineResult<Option<PipelineOutput>> {
        self.progress.reset();
        if cancel.is_cancelled() {
            info!("Cancelled before start");
            return Ok(None);
        }

        let (buffers, debug_dir) = self.extract(image, regions).await?;

        let Partition {
            image_hash,
            large_groups,
            small_groups,
        } = partition_regions(regions, self.config.recognition.large_group_threshold);
        let total_regions = regions.len();
        info!(
            "Processing {} regions: {} portraits, {} pooled groups, {} small groups",
            total_regions,
            image_hash.len(),
            large_groups.len(),
            small_groups.len()
        );

        let buffer_map: Arc<HashMap<String, Arc<DynamicImage>>> = Arc::new(
            buffers
                .into_iter()
                .map(|buffer| (buffer.name, buffer.image))
                .collect(),
        );

        // `stop` also trips on caller cancellation; `abort` is ours alone and
        // reaches into the pool workers
        let stop = cancel.child();
        let abort = CancellationFlag::new();
        let recognition = &self.config.recognition;

        // Every engine of this run; swept below, or by the guard if this
        // future is dropped first
        let registry = EngineRegistry::new();
        let _cleanup = registry.cleanup_guard();
        let mut branches: JoinSet<PipelineResult<Vec<RecognitionResult>>> = JoinSet::new();

        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&self.factory),
            recognition.pool_size,
            recognition.page_seg_mode,
            registry.clone(),
        ));
        branches.spawn(scheduler.run(
            large_groups,
            Arc::clone(&buffer_map),
            stop.clone(),
            abort.clone(),
            self.progress.clone(),
        ));

        {
            let standalone = StandaloneRecognizer::new(
                Arc::clone(&self.factory),
                recognition.page_seg_mode,
                registry.clone(),
            );
            let buffers = Arc::clone(&buffer_map);
            let stop = stop.clone();
            let abort = abort.clone();
            let progress = self.progress.clone();
            branches.spawn(async move {
                standalone
                    .run(&small_groups, &buffers, &stop, &abort, &progress)
                    .await
            });
        }

        {
            let matcher = Arc::clone(&self.matcher);
            let buffers = Arc::clone(&buffer_map);
            let library = library.clone();
            let stop = stop.clone();
            let progress = self.progress.clone();
            branches.spawn_blocking(move || {
                Ok(matcher.match_all(&image_hash, &buffers, &library, &stop, &progress))
            });
        }

        let mut results = Vec::with_capacity(total_regions);
        let mut failure = None;
        while let Some(joined) = branches.join_next().await {
            let branch = joined.map_err(|e| {
                stop.cancel();
                abort.cancel();
                PipelineError::Task(e.to_string())
            });
            match branch.and_then(|outcome| outcome) {
                Ok(branch_results) => results.extend(branch_results),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        registry.terminate_all().await;

        if cancel.is_cancelled() {
            info!(
                "Cancelled after {} of {} regions; no record produced",
                self.progress.completed(),
                total_regions
            );
            return Ok(None);
        }

        if let Some(e) = failure {
            error!("Recognition pass failed: {}", e);
            return Err(e);
        }

        let diagnostics = Diagnostics::from_results(&results);
        let record = parse_match_record(&diagnostics.raw);

        let output = PipelineOutput {
            record,
            results,
            diagnostics,
            total_regions,
            debug_dir,
        };
        if output.unresolved() > 0 {
            debug!("{} regions left unresolved", output.unresolved());
        }
        info!("Recognized {} of {} regions", output.results.len(), total_regions);

        Ok(Some(output))
    }

    /// Crop every region and write debug images, off the async workers
    async fn extract(
        &self,
        image: &DynamicImage,
        regions: &[Region],
    ) -> PipelineResult<(Vec<RegionBuffer>, Option<PathBuf>)> {
        let image = image.clone();
        let regions = regions.to_vec();
        let preprocessor = self.preprocessor.clone();
        let writer = DebugImageWriter::from_config(&self.config.diagnostics);

        tokio::task::spawn_blocking(move || -> PipelineResult<(Vec<RegionBuffer>, Option<PathBuf>)> {
            let buffers = preprocessor.extract_regions(&image, &regions)?;
            let debug_dir =
                writer.and_then(|writer| writer.write(&preprocessor.preview(&image), &buffers));
            Ok((buffers, debug_dir))
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?
    }

    /// Run the pipeline and hand the record to `store`, updating `record_id`
    /// when given, saving a new record otherwise. Cancelled runs store nothing.
    pub async fn process_and_store(
        &self,
        image: &DynamicImage,
        regions: &[Region],
        library: &HashLibrary,
        cancel: &CancellationFlag,
        store: &dyn MatchStore,
        record_id: Option<&str>,
    ) -> PipelineResult<Option<StoredMatch>> {
        let Some(output) = self.process(image, regions, library, cancel).await? else {
            return Ok(None);
        };

        let id = match record_id {
            Some(id) => {
                store
                    .update(id, &output.record)
                    .await
                    .map_err(PipelineError::Store)?;
                id.to_string()
            }
            None => store.save(&output.record).await.map_err(PipelineError::Store)?,
        };
        info!("Stored match record '{}'", id);

        Ok(Some(StoredMatch { id, output }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::PipelineConfig;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn pipeline() -> ScoreboardPipeline {
        ScoreboardPipeline::with_http_engine(PipelineConfig::default()).unwrap()
    }

    #[test]
    fn test_decode_png_bytes() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([9, 9, 9])));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let decoded = decode_image(&bytes).unwrap();

        assert_eq!(decoded.dimensions(), (8, 6));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(PipelineError::ImageDecode(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PipelineConfig::default();
        config.recognition.pool_size = 0;

        assert!(matches!(
            ScoreboardPipeline::with_http_engine(config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_resolve_for_image_halves_reference() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(1280, 720));
        let regions = vec![Region::new("result", 100, 40, 400, 80)];

        let resolved = pipeline().resolve_for_image(&regions, &image);

        assert_eq!(resolved[0].x, 50);
        assert_eq!(resolved[0].y, 20);
        assert_eq!(resolved[0].width, 200);
        assert_eq!(resolved[0].height, 40);
    }

    #[tokio::test]
    async fn test_bad_bytes_fail_before_region_work() {
        let result = pipeline()
            .process_bytes(b"nope", &[], &HashLibrary::empty(), &CancellationFlag::new())
            .await;

        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[tokio::test]
    async fn test_empty_region_list_needs_no_engine() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(16, 16));

        let output = pipeline()
            .process(&image, &[], &HashLibrary::empty(), &CancellationFlag::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(output.total_regions, 0);
        assert_eq!(output.record.players.len(), 10);
        assert!(output.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_debug_images_written_for_portrait_run() {
        let base = std::env::temp_dir().join(format!("scoreboard-pipeline-debug-{}", std::process::id()));
        let mut config = PipelineConfig::default();
        config.diagnostics.save_debug_images = true;
        config.diagnostics.debug_dir = Some(base.to_string_lossy().into_owned());
        let pipeline = ScoreboardPipeline::with_http_engine(config).unwrap();

        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([40, 40, 40])));
        let regions = vec![Region::new("blue_player1_hero", 0, 0, 8, 8).with_hash_set("heroes")];

        let output = pipeline
            .process(&image, &regions, &HashLibrary::empty(), &CancellationFlag::new())
            .await
            .unwrap()
            .unwrap();

        let run_dir = output.debug_dir.expect("debug images enabled");
        assert!(run_dir.join("preview.png").exists());
        assert!(run_dir.join("blue_player1_hero.png").exists());
        assert_eq!(output.results.len(), 1);

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn test_out_of_bounds_region_is_fatal() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(16, 16));
        let regions = vec![Region::new("result", 10, 10, 20, 4)];

        let result = pipeline()
            .process(&image, &regions, &HashLibrary::empty(), &CancellationFlag::new())
            .await;

        assert!(matches!(result, Err(PipelineError::RegionOutOfBounds { .. })));
    }
}
