use std::collections::HashMap;
use std::sync::Arc;

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, warn};

use crate::models::config::ImageHashConfig;
use crate::models::hash_set::{HashEntry, HashLibrary, ImageHash, ImageHashSet};
use crate::models::recognition::RecognitionResult;
use crate::models::region::Region;
use crate::utils::{CancellationFlag, ProgressCounter};

/// Perceptual hash scheme. Same image must always give the same hash.
pub trait ImageHasher: Send + Sync {
    fn hash(&self, image: &DynamicImage) -> ImageHash;

    fn bit_width(&self) -> usize;

    fn distance(&self, a: &ImageHash, b: &ImageHash) -> Option<u32> {
        a.distance(b)
    }
}

/// Gradient hash: grayscale, shrink to `(size + 1) x size`, one bit per
/// horizontally adjacent pair (set when brightness increases left to right).
#[derive(Debug, Clone, Copy)]
pub struct DifferenceHasher {
    size: u32,
}

impl DifferenceHasher {
    pub fn new(size: u32) -> Self {
        Self { size: size.max(2) }
    }
}

impl Default for DifferenceHasher {
    fn default() -> Self {
        Self::new(8)
    }
}

impl ImageHasher for DifferenceHasher {
    fn hash(&self, image: &DynamicImage) -> ImageHash {
        let gray = image.to_luma8();
        let reduced = image::imageops::resize(&gray, self.size + 1, self.size, FilterType::Triangle);

        let mut bits = Vec::with_capacity(self.bit_width());
        for y in 0..self.size {
            for x in 0..self.size {
                let left = reduced.get_pixel(x, y)[0];
                let right = reduced.get_pixel(x + 1, y)[0];
                bits.push(left < right);
            }
        }

        ImageHash::from_bits(&bits)
    }

    fn bit_width(&self) -> usize {
        (self.size * self.size) as usize
    }
}

/// Best entry for a region
#[derive(Debug, Clone, PartialEq)]
pub struct HashMatch {
    pub label: String,
    pub distance: u32,
    pub confidence: f32,
}

/// Nearest-neighbour classifier over a hash set
pub struct ImageHashMatcher {
    hasher: Box<dyn ImageHasher>,
    min_confidence: f32,
}

impl ImageHashMatcher {
    pub fn new(hasher: Box<dyn ImageHasher>, min_confidence: f32) -> Self {
        Self {
            hasher,
            min_confidence,
        }
    }

    pub fn from_config(config: &ImageHashConfig) -> Self {
        Self::new(Box::new(DifferenceHasher::new(config.hash_size)), config.min_confidence)
    }

    /// Hash a reference thumbnail into a library entry
    pub fn build_entry(&self, label: impl Into<String>, image: &DynamicImage) -> HashEntry {
        HashEntry {
            label: label.into(),
            hash: self.hasher.hash(image),
        }
    }

    /// `100 × (1 − distance / bitWidth)`, clamped to 0-100
    pub fn confidence(distance: u32, bit_width: usize) -> f32 {
        if bit_width == 0 {
            return 0.0;
        }
        (100.0 * (1.0 - distance as f32 / bit_width as f32)).clamp(0.0, 100.0)
    }

    /// Closest entry regardless of threshold (for debugging)
    pub fn best_match(&self, image: &DynamicImage, set: &ImageHashSet) -> Option<HashMatch> {
        let hash = self.hasher.hash(image);
        let mut best: Option<HashMatch> = None;

        for entry in &set.entries {
            let Some(distance) = self.hasher.distance(&hash, &entry.hash) else {
                warn!(
                    "Hash set '{}' entry '{}' is {} bits, expected {}; skipped",
                    set.id,
                    entry.label,
                    entry.hash.bit_width(),
                    hash.bit_width()
                );
                continue;
            };

            if best.as_ref().map_or(true, |b| distance < b.distance) {
                best = Some(HashMatch {
                    label: entry.label.clone(),
                    distance,
                    confidence: Self::confidence(distance, hash.bit_width()),
                });
            }
        }

        best
    }

    /// Match with threshold. Returns empty label and 0 confidence when nothing
    /// is close enough, never a low-confidence guess.
    pub fn match_image(&self, image: &DynamicImage, set: &ImageHashSet) -> (String, f32) {
        match self.best_match(image, set) {
            Some(m) if m.confidence >= self.min_confidence => (m.label, m.confidence),
            Some(m) => {
                debug!(
                    "Best match '{}' at {:.1}% below threshold {:.1}%",
                    m.label, m.confidence, self.min_confidence
                );
                (String::new(), 0.0)
            }
            None => (String::new(), 0.0),
        }
    }

    /// Resolve one portrait region against the library
    pub fn match_region(
        &self,
        region: &Region,
        image: &DynamicImage,
        library: &HashLibrary,
    ) -> RecognitionResult {
        let set_ref = region.image_hash_set_ref.as_deref().unwrap_or("");

        let Some(set) = library.resolve(set_ref) else {
            warn!(
                "Region '{}' references unknown hash set '{}'; left blank",
                region.name, set_ref
            );
            return RecognitionResult::blank(&region.name);
        };

        let (label, confidence) = self.match_image(image, set);
        RecognitionResult::new(&region.name, label, confidence)
    }

    /// Sequential loop over portrait regions, checking cancellation before each one.
    /// Regions skipped by cancellation are absent from the output.
    pub fn match_all(
        &self,
        regions: &[Region],
        buffers: &HashMap<String, Arc<DynamicImage>>,
        library: &HashLibrary,
        cancel: &CancellationFlag,
        progress: &ProgressCounter,
    ) -> Vec<RecognitionResult> {
        let mut results = Vec::with_capacity(regions.len());

        for region in regions {
            if cancel.is_cancelled() {
                debug!("Image hash loop cancelled before '{}'", region.name);
                break;
            }

            let Some(image) = buffers.get(&region.name) else {
                warn!("No pixels extracted for region '{}'", region.name);
                continue;
            };

            results.push(self.match_region(region, image, library));
            progress.increment();
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// Brightness rises left to right, with a small row-dependent wobble
    fn rising(width: u32, height: u32, wobble: bool) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
            let noise = if wobble { (y % 2) as u8 } else { 0 };
            Luma([(x * 2) as u8 + noise])
        }))
    }

    fn falling(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, _| {
            Luma([255 - (x * 2) as u8])
        }))
    }

    fn matcher() -> ImageHashMatcher {
        ImageHashMatcher::from_config(&ImageHashConfig::default())
    }

    fn hero_set(matcher: &ImageHashMatcher) -> ImageHashSet {
        ImageHashSet::new(
            "heroes",
            vec![
                matcher.build_entry("Rising", &rising(90, 80, false)),
                matcher.build_entry("Falling", &falling(90, 80)),
            ],
        )
    }

    #[test]
    fn test_hash_width_and_stability() {
        let hasher = DifferenceHasher::default();
        let image = rising(90, 80, false);

        let first = hasher.hash(&image);
        let second = hasher.hash(&image);

        assert_eq!(first.bit_width(), 64);
        assert_eq!(first, second);
    }

    #[test]
    fn test_opposite_gradients_are_maximally_distant() {
        let hasher = DifferenceHasher::default();
        let a = hasher.hash(&rising(90, 80, false));
        let b = hasher.hash(&falling(90, 80));

        assert_eq!(hasher.distance(&a, &b), Some(64));
    }

    #[test]
    fn test_confidence_formula() {
        assert_eq!(ImageHashMatcher::confidence(0, 64), 100.0);
        assert_eq!(ImageHashMatcher::confidence(16, 64), 75.0);
        assert_eq!(ImageHashMatcher::confidence(64, 64), 0.0);
        assert_eq!(ImageHashMatcher::confidence(80, 64), 0.0);
        assert_eq!(ImageHashMatcher::confidence(3, 0), 0.0);
    }

    #[test]
    fn test_match_tolerates_small_noise_and_scale() {
        let matcher = matcher();
        let set = hero_set(&matcher);

        let (label, confidence) = matcher.match_image(&rising(45, 40, true), &set);

        assert_eq!(label, "Rising");
        assert_eq!(confidence, 100.0);
    }

    #[test]
    fn test_below_threshold_is_blank() {
        let matcher = matcher();
        let set = ImageHashSet::new(
            "heroes",
            vec![matcher.build_entry("Falling", &falling(90, 80))],
        );

        let best = matcher.best_match(&rising(90, 80, false), &set).unwrap();
        assert_eq!(best.label, "Falling");

        let (label, confidence) = matcher.match_image(&rising(90, 80, false), &set);
        assert_eq!(label, "");
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_mismatched_entry_width_skipped() {
        let matcher = matcher();
        let set = ImageHashSet::new(
            "heroes",
            vec![HashEntry {
                label: "Short".to_string(),
                hash: ImageHash::from_hex("ff").unwrap(),
            }],
        );

        assert!(matcher.best_match(&rising(90, 80, false), &set).is_none());
        assert_eq!(matcher.match_image(&rising(90, 80, false), &set), (String::new(), 0.0));
    }

    #[test]
    fn test_unknown_hash_set_is_blank() {
        let matcher = matcher();
        let region = Region::new("blue_player1_hero", 0, 0, 90, 80).with_hash_set("missing");

        let result = matcher.match_region(&region, &rising(90, 80, false), &HashLibrary::empty());

        assert_eq!(result.region_name, "blue_player1_hero");
        assert_eq!(result.value, "");
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_match_all_respects_cancellation() {
        let matcher = matcher();
        let library = HashLibrary::new(vec![hero_set(&matcher)], None);
        let regions: Vec<Region> = (1..=3)
            .map(|i| Region::new(format!("blue_player{}_hero", i), 0, 0, 90, 80).with_hash_set("heroes"))
            .collect();
        let buffers: HashMap<String, Arc<DynamicImage>> = regions
            .iter()
            .map(|r| (r.name.clone(), Arc::new(rising(90, 80, false))))
            .collect();
        let progress = ProgressCounter::new();

        let results = matcher.match_all(&regions, &buffers, &library, &CancellationFlag::new(), &progress);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.value == "Rising"));
        assert_eq!(progress.completed(), 3);

        let cancelled = CancellationFlag::new();
        cancelled.cancel();
        let results = matcher.match_all(&regions, &buffers, &library, &cancelled, &progress);
        assert!(results.is_empty());
    }
}
