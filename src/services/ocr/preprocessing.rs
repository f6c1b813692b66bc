use std::collections::HashSet;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::{PipelineError, PipelineResult};
use crate::models::config::PreprocessingConfig;
use crate::models::region::{Region, Resolution};
use crate::services::diagnostics::preview_image;

/// Cropped (and possibly deskewed) pixels for one region
#[derive(Debug, Clone)]
pub struct RegionBuffer {
    pub name: String,
    pub image: Arc<DynamicImage>,
}

/// Region geometry and pixel conditioning
#[derive(Clone)]
pub struct PreprocessingService {
    config: PreprocessingConfig,
}

impl Default for PreprocessingService {
    fn default() -> Self {
        Self::new(PreprocessingConfig::default())
    }
}

impl PreprocessingService {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    /// Convert image to grayscale
    pub fn to_grayscale(&self, image: &DynamicImage) -> DynamicImage {
        DynamicImage::ImageLuma8(image.to_luma8())
    }

    /// Grayscale + contrast boost. Diagnostics only, recognition never sees this.
    pub fn preview(&self, image: &DynamicImage) -> DynamicImage {
        preview_image(image, self.config.preview_contrast)
    }

    /// Reject duplicate names and regions that don't fit the image
    pub fn validate_regions(&self, image: &DynamicImage, regions: &[Region]) -> PipelineResult<()> {
        let (image_width, image_height) = image.dimensions();
        let bounds = Resolution::new(image_width, image_height);
        let mut seen = HashSet::with_capacity(regions.len());

        for region in regions {
            if !seen.insert(region.name.as_str()) {
                return Err(PipelineError::DuplicateRegion(region.name.clone()));
            }

            if !region.fits_within(bounds) {
                return Err(PipelineError::RegionOutOfBounds {
                    name: region.name.clone(),
                    x: region.x,
                    y: region.y,
                    width: region.width,
                    height: region.height,
                    image_width,
                    image_height,
                });
            }
        }

        Ok(())
    }

    /// Extract exactly `width x height` pixels at `(x, y)`.
    /// The region must already be validated against the image.
    pub fn crop(&self, image: &DynamicImage, region: &Region) -> DynamicImage {
        image.crop_imm(region.x, region.y, region.width, region.height)
    }

    /// Horizontal shear `x' = x - y·tan(θ)` onto a fresh buffer of the same size.
    /// Pixels with no source are filled with the configured gray.
    pub fn deskew(&self, image: &DynamicImage, angle_degrees: f64) -> DynamicImage {
        let src = image.to_rgba8();
        let (width, height) = src.dimensions();
        let shear = angle_degrees.to_radians().tan();
        let gray = self.config.fill_gray;
        let fill = Rgba([gray, gray, gray, 255]);

        let sheared = RgbaImage::from_fn(width, height, |x, y| {
            // Inverse mapping keeps every destination pixel defined
            let source_x = (x as f64 + y as f64 * shear).round();
            if source_x >= 0.0 && source_x < width as f64 {
                *src.get_pixel(source_x as u32, y)
            } else {
                fill
            }
        });

        DynamicImage::ImageRgba8(sheared)
    }

    /// Crop one region, deskewing it when flagged italic
    pub fn prepare_region(&self, image: &DynamicImage, region: &Region) -> DynamicImage {
        let cropped = self.crop(image, region);
        if region.italic() {
            self.deskew(&cropped, self.config.italic_angle_degrees)
        } else {
            cropped
        }
    }

    /// Validate then prepare every region (parallel, order preserved)
    pub fn extract_regions(
        &self,
        image: &DynamicImage,
        regions: &[Region],
    ) -> PipelineResult<Vec<RegionBuffer>> {
        self.validate_regions(image, regions)?;

        Ok(regions
            .par_iter()
            .map(|region| RegionBuffer {
                name: region.name.clone(),
                image: Arc::new(self.prepare_region(image, region)),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Helper: gradient RGB image
    fn create_test_rgb_image() -> DynamicImage {
        let img = RgbImage::from_fn(100, 50, |x, y| {
            let val = ((x + y) % 256) as u8;
            Rgb([val, val, val])
        });
        DynamicImage::ImageRgb8(img)
    }

    /// Helper: every pixel encodes its own column so shifts are visible
    fn create_column_image(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, _y| Rgb([x as u8 * 10, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_grayscale_conversion() {
        let service = PreprocessingService::default();
        let gray = service.to_grayscale(&create_test_rgb_image());

        match gray {
            DynamicImage::ImageLuma8(_) => {}
            _ => panic!("Expected grayscale image (Luma8), got {:?}", gray.color()),
        }
    }

    #[test]
    fn test_preview_preserves_dimensions() {
        let service = PreprocessingService::default();
        let preview = service.preview(&create_test_rgb_image());

        assert_eq!(preview.dimensions(), (100, 50));
        assert!(matches!(preview, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_crop_exact_size_and_offset() {
        let service = PreprocessingService::default();
        let image = create_test_rgb_image();
        let region = Region::new("a", 10, 5, 20, 8);

        let cropped = service.crop(&image, &region);

        assert_eq!(cropped.dimensions(), (20, 8));
        // (10 + 5) at the crop origin
        assert_eq!(cropped.to_rgb8().get_pixel(0, 0)[0], 15);
        assert_eq!(cropped.to_rgb8().get_pixel(19, 7)[0], 41);
    }

    #[test]
    fn test_deskew_shifts_lower_rows_right() {
        let service = PreprocessingService::default();
        let image = create_column_image(20, 9);

        let sheared = service.deskew(&image, -14.0).to_rgba8();

        // Row 0 is untouched
        assert_eq!(sheared.get_pixel(5, 0)[0], 50);
        // Row 4: 4 * tan(14°) ≈ 1.0 → one pixel right
        assert_eq!(sheared.get_pixel(5, 4)[0], 40);
        // Row 8: ≈ 2.0 → two pixels right
        assert_eq!(sheared.get_pixel(5, 8)[0], 30);
        // Uncovered left edge gets neutral gray
        assert_eq!(*sheared.get_pixel(0, 8), Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn test_deskew_is_reproducible() {
        let service = PreprocessingService::default();
        let image = create_test_rgb_image();

        let first = service.deskew(&image, -14.0);
        let second = service.deskew(&image, -14.0);

        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_deskew_round_trip_preserves_shape() {
        let service = PreprocessingService::default();
        let image = create_test_rgb_image();

        let there = service.deskew(&image, -14.0);
        let back = service.deskew(&there, 14.0);

        assert_eq!(there.dimensions(), image.dimensions());
        assert_eq!(back.dimensions(), image.dimensions());
    }

    #[test]
    fn test_deskew_zero_angle_is_identity() {
        let service = PreprocessingService::default();
        let image = create_test_rgb_image();

        let same = service.deskew(&image, 0.0);
        assert_eq!(same.to_rgb8().as_raw(), image.to_rgb8().as_raw());
    }

    #[test]
    fn test_custom_fill_gray() {
        let service = PreprocessingService::new(PreprocessingConfig {
            fill_gray: 200,
            ..Default::default()
        });
        let sheared = service.deskew(&create_column_image(10, 10), -45.0).to_rgba8();
        assert_eq!(*sheared.get_pixel(0, 9), Rgba([200, 200, 200, 255]));
    }

    #[test]
    fn test_validate_out_of_bounds() {
        let service = PreprocessingService::default();
        let image = create_test_rgb_image();
        let regions = vec![Region::new("wide", 90, 0, 20, 10)];

        match service.validate_regions(&image, &regions) {
            Err(PipelineError::RegionOutOfBounds { name, .. }) => assert_eq!(name, "wide"),
            other => panic!("Expected out of bounds error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_duplicate_names() {
        let service = PreprocessingService::default();
        let image = create_test_rgb_image();
        let regions = vec![Region::new("a", 0, 0, 5, 5), Region::new("a", 5, 5, 5, 5)];

        assert!(matches!(
            service.validate_regions(&image, &regions),
            Err(PipelineError::DuplicateRegion(name)) if name == "a"
        ));
    }

    #[test]
    fn test_extract_regions_keeps_order_and_deskews_italic() {
        let service = PreprocessingService::default();
        let image = create_column_image(25, 20);
        let regions = vec![
            Region::new("plain", 0, 0, 10, 10),
            Region::new("slanted", 0, 0, 10, 10).with_italic(true),
        ];

        let buffers = service.extract_regions(&image, &regions).unwrap();

        assert_eq!(buffers.len(), 2);
        assert_eq!(buffers[0].name, "plain");
        assert_eq!(buffers[1].name, "slanted");
        assert_eq!(buffers[1].image.dimensions(), (10, 10));
        assert_eq!(buffers[0].image.to_rgba8().get_pixel(0, 8)[0], 0);
        assert_eq!(*buffers[1].image.to_rgba8().get_pixel(0, 8), Rgba([128, 128, 128, 255]));
    }
}
