use serde::{Deserialize, Serialize};

/// Pixel dimensions of an image or of the resolution a profile was authored at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Named rectangle on the scoreboard screenshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Allowed characters for text recognition. `None` and `""` both mean no restriction.
    #[serde(default)]
    pub char_set: Option<String>,
    #[serde(default)]
    pub is_italic: Option<bool>,
    /// Hash set used to classify this region as an image instead of text
    #[serde(default)]
    pub image_hash_set_ref: Option<String>,
}

impl Region {
    /// Create a plain text region with no whitelist
    pub fn new(name: impl Into<String>, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            width,
            height,
            char_set: None,
            is_italic: None,
            image_hash_set_ref: None,
        }
    }

    pub fn with_char_set(mut self, char_set: impl Into<String>) -> Self {
        self.char_set = Some(char_set.into());
        self
    }

    pub fn with_italic(mut self, italic: bool) -> Self {
        self.is_italic = Some(italic);
        self
    }

    pub fn with_hash_set(mut self, hash_set_ref: impl Into<String>) -> Self {
        self.image_hash_set_ref = Some(hash_set_ref.into());
        self
    }

    /// Validate region dimensions
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Get the end coordinates
    pub fn x2(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    pub fn y2(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Calculate area
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Check if region contains a point
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let (x, y) = (x as u64, y as u64);
        x >= self.x as u64 && x < self.x2() && y >= self.y as u64 && y < self.y2()
    }

    /// Check if region intersects with another region
    pub fn intersects(&self, other: &Region) -> bool {
        (self.x as u64) < other.x2()
            && self.x2() > other.x as u64
            && (self.y as u64) < other.y2()
            && self.y2() > other.y as u64
    }

    /// Whether the whole rectangle lies inside an image of the given size
    pub fn fits_within(&self, image: Resolution) -> bool {
        self.is_valid() && self.x2() <= image.width as u64 && self.y2() <= image.height as u64
    }

    /// Whether this region is resolved by portrait matching rather than text recognition
    pub fn is_image_hash(&self) -> bool {
        self.image_hash_set_ref
            .as_deref()
            .is_some_and(|set| !set.is_empty())
    }

    /// Whitelist key used for grouping; empty means unrestricted
    pub fn char_set_key(&self) -> &str {
        self.char_set.as_deref().unwrap_or("")
    }

    pub fn italic(&self) -> bool {
        self.is_italic.unwrap_or(false)
    }

    /// Scale this region from the resolution it was authored at to `actual`.
    /// X and Y scale independently; every field is rounded to the nearest pixel.
    pub fn scaled(&self, reference: Resolution, actual: Resolution) -> Region {
        let sx = actual.width as f64 / reference.width as f64;
        let sy = actual.height as f64 / reference.height as f64;

        Region {
            x: scale_component(self.x, sx),
            y: scale_component(self.y, sy),
            width: scale_component(self.width, sx),
            height: scale_component(self.height, sy),
            ..self.clone()
        }
    }
}

fn scale_component(value: u32, factor: f64) -> u32 {
    (value as f64 * factor).round() as u32
}

/// Resolve a region list authored at `reference` to an image of size `actual`
pub fn resolve_regions(regions: &[Region], reference: Resolution, actual: Resolution) -> Vec<Region> {
    if reference == actual {
        return regions.to_vec();
    }
    regions
        .iter()
        .map(|region| region.scaled(reference, actual))
        .collect()
}
