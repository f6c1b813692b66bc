use std::collections::HashMap;

use crate::models::region::Region;

/// Whether a group is worth its own engine pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSize {
    Large,
    Small,
}

/// Text regions sharing one character whitelist
#[derive(Debug, Clone, PartialEq)]
pub struct RegionGroup {
    /// Whitelist; empty means unrestricted
    pub char_set: String,
    pub regions: Vec<Region>,
    pub size: GroupSize,
}

impl RegionGroup {
    pub fn is_large(&self) -> bool {
        self.size == GroupSize::Large
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Independent workstreams for one recognition pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub image_hash: Vec<Region>,
    pub large_groups: Vec<RegionGroup>,
    pub small_groups: Vec<RegionGroup>,
}

impl Partition {
    pub fn text_region_count(&self) -> usize {
        self.large_groups
            .iter()
            .chain(self.small_groups.iter())
            .map(RegionGroup::len)
            .sum()
    }

    pub fn total_regions(&self) -> usize {
        self.image_hash.len() + self.text_region_count()
    }
}

/// Split regions by strategy, then group text regions by whitelist.
/// Groups keep first-seen order; a group is large when it has more than
/// `large_group_threshold` regions.
pub fn partition_regions(regions: &[Region], large_group_threshold: usize) -> Partition {
    let mut image_hash = Vec::new();
    let mut groups: Vec<(String, Vec<Region>)> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for region in regions {
        if region.is_image_hash() {
            image_hash.push(region.clone());
            continue;
        }

        let key = region.char_set_key();
        let index = match group_index.get(key) {
            Some(index) => *index,
            None => {
                groups.push((key.to_string(), Vec::new()));
                group_index.insert(key.to_string(), groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[index].1.push(region.clone());
    }

    let mut partition = Partition {
        image_hash,
        ..Default::default()
    };

    for (char_set, regions) in groups {
        let size = if regions.len() > large_group_threshold {
            GroupSize::Large
        } else {
            GroupSize::Small
        };
        let group = RegionGroup {
            char_set,
            regions,
            size,
        };
        match size {
            GroupSize::Large => partition.large_groups.push(group),
            GroupSize::Small => partition.small_groups.push(group),
        }
    }

    partition
}
