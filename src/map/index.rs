use rstar::primitives::{GeomWithData, Rectangle};
use rstar::RTree;

use super::feature::{Feature, FeatureCollection};
use super::geo::Coordinate;

type IndexedBox = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Point lookup over the rendered parcels, used to turn a map click into a selection.
pub struct FeatureIndex {
    tree: RTree<IndexedBox>,
    features: Vec<Feature>,
}

impl FeatureIndex {
    pub fn build(collection: &FeatureCollection) -> Self {
        let features = collection.features.clone();
        let boxes = features
            .iter()
            .enumerate()
            .filter_map(|(slot, feature)| {
                // Parcels without usable geometry can't be clicked
                let bounds = feature.bounds().ok()?;
                let rect = Rectangle::from_corners(
                    [bounds.min_lng, bounds.min_lat],
                    [bounds.max_lng, bounds.max_lat],
                );
                Some(GeomWithData::new(rect, slot))
            })
            .collect();

        Self {
            tree: RTree::bulk_load(boxes),
            features,
        }
    }

    pub fn empty() -> Self {
        Self {
            tree: RTree::new(),
            features: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The feature under `point`, preferring the earliest one in collection order.
    pub fn hit_test(&self, point: Coordinate) -> Option<&Feature> {
        self.tree
            .locate_all_at_point(&[point.longitude, point.latitude])
            .map(|entry| entry.data)
            .filter(|&slot| self.features[slot].contains(point))
            .min()
            .map(|slot| &self.features[slot])
    }
}

impl Default for FeatureIndex {
    fn default() -> Self {
        Self::empty()
    }
}
