//! Depth-ordered blending of the samples gathered for one pixel.

use crate::math::{FreeCoordinate, Rgba};

/// One layer contributing to a pixel: either what was already drawn there, or the result
/// of casting the pixel's ray through one volume.
#[derive(Clone, Copy, Debug, PartialEq)]
#[expect(clippy::exhaustive_structs)]
pub struct CompositeSample {
    /// Color with premultiplied alpha.
    pub color: Rgba,
    /// Distance along the ray from its origin.
    pub depth: FreeCoordinate,
}

/// The samples for one pixel, kept sorted farthest first.
///
/// A list is meant to be reused from pixel to pixel, so that its storage is allocated once
/// per row rather than once per pixel.
#[derive(Clone, Debug, Default)]
pub struct SampleList {
    samples: Vec<CompositeSample>,
}

impl SampleList {
    /// Creates an empty list with room for `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Removes all samples, keeping the allocation.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Adds a sample, moving it toward the front of the list past every sample nearer than
    /// it. Samples at equal depth keep the order they were inserted in.
    pub fn insert(&mut self, sample: CompositeSample) {
        self.samples.push(sample);
        let mut q = self.samples.len() - 1;
        while q > 0 && self.samples[q].depth > self.samples[q - 1].depth {
            self.samples.swap(q, q - 1);
            q -= 1;
        }
    }

    /// The samples, farthest first.
    pub fn as_slice(&self) -> &[CompositeSample] {
        &self.samples
    }

    /// Blends the samples; see [`composite_back_to_front()`].
    pub fn composite(&self) -> Rgba {
        composite_back_to_front(&self.samples)
    }
}

/// Blends `samples`, which must be ordered farthest first, with the “over” operator,
/// and clamps the result to the displayable range.
///
/// The alpha of the result is the total opacity of all the layers; it tells whether a
/// background color behind them would still show through.
pub fn composite_back_to_front(samples: &[CompositeSample]) -> Rgba {
    samples
        .iter()
        .fold(Rgba::TRANSPARENT, |behind, sample| sample.color.over(behind))
        .clamp01()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(r: f32, g: f32, b: f32, a: f32, depth: FreeCoordinate) -> CompositeSample {
        CompositeSample {
            color: Rgba::new(r, g, b, a),
            depth,
        }
    }

    fn depths(list: &SampleList) -> Vec<FreeCoordinate> {
        list.as_slice().iter().map(|s| s.depth).collect()
    }

    #[test]
    fn insertion_sorts_far_to_near() {
        let mut list = SampleList::default();
        for depth in [5.0, 9.0, 1.0, 7.0, 3.0] {
            list.insert(sample(0.0, 0.0, 0.0, 0.0, depth));
        }
        assert_eq!(depths(&list), vec![9.0, 7.0, 5.0, 3.0, 1.0]);
    }

    /// A new sample farther than everything must travel all the way to the front.
    #[test]
    fn insertion_reaches_front() {
        let mut list = SampleList::default();
        list.insert(sample(0.0, 0.0, 0.0, 0.0, 2.0));
        list.insert(sample(0.0, 0.0, 0.0, 0.0, 1.0));
        list.insert(sample(1.0, 0.0, 0.0, 0.0, 100.0));
        assert_eq!(depths(&list), vec![100.0, 2.0, 1.0]);
    }

    #[test]
    fn equal_depths_keep_insertion_order() {
        let mut list = SampleList::default();
        list.insert(sample(0.1, 0.0, 0.0, 0.0, 4.0));
        list.insert(sample(0.2, 0.0, 0.0, 0.0, 4.0));
        let reds: Vec<f32> = list.as_slice().iter().map(|s| s.color.to_array()[0]).collect();
        assert_eq!(reds, vec![0.1, 0.2]);
    }

    #[test]
    fn clear_empties() {
        let mut list = SampleList::with_capacity(3);
        list.insert(sample(0.0, 0.0, 0.0, 0.0, 1.0));
        list.clear();
        assert!(list.as_slice().is_empty());
        assert_eq!(list.composite(), Rgba::TRANSPARENT);
    }

    #[test]
    fn opaque_near_sample_hides_far() {
        let samples = [sample(0.0, 0.0, 1.0, 1.0, 10.0), sample(1.0, 0.0, 0.0, 1.0, 2.0)];
        assert_eq!(composite_back_to_front(&samples), Rgba::new(1.0, 0.0, 0.0, 1.0));
    }

    /// Two translucent layers composite differently depending on order, and the
    /// far-to-near order gives the reference answer.
    #[test]
    fn order_matters() {
        let far = sample(0.0, 0.0, 0.6, 0.6, 10.0);
        let near = sample(0.5, 0.0, 0.0, 0.5, 2.0);

        let mut list = SampleList::default();
        list.insert(near);
        list.insert(far);
        let correct = list.composite();
        // near.rgb + (1 - near.alpha) * far.rgb
        let expected = [0.5, 0.0, 0.3, 0.8];
        for (c, e) in correct.to_array().into_iter().zip(expected) {
            assert!((c - e).abs() < 1e-6, "{correct:?}");
        }

        let reversed = composite_back_to_front(&[near, far]);
        assert_ne!(reversed, correct);
    }

    #[test]
    fn oversaturation_is_clamped() {
        let samples = [sample(0.9, 0.9, 0.0, 0.5, 3.0), sample(0.8, 0.0, 0.0, 0.2, 1.0)];
        let result = composite_back_to_front(&samples).to_array();
        assert_eq!(result[0], 1.0);
        assert!(result.iter().all(|c| (0.0..=1.0).contains(c)));
    }
}
