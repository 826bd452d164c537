use serde::{Deserialize, Serialize};

pub const IMAGENET_MEANS: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STDS: [f32; 3] = [0.229, 0.224, 0.225];

/// The filter used to resize images.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Bilinear,
    Bicubic,
}

/// How raw images must be shaped and normalized to match the statistics the parameters were
/// trained with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessSpec {
    /// The length the short side is resized to.
    pub resize_dimension: u32,
    /// The side of the square center crop taken after resizing.
    pub crop_dimension: u32,
    pub channel_means: [f32; 3],
    pub channel_stds: [f32; 3],
    #[serde(default)]
    pub interpolation: Interpolation,
}

impl PreprocessSpec {
    /// Creates a new `PreprocessSpec` with ImageNet statistics.
    ///
    /// # Arguments
    /// * `resize_dimension` - The short side target.
    /// * `crop_dimension` - The side of the center crop.
    ///
    /// # Returns
    /// A new `PreprocessSpec` instance.
    pub const fn imagenet(resize_dimension: u32, crop_dimension: u32) -> Self {
        Self {
            resize_dimension,
            crop_dimension,
            channel_means: IMAGENET_MEANS,
            channel_stds: IMAGENET_STDS,
            interpolation: Interpolation::Bilinear,
        }
    }

    pub const fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Checks the transform is feasible.
    ///
    /// # Returns
    /// A description of the first problem found, if any.
    pub fn problem(&self) -> Option<&'static str> {
        if self.crop_dimension == 0 || self.resize_dimension == 0 {
            return Some("dimensions must be positive");
        }
        if self.crop_dimension > self.resize_dimension {
            return Some("crop dimension exceeds resize dimension");
        }
        if self.channel_stds.iter().any(|s| !(s.is_finite() && *s > 0.)) {
            return Some("channel stds must be positive");
        }
        if self.channel_means.iter().any(|m| !m.is_finite()) {
            return Some("channel means must be finite");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feasibility() {
        assert_eq!(PreprocessSpec::imagenet(256, 224).problem(), None);
        assert_eq!(PreprocessSpec::imagenet(310, 299).problem(), None);
        assert!(PreprocessSpec::imagenet(224, 256).problem().is_some());
        assert!(PreprocessSpec::imagenet(0, 0).problem().is_some());

        let mut spec = PreprocessSpec::imagenet(256, 224);
        spec.channel_stds[1] = 0.;
        assert!(spec.problem().is_some());
    }
}
