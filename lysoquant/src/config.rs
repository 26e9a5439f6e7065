//! Run configuration, loaded from YAML or JSON.

use std::path::Path;

use common::FileFormat;
use serde::{Deserialize, Serialize};

use crate::aggregate::QuantSettings;
use crate::classes::ClassLabelMap;
use crate::error::{Error, Result};
use crate::image::{Calibration, RawImage};
use crate::measure::Measurement;
use crate::range::DimRange;
use crate::segmentation::SegmentationSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub lyso_channel: usize,
    pub protein_channel: usize,
    /// Measurement channels, `"a-b"` or `"a"`; all channels when unset.
    pub channels: Option<String>,
    pub slices: Option<String>,
    pub frames: Option<String>,
    /// Minimum object area in calibrated units squared.
    pub min_size: f64,
    pub show_values: bool,
    pub measure_cargo: bool,
    pub cargo_threshold: u16,
    pub measurements: Vec<Measurement>,
    pub classes: ClassLabelMap,
    /// Overrides the calibration read from the raw image.
    pub calibration: Option<Calibration>,
    pub segmentation: SegmentationSettings,
    /// Warn that the model is 2D when the image has several slices.
    pub warn_3d: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            lyso_channel: 2,
            protein_channel: 3,
            channels: None,
            slices: None,
            frames: None,
            min_size: 0.53,
            show_values: false,
            measure_cargo: false,
            cargo_threshold: 0,
            measurements: Measurement::default_set(),
            classes: ClassLabelMap::default(),
            calibration: None,
            segmentation: SegmentationSettings::default(),
            warn_3d: true,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let format = FileFormat::from_path(path)?;
        let text = std::fs::read_to_string(path)?;
        let config: RunConfig = common::deserialize(&text, format)?;
        config.validate()?;
        log::debug!("Loaded run configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let format = FileFormat::from_path(path)?;
        std::fs::write(path, common::serialize(self, format)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.lyso_channel < 1 || self.protein_channel < 1 {
            return Err(Error::Config(format!(
                "channel ids start at 1, got lysosome {} and protein {}",
                self.lyso_channel, self.protein_channel
            )));
        }
        if !(self.min_size >= 0.0 && self.min_size.is_finite()) {
            return Err(Error::Config(format!(
                "min_size must be a non-negative number, got {}",
                self.min_size
            )));
        }
        if let Some(calibration) = &self.calibration {
            let valid = |v: f64| v > 0.0 && v.is_finite();
            if !valid(calibration.pixel_width) || !valid(calibration.pixel_height) {
                return Err(Error::Config(format!(
                    "pixel size must be positive, got {} x {}",
                    calibration.pixel_width, calibration.pixel_height
                )));
            }
        }
        // ClassLabelMap validates itself on construction
        Ok(())
    }

    /// Settings for one image, with ranges clamped to its dimensions.
    pub fn resolve(&self, raw: &RawImage) -> QuantSettings {
        let range = |text: &Option<String>, count: usize| match text {
            Some(text) => DimRange::parse(text, count),
            None => DimRange::full(count),
        };

        QuantSettings {
            lyso_channel: self.lyso_channel,
            protein_channel: self.protein_channel,
            channels: range(&self.channels, raw.channels()),
            slices: range(&self.slices, raw.slices()),
            frames: range(&self.frames, raw.frames()),
            min_size: self.min_size,
            show_values: self.show_values,
            cargo_threshold: self.measure_cargo.then_some(self.cargo_threshold),
            classes: self.classes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use common::test_utils::test_output_dir;
    use common::Buffer2;

    use super::*;
    use crate::image::{BitDepth, Hyperstack};

    fn raw(channels: usize, slices: usize) -> RawImage {
        Hyperstack::new(
            "raw.tif",
            channels,
            slices,
            1,
            BitDepth::Eight,
            vec![Buffer2::new_filled(2, 2, 0); channels * slices],
        )
        .unwrap()
    }

    #[test]
    fn defaults_match_plugin_preferences() {
        let config = RunConfig::default();
        assert_eq!((config.lyso_channel, config.protein_channel), (2, 3));
        assert_eq!(config.min_size, 0.53);
        assert!(!config.show_values && !config.measure_cargo);
        assert_eq!(config.classes.name(2), Some("Loaded"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loads_partial_yaml() {
        let dir = test_output_dir("config_loads_partial_yaml");
        let path = dir.join("run.yaml");
        std::fs::write(
            &path,
            "lyso_channel: 1\n\
             protein_channel: 2\n\
             channels: \"2-9\"\n\
             measure_cargo: true\n\
             cargo_threshold: 120\n\
             measurements: [area, median]\n\
             classes:\n  - id: 1\n    name: Empty\n  - id: 3\n    name: Full\n\
             segmentation:\n  gpu: none\n",
        )
        .unwrap();

        let config = RunConfig::load(&path).unwrap();

        assert_eq!(config.lyso_channel, 1);
        assert_eq!(config.min_size, 0.53);
        assert_eq!(config.measurements, vec![Measurement::Area, Measurement::Median]);
        assert_eq!(config.classes.name(3), Some("Full"));

        let settings = config.resolve(&raw(3, 1));
        assert_eq!(settings.channels, DimRange::new(2, 3));
        assert_eq!(settings.cargo_threshold, Some(120));
    }

    #[test]
    fn json_round_trip() {
        let dir = test_output_dir("config_json_round_trip");
        let path = dir.join("run.json");
        let config = RunConfig {
            show_values: true,
            slices: Some("2".to_string()),
            calibration: Some(Calibration::new(0.1, 0.1, "micron")),
            ..RunConfig::default()
        };

        config.save(&path).unwrap();

        assert_eq!(RunConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn rejects_invalid_values() {
        let zero_channel = RunConfig {
            lyso_channel: 0,
            ..RunConfig::default()
        };
        assert!(matches!(zero_channel.validate(), Err(Error::Config(_))));

        let negative_size = RunConfig {
            min_size: -1.0,
            ..RunConfig::default()
        };
        assert!(negative_size.validate().is_err());

        let flat_pixels = RunConfig {
            calibration: Some(Calibration::new(0.0, 1.0, "um")),
            ..RunConfig::default()
        };
        assert!(flat_pixels.validate().is_err());

        let duplicate_classes: std::result::Result<RunConfig, _> = serde_json::from_str(
            r#"{"classes": [{"id": 1, "name": "A"}, {"id": 1, "name": "B"}]}"#,
        );
        assert!(duplicate_classes.is_err());

        let dir = test_output_dir("config_rejects_invalid_values");
        assert!(matches!(
            RunConfig::load(&dir.join("run.toml")),
            Err(Error::FileFormat(_))
        ));
    }

    #[test]
    fn ranges_are_clamped_to_the_image() {
        let inverted = RunConfig {
            channels: Some("3-1".to_string()),
            slices: Some("2-7".to_string()),
            ..RunConfig::default()
        };

        let settings = inverted.resolve(&raw(4, 5));

        assert_eq!(settings.channels, DimRange::full(4));
        assert_eq!(settings.slices, DimRange::new(2, 5));
        assert_eq!(settings.frames, DimRange::full(1));
        assert_eq!(settings.cargo_threshold, None);
    }
}
