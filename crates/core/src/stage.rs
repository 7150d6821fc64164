//! The three preprocessing stages and what distinguishes them.

use crate::config::PipelineConfig;
use crate::constants::{BIAS_CORRECTION_SUFFIX, REGISTRATION_SUFFIX, SKULL_STRIP_SUFFIX};
use crate::dispatch::PoolShape;
use crate::tools::ToolCommand;
use neuroprep_types::FileSuffix;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    BiasCorrection,
    SkullStrip,
    Registration,
}

impl Stage {
    /// Stages in the order their outputs feed each other.
    pub const CHAIN: [Stage; 3] = [Stage::BiasCorrection, Stage::SkullStrip, Stage::Registration];

    /// This stage followed by every stage after it in [`Stage::CHAIN`].
    pub fn downstream(self) -> impl Iterator<Item = Stage> {
        Stage::CHAIN.into_iter().skip_while(move |s| *s != self)
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::BiasCorrection => "bias-correction",
            Stage::SkullStrip => "skull-strip",
            Stage::Registration => "registration",
        }
    }

    /// Suffix of the final derivative this stage leaves on disk.
    pub fn output_suffix(self) -> FileSuffix {
        let suffix = match self {
            Stage::BiasCorrection => BIAS_CORRECTION_SUFFIX,
            Stage::SkullStrip => SKULL_STRIP_SUFFIX,
            Stage::Registration => REGISTRATION_SUFFIX,
        };
        FileSuffix::new(suffix).expect("stage output suffixes are valid")
    }

    /// Whether the external tool writes gzip-compressed output that must be expanded.
    pub fn compressed_output(self) -> bool {
        !matches!(self, Stage::BiasCorrection)
    }

    /// N4 is CPU-bound and gets one worker per core; `bet` and `flirt` runs are
    /// oversubscribed.
    pub fn pool_shape(self) -> PoolShape {
        match self {
            Stage::BiasCorrection => PoolShape::Cpu,
            Stage::SkullStrip | Stage::Registration => PoolShape::Io,
        }
    }

    pub fn configured_input_suffix(self, config: &PipelineConfig) -> &FileSuffix {
        match self {
            Stage::BiasCorrection => &config.bias_correction.input_suffix,
            Stage::SkullStrip => &config.skull_strip.input_suffix,
            Stage::Registration => &config.registration.input_suffix,
        }
    }

    pub fn tool(self, config: &PipelineConfig) -> &dyn ToolCommand {
        match self {
            Stage::BiasCorrection => &config.bias_correction.n4,
            Stage::SkullStrip => &config.skull_strip.bet,
            Stage::Registration => &config.registration.flirt,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_suffixes() {
        assert_eq!(Stage::BiasCorrection.output_suffix().as_str(), "_N4_Bias_Corr.nii");
        assert_eq!(Stage::SkullStrip.output_suffix().as_str(), "_skull_stripped.nii");
        assert_eq!(Stage::Registration.output_suffix().as_str(), "_reg.nii");
    }

    #[test]
    fn test_only_fsl_stages_compress() {
        assert!(!Stage::BiasCorrection.compressed_output());
        assert!(Stage::SkullStrip.compressed_output());
        assert!(Stage::Registration.compressed_output());
    }

    #[test]
    fn test_downstream_stages() {
        let from_strip: Vec<Stage> = Stage::SkullStrip.downstream().collect();
        assert_eq!(from_strip, [Stage::SkullStrip, Stage::Registration]);
        assert_eq!(Stage::BiasCorrection.downstream().count(), 3);
        assert_eq!(Stage::Registration.downstream().count(), 1);
    }

    #[test]
    fn test_pool_shapes() {
        assert_eq!(Stage::BiasCorrection.pool_shape(), PoolShape::Cpu);
        assert_eq!(Stage::SkullStrip.pool_shape(), PoolShape::Io);
        assert_eq!(Stage::Registration.pool_shape(), PoolShape::Io);
    }
}
