//! Pipeline configuration.
//!
//! Cohort names, input suffixes, tool executables and their parameters all live in
//! [`PipelineConfig`]. It is resolved once at
//! process startup, from defaults, an optional YAML file and caller-supplied overrides, and
//! is then passed into the pipeline. The library never reads environment variables itself.

use crate::constants::{
    BET_PROGRAM, DEFAULT_COHORTS, DEFAULT_DATA_DIR, DEFAULT_INPUT_SUFFIX,
    DEFAULT_REFERENCE_TEMPLATE, FLIRT_PROGRAM, N4_PROGRAM,
};
use crate::{PrepError, PrepResult};
use neuroprep_types::{CohortName, FileSuffix};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

fn default_input_suffix() -> FileSuffix {
    FileSuffix::new(DEFAULT_INPUT_SUFFIX).expect("default input suffix is valid")
}

/// Parameters for N4 bias-field correction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct N4Params {
    pub program: String,
    pub dimension: u8,
    /// Maximum iterations at each resolution level, coarsest first.
    pub iterations: Vec<u32>,
    pub shrink_factor: u32,
    pub convergence_threshold: f64,
    /// B-spline fitting distance in millimetres.
    pub bspline_fitting_distance: f64,
}

impl Default for N4Params {
    fn default() -> Self {
        Self {
            program: N4_PROGRAM.into(),
            dimension: 3,
            iterations: vec![100, 100, 60, 40],
            shrink_factor: 3,
            convergence_threshold: 1e-4,
            bspline_fitting_distance: 300.0,
        }
    }
}

/// Parameters for `bet` brain extraction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BetParams {
    pub program: String,
    /// Robust brain centre estimation (`-R`).
    pub robust: bool,
    /// Fractional intensity threshold (`-f`), 0..=1.
    pub fractional_intensity: f64,
    /// Vertical gradient in fractional intensity threshold (`-g`), -1..=1.
    pub vertical_gradient: f64,
}

impl Default for BetParams {
    fn default() -> Self {
        Self {
            program: BET_PROGRAM.into(),
            robust: true,
            fractional_intensity: 0.3,
            vertical_gradient: 0.0,
        }
    }
}

/// `flirt` cost function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlirtCost {
    Mutualinfo,
    Corratio,
    Normcorr,
    Normmi,
    Leastsq,
    Labeldiff,
    Bbr,
}

impl FlirtCost {
    pub fn as_str(self) -> &'static str {
        match self {
            FlirtCost::Mutualinfo => "mutualinfo",
            FlirtCost::Corratio => "corratio",
            FlirtCost::Normcorr => "normcorr",
            FlirtCost::Normmi => "normmi",
            FlirtCost::Leastsq => "leastsq",
            FlirtCost::Labeldiff => "labeldiff",
            FlirtCost::Bbr => "bbr",
        }
    }
}

/// `flirt` final interpolation method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlirtInterp {
    Trilinear,
    Nearestneighbour,
    Sinc,
    Spline,
}

impl FlirtInterp {
    pub fn as_str(self) -> &'static str {
        match self {
            FlirtInterp::Trilinear => "trilinear",
            FlirtInterp::Nearestneighbour => "nearestneighbour",
            FlirtInterp::Sinc => "sinc",
            FlirtInterp::Spline => "spline",
        }
    }
}

/// Rotation search range for one axis, in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchRange {
    pub min: i32,
    pub max: i32,
}

impl Default for SearchRange {
    fn default() -> Self {
        Self { min: -90, max: 90 }
    }
}

/// Parameters for `flirt` linear registration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlirtParams {
    pub program: String,
    /// Reference template every volume is registered to.
    pub reference: PathBuf,
    pub bins: u32,
    pub cost: FlirtCost,
    pub search_x: SearchRange,
    pub search_y: SearchRange,
    pub search_z: SearchRange,
    pub dof: u8,
    pub interp: FlirtInterp,
}

impl Default for FlirtParams {
    fn default() -> Self {
        Self {
            program: FLIRT_PROGRAM.into(),
            reference: PathBuf::from(DEFAULT_REFERENCE_TEMPLATE),
            bins: 256,
            cost: FlirtCost::Corratio,
            search_x: SearchRange::default(),
            search_y: SearchRange::default(),
            search_z: SearchRange::default(),
            dof: 12,
            interp: FlirtInterp::Spline,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BiasCorrectionConfig {
    pub input_suffix: FileSuffix,
    pub n4: N4Params,
}

impl Default for BiasCorrectionConfig {
    fn default() -> Self {
        Self {
            input_suffix: default_input_suffix(),
            n4: N4Params::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkullStripConfig {
    pub input_suffix: FileSuffix,
    pub bet: BetParams,
}

impl Default for SkullStripConfig {
    fn default() -> Self {
        Self {
            input_suffix: default_input_suffix(),
            bet: BetParams::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrationConfig {
    pub input_suffix: FileSuffix,
    pub flirt: FlirtParams,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            input_suffix: default_input_suffix(),
            flirt: FlirtParams::default(),
        }
    }
}

/// Complete pipeline configuration, resolved at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory containing the cohort directories.
    pub data_dir: PathBuf,
    pub cohorts: Vec<CohortName>,
    /// Worker count for every stage. `None` keeps each stage's default pool shape.
    pub threads: Option<usize>,
    pub bias_correction: BiasCorrectionConfig,
    pub skull_strip: SkullStripConfig,
    pub registration: RegistrationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            cohorts: DEFAULT_COHORTS
                .iter()
                .map(|c| CohortName::new(c).expect("default cohort names are valid"))
                .collect(),
            threads: None,
            bias_correction: BiasCorrectionConfig::default(),
            skull_strip: SkullStripConfig::default(),
            registration: RegistrationConfig::default(),
        }
    }
}

/// Values supplied on the command line or through the environment.
///
/// Any field left as `None` keeps the value from the file or the defaults.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub cohorts: Option<Vec<CohortName>>,
    pub threads: Option<usize>,
    pub reference: Option<PathBuf>,
}

impl PipelineConfig {
    /// Load a configuration from a YAML file. Missing fields take their defaults.
    pub fn from_yaml_file(path: &Path) -> PrepResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| PrepError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    pub fn from_yaml_str(contents: &str) -> PrepResult<Self> {
        Self::parse(contents, Path::new("<inline>"))
    }

    fn parse(contents: &str, origin: &Path) -> PrepResult<Self> {
        let config: Self =
            serde_yaml::from_str(contents).map_err(|source| PrepError::ConfigParse {
                path: origin.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides on top of this configuration and re-validate.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> PrepResult<Self> {
        if let Some(data_dir) = overrides.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(cohorts) = overrides.cohorts {
            self.cohorts = cohorts;
        }
        if let Some(threads) = overrides.threads {
            self.threads = Some(threads);
        }
        if let Some(reference) = overrides.reference {
            self.registration.flirt.reference = reference;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn cohort_dir(&self, cohort: &CohortName) -> PathBuf {
        self.data_dir.join(cohort.as_str())
    }

    /// Check every value that would otherwise only fail inside an external tool.
    ///
    /// The reference template's existence is not checked here; it only matters to the
    /// registration stage and is checked when that stage starts.
    pub fn validate(&self) -> PrepResult<()> {
        if self.cohorts.is_empty() {
            return Err(invalid("at least one cohort is required"));
        }
        let mut seen = HashSet::new();
        for cohort in &self.cohorts {
            if !seen.insert(cohort.as_str()) {
                return Err(invalid(format!("cohort '{}' is listed twice", cohort)));
            }
        }

        if self.threads == Some(0) {
            return Err(invalid("threads must be at least 1"));
        }

        validate_n4(&self.bias_correction.n4)?;
        validate_bet(&self.skull_strip.bet)?;
        validate_flirt(&self.registration.flirt)?;

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> PrepError {
    PrepError::InvalidConfig(message.into())
}

fn require_program(program: &str, stage: &str) -> PrepResult<()> {
    if program.trim().is_empty() {
        return Err(invalid(format!("{stage} program cannot be empty")));
    }
    Ok(())
}

fn validate_n4(n4: &N4Params) -> PrepResult<()> {
    require_program(&n4.program, "N4")?;
    if !(2..=4).contains(&n4.dimension) {
        return Err(invalid("N4 dimension must be 2, 3 or 4"));
    }
    if n4.iterations.is_empty() || n4.iterations.contains(&0) {
        return Err(invalid(
            "N4 iterations must list at least one level, each above zero",
        ));
    }
    if n4.shrink_factor == 0 {
        return Err(invalid("N4 shrink factor must be at least 1"));
    }
    if !(n4.convergence_threshold.is_finite() && n4.convergence_threshold > 0.0) {
        return Err(invalid("N4 convergence threshold must be positive"));
    }
    if !(n4.bspline_fitting_distance.is_finite() && n4.bspline_fitting_distance > 0.0) {
        return Err(invalid("N4 B-spline fitting distance must be positive"));
    }
    Ok(())
}

fn validate_bet(bet: &BetParams) -> PrepResult<()> {
    require_program(&bet.program, "bet")?;
    if !(0.0..=1.0).contains(&bet.fractional_intensity) {
        return Err(invalid("bet fractional intensity must be within 0..=1"));
    }
    if !(-1.0..=1.0).contains(&bet.vertical_gradient) {
        return Err(invalid("bet vertical gradient must be within -1..=1"));
    }
    Ok(())
}

fn validate_flirt(flirt: &FlirtParams) -> PrepResult<()> {
    require_program(&flirt.program, "flirt")?;
    if flirt.reference.as_os_str().is_empty() {
        return Err(invalid("flirt reference template cannot be empty"));
    }
    if flirt.bins == 0 {
        return Err(invalid("flirt bins must be at least 1"));
    }
    if ![6, 7, 9, 12].contains(&flirt.dof) {
        return Err(invalid("flirt dof must be one of 6, 7, 9 or 12"));
    }
    for (axis, range) in [
        ("x", flirt.search_x),
        ("y", flirt.search_y),
        ("z", flirt.search_z),
    ] {
        if range.min > range.max || range.min < -180 || range.max > 180 {
            return Err(invalid(format!(
                "flirt search range for {axis} must satisfy -180 <= min <= max <= 180"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_original_parameters() {
        let config = PipelineConfig::default();
        config.validate().unwrap();

        let cohorts: Vec<&str> = config.cohorts.iter().map(|c| c.as_str()).collect();
        assert_eq!(cohorts, ["AD", "CN"]);

        let n4 = &config.bias_correction.n4;
        assert_eq!(n4.iterations, [100, 100, 60, 40]);
        assert_eq!(n4.shrink_factor, 3);

        let bet = &config.skull_strip.bet;
        assert!(bet.robust);
        assert_eq!(bet.fractional_intensity, 0.3);

        let flirt = &config.registration.flirt;
        assert_eq!(flirt.reference, PathBuf::from("MNI152_T1_1mm.nii"));
        assert_eq!(flirt.cost, FlirtCost::Corratio);
        assert_eq!(flirt.interp, FlirtInterp::Spline);
        assert_eq!(flirt.dof, 12);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
data_dir: /data/adni
cohorts: [AD]
skull_strip:
  input_suffix: _N4_Bias_Corr.nii
  bet:
    fractional_intensity: 0.5
registration:
  flirt:
    cost: normmi
    search_z: { min: -30, max: 30 }
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/data/adni"));
        assert_eq!(config.cohorts.len(), 1);
        assert_eq!(config.skull_strip.input_suffix.as_str(), "_N4_Bias_Corr.nii");
        assert_eq!(config.skull_strip.bet.fractional_intensity, 0.5);
        assert!(config.skull_strip.bet.robust);
        assert_eq!(config.registration.flirt.cost, FlirtCost::Normmi);
        assert_eq!(config.registration.flirt.search_z, SearchRange { min: -30, max: 30 });
        assert_eq!(config.registration.flirt.search_x, SearchRange::default());
        assert_eq!(config.bias_correction, BiasCorrectionConfig::default());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = PipelineConfig::from_yaml_str("cohort: [AD]\n");
        assert!(matches!(result, Err(PrepError::ConfigParse { .. })));
    }

    #[test]
    fn test_invalid_suffix_in_yaml_is_rejected() {
        let yaml = "bias_correction:\n  input_suffix: nii\n";
        assert!(PipelineConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.cohorts.push(CohortName::new("AD").unwrap());
        assert!(matches!(config.validate(), Err(PrepError::InvalidConfig(_))));

        let mut config = PipelineConfig::default();
        config.cohorts.clear();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.threads = Some(0);
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.bias_correction.n4.iterations = vec![100, 0];
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.skull_strip.bet.fractional_intensity = 1.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.registration.flirt.dof = 8;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.registration.flirt.search_y = SearchRange { min: 10, max: -10 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config = PipelineConfig::default()
            .with_overrides(ConfigOverrides {
                data_dir: Some(PathBuf::from("/scans")),
                cohorts: None,
                threads: Some(4),
                reference: Some(PathBuf::from("/templates/MNI152_T1_2mm.nii")),
            })
            .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/scans"));
        assert_eq!(config.threads, Some(4));
        assert_eq!(
            config.registration.flirt.reference,
            PathBuf::from("/templates/MNI152_T1_2mm.nii")
        );
        assert_eq!(
            config.cohort_dir(&config.cohorts[1]),
            PathBuf::from("/scans/CN")
        );
    }

    #[test]
    fn test_from_yaml_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("neuroprep.yaml");
        std::fs::write(&path, "threads: [not, a, number]\n").unwrap();

        let err = PipelineConfig::from_yaml_file(&path).unwrap_err();
        assert!(err.to_string().contains("neuroprep.yaml"));

        let missing = PipelineConfig::from_yaml_file(&temp.path().join("absent.yaml"));
        assert!(matches!(missing, Err(PrepError::ConfigRead { .. })));
    }
}
