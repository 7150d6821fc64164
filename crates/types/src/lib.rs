//! Validated text types shared across the neuroprep workspace.
//!
//! Cohort names and filename suffixes are both plain strings on disk, but both end up
//! joined into filesystem paths. Wrapping them here means a bad value is rejected once,
//! at configuration time, instead of producing a surprising path half way through a batch.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("text cannot be empty")]
    Empty,

    /// The input contained a path separator or parent-directory component
    #[error("'{0}' must not contain path separators or '..'")]
    PathComponent(String),

    /// A filename suffix did not begin with '.' or '_'
    #[error("suffix '{0}' must start with '.' or '_'")]
    SuffixStart(String),
}

fn reject_path_components(value: &str) -> Result<(), TextError> {
    if value.contains('/') || value.contains('\\') || value.contains("..") {
        return Err(TextError::PathComponent(value.to_owned()));
    }
    Ok(())
}

/// Name of a cohort directory, such as `AD` or `CN`.
///
/// The name is a single directory component relative to the data root: it is trimmed,
/// must be non-empty and must not contain separators or `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CohortName(String);

impl CohortName {
    /// Creates a new `CohortName`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` for blank input and `TextError::PathComponent` when the
    /// name would escape the data root.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        reject_path_components(trimmed)?;
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Filename suffix that marks a processing stage, e.g. `.nii` or `_reg.nii`.
///
/// Suffixes are matched against the end of a file name, so unlike [`CohortName`] they are
/// not trimmed: whitespace is rejected outright.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileSuffix(String);

impl FileSuffix {
    /// Creates a new `FileSuffix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the suffix is empty, contains whitespace, contains a path
    /// separator, or starts with anything other than `.` or `_`.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let value = input.as_ref();
        if value.trim().is_empty() {
            return Err(TextError::Empty);
        }
        if value.chars().any(char::is_whitespace) {
            return Err(TextError::PathComponent(value.to_owned()));
        }
        reject_path_components(value)?;
        if !(value.starts_with('.') || value.starts_with('_')) {
            return Err(TextError::SuffixStart(value.to_owned()));
        }
        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `file_name` ends with this suffix and has a non-empty stem.
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.len() > self.0.len() && file_name.ends_with(&self.0)
    }

    /// The file extension carried by this suffix: everything from its first `.`.
    ///
    /// `_skull_stripped.nii` has extension `.nii`, `.nii.gz` has `.nii.gz` and `_raw` has none.
    pub fn extension(&self) -> &str {
        self.0.find('.').map_or("", |i| &self.0[i..])
    }
}

macro_rules! text_impls {
    ($ty:ident) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $ty {
            type Err = TextError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::new(s)
            }
        }

        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $ty::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

text_impls!(CohortName);
text_impls!(FileSuffix);
