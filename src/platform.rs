//! Target platform resolution.
//!
//! A project's target platform is encoded in its `DSP` element as a versioned
//! schema-provider string:
//!
//! ```text
//! Microsoft.Data.Tools.Schema.Sql.Sql130DatabaseSchemaProvider
//! └──────────── prefix ──────────┘└┬─┘└──────── suffix ───────┘
//!                                version token
//! ```
//!
//! The resolver strips the fixed prefix and suffix and validates the remaining
//! token against the closed platform set. No partial matches, no normalization.

use crate::error::ProjectError;

/// Fixed prefix of every schema-provider string.
pub const DSP_PREFIX: &str = "Microsoft.Data.Tools.Schema.Sql.Sql";
/// Fixed suffix of every schema-provider string.
pub const DSP_SUFFIX: &str = "DatabaseSchemaProvider";

/// MSBuild path expression for a platform's system dacpac directory.
const SYSTEM_DACPACS_LOCATION: &str = r"$(SystemDacpacsLocation)\SystemDacpacs";

/// The closed set of known schema-provider generations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetPlatform {
    Sql90,
    Sql100,
    Sql110,
    Sql120,
    Sql130,
    Sql140,
    Sql150,
    /// Azure SQL Database (cloud variant).
    SqlAzureV12,
}

impl TargetPlatform {
    /// The version token embedded in DSP strings and system dacpac paths.
    pub fn version_token(&self) -> &'static str {
        match self {
            Self::Sql90 => "90",
            Self::Sql100 => "100",
            Self::Sql110 => "110",
            Self::Sql120 => "120",
            Self::Sql130 => "130",
            Self::Sql140 => "140",
            Self::Sql150 => "150",
            Self::SqlAzureV12 => "AzureV12",
        }
    }

    fn from_version_token(token: &str) -> Option<Self> {
        match token {
            "90" => Some(Self::Sql90),
            "100" => Some(Self::Sql100),
            "110" => Some(Self::Sql110),
            "120" => Some(Self::Sql120),
            "130" => Some(Self::Sql130),
            "140" => Some(Self::Sql140),
            "150" => Some(Self::Sql150),
            "AzureV12" => Some(Self::SqlAzureV12),
            _ => None,
        }
    }

    /// Parse a full schema-provider string.
    pub fn from_dsp(dsp: &str) -> Result<Self, ProjectError> {
        let token = dsp
            .strip_prefix(DSP_PREFIX)
            .and_then(|rest| rest.strip_suffix(DSP_SUFFIX))
            .ok_or_else(|| ProjectError::schema_provider(dsp.to_string()))?;
        Self::from_version_token(token)
            .ok_or_else(|| ProjectError::schema_provider(dsp.to_string()))
    }

    /// The full schema-provider string for this platform.
    pub fn dsp(&self) -> String {
        format!("{DSP_PREFIX}{}{DSP_SUFFIX}", self.version_token())
    }
}

impl std::fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.version_token())
    }
}

/// The canonical path expression for a system database reference artifact,
/// e.g. `$(SystemDacpacsLocation)\SystemDacpacs\130\master.dacpac`.
pub fn system_dacpac_path(platform: TargetPlatform, reference_name: &str) -> String {
    format!(
        r"{SYSTEM_DACPACS_LOCATION}\{}\{reference_name}.dacpac",
        platform.version_token()
    )
}
