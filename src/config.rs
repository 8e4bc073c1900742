use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum LabelType {
    #[serde(alias = "string")]
    String,
    #[serde(alias = "term")]
    Term,
}

/// How a domain label must relate to the codomain label it is mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum LabelRelation {
    #[serde(alias = "isomorphism")]
    Isomorphism,
    #[serde(alias = "specialisation", alias = "Specialization", alias = "specialization")]
    Specialisation,
    #[serde(alias = "unification")]
    Unification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct LabelSettings {
    #[serde(alias = "labelType")]
    pub label_type: LabelType,
    pub relation: LabelRelation,
    #[serde(default, alias = "withStereo")]
    pub with_stereo: bool,
    #[serde(default = "default_stereo_relation", alias = "stereoRelation")]
    pub stereo_relation: LabelRelation,
}

fn default_stereo_relation() -> LabelRelation {
    LabelRelation::Isomorphism
}

impl LabelSettings {
    pub fn new(label_type: LabelType, relation: LabelRelation) -> Self {
        Self {
            label_type,
            relation,
            with_stereo: false,
            stereo_relation: default_stereo_relation(),
        }
    }

    pub fn with_stereo(mut self, stereo_relation: LabelRelation) -> Self {
        self.with_stereo = true;
        self.stereo_relation = stereo_relation;
        self
    }

    pub fn string_iso() -> Self {
        Self::new(LabelType::String, LabelRelation::Isomorphism)
    }
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self::string_iso()
    }
}

/// Settings for a run of the engine, usually read from the head of a scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default, alias = "labelSettings")]
    pub label_settings: LabelSettings,
    /// Diagnostic detail forwarded to the indentation-aware logger.
    #[serde(default)]
    pub verbosity: usize,
    #[serde(default = "default_log_level", alias = "logLevel")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label_settings: LabelSettings::default(),
            verbosity: 0,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
