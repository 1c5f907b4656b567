// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Router Configuration Types
//
// Defines the configuration schema for the conductor routing engine:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Analyzer floor and structural cue vocabularies
// - Confidence bands, calibration buckets and drift monitoring
// - Relationship graph seeds and conflict rule table
// - Strategy, context handoff, dispatch and learning store settings
// - The declared handler catalog

use conductor_cortex::{LifecyclePolicy, LogCompactorConfig};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::confidence::ConfidenceThresholds;
use crate::domain::conflict::{ConflictCategory, ResolutionStrategy};
use crate::domain::handler::HandlerDescriptor;
use crate::domain::relationship::{RelationshipKind, MAX_LEARNING_RATE};

pub const API_VERSION: &str = "conductor/v1";
pub const KIND: &str = "RouterConfig";

/// Top-level Kubernetes-style router configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfigManifest {
    /// API version (must be "conductor/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "RouterConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: RouterConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Router configuration (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfigSpec {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub confidence: ConfidenceConfig,

    #[serde(default)]
    pub relationships: RelationshipConfig,

    #[serde(default)]
    pub conflicts: ConflictConfig,

    #[serde(default)]
    pub strategy: StrategyConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub learning: LearningConfig,

    #[serde(default)]
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Minimum raw strength for a domain to count as matched
    pub floor: f64,

    /// Summed trigger weight at which strength reaches ~63%
    pub saturation: f64,

    pub sequential_cues: Vec<String>,
    pub parallel_cues: Vec<String>,
    pub dependency_cues: Vec<String>,
    pub urgency_terms: Vec<String>,

    /// Word count treated as maximally complex
    pub long_query_words: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            floor: 0.15,
            saturation: 1.0,
            sequential_cues: strings(&["and then", "then", "followed by", "after that", "before"]),
            parallel_cues: strings(&["with", "while", "alongside", "in parallel", "simultaneously", "as well as"]),
            dependency_cues: strings(&["requiring", "requires", "depends on", "depending on", "blocked by", "once"]),
            urgency_terms: strings(&["urgent", "critical", "asap", "immediately", "outage", "blocker", "production down"]),
            long_query_words: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub high: f64,
    pub medium: f64,

    /// Below this, plans are flagged requires-confirmation
    pub fallback: f64,

    pub bucket_count: usize,

    /// Pseudo-observations granted to the raw score when blending
    pub prior_strength: f64,

    /// Outcomes in the rolling calibration-error window
    pub drift_window: usize,

    pub drift_threshold: f64,

    /// Clear bucket statistics when drift is detected
    pub reset_on_drift: bool,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            high: 0.7,
            medium: 0.5,
            fallback: 0.4,
            bucket_count: 10,
            prior_strength: 10.0,
            drift_window: 50,
            drift_threshold: 0.15,
            reset_on_drift: false,
        }
    }
}

impl ConfidenceConfig {
    pub fn thresholds(&self) -> ConfidenceThresholds {
        ConfidenceThresholds {
            high: self.high,
            medium: self.medium,
            fallback: self.fallback,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipSeed {
    pub from: String,
    pub to: String,
    pub kind: RelationshipKind,
    pub strength: f64,
    #[serde(default = "default_true")]
    pub bidirectional: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipConfig {
    /// Hop bound for transitive path search
    pub max_hops: usize,

    /// Per-observation strength change (at most 0.2)
    pub learning_rate: f64,

    pub seed: Vec<RelationshipSeed>,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            max_hops: 4,
            learning_rate: 0.1,
            seed: vec![
                seed("security", "containers", RelationshipKind::Synergistic, 0.6, true),
                seed("testing", "debugging", RelationshipKind::Sequential, 0.5, false),
                seed("performance", "database", RelationshipKind::Synergistic, 0.5, true),
                seed("architecture", "performance", RelationshipKind::Hierarchical, 0.4, false),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRule {
    pub between: [String; 2],
    pub category: ConflictCategory,
    pub severity: f64,
    pub description: String,
    #[serde(default)]
    pub resolutions: Vec<ResolutionStrategy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    pub rules: Vec<ConflictRule>,

    /// Phrases signalling contradictory requirements
    pub contradiction_cues: Vec<String>,

    /// Severity added per contradiction cue found in the query
    pub cue_increment: f64,

    /// Severity at or above which hierarchical coordination is forced
    pub escalation_severity: f64,

    pub cycle_severity: f64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                ConflictRule {
                    between: ["security".to_string(), "performance".to_string()],
                    category: ConflictCategory::ApproachContradiction,
                    severity: 0.6,
                    description: "latency vs protection trade-off".to_string(),
                    resolutions: vec![ResolutionStrategy::Negotiate, ResolutionStrategy::Sequence],
                },
                ConflictRule {
                    between: ["containers".to_string(), "performance".to_string()],
                    category: ConflictCategory::ResourceCompetition,
                    severity: 0.4,
                    description: "shared CPU and memory limits".to_string(),
                    resolutions: vec![ResolutionStrategy::PartitionResources],
                },
                ConflictRule {
                    between: ["testing".to_string(), "performance".to_string()],
                    category: ConflictCategory::Timing,
                    severity: 0.3,
                    description: "benchmarks skewed by concurrent test runs".to_string(),
                    resolutions: vec![ResolutionStrategy::Sequence],
                },
                ConflictRule {
                    between: ["architecture".to_string(), "performance".to_string()],
                    category: ConflictCategory::ApproachContradiction,
                    severity: 0.5,
                    description: "abstraction layers vs hot-path cost".to_string(),
                    resolutions: vec![ResolutionStrategy::PrioritizePrimary],
                },
            ],
            contradiction_cues: strings(&[
                "without sacrificing",
                "without compromising",
                "versus",
                "trade-off",
                "tradeoff",
                "at the same time",
                "but also",
                "zero overhead",
            ]),
            cue_increment: 0.125,
            escalation_severity: 0.8,
            cycle_severity: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Confidence lead making the top domain dominant
    pub dominance_gap: f64,

    /// Top-two gap under which low-confidence queries count as ambiguous
    pub ambiguity_gap: f64,

    pub max_parallel_domains: usize,

    /// Handler that sequences specialists in hierarchical plans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator_handler: Option<String>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            dominance_gap: 0.2,
            ambiguity_gap: 0.1,
            max_parallel_domains: 4,
            coordinator_handler: Some("coordinator".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Contexts at or under this size transfer in full
    pub small_context_bytes: usize,

    /// Byte budget for hierarchical transfers
    pub size_budget_bytes: usize,

    #[serde(with = "humantime_serde")]
    pub time_budget: Duration,

    /// Elements longer than this are truncated with an elision marker
    pub max_element_bytes: usize,

    /// Coverage below which a lossy transfer is reported degraded
    pub degraded_coverage: f64,

    /// Source/target relationship strength that favours broader transfers
    pub strong_relationship: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            small_context_bytes: 4096,
            size_budget_bytes: 16 * 1024,
            time_budget: Duration::from_millis(50),
            max_element_bytes: 2048,
            degraded_coverage: 0.7,
            strong_relationship: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_concurrent_handlers: usize,

    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Retry a failed handler once with its fallback
    pub retry_once: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_handlers: 5,
            default_timeout: Duration::from_secs(30),
            retry_once: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub backend: StoreBackend,

    /// Append log location for the file backend (default ~/.conductor/patterns.log)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Fast-path lookups slower than this are abandoned
    #[serde(with = "humantime_serde")]
    pub lookup_budget: Duration,

    pub similarity_threshold: f64,
    pub feedback_queue_capacity: usize,
    pub seen_capacity: usize,
    pub issued_plan_capacity: usize,
    pub lifecycle: LifecyclePolicy,
    pub compaction: LogCompactorConfig,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: None,
            lookup_budget: Duration::from_millis(25),
            similarity_threshold: 0.6,
            feedback_queue_capacity: 1024,
            seen_capacity: 10_000,
            issued_plan_capacity: 4096,
            lifecycle: LifecyclePolicy::default(),
            compaction: LogCompactorConfig::default(),
        }
    }
}

impl LearningConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".conductor")
                .join("patterns.log")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,

    /// Handler used when no domain clears the floor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_handler: Option<String>,

    pub handlers: Vec<HandlerDescriptor>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            default_handler: Some("general".to_string()),
            handlers: default_catalog(),
        }
    }
}

/// Built-in specialist catalog used when none is declared
pub fn default_catalog() -> Vec<HandlerDescriptor> {
    vec![
        HandlerDescriptor::new("security-expert", "security")
            .with_trigger("security", 1.0)
            .with_trigger("secure", 0.9)
            .with_trigger("vulnerab", 1.0)
            .with_trigger("cve", 1.0)
            .with_trigger("auth", 0.8)
            .with_trigger("login", 0.6)
            .with_trigger("encrypt", 0.8)
            .with_trigger("credential", 0.8)
            .with_trigger("injection", 0.9)
            .with_trigger("harden", 0.7),
        HandlerDescriptor::new("performance-expert", "performance")
            .with_trigger("performance", 1.0)
            .with_trigger("latency", 0.9)
            .with_trigger("slow", 0.8)
            .with_trigger("throughput", 0.9)
            .with_trigger("monitor", 0.7)
            .with_trigger("profil", 0.9)
            .with_trigger("optimi", 0.7)
            .with_trigger("benchmark", 0.8)
            .with_trigger("memory leak", 1.0),
        HandlerDescriptor::new("testing-expert", "testing")
            .with_trigger("test", 1.0)
            .with_trigger("failing", 0.5)
            .with_trigger("flaky", 0.8)
            .with_trigger("coverage", 0.8)
            .with_trigger("assert", 0.6)
            .with_trigger("mock", 0.6)
            .with_trigger("regression", 0.6),
        HandlerDescriptor::new("container-expert", "containers")
            .with_trigger("container", 1.0)
            .with_trigger("docker", 1.0)
            .with_trigger("kubernetes", 1.0)
            .with_trigger("k8s", 1.0)
            .with_trigger("pod", 0.8)
            .with_trigger("helm", 0.9)
            .with_trigger("image", 0.5),
        HandlerDescriptor::new("debugging-expert", "debugging")
            .with_trigger("debug", 1.0)
            .with_trigger("bug", 0.9)
            .with_trigger("crash", 0.9)
            .with_trigger("stack trace", 1.0)
            .with_trigger("panic", 0.8)
            .with_trigger("exception", 0.8)
            .with_trigger("error", 0.5),
        HandlerDescriptor::new("architecture-expert", "architecture")
            .with_trigger("architecture", 1.0)
            .with_trigger("design", 0.7)
            .with_trigger("refactor", 0.8)
            .with_trigger("microservice", 0.9)
            .with_trigger("scalab", 0.8)
            .with_trigger("modular", 0.6),
        HandlerDescriptor::new("database-expert", "database")
            .with_trigger("database", 1.0)
            .with_trigger("sql", 1.0)
            .with_trigger("postgres", 1.0)
            .with_trigger("schema", 0.8)
            .with_trigger("migration", 0.8)
            .with_trigger("index", 0.6),
        HandlerDescriptor::new("coordinator", "coordination"),
        HandlerDescriptor::new("general", "general"),
    ]
}

fn seed(from: &str, to: &str, kind: RelationshipKind, strength: f64, bidirectional: bool) -> RelationshipSeed {
    RelationshipSeed {
        from: from.to_string(),
        to: to.to_string(),
        kind,
        strength,
        bidirectional,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

impl Default for RouterConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "conductor".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: RouterConfigSpec::default(),
        }
    }
}

impl RouterConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CONDUCTOR_CONFIG_PATH environment variable
    /// 2. ./conductor-config.yaml (working directory)
    /// 3. ~/.conductor/config.yaml (user home)
    /// 4. /etc/conductor/config.yaml (system, Unix) or C:\ProgramData\Conductor\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CONDUCTOR_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./conductor-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".conductor").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/conductor/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Conductor\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path (fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations, using defaults");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CONDUCTOR_MAX_CONCURRENT_HANDLERS") {
            match val.parse::<usize>() {
                Ok(n) => {
                    tracing::info!("Environment override: CONDUCTOR_MAX_CONCURRENT_HANDLERS={}", n);
                    self.spec.dispatch.max_concurrent_handlers = n;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for CONDUCTOR_MAX_CONCURRENT_HANDLERS: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("CONDUCTOR_DOMAIN_FLOOR") {
            match val.parse::<f64>() {
                Ok(floor) => {
                    tracing::info!("Environment override: CONDUCTOR_DOMAIN_FLOOR={}", floor);
                    self.spec.analyzer.floor = floor;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for CONDUCTOR_DOMAIN_FLOOR: '{}'. Expected a number in [0,1]. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("CONDUCTOR_PATTERN_STORE_PATH") {
            if !val.is_empty() {
                tracing::info!("Environment override: CONDUCTOR_PATTERN_STORE_PATH={}", val);
                self.spec.learning.backend = StoreBackend::File;
                self.spec.learning.path = Some(PathBuf::from(val));
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;

        ensure_unit("spec.analyzer.floor", spec.analyzer.floor)?;
        if spec.analyzer.saturation <= 0.0 {
            anyhow::bail!("spec.analyzer.saturation must be positive");
        }

        let c = &spec.confidence;
        ensure_unit("spec.confidence.high", c.high)?;
        ensure_unit("spec.confidence.medium", c.medium)?;
        ensure_unit("spec.confidence.fallback", c.fallback)?;
        if !(c.fallback <= c.medium && c.medium <= c.high) {
            anyhow::bail!(
                "Confidence thresholds must satisfy fallback <= medium <= high (got {} / {} / {})",
                c.fallback,
                c.medium,
                c.high
            );
        }
        if c.bucket_count == 0 {
            anyhow::bail!("spec.confidence.bucket_count must be greater than zero");
        }
        if c.drift_window == 0 {
            anyhow::bail!("spec.confidence.drift_window must be greater than zero");
        }
        if c.prior_strength < 0.0 {
            anyhow::bail!("spec.confidence.prior_strength cannot be negative");
        }

        let r = &spec.relationships;
        if r.learning_rate <= 0.0 || r.learning_rate > MAX_LEARNING_RATE {
            anyhow::bail!(
                "spec.relationships.learning_rate must be in (0, {}] (got {})",
                MAX_LEARNING_RATE,
                r.learning_rate
            );
        }
        if r.max_hops == 0 {
            anyhow::bail!("spec.relationships.max_hops must be greater than zero");
        }
        for seed in &r.seed {
            ensure_unit("spec.relationships.seed.strength", seed.strength)?;
        }

        for rule in &spec.conflicts.rules {
            ensure_unit("spec.conflicts.rules.severity", rule.severity)?;
            if rule.between[0] == rule.between[1] {
                anyhow::bail!("Conflict rule cannot pair '{}' with itself", rule.between[0]);
            }
        }
        ensure_unit("spec.conflicts.escalation_severity", spec.conflicts.escalation_severity)?;
        ensure_unit("spec.conflicts.cycle_severity", spec.conflicts.cycle_severity)?;
        ensure_unit("spec.context.degraded_coverage", spec.context.degraded_coverage)?;

        if spec.strategy.max_parallel_domains < 2 {
            anyhow::bail!("spec.strategy.max_parallel_domains must be at least 2");
        }

        if spec.dispatch.max_concurrent_handlers == 0 {
            anyhow::bail!("spec.dispatch.max_concurrent_handlers must be greater than zero");
        }

        ensure_unit("spec.learning.similarity_threshold", spec.learning.similarity_threshold)?;
        if spec.learning.backend == StoreBackend::File && spec.learning.path.is_none() && dirs::home_dir().is_none() {
            anyhow::bail!("spec.learning.path is required for the file backend when no home directory exists");
        }

        let mut ids = HashSet::new();
        for handler in &spec.registry.handlers {
            if handler.id.as_str().is_empty() {
                anyhow::bail!("Handler id cannot be empty");
            }
            if !ids.insert(handler.id.as_str()) {
                anyhow::bail!("Duplicate handler id: {}", handler.id);
            }
            for trigger in &handler.triggers {
                if trigger.term.trim().is_empty() {
                    anyhow::bail!("Empty trigger term for handler: {}", handler.id);
                }
                if trigger.weight <= 0.0 {
                    anyhow::bail!("Trigger '{}' of handler {} must have a positive weight", trigger.term, handler.id);
                }
            }
        }

        if let Some(default_handler) = &spec.registry.default_handler {
            if !ids.contains(default_handler.as_str()) {
                anyhow::bail!("Default handler '{}' not found in registry.handlers", default_handler);
            }
        }

        if let Some(coordinator) = &spec.strategy.coordinator_handler {
            if !ids.contains(coordinator.as_str()) {
                anyhow::bail!("Coordinator handler '{}' not found in registry.handlers", coordinator);
            }
        }

        Ok(())
    }
}

fn ensure_unit(field: &str, value: f64) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("{} must be in [0,1] (got {})", field, value);
    }
    Ok(())
}
