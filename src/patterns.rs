// src/patterns.rs
//! Pattern rule store and engine: rule config schema, regex compilation,
//! match evaluation, safety-flag rollup, and the hot-reloadable handle.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::level::CrisisLevel;

// --- env defaults & names ---
pub const DEFAULT_PATTERNS_CONFIG_PATH: &str = "config/patterns.json";
pub const DEFAULT_EMERGENCY_THRESHOLD: f64 = 0.7;

pub const ENV_PATTERNS_CONFIG_PATH: &str = "TRIAGE_PATTERNS_PATH";
pub const ENV_HOT_RELOAD: &str = "TRIAGE_HOT_RELOAD";

// Dev logging gate: TRIAGE_DEV_LOG=1 AND dev env (debug or TRIAGE_ENV in {local,development,dev})
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var("TRIAGE_DEV_LOG").ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("TRIAGE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Short stable id for a message, safe to log. Raw text never hits the logs.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Minimal, anonymized dev logger for pattern evaluation events.
fn dev_log_patterns(event: &str, text: &str, categories: &[String], confidence: f64) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_hash(text);
    info!(
        target: "patterns",
        %id, %confidence, event,
        categories = ?categories
    );
}

/* ----------------------------
Config schema (from JSON)
---------------------------- */

/// Exact-substring or regular-expression matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Regex,
}

impl Default for MatchKind {
    fn default() -> Self {
        MatchKind::Exact
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternFileCfg {
    /// Aggregate-confidence cutoff that forces `emergency_response_triggered`.
    #[serde(default = "default_emergency_threshold")]
    pub emergency_confidence_threshold: f64,
    #[serde(default)]
    pub categories: Vec<CategoryCfg>,
}

fn default_emergency_threshold() -> f64 {
    DEFAULT_EMERGENCY_THRESHOLD
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryCfg {
    pub name: String,
    #[serde(default)]
    pub case_sensitive: bool,
    /// Used when an individual rule omits `weight`.
    #[serde(default)]
    pub default_weight: Option<f64>,
    /// Used when an individual rule omits `urgency`.
    #[serde(default)]
    pub default_urgency: Option<CrisisLevel>,
    #[serde(default)]
    pub rules: Vec<RuleCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleCfg {
    pub pattern: String,
    #[serde(default, rename = "type")]
    pub kind: MatchKind,
    pub crisis_level: CrisisLevel,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub urgency: Option<CrisisLevel>,
    #[serde(default)]
    pub auto_escalate: bool,
    /// Reserved for future contextual gating; carried through, not acted on.
    #[serde(default)]
    pub context_required: bool,
}

/* ----------------------------
Compiled store
---------------------------- */

#[derive(Debug)]
struct CompiledRule {
    pattern: String,
    kind: MatchKind,
    crisis_level: CrisisLevel,
    urgency: CrisisLevel,
    weight: f64,
    auto_escalate: bool,
    #[allow(dead_code)] // reserved flag, kept for rule provenance
    context_required: bool,
    /// Compiled once at load for `MatchKind::Regex`; `None` for exact rules.
    re: Option<Regex>,
    /// Lower-cased pattern for case-insensitive exact matching.
    needle_lower: String,
}

#[derive(Debug)]
struct CompiledCategory {
    name: String,
    case_sensitive: bool,
    rules: Vec<CompiledRule>,
}

/// Read-only rule store. Built once at load, shared across requests, and
/// replaced as a whole on reload.
#[derive(Debug)]
pub struct PatternStore {
    emergency_threshold: f64,
    categories: Vec<CompiledCategory>,
}

/// A rule that fired against a specific message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternMatch {
    pub category: String,
    pub pattern: String,
    pub matched_text: String,
    pub crisis_level: CrisisLevel,
    pub urgency: CrisisLevel,
    pub weight: f64,
    /// `min(weight + 0.1, 1.0)`.
    pub confidence: f64,
    pub auto_escalate: bool,
    /// Where the match came from, e.g. `"self_harm:regex"`.
    pub provenance: String,
}

/// Rollup of safety-relevant findings for one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SafetyFlags {
    pub critical_patterns_detected: Vec<String>,
    pub auto_escalation_required: Vec<String>,
    pub immediate_intervention_patterns: Vec<String>,
    pub emergency_response_triggered: bool,
}

/// Everything the engine produces for one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternEvaluation {
    pub matches: Vec<PatternMatch>,
    pub safety: SafetyFlags,
    /// Mean of per-match confidences; 0.0 with no matches.
    pub aggregate_confidence: f64,
}

impl PatternStore {
    /// Build from a JSON string. Rules whose regex fails to compile are
    /// dropped with a warning; the load itself only fails on malformed JSON.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let cfg: PatternFileCfg = serde_json::from_str(json)?;
        Ok(Self::from_cfg(cfg))
    }

    pub fn from_cfg(cfg: PatternFileCfg) -> Self {
        let mut categories = Vec::with_capacity(cfg.categories.len());
        for cat in cfg.categories {
            let default_weight = cat.default_weight.unwrap_or(0.5);
            let default_urgency = cat.default_urgency.unwrap_or(CrisisLevel::None);

            let mut rules = Vec::with_capacity(cat.rules.len());
            for r in cat.rules {
                let weight = r.weight.unwrap_or(default_weight).clamp(0.0, 1.0);
                let urgency = r.urgency.unwrap_or(default_urgency);

                // Regex rules honor the category's case_sensitive flag the
                // same way exact rules do.
                let re = match r.kind {
                    MatchKind::Regex => match RegexBuilder::new(&r.pattern)
                        .case_insensitive(!cat.case_sensitive)
                        .build()
                    {
                        Ok(re) => Some(re),
                        Err(e) => {
                            // Compile failure drops the rule, never the load.
                            warn!(
                                target: "patterns",
                                category = %cat.name,
                                pattern = %r.pattern,
                                error = %e,
                                "dropping rule with invalid regex"
                            );
                            continue;
                        }
                    },
                    MatchKind::Exact => None,
                };

                rules.push(CompiledRule {
                    needle_lower: r.pattern.to_lowercase(),
                    pattern: r.pattern,
                    kind: r.kind,
                    crisis_level: r.crisis_level,
                    urgency,
                    weight,
                    auto_escalate: r.auto_escalate,
                    context_required: r.context_required,
                    re,
                });
            }

            categories.push(CompiledCategory {
                name: cat.name,
                case_sensitive: cat.case_sensitive,
                rules,
            });
        }

        Self {
            emergency_threshold: cfg.emergency_confidence_threshold.clamp(0.0, 1.0),
            categories,
        }
    }

    /// Load from a JSON file. Falls back to `default_seed()` if the file is
    /// missing or unreadable, so the engine always has rules.
    pub fn load_or_seed<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(s) => match Self::from_json_str(&s) {
                Ok(store) => store,
                Err(e) => {
                    warn!(target: "patterns", error = %e, "invalid pattern file; using seed rules");
                    Self::default_seed()
                }
            },
            Err(_) => Self::default_seed(),
        }
    }

    /// Resolve the config path from env (or default) and load.
    pub fn from_env() -> Self {
        let path = std::env::var(ENV_PATTERNS_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_PATTERNS_CONFIG_PATH));
        Self::load_or_seed(path)
    }

    /// Built-in seed rules covering the core crisis categories. Used as a
    /// fallback when no pattern file is available.
    pub fn default_seed() -> Self {
        let json = include_str!("../config/patterns.json");
        Self::from_json_str(json).expect("seed pattern file must parse")
    }

    pub fn emergency_threshold(&self) -> f64 {
        self.emergency_threshold
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn rule_count(&self) -> usize {
        self.categories.iter().map(|c| c.rules.len()).sum()
    }

    /// Evaluate a message against every category. Zero categories or zero
    /// matches yield an empty evaluation, never an error.
    pub fn evaluate(&self, message: &str) -> PatternEvaluation {
        let lower = message.to_lowercase();

        let mut matches = Vec::new();
        let mut safety = SafetyFlags::default();

        for cat in &self.categories {
            for rule in &cat.rules {
                let matched_text = match rule.kind {
                    MatchKind::Exact => {
                        let hit = if cat.case_sensitive {
                            message.contains(rule.pattern.as_str())
                        } else {
                            lower.contains(rule.needle_lower.as_str())
                        };
                        if hit {
                            Some(rule.pattern.clone())
                        } else {
                            None
                        }
                    }
                    MatchKind::Regex => rule
                        .re
                        .as_ref()
                        .and_then(|re| re.find(message))
                        .map(|m| m.as_str().to_string()),
                };

                let Some(matched_text) = matched_text else {
                    continue;
                };

                let confidence = (rule.weight + 0.1).min(1.0);

                if rule.crisis_level == CrisisLevel::Critical {
                    safety.critical_patterns_detected.push(rule.pattern.clone());
                    safety.emergency_response_triggered = true;
                }
                if rule.auto_escalate {
                    safety.auto_escalation_required.push(rule.pattern.clone());
                }
                if rule.urgency == CrisisLevel::Critical {
                    safety.immediate_intervention_patterns.push(rule.pattern.clone());
                }

                matches.push(PatternMatch {
                    category: cat.name.clone(),
                    provenance: format!("{}:{}", cat.name, kind_str(rule.kind)),
                    pattern: rule.pattern.clone(),
                    matched_text,
                    crisis_level: rule.crisis_level,
                    urgency: rule.urgency,
                    weight: rule.weight,
                    confidence,
                    auto_escalate: rule.auto_escalate,
                });
            }
        }

        let aggregate_confidence = if matches.is_empty() {
            0.0
        } else {
            matches.iter().map(|m| m.confidence).sum::<f64>() / matches.len() as f64
        };

        if aggregate_confidence >= self.emergency_threshold && !matches.is_empty() {
            safety.emergency_response_triggered = true;
        }

        let categories: Vec<String> = {
            let mut v: Vec<String> = matches.iter().map(|m| m.category.clone()).collect();
            v.sort();
            v.dedup();
            v
        };
        let event = if safety.emergency_response_triggered {
            "emergency"
        } else if matches.is_empty() {
            "no_match"
        } else {
            "matched"
        };
        dev_log_patterns(event, message, &categories, aggregate_confidence);

        PatternEvaluation {
            matches,
            safety,
            aggregate_confidence,
        }
    }
}

fn kind_str(kind: MatchKind) -> &'static str {
    match kind {
        MatchKind::Exact => "exact",
        MatchKind::Regex => "regex",
    }
}

/* ----------------------------
Thread-safe handle + reload
---------------------------- */

/// Cloneable handle over the store. Readers take a cheap `Arc` snapshot;
/// reload builds a fresh store and swaps it in atomically, so in-flight
/// evaluations keep using the store they started with.
#[derive(Clone)]
pub struct PatternHandle {
    inner: Arc<RwLock<Arc<PatternStore>>>,
}

impl PatternHandle {
    pub fn new(store: PatternStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(store))),
        }
    }

    /// Snapshot of the current store.
    pub fn store(&self) -> Arc<PatternStore> {
        match self.inner.read() {
            Ok(g) => g.clone(),
            // Poisoned lock: fall back to an empty store rather than panic.
            Err(_) => Arc::new(PatternStore::from_cfg(PatternFileCfg {
                emergency_confidence_threshold: DEFAULT_EMERGENCY_THRESHOLD,
                categories: Vec::new(),
            })),
        }
    }

    pub fn evaluate(&self, message: &str) -> PatternEvaluation {
        self.store().evaluate(message)
    }

    /// Replace the store wholesale. Serialized by the write lock.
    pub fn swap(&self, store: PatternStore) {
        if let Ok(mut g) = self.inner.write() {
            *g = Arc::new(store);
        }
    }

    /// Rebuild from the configured file and swap. Returns the new rule count.
    pub fn reload_from_env(&self) -> usize {
        let fresh = PatternStore::from_env();
        let n = fresh.rule_count();
        self.swap(fresh);
        info!(target: "patterns", rules = n, "pattern store reloaded");
        n
    }
}

/// Returns true if we should enable hot reload (dev/local only).
fn hot_reload_enabled() -> bool {
    let want = std::env::var(ENV_HOT_RELOAD)
        .ok()
        .map(|v| v == "1")
        .unwrap_or(false);
    if !want {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("TRIAGE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Start a simple polling watcher on `path` that swaps the store on mtime
/// change. Polls every 2s. Uses only std, no external deps.
pub fn start_hot_reload_thread(handle: PatternHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(mtime) => {
                    let changed = match last_mtime {
                        None => {
                            last_mtime = Some(mtime);
                            false
                        }
                        Some(prev) => mtime > prev,
                    };
                    if changed {
                        if let Ok(content) = fs::read_to_string(&path) {
                            if let Ok(store) = PatternStore::from_json_str(&content) {
                                handle.swap(store);
                                info!(target: "patterns", "hot-reloaded pattern store");
                            }
                        }
                        last_mtime = Some(mtime);
                    }
                }
                Err(_) => {
                    // File missing or unreadable; keep trying.
                }
            }
            thread::sleep(poll);
        }
    });
}

/* ----------------------------
Tests
---------------------------- */
