//! Query-aware model selection for investigation LLM calls.
//!
//! Routes a domain agent's, the supervisor's, or a user's free-form
//! investigation query to a model tier based on:
//! - Query type (cluster-wide, cross-service, debugging, status check, simple)
//! - Investigation depth (re-dispatched / nested calls use cheaper models)
//! - Budget constraints

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::types::{ModelSpec, ModelTier};

/// Query type classification for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Platform-wide or multi-namespace blast-radius questions
    ClusterWide,
    /// Questions spanning a service's upstream/downstream dependencies
    CrossService,
    /// Root-cause and error analysis
    Debugging,
    /// Plain status/describe lookups
    StatusCheck,
    /// Everything else
    Simple,
}

impl QueryType {
    /// Classify a query based on content analysis.
    pub fn classify(query: &str) -> Self {
        static PATTERNS: OnceLock<QueryPatterns> = OnceLock::new();
        let patterns = PATTERNS.get_or_init(QueryPatterns::new);

        let query_lower = query.to_lowercase();

        // Check patterns in order of specificity
        if patterns.cluster_wide.is_match(&query_lower) {
            QueryType::ClusterWide
        } else if patterns.cross_service.is_match(&query_lower) {
            QueryType::CrossService
        } else if patterns.debugging.is_match(&query_lower) {
            QueryType::Debugging
        } else if patterns.status_check.is_match(&query_lower) {
            QueryType::StatusCheck
        } else {
            QueryType::Simple
        }
    }

    /// Get the recommended model tier for this query type at depth 0.
    pub fn base_tier(&self) -> ModelTier {
        match self {
            QueryType::ClusterWide => ModelTier::Flagship,
            QueryType::CrossService => ModelTier::Flagship,
            QueryType::Debugging => ModelTier::Balanced,
            QueryType::StatusCheck => ModelTier::Balanced,
            QueryType::Simple => ModelTier::Fast,
        }
    }
}

/// Compiled regex patterns for query classification.
struct QueryPatterns {
    cluster_wide: Regex,
    cross_service: Regex,
    debugging: Regex,
    status_check: Regex,
}

impl QueryPatterns {
    fn new() -> Self {
        Self {
            cluster_wide: Regex::new(
                r"(?x)
                cluster.?wide|platform.?wide|every\s+namespace|
                all\s+namespaces|all\s+services|control\s+plane|
                blast\s+radius|widespread|how\s+many\s+services|
                etcd|apiserver|api\s+server|coredns|dns\s+resolution
                "
            ).unwrap(),
            cross_service: Regex::new(
                r"(?x)
                upstream|downstream|depends?\s+on|dependency|
                dependent\s+service|caller|callee|
                cascad|propagat|chain\s+of|across\s+services|
                between\s+\w+\s+and\s+\w+|which\s+services
                "
            ).unwrap(),
            debugging: Regex::new(
                r"(?x)
                crash.?loop|oom|out\s+of\s+memory|restart|
                error|fail|exception|panic|
                why\s+is|why\s+does|what.s\s+wrong|
                root\s+cause|diagnose|investigate|
                throttl|evict|pending|unhealthy|degrad
                "
            ).unwrap(),
            status_check: Regex::new(
                r"(?x)
                status|describe|show\s+me|list|
                what\s+is|what\s+are|get\s+logs|
                tail|current\s+state|how\s+many\s+pods|
                uptime|ready|replicas
                "
            ).unwrap(),
        }
    }
}

/// Context for routing decisions.
#[derive(Debug, Clone, Default)]
pub struct RoutingContext {
    /// Current recursion depth
    pub depth: u32,
    /// Maximum allowed depth
    pub max_depth: u32,
    /// Remaining budget in USD
    pub remaining_budget: Option<f64>,
    /// Require caching support
    pub require_caching: bool,
}

impl RoutingContext {
    pub fn new() -> Self {
        Self {
            depth: 0,
            max_depth: 5,
            remaining_budget: None,
            require_caching: false,
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.remaining_budget = Some(budget);
        self
    }

    pub fn requiring_caching(mut self) -> Self {
        self.require_caching = true;
        self
    }
}

/// Routing decision output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Selected model
    pub model: ModelSpec,
    /// Query classification
    pub query_type: QueryType,
    /// Recommended tier
    pub tier: ModelTier,
    /// Reasoning for selection
    pub reason: String,
    /// Estimated cost (if calculable)
    pub estimated_cost: Option<f64>,
}

/// Routes investigation queries to the model tier best suited to them.
/// Backs the investigation smart path: a free-form query against a running
/// session resolves to a tier and model before the completion call is made.
pub struct InvestigationRouter {
    /// Available models
    models: Vec<ModelSpec>,
    /// Default model for each tier
    tier_defaults: TierDefaults,
}

/// Default models for each tier.
#[derive(Debug, Clone)]
pub struct TierDefaults {
    pub flagship: ModelSpec,
    pub balanced: ModelSpec,
    pub fast: ModelSpec,
}

impl Default for TierDefaults {
    fn default() -> Self {
        Self {
            flagship: ModelSpec::claude_opus(),
            balanced: ModelSpec::claude_sonnet(),
            fast: ModelSpec::claude_haiku(),
        }
    }
}

impl InvestigationRouter {
    /// Create a new router with the default Anthropic model lineup.
    pub fn new() -> Self {
        Self {
            models: vec![
                ModelSpec::claude_opus(),
                ModelSpec::claude_sonnet(),
                ModelSpec::claude_haiku(),
            ],
            tier_defaults: TierDefaults::default(),
        }
    }

    /// Create with custom models.
    pub fn with_models(models: Vec<ModelSpec>) -> Self {
        // Find best model for each tier
        let flagship = models
            .iter()
            .filter(|m| m.tier == ModelTier::Flagship)
            .min_by(|a, b| a.input_cost_per_m.partial_cmp(&b.input_cost_per_m).unwrap())
            .cloned()
            .unwrap_or_else(ModelSpec::claude_opus);

        let balanced = models
            .iter()
            .filter(|m| m.tier == ModelTier::Balanced)
            .min_by(|a, b| a.input_cost_per_m.partial_cmp(&b.input_cost_per_m).unwrap())
            .cloned()
            .unwrap_or_else(ModelSpec::claude_sonnet);

        let fast = models
            .iter()
            .filter(|m| m.tier == ModelTier::Fast)
            .min_by(|a, b| a.input_cost_per_m.partial_cmp(&b.input_cost_per_m).unwrap())
            .cloned()
            .unwrap_or_else(ModelSpec::claude_haiku);

        Self {
            models,
            tier_defaults: TierDefaults {
                flagship,
                balanced,
                fast,
            },
        }
    }

    /// Set custom tier defaults.
    pub fn with_tier_defaults(mut self, defaults: TierDefaults) -> Self {
        self.tier_defaults = defaults;
        self
    }

    /// Route a query to the best model.
    pub fn route(&self, query: &str, context: &RoutingContext) -> RoutingDecision {
        let query_type = QueryType::classify(query);
        let base_tier = query_type.base_tier();

        // Adjust tier based on depth (deeper = cheaper)
        let adjusted_tier = self.adjust_tier_for_depth(base_tier, context.depth);

        // Find best model matching requirements
        let model = self.select_model(adjusted_tier, context);
        let estimated_cost = Some(model.calculate_cost(10_000, 1_000));

        let reason = format!(
            "query type '{}' at depth {} -> {} tier (adjusted from {})",
            format!("{:?}", query_type).to_lowercase(),
            context.depth,
            format!("{:?}", adjusted_tier).to_lowercase(),
            format!("{:?}", base_tier).to_lowercase(),
        );

        RoutingDecision {
            model,
            query_type,
            tier: adjusted_tier,
            reason,
            estimated_cost,
        }
    }

    /// Adjust tier based on recursion depth.
    fn adjust_tier_for_depth(&self, base: ModelTier, depth: u32) -> ModelTier {
        match depth {
            0 => base,
            1 => match base {
                ModelTier::Flagship => ModelTier::Balanced,
                _ => base,
            },
            _ => ModelTier::Fast,
        }
    }

    /// Select the best model for the tier and constraints.
    fn select_model(&self, tier: ModelTier, context: &RoutingContext) -> ModelSpec {
        let candidates: Vec<_> = self
            .models
            .iter()
            .filter(|m| {
                m.tier <= tier
                    && (!context.require_caching || m.supports_caching)
                    // rough budget estimate for a 10k-input/1k-output call
                    && context.remaining_budget.map_or(true, |b| {
                        m.calculate_cost(10_000, 1_000) < b
                    })
            })
            .collect();

        candidates
            .iter()
            .filter(|m| m.tier == tier)
            .min_by(|a, b| a.input_cost_per_m.partial_cmp(&b.input_cost_per_m).unwrap())
            .cloned()
            .cloned()
            .or_else(|| {
                candidates
                    .iter()
                    .min_by(|a, b| a.input_cost_per_m.partial_cmp(&b.input_cost_per_m).unwrap())
                    .cloned()
                    .cloned()
            })
            .unwrap_or_else(|| self.tier_default(tier))
    }

    /// Get the default model for a tier.
    fn tier_default(&self, tier: ModelTier) -> ModelSpec {
        match tier {
            ModelTier::Flagship => self.tier_defaults.flagship.clone(),
            ModelTier::Balanced => self.tier_defaults.balanced.clone(),
            ModelTier::Fast => self.tier_defaults.fast.clone(),
        }
    }

    /// Get all available models.
    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }

    /// Add a model to the router.
    pub fn add_model(&mut self, model: ModelSpec) {
        self.models.push(model);
    }
}

impl Default for InvestigationRouter {
    fn default() -> Self {
        Self::new()
    }
}
