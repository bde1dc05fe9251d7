//! LLM client abstraction with investigation-aware routing.
//!
//! This module provides the completion client used by the supervisor, domain
//! agents, and the investigation router's smart path, with routing based on
//! query type, investigation depth, and budget constraints.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rca_core::llm::{
//!     AnthropicClient, ClientConfig, InvestigationRouter, RoutingContext,
//!     CompletionRequest, ChatMessage,
//! };
//!
//! // Create a client
//! let client = AnthropicClient::new(
//!     ClientConfig::new("your-api-key")
//!         .with_default_model("claude-3-5-sonnet-20241022")
//! );
//!
//! // Route a free-form investigation query to a model tier
//! let router = InvestigationRouter::new();
//! let context = RoutingContext::new().with_depth(0);
//! let decision = router.route("Why is checkout-service crash-looping?", &context);
//!
//! // Make a request
//! let request = CompletionRequest::new()
//!     .with_model(&decision.model.id)
//!     .with_message(ChatMessage::user("Hello"));
//!
//! let response = client.complete(request).await?;
//! ```

mod client;
mod router;
mod types;

pub use client::{AnthropicClient, ClientConfig, LLMClient};
pub use router::{InvestigationRouter, QueryType, RoutingContext, RoutingDecision};
pub use types::{
    CacheControl, ChatMessage, ChatRole, CompletionRequest, CompletionResponse, ModelSpec,
    ModelTier, Provider, StopReason, TokenUsage,
};
