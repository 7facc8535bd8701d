use async_trait::async_trait;

use crate::{GenerationRequest, ProviderResponse, Result};

/// A remote text-generation service that can write a review.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Returns the identifier of this provider (`openai`, `groq`, ...).
    fn id(&self) -> &str;

    /// Returns the model this provider is configured to call.
    fn model_id(&self) -> &str;

    /// Checks whether this provider is currently able to serve requests.
    async fn is_available(&self) -> bool;

    /// Generates a review for the request.
    ///
    /// Implementations own their retry policy: an error returned here means
    /// the provider is exhausted for this request.
    ///
    /// # Errors
    ///
    /// Returns an error if every attempt failed, timed out, or the provider
    /// cannot be called at all (for example, missing credentials).
    async fn call(&self, request: &GenerationRequest) -> Result<ProviderResponse>;
}
