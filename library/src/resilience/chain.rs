use super::{BreakerConfig, CircuitBreaker, ExpiringCache};
use crate::BoxedError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Remote source of a value
#[async_trait]
pub trait Provider: Send + Sync {
    /// Input parameters
    type Request: Send + Sync;
    /// Produced value, may itself carry an error status
    type Output: Send;

    /// Name used in logs and failure descriptions
    fn name(&self) -> &str;

    /// Queries the remote source
    ///
    /// Returns `Err` when no answer could be obtained at all (transport errors, unreadable bodies).
    async fn fetch(&self, request: &Self::Request) -> Result<Self::Output, BoxedError>;

    /// Whether the provider is able to serve the request at all
    ///
    /// Requests it can not serve skip it without counting against its circuit.
    fn accepts(&self, _request: &Self::Request) -> bool {
        true
    }

    /// Whether an unsuccessful value was caused by the request rather than the provider
    ///
    /// Such answers, e.g. a rejected client supplied credential, do not count against the circuit.
    fn is_request_fault(&self, _value: &Self::Output) -> bool {
        false
    }
}

/// Values produced by providers which carry their own success status
pub trait Outcome: Clone + Send + Sync {
    /// Whether the value is usable and may be cached
    fn is_success(&self) -> bool;

    /// Builds an error valued outcome from a description
    fn failure(description: String) -> Self;
}

/// Requests which can be served from a cache
pub trait Cacheable {
    /// Inputs a cached value is only valid for
    type Fingerprint: PartialEq + Clone + Send + Sync;

    /// Semantic key of the request or `None` if it must not be cached
    fn cache_key(&self) -> Option<String>;

    /// Inputs of this request
    fn fingerprint(&self) -> Self::Fingerprint;
}

/// Where a [`Resolved`] value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedSource {
    /// Served from the cache without remote calls
    Cache,
    /// Answered by the primary provider
    Primary,
    /// Answered by the fallback provider
    Fallback,
}

/// Result of [`ResilientChain::resolve`]
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<O> {
    /// Resolved value, possibly carrying an error status
    pub value: O,
    /// Origin of the value
    pub source: ResolvedSource,
}

type DynProvider<R, O> = Arc<dyn Provider<Request = R, Output = O>>;

struct Fallback<R, O> {
    provider: DynProvider<R, O>,
    breaker: CircuitBreaker,
}

/// Primary provider guarded by a circuit breaker with an optional fallback and cache
///
/// Without a fallback the breaker is bypassed and every call reaches the primary, so a single
/// provider is never starved by its own circuit.
pub struct ResilientChain<R: Cacheable, O> {
    name: String,
    primary: DynProvider<R, O>,
    fallback: Option<Fallback<R, O>>,
    cache: Option<ExpiringCache<R::Fingerprint, O>>,
}

impl<R, O> ResilientChain<R, O>
where
    R: Cacheable + Send + Sync,
    O: Outcome,
{
    /// Creates a chain consisting only of the primary provider
    pub fn new(name: impl Into<String>, primary: DynProvider<R, O>) -> Self {
        Self {
            name: name.into(),
            primary,
            fallback: None,
            cache: None,
        }
    }

    /// Adds a fallback provider, guarding the primary with a breaker
    pub fn with_fallback(mut self, provider: DynProvider<R, O>, config: BreakerConfig) -> Self {
        let breaker = CircuitBreaker::new(format!("{}/{}", self.name, self.primary.name()), config);
        self.fallback = Some(Fallback { provider, breaker });
        self
    }

    /// Enables caching of successful results
    pub fn with_cache(mut self, capacity: usize, ttl: Duration) -> Self {
        self.cache = Some(ExpiringCache::new(capacity, ttl));
        self
    }

    /// Breaker guarding the primary provider, if a fallback is configured
    pub fn breaker(&self) -> Option<&CircuitBreaker> {
        self.fallback.as_ref().map(|fallback| &fallback.breaker)
    }

    /// Resolves a value, never failing
    pub async fn resolve(&self, request: &R) -> Resolved<O> {
        let cache = self
            .cache
            .as_ref()
            .and_then(|cache| request.cache_key().map(|key| (cache, key)));

        if let Some((cache, key)) = &cache {
            if let Some(value) = cache.get(key, &request.fingerprint()).await {
                debug!(chain = %self.name, %key, "Serving value from cache");
                return Resolved {
                    value,
                    source: ResolvedSource::Cache,
                };
            }
        }

        let resolved = self.call(request).await;

        if let Some((cache, key)) = cache {
            if resolved.value.is_success() {
                cache
                    .insert(key, request.fingerprint(), resolved.value.clone())
                    .await;
            }
        }

        resolved
    }

    async fn call(&self, request: &R) -> Resolved<O> {
        let fallback = match &self.fallback {
            Some(fallback) => fallback,
            None => {
                return Resolved {
                    value: fold(self.primary.as_ref(), self.primary.fetch(request).await),
                    source: ResolvedSource::Primary,
                }
            }
        };

        if !self.primary.accepts(request) {
            debug!(chain = %self.name, provider = self.primary.name(), "Request not accepted by primary provider");
        } else if let Some(permit) = fallback.breaker.try_acquire() {
            match self.primary.fetch(request).await {
                Ok(value) if value.is_success() => {
                    permit.success();
                    return Resolved {
                        value,
                        source: ResolvedSource::Primary,
                    };
                }
                Ok(value) if self.primary.is_request_fault(&value) => {
                    permit.release();
                    debug!(chain = %self.name, provider = self.primary.name(), "Primary provider rejected the request");
                }
                Ok(_) => {
                    permit.failure();
                    warn!(chain = %self.name, provider = self.primary.name(), "Primary provider answered with an error");
                }
                Err(error) => {
                    permit.failure();
                    warn!(chain = %self.name, provider = self.primary.name(), %error, "Primary provider failed");
                }
            }
        } else {
            debug!(chain = %self.name, provider = self.primary.name(), "Circuit open, skipping primary provider");
        }

        let provider = fallback.provider.as_ref();
        Resolved {
            value: fold(provider, provider.fetch(request).await),
            source: ResolvedSource::Fallback,
        }
    }
}

fn fold<R: Send + Sync, O: Outcome>(
    provider: &dyn Provider<Request = R, Output = O>,
    result: Result<O, BoxedError>,
) -> O {
    match result {
        Ok(value) => value,
        Err(error) => {
            warn!(provider = provider.name(), %error, "Provider failed");
            O::failure(format!("{}: {}", provider.name(), error))
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::resilience::CircuitState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum Rate {
        Ok(f64),
        Error(String),
    }

    impl Outcome for Rate {
        fn is_success(&self) -> bool {
            matches!(self, Rate::Ok(_))
        }

        fn failure(description: String) -> Self {
            Rate::Error(description)
        }
    }

    struct Pair(&'static str, &'static str);

    impl Cacheable for Pair {
        type Fingerprint = (String, String);

        fn cache_key(&self) -> Option<String> {
            Some(format!("er-{}-{}", self.0, self.1))
        }

        fn fingerprint(&self) -> Self::Fingerprint {
            (self.0.to_owned(), self.1.to_owned())
        }
    }

    enum Behaviour {
        Answer(f64),
        Reject,
        Throw,
        Hang,
        Unauthorized,
    }

    struct Scripted {
        name: &'static str,
        behaviour: Behaviour,
        calls: AtomicUsize,
        accepts: bool,
    }

    impl Scripted {
        fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                name,
                behaviour,
                calls: AtomicUsize::new(0),
                accepts: true,
            })
        }

        fn refusing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                behaviour: Behaviour::Throw,
                calls: AtomicUsize::new(0),
                accepts: false,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for Scripted {
        type Request = Pair;
        type Output = Rate;

        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _request: &Pair) -> Result<Rate, BoxedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            match self.behaviour {
                Behaviour::Answer(rate) => Ok(Rate::Ok(rate)),
                Behaviour::Reject => Ok(Rate::Error("400 Bad Request".into())),
                Behaviour::Throw => Err("connection reset".into()),
                Behaviour::Unauthorized => Ok(Rate::Error("401 Unauthorized".into())),
                Behaviour::Hang => {
                    futures::future::pending::<()>().await;
                    Err("unreachable".into())
                }
            }
        }

        fn accepts(&self, _request: &Pair) -> bool {
            self.accepts
        }

        fn is_request_fault(&self, value: &Rate) -> bool {
            matches!(value, Rate::Error(description) if description.starts_with("401"))
        }
    }

    fn config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 2,
            cool_down: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn fall_back_and_serve_from_cache() {
        let primary = Scripted::new("primary", Behaviour::Throw);
        let fallback = Scripted::new("fallback", Behaviour::Answer(51.440375));
        let chain = ResilientChain::new("exchange", primary.clone())
            .with_fallback(fallback.clone(), config())
            .with_cache(16, Duration::from_secs(3600));

        let first = chain.resolve(&Pair("EUR", "PHP")).await;
        assert_eq!(first.value, Rate::Ok(51.440375));
        assert_eq!(first.source, ResolvedSource::Fallback);

        let second = chain.resolve(&Pair("EUR", "PHP")).await;
        assert_eq!(second.value, Rate::Ok(51.440375));
        assert_eq!(second.source, ResolvedSource::Cache);

        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn skip_primary_while_the_circuit_is_open() {
        let primary = Scripted::new("primary", Behaviour::Reject);
        let fallback = Scripted::new("fallback", Behaviour::Answer(1.1));
        let chain = ResilientChain::new("exchange", primary.clone())
            .with_fallback(fallback.clone(), config());

        for _ in 0..5 {
            let resolved = chain.resolve(&Pair("EUR", "USD")).await;
            assert_eq!(resolved.source, ResolvedSource::Fallback);
        }

        assert_eq!(primary.calls(), 2);
        assert_eq!(fallback.calls(), 5);
        assert_eq!(chain.breaker().map(CircuitBreaker::state), Some(CircuitState::Open));
    }

    #[tokio::test]
    async fn never_cache_failures() {
        let primary = Scripted::new("primary", Behaviour::Throw);
        let chain = ResilientChain::new("exchange", primary.clone()).with_cache(16, Duration::from_secs(3600));

        for _ in 0..3 {
            let resolved = chain.resolve(&Pair("EUR", "PHP")).await;
            assert!(matches!(resolved.value, Rate::Error(ref e) if e.contains("connection reset")));
            assert_eq!(resolved.source, ResolvedSource::Primary);
        }

        assert_eq!(primary.calls(), 3);
    }

    #[tokio::test]
    async fn return_the_fallback_failure_when_both_fail() {
        let primary = Scripted::new("primary", Behaviour::Throw);
        let fallback = Scripted::new("fallback", Behaviour::Reject);
        let chain = ResilientChain::new("exchange", primary).with_fallback(fallback, config());

        let resolved = chain.resolve(&Pair("EUR", "PHP")).await;
        assert_eq!(resolved.value, Rate::Error("400 Bad Request".into()));
        assert_eq!(resolved.source, ResolvedSource::Fallback);
    }

    #[tokio::test]
    async fn bypass_the_circuit_for_requests_the_primary_refuses() {
        let primary = Scripted::refusing("primary");
        let fallback = Scripted::new("fallback", Behaviour::Answer(1.1));
        let chain = ResilientChain::new("weather", primary.clone()).with_fallback(fallback.clone(), config());

        for _ in 0..3 {
            let resolved = chain.resolve(&Pair("EUR", "USD")).await;
            assert_eq!(resolved.value, Rate::Ok(1.1));
            assert_eq!(resolved.source, ResolvedSource::Fallback);
        }

        assert_eq!(primary.calls(), 0);
        assert_eq!(chain.breaker().map(CircuitBreaker::state), Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn keep_the_circuit_closed_on_request_faults() {
        let primary = Scripted::new("primary", Behaviour::Unauthorized);
        let fallback = Scripted::new("fallback", Behaviour::Answer(1.1));
        let chain = ResilientChain::new("weather", primary.clone()).with_fallback(fallback.clone(), config());

        for _ in 0..3 {
            let resolved = chain.resolve(&Pair("EUR", "USD")).await;
            assert_eq!(resolved.source, ResolvedSource::Fallback);
        }

        assert_eq!(primary.calls(), 3);
        assert_eq!(fallback.calls(), 3);
        assert_eq!(chain.breaker().map(CircuitBreaker::state), Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn retry_the_primary_after_an_abandoned_trial() {
        let primary = Scripted::new("primary", Behaviour::Hang);
        let fallback = Scripted::new("fallback", Behaviour::Answer(1.1));
        let chain = Arc::new(ResilientChain::new("exchange", primary.clone()).with_fallback(
            fallback.clone(),
            BreakerConfig {
                failure_threshold: 2,
                cool_down: Duration::from_millis(10),
            },
        ));

        if let Some(breaker) = chain.breaker() {
            for _ in 0..2 {
                if let Some(permit) = breaker.try_acquire() {
                    permit.failure();
                }
            }
            assert_eq!(breaker.state(), CircuitState::Open);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        let pending_trial = {
            let chain = chain.clone();
            tokio::spawn(async move { chain.resolve(&Pair("EUR", "USD")).await })
        };
        while primary.calls() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(chain.breaker().map(CircuitBreaker::state), Some(CircuitState::HalfOpen));

        pending_trial.abort();
        assert!(pending_trial.await.is_err());

        let retry = tokio::time::timeout(Duration::from_millis(50), chain.resolve(&Pair("EUR", "USD"))).await;
        assert!(retry.is_err());
        assert_eq!(primary.calls(), 2);
        assert_eq!(fallback.calls(), 0);
    }
}
