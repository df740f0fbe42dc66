//! Request-scoped coherence context.
//!
//! One `RequestContext` lives for exactly one request/response cycle. It
//! carries what the remote side reported about its cache and collects what
//! this side decided, so nothing leaks between concurrent requests.

use std::collections::HashMap;

use super::codec::{self, CacheFact};
use super::hash::NotModified;

#[derive(Debug, Default, Clone)]
pub struct RequestContext {
    remote: HashMap<String, CacheFact>,
    extensions: Vec<(String, NotModified)>,
    outbound: Vec<CacheFact>,
}

impl RequestContext {
    /// A context with no remote facts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Later facts for the same key replace earlier ones.
    pub fn from_facts(facts: Vec<CacheFact>) -> Self {
        let remote = facts
            .into_iter()
            .map(|fact| (fact.cache_key.clone(), fact))
            .collect();
        Self {
            remote,
            ..Self::default()
        }
    }

    /// Builds a context from transport-encoded facts. Malformed input gives
    /// an empty context.
    pub fn from_encoded(encoded: &str) -> Self {
        Self::from_facts(codec::decode(encoded))
    }

    pub fn remote_fact(&self, key: &str) -> Option<&CacheFact> {
        self.remote.get(key)
    }

    pub fn remote_len(&self) -> usize {
        self.remote.len()
    }

    // == Outputs ==
    pub fn record_extension(&mut self, key: &str, reply: NotModified) {
        self.extensions.retain(|(k, _)| k != key);
        self.extensions.push((key.to_string(), reply));
    }

    /// Keys answered with an extension directive instead of data.
    pub fn extensions(&self) -> &[(String, NotModified)] {
        &self.extensions
    }

    pub fn extension_for(&self, key: &str) -> Option<&NotModified> {
        self.extensions
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, reply)| reply)
    }

    pub fn push_outbound(&mut self, fact: CacheFact) {
        self.outbound.retain(|f| f.cache_key != fact.cache_key);
        self.outbound.push(fact);
    }

    /// Facts this side reports back at the end of the cycle.
    pub fn outbound_facts(&self) -> &[CacheFact] {
        &self.outbound
    }

    pub fn encode_outbound(&self) -> String {
        codec::encode(&self.outbound)
    }
}
