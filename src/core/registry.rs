/// Endpoint registry: the fixed index space shared by snapshots and pools
use crate::core::{Dsn, Endpoint};
use crate::error::{RouterError, RouterResult};
use std::ops::Index;
use std::slice::Iter;

#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    endpoints: Vec<Endpoint>,
}

impl EndpointRegistry {
    /// Build the registry from DSN strings; their order fixes the indices
    pub fn new<I, S>(dsns: I) -> RouterResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints = dsns
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                Dsn::parse(raw.as_ref())
                    .map(|dsn| Endpoint::new(index, dsn))
                    .map_err(|e| {
                        RouterError::configuration(format!("Invalid DSN #{}: {}", index, e))
                    })
            })
            .collect::<RouterResult<Vec<_>>>()?;

        if endpoints.is_empty() {
            return Err(RouterError::configuration(
                "Cannot create a cluster from an empty DSN list",
            ));
        }

        Ok(Self { endpoints })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false for a constructed registry
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Endpoint> {
        self.endpoints.get(index)
    }

    pub fn iter(&self) -> Iter<'_, Endpoint> {
        self.endpoints.iter()
    }

    pub fn as_slice(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Index of the endpoint with the given replication name
    pub fn find_by_replication_name(&self, name: &str) -> Option<usize> {
        self.endpoints
            .iter()
            .find(|e| e.replication_name() == name)
            .map(|e| e.index)
    }
}

impl Index<usize> for EndpointRegistry {
    type Output = Endpoint;

    fn index(&self, index: usize) -> &Self::Output {
        &self.endpoints[index]
    }
}

impl<'a> IntoIterator for &'a EndpointRegistry {
    type Item = &'a Endpoint;
    type IntoIter = Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.iter()
    }
}
