//! Test utilities: an in-memory resolver and engine setup

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tether_core::{DocumentId, ResolutionError, strip_extension};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::engine::{ChangePropagationEngine, UpdateReport};
use crate::registry::InMemoryRegistry;
use crate::resolver::{ResolveError, SpecifierResolver};
use tether_core::Document;

/// `leaf` -> `/ws/leaf.x`
pub fn doc(name: &str) -> DocumentId {
    DocumentId::new(format!("/ws/{}.x", name))
}

/// Resolves `name` to `/ws/name.x` when that file was added.
#[derive(Debug, Default)]
pub struct StubResolver {
    files: Mutex<HashSet<DocumentId>>,
    broken: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    invalidations: Mutex<Vec<Vec<DocumentId>>>,
}

impl StubResolver {
    pub fn with_files(names: &[&str]) -> Arc<Self> {
        let resolver = StubResolver::default();
        for name in names {
            resolver.add_file(name);
        }
        Arc::new(resolver)
    }

    pub fn add_file(&self, name: &str) {
        self.files.lock().unwrap().insert(doc(name));
    }

    /// Fail this specifier with an internal error.
    pub fn break_specifier(&self, specifier: &str) {
        self.broken.lock().unwrap().insert(specifier.to_string());
    }

    /// Never finish resolving this specifier.
    pub fn hang_on(&self, specifier: &str) {
        self.hanging.lock().unwrap().insert(specifier.to_string());
    }

    pub fn invalidations(&self) -> Vec<Vec<DocumentId>> {
        self.invalidations.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpecifierResolver for StubResolver {
    async fn resolve(&self, from: &DocumentId, specifier: &str) -> Result<DocumentId, ResolveError> {
        let hangs = self.hanging.lock().unwrap().contains(specifier);
        if hangs {
            std::future::pending::<()>().await;
        }
        let broken = self.broken.lock().unwrap().contains(specifier);
        if broken {
            return Err(ResolveError::Internal(anyhow::anyhow!("resolver backend unavailable")));
        }

        let target = doc(strip_extension(specifier));
        let known = self.files.lock().unwrap().contains(&target);
        if known {
            Ok(target)
        } else {
            Err(ResolutionError::NotFound {
                specifier: specifier.to_string(),
                from: from.clone(),
            }
            .into())
        }
    }

    fn invalidate(&self, importers: &[DocumentId]) {
        self.invalidations.lock().unwrap().push(importers.to_vec());
    }
}

pub struct Fixture {
    pub engine: ChangePropagationEngine,
    pub resolver: Arc<StubResolver>,
    pub registry: Arc<InMemoryRegistry>,
}

impl Fixture {
    pub fn new(files: &[&str]) -> Self {
        Self::with_config(files, EngineConfig::default())
    }

    pub fn with_config(files: &[&str], config: EngineConfig) -> Self {
        let resolver = StubResolver::with_files(files);
        let registry = Arc::new(InMemoryRegistry::new());
        let engine = ChangePropagationEngine::new(config, resolver.clone(), registry.clone());
        Fixture {
            engine,
            resolver,
            registry,
        }
    }

    /// Register and index a document, panicking on engine errors.
    pub async fn update(&mut self, document: Document) -> UpdateReport {
        self.registry.insert(document.clone());
        self.engine
            .update_content(&document, &CancellationToken::new())
            .await
            .unwrap()
    }
}
