//! In-memory registry for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{RegistryError, Result};
use crate::registry::{DefinitionPart, DeploymentOptions, ModelRegistry};
use crate::{ModelId, TrainedModelConfig, Vocabulary};

/// A recorded call against the registry, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    Ping,
    Exists(ModelId),
    Delete(ModelId),
    PutConfig(ModelId),
    PutDefinitionPart(ModelId, usize),
    PutVocabulary(ModelId),
    StartDeployment(ModelId),
    StopDeployment(ModelId),
}

/// A model as stored by `InMemoryRegistry`.
#[derive(Debug, Clone)]
pub struct StoredModel {
    pub config: TrainedModelConfig,
    pub parts: BTreeMap<usize, DefinitionPart>,
    pub vocabulary: Option<Vocabulary>,
    pub deployed: bool,
}

impl StoredModel {
    /// Reassemble the definition, or `None` while parts are missing.
    pub fn definition(&self) -> Option<Vec<u8>> {
        let total_parts = self.parts.values().next()?.total_parts;
        if self.parts.len() != total_parts {
            return None;
        }
        let mut bytes = Vec::new();
        for part in self.parts.values() {
            bytes.extend(STANDARD.decode(&part.definition).ok()?);
        }
        Some(bytes)
    }
}

/// In-memory registry for testing
pub struct InMemoryRegistry {
    models: RwLock<HashMap<ModelId, StoredModel>>,
    calls: RwLock<Vec<RegistryCall>>,
    /// When set, `ping` fails with a connection error
    unreachable: RwLock<Option<String>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            unreachable: RwLock::new(None),
        }
    }

    /// Make every subsequent `ping` fail as if the cluster were down.
    pub fn set_unreachable(&self, reason: &str) {
        *self.unreachable.write().unwrap() = Some(reason.to_string());
    }

    pub fn model(&self, id: &ModelId) -> Option<StoredModel> {
        self.models.read().unwrap().get(id).cloned()
    }

    pub fn model_count(&self) -> usize {
        self.models.read().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls.read().unwrap().clone()
    }

    fn record(&self, call: RegistryCall) {
        self.calls.write().unwrap().push(call);
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelRegistry for InMemoryRegistry {
    async fn ping(&self) -> Result<()> {
        self.record(RegistryCall::Ping);
        match self.unreachable.read().unwrap().as_ref() {
            Some(reason) => Err(RegistryError::Connection(reason.clone())),
            None => Ok(()),
        }
    }

    async fn model_exists(&self, id: &ModelId) -> Result<bool> {
        self.record(RegistryCall::Exists(id.clone()));
        Ok(self.models.read().unwrap().contains_key(id))
    }

    async fn delete_model(&self, id: &ModelId) -> Result<()> {
        self.record(RegistryCall::Delete(id.clone()));
        let mut models = self.models.write().unwrap();
        match models.get(id) {
            None => Err(RegistryError::NotFound(id.to_string())),
            Some(model) if model.deployed => Err(RegistryError::Rejected {
                status: 409,
                reason: format!("Cannot delete model [{}] while it is deployed", id),
            }),
            Some(_) => {
                models.remove(id);
                Ok(())
            }
        }
    }

    async fn put_config(&self, id: &ModelId, config: &TrainedModelConfig) -> Result<()> {
        self.record(RegistryCall::PutConfig(id.clone()));
        let mut models = self.models.write().unwrap();
        if models.contains_key(id) {
            return Err(RegistryError::AlreadyExists(id.to_string()));
        }
        models.insert(
            id.clone(),
            StoredModel {
                config: config.clone(),
                parts: BTreeMap::new(),
                vocabulary: None,
                deployed: false,
            },
        );
        Ok(())
    }

    async fn put_definition_part(&self, id: &ModelId, part: &DefinitionPart) -> Result<()> {
        self.record(RegistryCall::PutDefinitionPart(id.clone(), part.index));
        let mut models = self.models.write().unwrap();
        let model = models
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        model.parts.insert(part.index, part.clone());
        Ok(())
    }

    async fn put_vocabulary(&self, id: &ModelId, vocabulary: &Vocabulary) -> Result<()> {
        self.record(RegistryCall::PutVocabulary(id.clone()));
        let mut models = self.models.write().unwrap();
        let model = models
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        model.vocabulary = Some(vocabulary.clone());
        Ok(())
    }

    async fn start_deployment(&self, id: &ModelId, _options: &DeploymentOptions) -> Result<()> {
        self.record(RegistryCall::StartDeployment(id.clone()));
        let mut models = self.models.write().unwrap();
        let model = models
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if model.definition().is_none() || model.vocabulary.is_none() {
            return Err(RegistryError::Rejected {
                status: 400,
                reason: format!("Model [{}] is not fully stored", id),
            });
        }
        model.deployed = true;
        Ok(())
    }

    async fn stop_deployment(&self, id: &ModelId) -> Result<()> {
        self.record(RegistryCall::StopDeployment(id.clone()));
        if let Some(model) = self.models.write().unwrap().get_mut(id) {
            model.deployed = false;
        }
        Ok(())
    }
}
