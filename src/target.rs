//! Target kinds that CREATE, UPDATE and DELETE requests are fulfilled against
use crate::error::StoreError;
use crate::payload::Payload;
use std::collections::HashMap;
use std::sync::Arc;

/// Storage for one kind of domain entity.
pub trait TargetStore: Send + Sync {
    /// Return the id of an entity matching every attribute, creating one if none exists.
    fn create_if_absent(&self, attributes: &Payload) -> anyhow::Result<String>;

    /// Apply `changes` on top of the entity's current attributes.
    fn update(&self, id: &str, changes: &Payload) -> anyhow::Result<()>;

    fn delete(&self, id: &str) -> anyhow::Result<()>;
}

#[derive(Default, Clone)]
pub struct TargetRegistry {
    stores: HashMap<String, Arc<dyn TargetStore>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn register(&mut self, kind: impl Into<String>, store: Arc<dyn TargetStore>) {
        self.stores.insert(kind.into(), store);
    }
    pub fn contains(&self, kind: &str) -> bool {
        self.stores.contains_key(kind)
    }
    pub fn resolve(&self, kind: &str) -> Option<Arc<dyn TargetStore>> {
        self.stores.get(kind).cloned()
    }
}

pub type Validator = Arc<dyn Fn(&Payload) -> anyhow::Result<()> + Send + Sync>;

/// Entities of one kind kept as CBOR documents in their own sled tree.
pub struct SledTargetStore {
    kind: String,
    db: sled::Db,
    tree: sled::Tree,
    validator: Option<Validator>,
}

impl SledTargetStore {
    pub fn open(db: &sled::Db, kind: &str) -> Result<Self, StoreError> {
        let tree = db.open_tree(format!("target:{kind}"))?;

        Ok(Self {
            kind: kind.to_string(),
            db: db.clone(),
            tree,
            validator: None,
        })
    }

    /// Checked against the full attribute set before every create and update.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Payload) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Store an entity directly, bypassing any request.
    pub fn insert(&self, attributes: &Payload) -> anyhow::Result<String> {
        self.validate(attributes)?;
        let id = self.db.generate_id()?.to_string();
        self.tree.insert(id.as_bytes(), minicbor::to_vec(attributes)?)?;
        Ok(id)
    }

    pub fn get(&self, id: &str) -> anyhow::Result<Option<Payload>> {
        match self.tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn validate(&self, attributes: &Payload) -> anyhow::Result<()> {
        match &self.validator {
            Some(validator) => validator(attributes),
            None => Ok(()),
        }
    }
}

impl TargetStore for SledTargetStore {
    fn create_if_absent(&self, attributes: &Payload) -> anyhow::Result<String> {
        for entry in self.tree.iter() {
            let (key, value) = entry?;
            let existing: Payload = minicbor::decode(&value)?;
            if existing.contains(attributes) {
                return Ok(String::from_utf8(key.to_vec())?);
            }
        }

        self.insert(attributes)
    }

    fn update(&self, id: &str, changes: &Payload) -> anyhow::Result<()> {
        let mut entity = self
            .get(id)?
            .ok_or_else(|| anyhow::anyhow!("{} {id} not found", self.kind))?;

        entity.merge(changes);
        self.validate(&entity)?;
        self.tree.insert(id.as_bytes(), minicbor::to_vec(&entity)?)?;

        Ok(())
    }

    fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.tree
            .remove(id.as_bytes())?
            .ok_or_else(|| anyhow::anyhow!("{} {id} not found", self.kind))?;
        Ok(())
    }
}
