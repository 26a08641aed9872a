//! In-memory remote store with call counters and fault injection.
//!
//! Behaves like the Notion API closely enough to drive the sync engine in
//! tests and dry runs: created properties are stored in wire format and read
//! back through the same decoder used for real pages.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::codec::{title_text, PropertySet};
use crate::models::{CoverImage, PropertyBag, RemoteEntity};
use crate::remote::RemoteStore;
use crate::{Error, Result};

/// Store operation, used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ResolveCollection,
    Lookup,
    Create,
    Update,
}

/// Failure to return from the next call of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Connection-level failure, retried by the engine
    Transport,
    /// Non-2xx response, never retried
    Api { status: u16, message: String },
}

impl Fault {
    fn into_error(self, operation: Operation) -> Error {
        match self {
            Self::Transport => {
                Error::transport(format!("injected {operation:?} transport failure"))
            }
            Self::Api { status, message } => Error::api(status, message),
        }
    }
}

/// Number of calls received per operation, failed attempts included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub resolve: usize,
    pub lookups: usize,
    pub creates: usize,
    pub updates: usize,
}

impl CallCounts {
    pub const fn writes(&self) -> usize {
        self.creates + self.updates
    }
}

#[derive(Debug, Default)]
struct State {
    entities: Vec<RemoteEntity>,
    next_id: u64,
    faults: HashMap<Operation, VecDeque<Fault>>,
    calls: CallCounts,
}

impl State {
    fn begin(&mut self, operation: Operation) -> Result<()> {
        let counter = match operation {
            Operation::ResolveCollection => &mut self.calls.resolve,
            Operation::Lookup => &mut self.calls.lookups,
            Operation::Create => &mut self.calls.creates,
            Operation::Update => &mut self.calls.updates,
        };
        *counter += 1;

        match self
            .faults
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(fault) => Err(fault.into_error(operation)),
            None => Ok(()),
        }
    }

    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("page-{:04}", self.next_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an entity that already exists remotely.
    pub fn insert(&self, properties: &PropertySet, cover: Option<&str>) -> RemoteEntity {
        let mut state = self.lock();
        let entity = RemoteEntity {
            id: state.allocate_id(),
            properties: to_property_bag(properties),
            cover: cover.map(CoverImage::external),
        };
        state.entities.push(entity.clone());
        entity
    }

    /// Seed an entity exactly as given, e.g. with a raw Notion-shaped bag.
    pub fn insert_raw(&self, entity: RemoteEntity) {
        self.lock().entities.push(entity);
    }

    /// Make the next `times` calls of `operation` fail with `fault`.
    pub fn fail_next(&self, operation: Operation, fault: Fault, times: usize) {
        let mut state = self.lock();
        let queue = state.faults.entry(operation).or_default();
        queue.extend(std::iter::repeat(fault).take(times));
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    pub fn reset_calls(&self) {
        self.lock().calls = CallCounts::default();
    }

    pub fn entities(&self) -> Vec<RemoteEntity> {
        self.lock().entities.clone()
    }

    pub fn entity(&self, id: &str) -> Option<RemoteEntity> {
        self.lock()
            .entities
            .iter()
            .find(|entity| entity.id == id)
            .cloned()
    }
}

/// Convert an encoded payload into the shape the store reports back.
fn to_property_bag(properties: &PropertySet) -> PropertyBag {
    properties
        .iter()
        .map(|(name, value)| {
            let mut property = serde_json::to_value(value).unwrap_or(Value::Null);
            if let Value::Object(object) = &mut property {
                if let Some(kind) = object.keys().next().cloned() {
                    object.insert("type".to_string(), Value::String(kind));
                }
            }
            (name.clone(), property)
        })
        .collect()
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn resolve_collection_id(&self, database_id: &str) -> Result<String> {
        self.lock().begin(Operation::ResolveCollection)?;
        Ok(database_id.to_string())
    }

    async fn lookup(
        &self,
        _collection_id: &str,
        title_field: &str,
        name: &str,
    ) -> Result<Vec<RemoteEntity>> {
        let mut state = self.lock();
        state.begin(Operation::Lookup)?;
        Ok(state
            .entities
            .iter()
            .filter(|entity| {
                entity
                    .properties
                    .get(title_field)
                    .is_some_and(|property| title_text(property) == name)
            })
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        _collection_id: &str,
        properties: &PropertySet,
        cover: Option<&str>,
    ) -> Result<RemoteEntity> {
        self.lock().begin(Operation::Create)?;
        Ok(self.insert(properties, cover))
    }

    async fn update(
        &self,
        entity_id: &str,
        properties: &PropertySet,
        cover: Option<&str>,
    ) -> Result<RemoteEntity> {
        let mut state = self.lock();
        state.begin(Operation::Update)?;
        let entity = state
            .entities
            .iter_mut()
            .find(|entity| entity.id == entity_id)
            .ok_or_else(|| {
                Error::api(404, format!("object_not_found: Could not find page {entity_id}"))
            })?;

        entity.properties.extend(to_property_bag(properties));
        entity.cover = cover.map(CoverImage::external);
        Ok(entity.clone())
    }
}
