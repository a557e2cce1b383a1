//! Mock CMDB connector for testing.
//!
//! Holds catalog objects in memory, resolves reference values to the label of
//! the referenced object the way the real catalog does, counts every call and
//! can be told to fail specific reads, updates or pages.

use crate::testing::exhausted_error;
use crate::traits::{
    AttributeSlot, AttributeValue, CatalogPage, CatalogQuery, CmdbConnector, Connector,
    ConnectorError, ConnectorHealth, ConnectorResult, ObjectEntry,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A catalog object held by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockObject {
    pub id: String,
    pub label: String,
    pub object_type_id: String,
    pub attributes: Vec<AttributeSlot>,
}

impl MockObject {
    /// Display forms of an attribute's values, in order.
    pub fn displays(&self, attribute_id: &str) -> Vec<String> {
        self.attributes
            .iter()
            .find(|s| s.object_type_attribute_id == attribute_id)
            .map(|s| {
                s.object_attribute_values
                    .iter()
                    .filter_map(|v| v.display_value.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct MockState {
    /// Insertion order doubles as catalog order.
    order: Vec<String>,
    objects: HashMap<String, MockObject>,
    /// id -> label of objects that may be referenced by value.
    references: HashMap<String, String>,
    aql_results: HashMap<String, Vec<ObjectEntry>>,
    failing_reads: HashSet<String>,
    failing_updates: HashSet<String>,
    failing_pages: HashSet<u32>,
    failing_aql: HashSet<String>,
    fail_creates: bool,
}

#[derive(Default)]
struct CallCounters {
    searches: AtomicU64,
    reads: AtomicU64,
    updates: AtomicU64,
    creates: AtomicU64,
    aql: AtomicU64,
}

/// In-memory [`CmdbConnector`].
pub struct MockCmdbConnector {
    name: String,
    state: Arc<RwLock<MockState>>,
    calls: CallCounters,
    next_id: AtomicU64,
}

impl MockCmdbConnector {
    /// Creates an empty mock catalog.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(RwLock::new(MockState::default())),
            calls: CallCounters::default(),
            next_id: AtomicU64::new(10_000),
        }
    }

    /// Adds an object to the catalog.
    pub async fn insert_object(
        &self,
        id: &str,
        label: &str,
        object_type_id: &str,
        attributes: Vec<AttributeSlot>,
    ) {
        let mut state = self.state.write().await;
        if !state.objects.contains_key(id) {
            state.order.push(id.to_string());
        }
        state.objects.insert(
            id.to_string(),
            MockObject {
                id: id.to_string(),
                label: label.to_string(),
                object_type_id: object_type_id.to_string(),
                attributes,
            },
        );
    }

    /// Registers an object that reference attributes may point at (a site, a device type).
    pub async fn add_reference(&self, id: &str, label: &str) {
        self.state
            .write()
            .await
            .references
            .insert(id.to_string(), label.to_string());
    }

    /// Sets the canned result of a query-language search.
    pub async fn set_aql_result(&self, ql_query: &str, entries: Vec<ObjectEntry>) {
        self.state
            .write()
            .await
            .aql_results
            .insert(ql_query.to_string(), entries);
    }

    /// Makes every attribute read of an object fail as if retries were exhausted.
    pub async fn fail_reads_for(&self, object_id: &str) {
        self.state
            .write()
            .await
            .failing_reads
            .insert(object_id.to_string());
    }

    /// Makes every update of an object fail.
    pub async fn fail_updates_for(&self, object_id: &str) {
        self.state
            .write()
            .await
            .failing_updates
            .insert(object_id.to_string());
    }

    /// Makes a catalog page fail.
    pub async fn fail_page(&self, page: u32) {
        self.state.write().await.failing_pages.insert(page);
    }

    /// Makes a query-language search fail.
    pub async fn fail_aql(&self, ql_query: &str) {
        self.state
            .write()
            .await
            .failing_aql
            .insert(ql_query.to_string());
    }

    /// Makes object creation fail.
    pub async fn fail_creates(&self) {
        self.state.write().await.fail_creates = true;
    }

    /// Snapshot of an object.
    pub async fn object(&self, id: &str) -> Option<MockObject> {
        self.state.read().await.objects.get(id).cloned()
    }

    /// Snapshots of all objects of a type, in catalog order.
    pub async fn objects_of_type(&self, object_type_id: &str) -> Vec<MockObject> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter_map(|id| state.objects.get(id))
            .filter(|o| o.object_type_id == object_type_id)
            .cloned()
            .collect()
    }

    pub fn search_count(&self) -> u64 {
        self.calls.searches.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> u64 {
        self.calls.reads.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> u64 {
        self.calls.updates.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> u64 {
        self.calls.creates.load(Ordering::SeqCst)
    }

    pub fn aql_count(&self) -> u64 {
        self.calls.aql.load(Ordering::SeqCst)
    }

    /// Total mutating calls (updates and creates).
    pub fn write_count(&self) -> u64 {
        self.update_count() + self.create_count()
    }

    /// Resets all call counters to zero.
    pub fn reset_counters(&self) {
        for counter in [
            &self.calls.searches,
            &self.calls.reads,
            &self.calls.updates,
            &self.calls.creates,
            &self.calls.aql,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    /// Fills in the display form the catalog would show for a written value.
    fn resolve_display(references: &HashMap<String, String>, value: &AttributeValue) -> AttributeValue {
        let mut resolved = value.clone();
        if resolved.display_value.is_none() {
            resolved.display_value = resolved
                .value
                .as_ref()
                .map(|v| references.get(v).cloned().unwrap_or_else(|| v.clone()));
        }
        resolved
    }
}

#[async_trait]
impl Connector for MockCmdbConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn connector_type(&self) -> &str {
        "cmdb"
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        Ok(ConnectorHealth::Healthy)
    }
}

#[async_trait]
impl CmdbConnector for MockCmdbConnector {
    async fn search_page(&self, query: &CatalogQuery, page: u32) -> ConnectorResult<CatalogPage> {
        self.calls.searches.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        if state.failing_pages.contains(&page) {
            return Err(exhausted_error());
        }

        let matching: Vec<&MockObject> = state
            .order
            .iter()
            .filter_map(|id| state.objects.get(id))
            .filter(|o| o.object_type_id == query.object_type_id)
            .collect();

        let per_page = query.results_per_page.max(1) as usize;
        let total_pages = matching.len().div_ceil(per_page) as u32;
        let start = (page.saturating_sub(1) as usize) * per_page;

        let object_entries = matching
            .into_iter()
            .skip(start)
            .take(per_page)
            .map(|o| ObjectEntry {
                id: o.id.clone(),
                label: o.label.clone(),
                object_key: None,
            })
            .collect();

        Ok(CatalogPage {
            page_size: total_pages,
            object_entries,
        })
    }

    async fn get_attributes(&self, object_id: &str) -> ConnectorResult<Vec<AttributeSlot>> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        if state.failing_reads.contains(object_id) {
            return Err(exhausted_error());
        }
        state
            .objects
            .get(object_id)
            .map(|o| o.attributes.clone())
            .ok_or_else(|| ConnectorError::NotFound(object_id.to_string()))
    }

    async fn update_attributes(
        &self,
        object_id: &str,
        attributes: Vec<AttributeSlot>,
    ) -> ConnectorResult<()> {
        self.calls.updates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;
        if state.failing_updates.contains(object_id) {
            return Err(exhausted_error());
        }

        let references = state.references.clone();
        let object = state
            .objects
            .get_mut(object_id)
            .ok_or_else(|| ConnectorError::NotFound(object_id.to_string()))?;

        for update in attributes {
            let values: Vec<AttributeValue> = update
                .object_attribute_values
                .iter()
                .map(|v| Self::resolve_display(&references, v))
                .collect();
            match object
                .attributes
                .iter_mut()
                .find(|s| s.object_type_attribute_id == update.object_type_attribute_id)
            {
                Some(slot) => slot.object_attribute_values = values,
                None => object.attributes.push(AttributeSlot {
                    object_type_attribute_id: update.object_type_attribute_id,
                    object_attribute_values: values,
                }),
            }
        }
        Ok(())
    }

    async fn create_object(
        &self,
        object_type_id: &str,
        attributes: Vec<AttributeSlot>,
    ) -> ConnectorResult<ObjectEntry> {
        self.calls.creates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;
        if state.fail_creates {
            return Err(exhausted_error());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let label = attributes
            .first()
            .and_then(|s| s.object_attribute_values.first())
            .and_then(|v| v.value.clone())
            .unwrap_or_else(|| id.clone());

        let references = state.references.clone();
        let attributes = attributes
            .into_iter()
            .map(|s| AttributeSlot {
                object_attribute_values: s
                    .object_attribute_values
                    .iter()
                    .map(|v| Self::resolve_display(&references, v))
                    .collect(),
                object_type_attribute_id: s.object_type_attribute_id,
            })
            .collect();

        state.order.push(id.clone());
        state.objects.insert(
            id.clone(),
            MockObject {
                id: id.clone(),
                label: label.clone(),
                object_type_id: object_type_id.to_string(),
                attributes,
            },
        );
        state.references.insert(id.clone(), label.clone());

        Ok(ObjectEntry {
            id,
            label,
            object_key: None,
        })
    }

    async fn aql_search(
        &self,
        ql_query: &str,
        start_at: u32,
        max_results: u32,
    ) -> ConnectorResult<Vec<ObjectEntry>> {
        self.calls.aql.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        if state.failing_aql.contains(ql_query) {
            return Err(exhausted_error());
        }
        Ok(state
            .aql_results
            .get(ql_query)
            .map(|entries| {
                entries
                    .iter()
                    .skip(start_at as usize)
                    .take(max_results as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
