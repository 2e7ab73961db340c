//! Relationship resolver: hierarchy views and dependency lookups
//!
//! Builds an in-memory graph from the index's parent back-references and
//! reuses it until the index generation changes, the TTL runs out, or
//! [`RelationshipResolver::rebuild_cache`] is called. The reverse dependency
//! map is only computed the first time it is needed.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::config::Config;
use crate::core::identity::ItemType;
use crate::core::index::{Index, IndexEngine, IndexError};
use crate::core::item::{ChildRefs, ItemRecord};
use crate::core::project::Project;
use crate::core::store::{DocumentStore, MarkdownStore};
use crate::core::workflow::{RelatedState, TransitionContext};

/// An item with everything above and below it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hierarchy {
    pub anchor: ItemRecord,
    /// Resolved parents, top of the hierarchy first
    pub ancestors: Vec<ItemRecord>,
    pub issues: Vec<ItemRecord>,
    pub tasks: Vec<ItemRecord>,
    pub prs: Vec<ItemRecord>,
}

impl Hierarchy {
    /// Whether `id` is the anchor or one of its descendants
    pub fn contains(&self, id: &str) -> bool {
        self.anchor.id == id || self.descendants().any(|item| item.id == id)
    }

    pub fn descendants(&self) -> impl Iterator<Item = &ItemRecord> {
        self.issues.iter().chain(self.tasks.iter()).chain(self.prs.iter())
    }
}

/// Items linked to one id through `dependencies` / `blocked_by`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedItems {
    pub id: String,
    /// Items that list `id` as a dependency or blocker
    pub dependents: Vec<ItemRecord>,
    /// Items `id` waits on
    pub blockers: Vec<ItemRecord>,
    /// Ids `id` waits on that are not indexed
    pub missing: Vec<String>,
}

/// Derived parent/child and dependency maps, stamped with their source
#[derive(Debug)]
struct RelationshipGraph {
    generation: u64,
    built_at: Instant,
    children: BTreeMap<String, ChildRefs>,
    /// id -> ids that depend on it, built lazily
    dependents: Option<BTreeMap<String, Vec<String>>>,
}

impl RelationshipGraph {
    fn build(index: &Index, generation: u64) -> Self {
        let children = index
            .items()
            .filter(|item| !item.children.is_empty())
            .map(|item| (item.id.clone(), item.children.clone()))
            .collect();

        Self {
            generation,
            built_at: Instant::now(),
            children,
            dependents: None,
        }
    }

    fn is_current(&self, generation: u64, ttl: Duration) -> bool {
        self.generation == generation && self.built_at.elapsed() < ttl
    }

    fn dependents(&mut self, index: &Index) -> &BTreeMap<String, Vec<String>> {
        self.dependents.get_or_insert_with(|| {
            let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            for item in index.items() {
                for target in item.blocking_ids() {
                    map.entry(target.to_string())
                        .or_default()
                        .insert(item.id.clone());
                }
            }
            map.into_iter()
                .map(|(id, set)| (id, set.into_iter().collect()))
                .collect()
        })
    }

    /// Every descendant id of `id`, breadth first
    fn descendant_ids(&self, id: &str) -> Vec<String> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([id]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            let Some(refs) = self.children.get(current) else {
                continue;
            };
            for child in refs.issues.iter().chain(&refs.tasks).chain(&refs.prs) {
                if child != id && seen.insert(child.clone()) {
                    found.push(child.clone());
                    queue.push_back(child);
                }
            }
        }

        found
    }
}

/// Answers hierarchy and dependency questions over one index engine
pub struct RelationshipResolver<S: DocumentStore = MarkdownStore> {
    engine: IndexEngine<S>,
    ttl: Duration,
    graph: Option<RelationshipGraph>,
}

impl RelationshipResolver<MarkdownStore> {
    /// Resolver over Markdown documents, with TTLs from configuration
    pub fn open(project: Project, config: &Config) -> Self {
        Self::new(IndexEngine::open(project, config), config.relation_ttl())
    }
}

impl<S: DocumentStore> RelationshipResolver<S> {
    pub fn new(engine: IndexEngine<S>, ttl: Duration) -> Self {
        Self {
            engine,
            ttl,
            graph: None,
        }
    }

    pub fn engine(&self) -> &IndexEngine<S> {
        &self.engine
    }

    /// Mutable access to the index engine (updates bump its generation,
    /// which invalidates the graph on the next read)
    pub fn engine_mut(&mut self) -> &mut IndexEngine<S> {
        &mut self.engine
    }

    /// Drop the derived graph; the index itself is untouched
    pub fn rebuild_cache(&mut self) {
        self.graph = None;
    }

    /// Whether a graph is cached and still matches the index
    pub fn is_graph_current(&self) -> bool {
        self.graph
            .as_ref()
            .is_some_and(|g| g.is_current(self.engine.generation(), self.ttl))
    }

    /// Load the index and make sure the graph matches it
    fn ensure_graph(&mut self) -> Result<(), IndexError> {
        self.engine.load_index()?;
        let generation = self.engine.generation();

        if !self.is_graph_current() {
            tracing::debug!("building relationship graph (generation {})", generation);
            self.graph = Some(RelationshipGraph::build(self.engine.cached()?, generation));
        }
        Ok(())
    }

    pub fn get_epic_hierarchy(&mut self, epic_id: &str) -> Result<Option<Hierarchy>, IndexError> {
        self.hierarchy(ItemType::Epic, epic_id)
    }

    pub fn get_issue_hierarchy(&mut self, issue_id: &str) -> Result<Option<Hierarchy>, IndexError> {
        self.hierarchy(ItemType::Issue, issue_id)
    }

    pub fn get_task_hierarchy(&mut self, task_id: &str) -> Result<Option<Hierarchy>, IndexError> {
        self.hierarchy(ItemType::Task, task_id)
    }

    pub fn get_pr_hierarchy(&mut self, pr_id: &str) -> Result<Option<Hierarchy>, IndexError> {
        self.hierarchy(ItemType::Pr, pr_id)
    }

    /// Hierarchy of whatever type holds `id`
    pub fn get_hierarchy(&mut self, id: &str) -> Result<Option<Hierarchy>, IndexError> {
        let item_type = self.engine.load_index()?.type_of(id);
        match item_type {
            Some(item_type) => self.hierarchy(item_type, id),
            None => Ok(None),
        }
    }

    fn hierarchy(&mut self, item_type: ItemType, id: &str) -> Result<Option<Hierarchy>, IndexError> {
        self.ensure_graph()?;
        let index = self.engine.cached()?;
        let graph = self.graph.as_ref().ok_or(IndexError::NotLoaded)?;

        let Some(anchor) = index.get(item_type, id) else {
            return Ok(None);
        };

        let mut hierarchy = Hierarchy {
            anchor: anchor.clone(),
            ancestors: ancestors(index, anchor),
            issues: Vec::new(),
            tasks: Vec::new(),
            prs: Vec::new(),
        };

        for child_id in graph.descendant_ids(id) {
            let Some(child) = index.find(&child_id) else {
                continue;
            };
            let bucket = match child.item_type {
                ItemType::Issue => &mut hierarchy.issues,
                ItemType::Task => &mut hierarchy.tasks,
                ItemType::Pr => &mut hierarchy.prs,
                ItemType::Epic | ItemType::Project => continue,
            };
            bucket.push(child.clone());
        }
        hierarchy.issues.sort_by(|a, b| a.id.cmp(&b.id));
        hierarchy.tasks.sort_by(|a, b| a.id.cmp(&b.id));
        hierarchy.prs.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Some(hierarchy))
    }

    /// Dependents of `id`, plus what `id` itself waits on
    pub fn get_related_items(&mut self, id: &str) -> Result<RelatedItems, IndexError> {
        self.ensure_graph()?;
        let index = self.engine.cached()?;
        let graph = self.graph.as_mut().ok_or(IndexError::NotLoaded)?;

        let dependents = graph
            .dependents(index)
            .get(id)
            .map(|ids| ids.iter().filter_map(|d| index.find(d)).cloned().collect())
            .unwrap_or_default();

        let mut related = RelatedItems {
            id: id.to_string(),
            dependents,
            ..Default::default()
        };

        if let Some(item) = index.find(id) {
            let mut seen = BTreeSet::new();
            for target in item.blocking_ids() {
                if !seen.insert(target) {
                    continue;
                }
                match index.find(target) {
                    Some(blocker) => related.blockers.push(blocker.clone()),
                    None => related.missing.push(target.to_string()),
                }
            }
        }

        Ok(related)
    }

    /// Neighbour states for the transition engine's soft checks
    pub fn transition_context(&mut self, id: &str) -> Result<TransitionContext, IndexError> {
        let related = self.get_related_items(id)?;
        let children = match self.get_hierarchy(id)? {
            Some(hierarchy) => hierarchy.descendants().map(RelatedState::of).collect(),
            None => Vec::new(),
        };

        Ok(TransitionContext {
            blockers: related.blockers.iter().map(RelatedState::of).collect(),
            dependents: related.dependents.iter().map(RelatedState::of).collect(),
            children,
        })
    }

    pub fn get_all_epics(&mut self) -> Result<Vec<&ItemRecord>, IndexError> {
        self.engine.get_items_by_type(ItemType::Epic)
    }

    pub fn get_all_issues(&mut self) -> Result<Vec<&ItemRecord>, IndexError> {
        self.engine.get_items_by_type(ItemType::Issue)
    }

    pub fn get_all_tasks(&mut self) -> Result<Vec<&ItemRecord>, IndexError> {
        self.engine.get_items_by_type(ItemType::Task)
    }

    pub fn get_all_prs(&mut self) -> Result<Vec<&ItemRecord>, IndexError> {
        self.engine.get_items_by_type(ItemType::Pr)
    }
}

/// Parents of `item`, resolved transitively, top of the hierarchy first
fn ancestors(index: &Index, item: &ItemRecord) -> Vec<ItemRecord> {
    let mut found: BTreeMap<String, ItemRecord> = BTreeMap::new();
    let mut queue: VecDeque<&ItemRecord> = VecDeque::from([item]);

    while let Some(current) = queue.pop_front() {
        for parent in current.parent_refs() {
            if parent.id == item.id || found.contains_key(parent.id) {
                continue;
            }
            if let Some(record) = index.get(parent.parent_type, parent.id) {
                found.insert(record.id.clone(), record.clone());
                queue.push_back(record);
            }
        }
    }

    let mut ancestors: Vec<ItemRecord> = found.into_values().collect();
    ancestors.sort_by(|a, b| a.item_type.cmp(&b.item_type).then_with(|| a.id.cmp(&b.id)));
    ancestors
}
