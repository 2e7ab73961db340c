//! Read queries over the cached index

use chrono::{DateTime, Duration, Utc};

use crate::core::identity::ItemType;
use crate::core::item::{ItemRecord, Priority};
use crate::core::store::DocumentStore;

use super::{EpicProgress, Index, IndexEngine, IndexError, ProjectOverview, RecentItem};

/// Window for "recently updated" items in the overview
pub const RECENT_DAYS: i64 = 7;

impl<S: DocumentStore> IndexEngine<S> {
    /// All records of one type, ordered by id
    pub fn get_items_by_type(&mut self, item_type: ItemType) -> Result<Vec<&ItemRecord>, IndexError> {
        let index = self.load_index()?;
        Ok(index
            .map(item_type)
            .map(|map| map.values().collect())
            .unwrap_or_default())
    }

    pub fn get_item_by_id(
        &mut self,
        item_type: ItemType,
        id: &str,
    ) -> Result<Option<&ItemRecord>, IndexError> {
        Ok(self.load_index()?.get(item_type, id))
    }

    /// Look an id up across all types
    pub fn find_item(&mut self, id: &str) -> Result<Option<&ItemRecord>, IndexError> {
        Ok(self.load_index()?.find(id))
    }

    /// Aggregate counts, completion rate and recent activity
    pub fn get_project_overview(&mut self) -> Result<ProjectOverview, IndexError> {
        Ok(overview(self.load_index()?, Utc::now()))
    }
}

/// Build the overview of `index` as seen at `now`
pub fn overview(index: &Index, now: DateTime<Utc>) -> ProjectOverview {
    let mut overview = ProjectOverview {
        total_items: index.len(),
        ..Default::default()
    };

    for &item_type in ItemType::indexed() {
        let count = index.map(item_type).map_or(0, |map| map.len());
        overview.by_type.insert(item_type.as_str().to_string(), count);
    }
    for priority in Priority::all() {
        overview.by_priority.insert(priority.to_string(), 0);
    }

    let cutoff = now - Duration::days(RECENT_DAYS);
    let mut delivered = 0usize;

    for item in index.items() {
        let state = item.effective_state();
        *overview.by_state.entry(state.to_string()).or_default() += 1;
        *overview
            .by_priority
            .entry(item.priority.to_string())
            .or_default() += 1;

        if state.is_delivered() {
            delivered += 1;
        }

        if let Some(touched) = item.updated_at.or(item.created_at) {
            if touched >= cutoff && touched <= now {
                overview.recently_updated.push(RecentItem {
                    id: item.id.clone(),
                    item_type: item.item_type,
                    title: item.title.clone(),
                    state,
                    updated_at: touched,
                });
            }
        }
    }

    overview
        .recently_updated
        .sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));

    overview.completion_rate = percentage(delivered, index.len());
    overview.epics = index.epics.values().map(|epic| epic_progress(index, epic)).collect();

    overview
}

fn epic_progress(index: &Index, epic: &ItemRecord) -> EpicProgress {
    let children: Vec<&ItemRecord> = epic
        .children
        .issues
        .iter()
        .filter_map(|id| index.get(ItemType::Issue, id))
        .chain(
            epic.children
                .tasks
                .iter()
                .filter_map(|id| index.get(ItemType::Task, id)),
        )
        .chain(
            epic.children
                .prs
                .iter()
                .filter_map(|id| index.get(ItemType::Pr, id)),
        )
        .collect();

    let delivered = children
        .iter()
        .filter(|child| child.effective_state().is_delivered())
        .count();

    let completion_percentage = if children.is_empty() {
        match (epic.completion_percentage, epic.effective_state()) {
            (Some(pct), _) => f64::from(pct),
            (None, state) if state.is_delivered() => 100.0,
            (None, _) => 0.0,
        }
    } else {
        percentage(delivered, children.len())
    };

    EpicProgress {
        id: epic.id.clone(),
        title: epic.title.clone(),
        state: epic.effective_state(),
        child_count: children.len(),
        delivered_count: delivered,
        completion_percentage,
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let pct = part as f64 / whole as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::super::tests::setup_project;
    use super::*;
    use crate::core::item::{LifecycleStatus, ResolutionStatus};

    #[test]
    fn test_queries() {
        let (_tmp, mut engine) = setup_project();

        let tasks = engine.get_items_by_type(ItemType::Task).unwrap();
        let ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["TSK-0001", "TSK-0002"]);

        assert!(engine
            .get_item_by_id(ItemType::Issue, "ISS-0001")
            .unwrap()
            .is_some());
        assert!(engine
            .get_item_by_id(ItemType::Task, "ISS-0001")
            .unwrap()
            .is_none());
        assert_eq!(
            engine.find_item("PR-0001").unwrap().map(|r| r.item_type),
            Some(ItemType::Pr)
        );
        assert!(engine
            .get_items_by_type(ItemType::Project)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_overview_counts() {
        let (_tmp, mut engine) = setup_project();
        let overview = engine.get_project_overview().unwrap();
        assert_eq!(overview.total_items, 5);
        assert_eq!(overview.by_type["task"], 2);
        assert_eq!(overview.by_state["active"], 1);
        assert_eq!(overview.by_state["planning"], 4);
        assert_eq!(overview.by_priority["medium"], 5);
        assert_eq!(overview.by_priority["critical"], 0);
        assert_eq!(overview.completion_rate, 0.0);
        assert_eq!(overview.epics.len(), 1);
        assert_eq!(overview.epics[0].child_count, 2);
    }

    #[test]
    fn test_overview_completion_and_recent() {
        let now = Utc::now();
        let mut index = Index::new(std::path::Path::new("/tmp/project"));

        let mut epic = ItemRecord::new(ItemType::Epic, "EP-0001", "Auth");
        epic.children.insert(ItemType::Issue, "ISS-0001");
        epic.children.insert(ItemType::Issue, "ISS-0002");
        index.epics.insert(epic.id.clone(), epic);

        let mut done = ItemRecord::new(ItemType::Issue, "ISS-0001", "Login");
        done.status = LifecycleStatus::Completed;
        done.resolution = Some(ResolutionStatus::Done);
        done.updated_at = Some(now - Duration::days(1));
        index.issues.insert(done.id.clone(), done);

        let mut old = ItemRecord::new(ItemType::Issue, "ISS-0002", "Signup");
        old.updated_at = Some(now - Duration::days(30));
        index.issues.insert(old.id.clone(), old);
        index.refresh_counts();

        let overview = overview(&index, now);
        assert_eq!(overview.completion_rate, 33.3);
        assert_eq!(overview.by_state["done"], 1);
        assert_eq!(overview.recently_updated.len(), 1);
        assert_eq!(overview.recently_updated[0].id, "ISS-0001");
        assert_eq!(overview.epics[0].delivered_count, 1);
        assert_eq!(overview.epics[0].completion_percentage, 50.0);
    }
}
