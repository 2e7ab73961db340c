//! Index health checks and automatic repair
//!
//! Validation compares the index with the documents on disk without changing
//! anything. Repair only ever touches the index, never the documents.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::core::identity::ItemType;
use crate::core::store::DocumentStore;

use super::{
    DuplicateId, HealthReport, HealthStats, InconsistentRef, Index, IndexEngine, IndexError,
    MissingEntry, OrphanedEntry, ReferenceProblem, RepairReport, StaleEntry, UnreadableDocument,
};

impl<S: DocumentStore> IndexEngine<S> {
    /// Compare the index with the documents on disk
    ///
    /// Uses the in-memory index if one is loaded, otherwise the index file.
    /// An absent or unusable file is reported and compared as an empty index.
    /// A loaded index whose file is gone is still compared, and the absent
    /// file is reported.
    pub fn validate_index_health(&self) -> Result<HealthReport, IndexError> {
        self.ensure_root()?;

        let mut report = HealthReport {
            index_present: true,
            ..Default::default()
        };

        let index: Cow<'_, Index> = match self.cached() {
            Ok(index) => {
                let path = self.project().index_path();
                if !path.is_file() {
                    report.index_present = false;
                    report.issues.push(format!("Index file {} is missing", path.display()));
                }
                Cow::Borrowed(index)
            }
            Err(_) => match self.read_persisted() {
                Ok(index) => Cow::Owned(index),
                Err(reason) => {
                    report.index_present = false;
                    report.issues.push(format!("Index unavailable: {}", reason));
                    Cow::Owned(Index::new(self.project().root()))
                }
            },
        };

        // id -> every path claiming it, per type
        let mut on_disk: BTreeMap<(ItemType, String), Vec<PathBuf>> = BTreeMap::new();
        let mut unreadable_paths: BTreeSet<PathBuf> = BTreeSet::new();

        for &item_type in ItemType::indexed() {
            let dir = self.project().item_directory(item_type);
            for path in self.store().list_files(&dir)? {
                report.stats.file_count += 1;
                let rel = self.project().relative_path(&path);

                let record = match self.store().read(&path, item_type) {
                    Ok(record) => record,
                    Err(e) => {
                        report.issues.push(format!("Unreadable document {}: {}", rel.display(), e));
                        unreadable_paths.insert(rel.clone());
                        report.unreadable.push(UnreadableDocument {
                            path: rel,
                            error: e.to_string(),
                        });
                        continue;
                    }
                };

                let claims = on_disk
                    .entry((item_type, record.id.clone()))
                    .or_default();
                claims.push(rel.clone());
                if claims.len() > 1 {
                    continue;
                }

                match index.get(item_type, &record.id) {
                    None => {
                        report.issues.push(format!(
                            "Document {} ({}) is not indexed",
                            rel.display(),
                            record.id
                        ));
                        report.missing.push(MissingEntry {
                            item_type,
                            id: record.id,
                            path: rel,
                        });
                    }
                    Some(indexed) => {
                        if indexed.file_hash != record.file_hash || indexed.file_path != rel {
                            report.issues.push(format!(
                                "{} changed since it was indexed",
                                record.id
                            ));
                            report.stale.push(StaleEntry {
                                item_type,
                                id: record.id,
                                path: rel,
                            });
                        }
                    }
                }
            }
        }

        for ((_, id), paths) in &on_disk {
            if paths.len() > 1 {
                report.issues.push(format!(
                    "Duplicate id {} in {}",
                    id,
                    paths
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
                report.duplicates.push(DuplicateId {
                    id: id.clone(),
                    paths: paths.clone(),
                });
            }
        }

        for &item_type in ItemType::indexed() {
            let Some(map) = index.map(item_type) else {
                continue;
            };
            for record in map.values() {
                // An unreadable document is reported above; its entry is kept
                let gone = !on_disk.contains_key(&(item_type, record.id.clone()))
                    && !unreadable_paths.contains(&record.file_path);
                if gone {
                    report.issues.push(format!(
                        "Indexed {} {} has no document ({})",
                        item_type,
                        record.id,
                        record.file_path.display()
                    ));
                    report.orphaned.push(OrphanedEntry {
                        item_type,
                        id: record.id.clone(),
                        path: record.file_path.clone(),
                    });
                }

                for parent in record.parent_refs() {
                    let problem = match index.type_of(parent.id) {
                        None => ReferenceProblem::Dangling,
                        Some(found) if found != parent.parent_type => {
                            ReferenceProblem::WrongType(found)
                        }
                        Some(_) => continue,
                    };
                    report.issues.push(match problem {
                        ReferenceProblem::Dangling => format!(
                            "{} references missing {} {} in {}",
                            record.id, parent.parent_type, parent.id, parent.field
                        ),
                        ReferenceProblem::WrongType(found) => format!(
                            "{} has {} {} but {} is a {}",
                            record.id, parent.field, parent.id, parent.id, found
                        ),
                    });
                    report.inconsistent.push(InconsistentRef {
                        id: record.id.clone(),
                        field: parent.field,
                        target: parent.id.to_string(),
                        expected: parent.parent_type,
                        problem,
                    });
                }
            }
        }

        report.stats.indexed_count = index.len();
        report.stats.missing_count = report.missing.len();
        report.stats.orphaned_count = report.orphaned.len();
        report.is_valid = report.missing.is_empty() && report.orphaned.is_empty();
        report.suggestions = suggestions(&report);

        Ok(report)
    }

    /// Validate, then bring the index back in line with the documents
    ///
    /// Missing and stale documents are re-read from the paths validation found
    /// them at, orphaned entries are dropped. An absent or unusable index file
    /// is rebuilt. `repaired` is false when the follow-up check still fails,
    /// including when the rebuilt index cannot be written.
    pub fn auto_repair_index(&mut self) -> Result<RepairReport, IndexError> {
        let before = self.validate_index_health()?;
        let mut actions = Vec::new();
        let mut errors = Vec::new();

        if !before.index_present {
            let stats = self.rebuild_index()?;
            actions.push(format!(
                "Rebuilt index from documents ({} items)",
                stats.items_indexed
            ));
        } else {
            for entry in &before.missing {
                match self.update_item_from(entry.item_type, &entry.id, &entry.path) {
                    Ok(outcome) => actions.push(format!(
                        "Indexed {} {} from {} ({})",
                        entry.item_type,
                        entry.id,
                        entry.path.display(),
                        outcome
                    )),
                    Err(e) => errors.push(format!("Failed to index {}: {}", entry.id, e)),
                }
            }

            for entry in &before.stale {
                match self.update_item_from(entry.item_type, &entry.id, &entry.path) {
                    Ok(_) => actions.push(format!("Refreshed {} {}", entry.item_type, entry.id)),
                    Err(e) => errors.push(format!("Failed to refresh {}: {}", entry.id, e)),
                }
            }

            for entry in &before.orphaned {
                match self.remove_item(entry.item_type, &entry.id) {
                    Ok(true) => actions.push(format!(
                        "Removed orphaned {} {}",
                        entry.item_type, entry.id
                    )),
                    Ok(false) => {}
                    Err(e) => errors.push(format!("Failed to remove {}: {}", entry.id, e)),
                }
            }
        }

        let after = self.validate_index_health()?;
        let repaired = after.is_valid && after.index_present;
        tracing::info!(
            "index repair: {} actions, {} errors, repaired: {}",
            actions.len(),
            errors.len(),
            repaired
        );

        Ok(RepairReport {
            repaired,
            actions,
            errors,
            before,
            after,
        })
    }
}

fn suggestions(report: &HealthReport) -> Vec<String> {
    let mut suggestions = Vec::new();

    if !report.index_present {
        suggestions.push("Run 'wl index rebuild' to recreate the index".to_string());
    } else if !report.is_valid || !report.stale.is_empty() {
        suggestions.push("Run 'wl index repair' to bring the index up to date".to_string());
    }
    if !report.unreadable.is_empty() {
        suggestions.push("Fix the front matter of the unreadable documents".to_string());
    }
    if !report.duplicates.is_empty() {
        suggestions.push("Give every document a unique id".to_string());
    }
    if !report.inconsistent.is_empty() {
        suggestions.push(
            "Point parent fields (epic_id, issue_id, task_id) at existing items of the right type"
                .to_string(),
        );
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::super::tests::{setup_project, write_doc};
    use super::*;

    #[test]
    fn test_fresh_index_is_healthy() {
        let (_tmp, mut engine) = setup_project();
        engine.rebuild_index().unwrap();

        let report = engine.validate_index_health().unwrap();
        assert!(report.is_valid);
        assert!(report.index_present);
        assert_eq!(report.stats.file_count, 5);
        assert_eq!(report.stats.indexed_count, 5);
        assert!(report.issues.is_empty());
        assert!(report.suggestions.is_empty());
    }

    #[test]
    fn test_absent_index_reports_everything_missing() {
        let (_tmp, engine) = setup_project();
        let report = engine.validate_index_health().unwrap();
        assert!(!report.index_present);
        assert!(!report.is_valid);
        assert_eq!(report.stats.missing_count, 5);
        assert!(!engine.project().index_path().exists());
    }

    #[test]
    fn test_orphaned_missing_and_stale() {
        let (_tmp, mut engine) = setup_project();
        engine.rebuild_index().unwrap();

        std::fs::remove_file(engine.project().item_path(ItemType::Task, "TSK-0002")).unwrap();
        write_doc(engine.project(), "tasks", "TSK-0003", "title: New\n");
        write_doc(engine.project(), "epics", "EP-0001", "title: Auth v2\n");

        let report = engine.validate_index_health().unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.stats.orphaned_count, 1);
        assert_eq!(report.orphaned[0].id, "TSK-0002");
        assert_eq!(report.stats.missing_count, 1);
        assert_eq!(report.missing[0].id, "TSK-0003");
        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.stale[0].id, "EP-0001");
    }

    #[test]
    fn test_unreadable_and_duplicates_do_not_affect_validity() {
        let (_tmp, mut engine) = setup_project();
        engine.rebuild_index().unwrap();

        let dir = engine.project().item_directory(ItemType::Issue);
        std::fs::write(dir.join("broken.md"), "no front matter here").unwrap();
        std::fs::write(
            dir.join("ISS-0001-copy.md"),
            std::fs::read_to_string(dir.join("ISS-0001.md")).unwrap(),
        )
        .unwrap();

        let report = engine.validate_index_health().unwrap();
        assert!(report.is_valid);
        assert_eq!(report.unreadable.len(), 1);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].paths.len(), 2);
        assert!(report.has_issues());
    }

    #[test]
    fn test_inconsistent_parent_refs() {
        let (_tmp, mut engine) = setup_project();
        write_doc(
            engine.project(),
            "tasks",
            "TSK-0007",
            "title: Odd\nissue_id: TSK-0001\nepic_id: EP-0404\n",
        );
        engine.rebuild_index().unwrap();

        let report = engine.validate_index_health().unwrap();
        assert!(report.is_valid);
        assert_eq!(report.inconsistent.len(), 2);
        assert!(report
            .inconsistent
            .iter()
            .any(|r| r.problem == ReferenceProblem::Dangling && r.target == "EP-0404"));
        assert!(report
            .inconsistent
            .iter()
            .any(|r| r.problem == ReferenceProblem::WrongType(ItemType::Task)));
    }

    #[test]
    fn test_deleted_index_file_is_reported_while_loaded() {
        let (_tmp, mut engine) = setup_project();
        engine.rebuild_index().unwrap();
        std::fs::remove_file(engine.project().index_path()).unwrap();

        let report = engine.validate_index_health().unwrap();
        assert!(!report.index_present);
        assert!(report.is_valid);
        assert!(report.has_issues());
        assert!(report.issues[0].contains("is missing"));
        assert_eq!(report.suggestions[0], "Run 'wl index rebuild' to recreate the index");

        let repair = engine.auto_repair_index().unwrap();
        assert!(repair.repaired);
        assert!(engine.project().index_path().is_file());
    }

    #[test]
    fn test_unreadable_indexed_document_is_not_orphaned() {
        let (_tmp, mut engine) = setup_project();
        engine.rebuild_index().unwrap();

        let path = engine.project().item_path(ItemType::Issue, "ISS-0001");
        std::fs::write(&path, "---\nid: ISS-0001\ntitle: [broken\n---\n").unwrap();

        let report = engine.validate_index_health().unwrap();
        assert!(report.is_valid);
        assert!(report.orphaned.is_empty());
        assert_eq!(report.unreadable.len(), 1);
        assert_eq!(report.unreadable[0].path, PathBuf::from("issues/ISS-0001.md"));
        assert!(!report.issues.iter().any(|i| i.contains("has no document")));

        let repair = engine.auto_repair_index().unwrap();
        assert!(repair.actions.is_empty());
        let index = engine.load_index().unwrap();
        assert!(index.issues.contains_key("ISS-0001"));
        assert_eq!(
            index.epics["EP-0001"].children.issues,
            vec!["ISS-0001"]
        );
    }

    #[test]
    fn test_repair_fixes_everything() {
        let (_tmp, mut engine) = setup_project();
        engine.rebuild_index().unwrap();

        std::fs::remove_file(engine.project().item_path(ItemType::Task, "TSK-0002")).unwrap();
        write_doc(
            engine.project(),
            "tasks",
            "TSK-0003",
            "title: New\nissue_id: ISS-0001\n",
        );

        let repair = engine.auto_repair_index().unwrap();
        assert!(repair.repaired);
        assert!(!repair.before.is_valid);
        assert!(repair.after.is_valid);
        assert_eq!(repair.actions.len(), 2);
        assert!(repair.errors.is_empty());

        let index = engine.load_index().unwrap();
        assert!(index.tasks.get("TSK-0002").is_none());
        assert_eq!(
            index.issues["ISS-0001"].children.tasks,
            vec!["TSK-0001", "TSK-0003"]
        );
    }

    #[test]
    fn test_repair_rebuilds_absent_index() {
        let (_tmp, mut engine) = setup_project();
        let repair = engine.auto_repair_index().unwrap();
        assert!(repair.repaired);
        assert_eq!(repair.actions.len(), 1);
        assert!(engine.project().index_path().exists());
    }

    #[test]
    fn test_repair_on_healthy_index_does_nothing() {
        let (_tmp, mut engine) = setup_project();
        engine.rebuild_index().unwrap();
        let generation = engine.generation();

        let repair = engine.auto_repair_index().unwrap();
        assert!(repair.repaired);
        assert!(repair.actions.is_empty());
        assert_eq!(engine.generation(), generation);
    }
}
