// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The run document store: one record per ingested run, backed by MongoDB.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Collection;
use serde::{Deserialize, Serialize};

use crate::core::{IngestError, Result};

/// A completed run's catalog record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub date: DateTime<Utc>,
    pub object_store_key: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub car_model: Option<String>,
}

/// Query filter for listing runs. Every present field narrows the match;
/// `None` fields are unconstrained. Date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub id: Option<String>,
    pub before_date: Option<DateTime<Utc>>,
    pub after_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub event_type: Option<String>,
    pub car_model: Option<String>,
    pub search_text: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

/// A partial update to a run's metadata fields.
#[derive(Debug, Clone, Default)]
pub struct RunPatch {
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub event_type: Option<String>,
    pub car_model: Option<String>,
}

/// The run catalog's persistence surface.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Insert a newly completed run's record.
    async fn create(&self, record: RunRecord) -> Result<()>;

    /// List runs matching `filter`.
    async fn find(&self, filter: &RunFilter) -> Result<Vec<RunRecord>>;

    /// Apply a partial metadata update to a run by ID.
    async fn update_fields(&self, run_id: &str, patch: &RunPatch) -> Result<()>;

    /// Clear a single metadata field back to unset.
    async fn unset_field(&self, run_id: &str, field: &str) -> Result<()>;

    /// Delete a run's catalog record by ID.
    async fn delete(&self, run_id: &str) -> Result<()>;
}

/// `RunRepository` backed by a real MongoDB collection.
pub struct MongoRunRepository {
    collection: Collection<RunRecord>,
}

impl MongoRunRepository {
    pub fn new(collection: Collection<RunRecord>) -> Self {
        Self { collection }
    }
}

fn filter_to_bson(filter: &RunFilter) -> mongodb::bson::Document {
    let mut doc = doc! {};
    if let Some(id) = &filter.id {
        doc.insert("run_id", id);
    }
    if let Some(location) = &filter.location {
        doc.insert("location", location);
    }
    if let Some(event_type) = &filter.event_type {
        doc.insert("event_type", event_type);
    }
    if let Some(car_model) = &filter.car_model {
        doc.insert("car_model", car_model);
    }
    if filter.before_date.is_some() || filter.after_date.is_some() {
        let mut range = doc! {};
        if let Some(after) = filter.after_date {
            range.insert("$gte", after);
        }
        if let Some(before) = filter.before_date {
            range.insert("$lte", before);
        }
        doc.insert("date", range);
    }
    if let Some(search_text) = &filter.search_text {
        doc.insert(
            "$or",
            vec![
                doc! { "object_store_key": { "$regex": search_text, "$options": "i" } },
                doc! { "notes": { "$regex": search_text, "$options": "i" } },
            ],
        );
    }
    doc
}

#[async_trait]
impl RunRepository for MongoRunRepository {
    async fn create(&self, record: RunRecord) -> Result<()> {
        self.collection
            .insert_one(record)
            .await
            .map_err(|e| IngestError::storage_failure("mongo", e.to_string()))?;
        Ok(())
    }

    async fn find(&self, filter: &RunFilter) -> Result<Vec<RunRecord>> {
        let mut find = self.collection.find(filter_to_bson(filter));
        if let Some(limit) = filter.limit {
            find = find.limit(limit);
        }
        if let Some(offset) = filter.offset {
            find = find.skip(offset);
        }
        let cursor = find
            .await
            .map_err(|e| IngestError::storage_failure("mongo", e.to_string()))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| IngestError::storage_failure("mongo", e.to_string()))
    }

    async fn update_fields(&self, run_id: &str, patch: &RunPatch) -> Result<()> {
        let mut set = doc! {};
        if let Some(date) = patch.date {
            set.insert("date", date);
        }
        if let Some(location) = &patch.location {
            set.insert("location", location);
        }
        if let Some(notes) = &patch.notes {
            set.insert("notes", notes);
        }
        if let Some(event_type) = &patch.event_type {
            set.insert("event_type", event_type);
        }
        if let Some(car_model) = &patch.car_model {
            set.insert("car_model", car_model);
        }
        self.collection
            .update_one(doc! { "run_id": run_id }, doc! { "$set": set })
            .await
            .map_err(|e| IngestError::storage_failure("mongo", e.to_string()))?;
        Ok(())
    }

    async fn unset_field(&self, run_id: &str, field: &str) -> Result<()> {
        let mut unset = mongodb::bson::Document::new();
        unset.insert(field, "");
        self.collection
            .update_one(doc! { "run_id": run_id }, doc! { "$unset": unset })
            .await
            .map_err(|e| IngestError::storage_failure("mongo", e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, run_id: &str) -> Result<()> {
        self.collection
            .delete_one(doc! { "run_id": run_id })
            .await
            .map_err(|e| IngestError::storage_failure("mongo", e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct InMemoryRunRepository {
        records: Mutex<Vec<RunRecord>>,
    }

    #[async_trait]
    impl RunRepository for InMemoryRunRepository {
        async fn create(&self, record: RunRecord) -> Result<()> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }

        async fn find(&self, filter: &RunFilter) -> Result<Vec<RunRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| filter.id.as_deref().map(|id| id == r.run_id).unwrap_or(true))
                .cloned()
                .collect())
        }

        async fn update_fields(&self, run_id: &str, patch: &RunPatch) -> Result<()> {
            let mut records = self.records.lock().unwrap();
            if let Some(record) = records.iter_mut().find(|r| r.run_id == run_id) {
                if let Some(location) = &patch.location {
                    record.location = Some(location.clone());
                }
            }
            Ok(())
        }

        async fn unset_field(&self, run_id: &str, field: &str) -> Result<()> {
            let mut records = self.records.lock().unwrap();
            if let Some(record) = records.iter_mut().find(|r| r.run_id == run_id) {
                match field {
                    "location" => record.location = None,
                    "notes" => record.notes = None,
                    "event_type" => record.event_type = None,
                    "car_model" => record.car_model = None,
                    _ => {}
                }
            }
            Ok(())
        }

        async fn delete(&self, run_id: &str) -> Result<()> {
            self.records.lock().unwrap().retain(|r| r.run_id != run_id);
            Ok(())
        }
    }

    fn sample_record() -> RunRecord {
        RunRecord {
            run_id: "run-1".to_string(),
            date: Utc::now(),
            object_store_key: "runs/run-1.mcap".to_string(),
            size_bytes: 1024,
            location: None,
            notes: None,
            event_type: None,
            car_model: None,
        }
    }

    #[tokio::test]
    async fn create_then_find_round_trips() {
        let repo = InMemoryRunRepository {
            records: Mutex::new(Vec::new()),
        };
        let record = sample_record();
        repo.create(record.clone()).await.unwrap();

        let found = repo
            .find(&RunFilter {
                id: Some("run-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].object_store_key, record.object_store_key);
    }

    #[tokio::test]
    async fn find_missing_run_returns_empty() {
        let repo = InMemoryRunRepository {
            records: Mutex::new(Vec::new()),
        };
        let found = repo
            .find(&RunFilter {
                id: Some("missing".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn unset_field_clears_only_the_named_field() {
        let mut record = sample_record();
        record.location = Some("Laguna Seca".to_string());
        record.notes = Some("wet track".to_string());
        let repo = InMemoryRunRepository {
            records: Mutex::new(vec![record]),
        };
        repo.unset_field("run-1", "location").await.unwrap();
        let found = repo
            .find(&RunFilter {
                id: Some("run-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found[0].location, None);
        assert_eq!(found[0].notes.as_deref(), Some("wet track"));
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let repo = InMemoryRunRepository {
            records: Mutex::new(vec![sample_record()]),
        };
        repo.delete("run-1").await.unwrap();
        assert!(repo.find(&RunFilter::default()).await.unwrap().is_empty());
    }
}
