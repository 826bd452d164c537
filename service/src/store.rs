use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{Result, ServiceErr, file_store::unix_secs};

/// A prediction about to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrediction {
    pub user_id: Option<u64>,
    pub image_reference: String,
    pub label: String,
    pub confidence: f32,
}

impl NewPrediction {
    /// Checks the prediction is worth persisting.
    pub fn problem(&self) -> Option<&'static str> {
        if self.label.trim().is_empty() {
            return Some("label must not be empty");
        }
        if self.image_reference.trim().is_empty() {
            return Some("image reference must not be empty");
        }
        if !(0.5..=1.).contains(&self.confidence) {
            return Some("confidence must be in [0.5, 1]");
        }
        None
    }
}

/// A persisted prediction, never modified once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: u64,
    pub user_id: Option<u64>,
    pub image_reference: String,
    pub label: String,
    pub confidence: f32,
    /// Unix seconds.
    pub created_at: u64,
}

/// Where predictions are kept.
pub trait PredictionStore: Send + Sync {
    /// Persists a prediction.
    ///
    /// # Arguments
    /// * `prediction` - The prediction to persist.
    ///
    /// # Returns
    /// The id of the new record.
    fn save(&self, prediction: NewPrediction) -> Result<u64>;

    /// Lists a window of the records of a user, newest first.
    ///
    /// # Arguments
    /// * `user_id` - The owner of the records, `None` lists the anonymous ones.
    /// * `limit` - The maximum amount of records.
    /// * `offset` - How many of the newest records to skip.
    ///
    /// # Returns
    /// The window of records and how many records the user has in total.
    fn list_paginated(
        &self,
        user_id: Option<u64>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<PredictionRecord>, usize)>;
}

/// A `PredictionStore` that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<PredictionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl PredictionStore for MemoryStore {
    fn save(&self, prediction: NewPrediction) -> Result<u64> {
        if let Some(reason) = prediction.problem() {
            return Err(ServiceErr::Persistence(reason.into()));
        }

        let mut records = self.records.write();
        let id = records.last().map_or(1, |record| record.id + 1);

        records.push(PredictionRecord {
            id,
            user_id: prediction.user_id,
            image_reference: prediction.image_reference,
            label: prediction.label,
            confidence: prediction.confidence,
            created_at: unix_secs(),
        });

        Ok(id)
    }

    fn list_paginated(
        &self,
        user_id: Option<u64>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<PredictionRecord>, usize)> {
        let records = self.records.read();
        let owned: Vec<_> = records
            .iter()
            .rev()
            .filter(|record| record.user_id == user_id)
            .collect();

        let total_count = owned.len();
        let window = owned.into_iter().skip(offset).take(limit).cloned().collect();
        Ok((window, total_count))
    }
}

/// One page of a user's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub records: Vec<PredictionRecord>,
    pub total_count: usize,
    pub has_more: bool,
}

impl Page {
    /// Reads page `page` (1-based) of `limit` records from `store`.
    ///
    /// # Returns
    /// The page or `InvalidPage` if `page` or `limit` is zero.
    pub fn fetch<S>(store: &S, user_id: Option<u64>, page: usize, limit: usize) -> Result<Self>
    where
        S: PredictionStore + ?Sized,
    {
        if page == 0 || limit == 0 {
            return Err(ServiceErr::InvalidPage { page, limit });
        }

        let offset = (page - 1).saturating_mul(limit);
        let (records, total_count) = store.list_paginated(user_id, limit, offset)?;

        Ok(Self {
            records,
            total_count,
            has_more: offset.saturating_add(limit) < total_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn prediction(user_id: Option<u64>, n: usize) -> NewPrediction {
        NewPrediction {
            user_id,
            image_reference: format!("{n}.png"),
            label: "Healthy".into(),
            confidence: 0.75,
        }
    }

    #[test]
    fn ids_increase() {
        let store = MemoryStore::new();
        assert_eq!(store.save(prediction(Some(1), 0)).unwrap(), 1);
        assert_eq!(store.save(prediction(None, 1)).unwrap(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn invalid_predictions_are_refused() {
        let store = MemoryStore::new();

        let mut empty_label = prediction(None, 0);
        empty_label.label.clear();
        let mut unsure = prediction(None, 0);
        unsure.confidence = 0.4;
        let mut no_image = prediction(None, 0);
        no_image.image_reference = " ".into();

        for bad in [empty_label, unsure, no_image] {
            assert!(matches!(store.save(bad), Err(ServiceErr::Persistence(_))));
        }
        assert!(store.is_empty());
    }

    #[test]
    fn pages_are_newest_first_and_per_user() {
        let store = MemoryStore::new();
        for n in 0..5 {
            store.save(prediction(Some(7), n)).unwrap();
            store.save(prediction(Some(8), n)).unwrap();
        }

        let first = Page::fetch(&store, Some(7), 1, 2).unwrap();
        assert_eq!(first.total_count, 5);
        assert!(first.has_more);
        assert_eq!(
            first.records.iter().map(|r| r.image_reference.as_str()).collect::<Vec<_>>(),
            ["4.png", "3.png"]
        );
        assert!(first.records.iter().all(|r| r.user_id == Some(7)));

        let last = Page::fetch(&store, Some(7), 3, 2).unwrap();
        assert_eq!(last.records.len(), 1);
        assert_eq!(last.records[0].image_reference, "0.png");
        assert!(!last.has_more);

        let past_the_end = Page::fetch(&store, Some(7), 4, 2).unwrap();
        assert!(past_the_end.records.is_empty());
        assert!(!past_the_end.has_more);

        assert_eq!(Page::fetch(&store, Some(9), 1, 10).unwrap().total_count, 0);
    }

    #[test]
    fn zero_pages_are_invalid() {
        let store = MemoryStore::new();
        assert!(matches!(
            Page::fetch(&store, None, 0, 10),
            Err(ServiceErr::InvalidPage { page: 0, .. })
        ));
        assert!(matches!(
            Page::fetch(&store, None, 1, 0),
            Err(ServiceErr::InvalidPage { limit: 0, .. })
        ));
    }

    #[test]
    fn concurrent_saves_get_distinct_ids() {
        let store = Arc::new(MemoryStore::new());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    (0..25)
                        .map(|n| store.save(prediction(Some(t), n)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), 100);
        assert_eq!(ids.last(), Some(&100));
    }
}
