//! Price list sync service
//!
//! Re-sync jobs merge their bookkeeping into the list metadata instead of
//! overwriting it, and lifecycle moves are checked before they are stored.
//! Archiving is the only way a list leaves service.

use carrio_core::{
    models::{PriceList, PriceListStatus},
    traits::PriceListRepository,
    AppError, AppResult,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Metadata key stamped on every sync
pub const LAST_SYNCED_AT_KEY: &str = "last_synced_at";

/// Overlay `patch` onto `existing`
///
/// Objects merge key by key, any other patch value replaces, and a `null`
/// in the patch removes the key. Keys the patch does not mention survive.
pub fn merge_metadata(existing: &Value, patch: &Value) -> Value {
    let Value::Object(patch_map) = patch else {
        return patch.clone();
    };

    let mut merged = match existing {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    for (key, value) in patch_map {
        match value {
            Value::Null => {
                merged.remove(key);
            }
            Value::Object(_) => {
                let current = merged.get(key).cloned().unwrap_or(Value::Null);
                merged.insert(key.clone(), merge_metadata(&current, value));
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    Value::Object(merged)
}

/// Price list sync service
pub struct PriceListSync<P> {
    repo: Arc<P>,
}

impl<P: PriceListRepository> PriceListSync<P> {
    /// Create a new sync service
    pub fn new(repo: Arc<P>) -> Self {
        Self { repo }
    }

    /// Merge `patch` into the list metadata and stamp the sync time
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the patch is not a JSON object
    /// - `PriceListNotFound` if the list does not exist
    #[instrument(skip(self, patch))]
    pub async fn sync_metadata(&self, price_list_id: Uuid, patch: Value) -> AppResult<PriceList> {
        if !patch.is_object() {
            return Err(AppError::InvalidInput(
                "metadata patch must be a JSON object".to_string(),
            ));
        }

        let list = self.find_list(price_list_id).await?;

        let mut merged = merge_metadata(&list.metadata, &patch);
        if let Value::Object(map) = &mut merged {
            map.insert(
                LAST_SYNCED_AT_KEY.to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        let updated = self.repo.update_metadata(list.id, &merged).await?;
        info!("Synced metadata of price list {}", updated.id);
        Ok(updated)
    }

    /// Move a list through its lifecycle
    ///
    /// `draft -> active` requires at least one entry; `draft -> archived`
    /// and `active -> archived` are always allowed.
    ///
    /// # Errors
    ///
    /// - `PriceListNotFound` if the list does not exist
    /// - `Configuration` when activating a list without entries
    /// - `InvalidInput` for any other move
    #[instrument(skip(self))]
    pub async fn transition_status(
        &self,
        price_list_id: Uuid,
        to: PriceListStatus,
    ) -> AppResult<PriceList> {
        let list = self.find_list(price_list_id).await?;

        if !list.status.can_transition_to(to) {
            warn!("Refused price list {} move {} -> {}", list.id, list.status, to);
            return Err(AppError::InvalidInput(format!(
                "price list cannot move from {} to {}",
                list.status, to
            )));
        }

        if to == PriceListStatus::Active && self.repo.count_entries(list.id).await? == 0 {
            return Err(AppError::Configuration(format!(
                "price list {} has no entries and cannot be activated",
                list.id
            )));
        }

        let updated = self.repo.update_status(list.id, to).await?;
        info!("Price list {} moved {} -> {}", updated.id, list.status, to);
        Ok(updated)
    }

    async fn find_list(&self, price_list_id: Uuid) -> AppResult<PriceList> {
        self.repo
            .find_by_id(price_list_id)
            .await?
            .ok_or_else(|| AppError::PriceListNotFound(price_list_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrio_core::models::PriceListEntry;
    use carrio_db::InMemoryStore;
    use serde_json::json;

    #[test]
    fn test_merge_overlays_nested_objects() {
        let existing = json!({
            "courier": "BRT",
            "source": {"contract": "C-1", "fetched": 3},
            "tags": ["a"],
        });
        let patch = json!({
            "source": {"fetched": 4, "etag": "x"},
            "tags": ["b", "c"],
        });

        assert_eq!(
            merge_metadata(&existing, &patch),
            json!({
                "courier": "BRT",
                "source": {"contract": "C-1", "fetched": 4, "etag": "x"},
                "tags": ["b", "c"],
            })
        );
    }

    #[test]
    fn test_merge_null_removes_key() {
        let existing = json!({"courier": "BRT", "stale": true, "nested": {"a": 1, "b": 2}});
        let patch = json!({"stale": null, "nested": {"a": null}});

        assert_eq!(
            merge_metadata(&existing, &patch),
            json!({"courier": "BRT", "nested": {"b": 2}})
        );
    }

    #[test]
    fn test_merge_into_non_object() {
        assert_eq!(merge_metadata(&Value::Null, &json!({"a": 1})), json!({"a": 1}));
        assert_eq!(merge_metadata(&json!({"a": 1}), &json!(5)), json!(5));
    }

    #[tokio::test]
    async fn test_sync_preserves_existing_keys() {
        let store = InMemoryStore::new();
        let list = PriceList {
            metadata: json!({"courier_id": "brt-1", "extra_step_per_100kg": "4.50"}),
            ..Default::default()
        };
        let id = list.id;
        store.insert_price_list(list);
        let sync = PriceListSync::new(Arc::new(store));

        let updated = sync
            .sync_metadata(id, json!({"source_version": 7}))
            .await
            .unwrap();

        assert_eq!(updated.metadata["courier_id"], "brt-1");
        assert_eq!(updated.metadata["extra_step_per_100kg"], "4.50");
        assert_eq!(updated.metadata["source_version"], 7);
        assert!(updated.metadata[LAST_SYNCED_AT_KEY].is_string());
    }

    #[tokio::test]
    async fn test_sync_rejects_non_object_patch() {
        let store = InMemoryStore::new();
        let list = PriceList::default();
        let id = list.id;
        store.insert_price_list(list);
        let sync = PriceListSync::new(Arc::new(store));

        let err = sync.sync_metadata(id, json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = sync
            .sync_metadata(Uuid::new_v4(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PriceListNotFound(_)));
    }

    #[tokio::test]
    async fn test_activation_requires_entries() {
        let store = InMemoryStore::new();
        let list = PriceList::default();
        let id = list.id;
        store.insert_price_list(list);
        let sync = PriceListSync::new(Arc::new(store.clone()));

        let err = sync
            .transition_status(id, PriceListStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));

        store.insert_entries(vec![PriceListEntry {
            price_list_id: id,
            ..Default::default()
        }]);
        let updated = sync
            .transition_status(id, PriceListStatus::Active)
            .await
            .unwrap();
        assert_eq!(updated.status, PriceListStatus::Active);
    }

    #[tokio::test]
    async fn test_archived_lists_stay_archived() {
        let store = InMemoryStore::new();
        let list = PriceList::default();
        let id = list.id;
        store.insert_price_list(list);
        let sync = PriceListSync::new(Arc::new(store));

        sync.transition_status(id, PriceListStatus::Archived)
            .await
            .unwrap();
        for to in [PriceListStatus::Draft, PriceListStatus::Active, PriceListStatus::Archived] {
            let err = sync.transition_status(id, to).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)));
        }
    }
}
