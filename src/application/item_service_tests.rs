#[cfg(test)]
mod tests {
    use super::super::error::AppError;
    use super::super::item_service::{ItemService, ItemServiceImpl};
    use crate::domain::{
        item::{Completion, Item, ItemId, NewItem},
        repository::ItemRepository,
        user::UserId,
    };
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct InMemoryRepo {
        items: Arc<Mutex<BTreeMap<i64, Item>>>,
        writes: Arc<Mutex<usize>>,
    }

    impl InMemoryRepo {
        fn writes(&self) -> usize { *self.writes.lock().unwrap() }
    }

    #[async_trait]
    impl ItemRepository for InMemoryRepo {
        async fn create(&self, input: NewItem) -> Result<Item> {
            let mut map = self.items.lock().unwrap();
            let id = ItemId(map.keys().next_back().copied().unwrap_or(0) + 1);
            let item = Item {
                id,
                name: input.name,
                completion: Completion::Incomplete,
                user_id: input.owner,
                created_at: input.created_at,
                updated_at: input.created_at,
            };
            map.insert(id.0, item.clone());
            Ok(item)
        }
        async fn get(&self, id: ItemId) -> Result<Option<Item>> { Ok(self.items.lock().unwrap().get(&id.0).cloned()) }
        async fn list_for_user(&self, owner: UserId) -> Result<Vec<Item>> {
            let mut items: Vec<Item> = self.items.lock().unwrap().values().filter(|i| i.user_id == owner).cloned().collect();
            items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
            Ok(items)
        }
        async fn save(&self, item: &Item) -> Result<()> {
            *self.writes.lock().unwrap() += 1;
            self.items.lock().unwrap().insert(item.id.0, item.clone());
            Ok(())
        }
        async fn delete(&self, id: ItemId) -> Result<bool> {
            *self.writes.lock().unwrap() += 1;
            Ok(self.items.lock().unwrap().remove(&id.0).is_some())
        }
    }

    const ALICE: UserId = UserId(1);
    const BOB: UserId = UserId(2);

    #[tokio::test]
    async fn create_stamps_owner_from_session() {
        let service = ItemServiceImpl::new(InMemoryRepo::default());
        let created = service.create(ALICE, &json!({"item": {"name": "Buy milk", "user_id": 2}})).await.unwrap();
        assert_eq!(created.user_id, ALICE);
        assert_eq!(created.completion, Completion::Incomplete);
        assert_eq!(created.name.as_str(), "Buy milk");
    }

    #[tokio::test]
    async fn list_only_returns_own_items_newest_first() {
        let service = ItemServiceImpl::new(InMemoryRepo::default());
        let first = service.create(ALICE, &json!({"item": {"name": "one"}})).await.unwrap();
        service.create(BOB, &json!({"item": {"name": "bob's"}})).await.unwrap();
        let second = service.create(ALICE, &json!({"item": {"name": "two"}})).await.unwrap();

        let listed = service.list(ALICE).await.unwrap();
        assert_eq!(listed.iter().map(|i| i.id).collect::<Vec<_>>(), vec![second.id, first.id]);
        assert!(listed.iter().all(|i| i.user_id == ALICE));
    }

    #[tokio::test]
    async fn completion_round_trip_keeps_invariant() {
        let service = ItemServiceImpl::new(InMemoryRepo::default());
        let item = service.create(ALICE, &json!({"item": {"name": "X"}})).await.unwrap();

        let done = service.update(ALICE, item.id, &json!({"item": {"completed": true}})).await.unwrap();
        let at = done.completion.completed_at().unwrap();
        assert!(at >= item.created_at);
        assert_eq!(done.name.as_str(), "X");

        let reopened = service.update(ALICE, item.id, &json!({"item": {"completed": false}})).await.unwrap();
        assert_eq!(reopened.completion, Completion::Incomplete);
    }

    #[tokio::test]
    async fn foreign_item_is_forbidden_and_untouched() {
        let repo = InMemoryRepo::default();
        let service = ItemServiceImpl::new(repo.clone());
        let item = service.create(ALICE, &json!({"item": {"name": "mine"}})).await.unwrap();

        let err = service.update(BOB, item.id, &json!({"item": {"completed": true}})).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        let err = service.delete(BOB, item.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        assert_eq!(repo.writes(), 0);
        assert_eq!(service.list(ALICE).await.unwrap(), vec![item]);
    }

    #[tokio::test]
    async fn ownership_is_checked_before_body() {
        let service = ItemServiceImpl::new(InMemoryRepo::default());
        let item = service.create(ALICE, &json!({"item": {"name": "mine"}})).await.unwrap();
        let err = service.update(BOB, item.id, &json!({"item": {"completed": "nope"}})).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        let err = service.update(ALICE, item.id, &json!({"item": {"completed": "nope"}})).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_item_is_not_found() {
        let service = ItemServiceImpl::new(InMemoryRepo::default());
        assert!(matches!(service.delete(ALICE, ItemId(9999)).await, Err(AppError::NotFound)));
        assert!(matches!(service.update(ALICE, ItemId(9999), &json!({})).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn empty_update_does_not_write() {
        let repo = InMemoryRepo::default();
        let service = ItemServiceImpl::new(repo.clone());
        let item = service.create(ALICE, &json!({"item": {"name": "same"}})).await.unwrap();
        let unchanged = service.update(ALICE, item.id, &json!({"item": {}})).await.unwrap();
        assert_eq!(unchanged, item);
        assert_eq!(repo.writes(), 0);
    }
}
