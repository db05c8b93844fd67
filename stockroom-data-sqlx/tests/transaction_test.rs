mod common;

use common::*;
use stockroom_data::prelude::*;
use stockroom_data_sqlx::{with_transaction, Tx};

#[tokio::test]
async fn test_error_rolls_back_every_write() {
    let repo = items().await;
    let scoped = repo.clone();

    let result: Result<(), DataError> = repo
        .with_transaction(move |tx| {
            Box::pin(async move {
                scoped.create_in(tx.as_mut(), new_item("A", "a", 1)).await?;
                scoped.create_in(tx.as_mut(), new_item("B", "b", 2)).await?;
                Err(DataError::Other("abort".into()))
            })
        })
        .await;

    assert!(matches!(result, Err(DataError::Other(_))));
    assert_eq!(repo.count(&ListQuery::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_ok_commits() {
    let repo = items().await;
    let scoped = repo.clone();

    let created = repo
        .with_transaction(move |tx| {
            Box::pin(async move {
                let a = scoped.create_in(tx.as_mut(), new_item("A", "a", 1)).await?;
                let b = scoped.create_in(tx.as_mut(), new_item("B", "b", 2)).await?;
                Ok::<_, DataError>(vec![a, b])
            })
        })
        .await
        .unwrap();

    assert_eq!(created.len(), 2);
    assert_eq!(repo.count(&ListQuery::new()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_constraint_violation_inside_rolls_back_earlier_writes() {
    let repo = items().await;
    let scoped = repo.clone();

    let err = repo
        .with_transaction(move |tx| {
            Box::pin(async move {
                scoped.create_in(tx.as_mut(), new_item("A", "a", 1)).await?;
                scoped.create_in(tx.as_mut(), new_item("A", "dup", 2)).await?;
                Ok::<_, DataError>(())
            })
        })
        .await
        .unwrap_err();

    assert!(err.is_unique_violation());
    assert_eq!(repo.count(&ListQuery::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_reads_inside_see_uncommitted_writes() {
    let repo = items().await;
    let scoped = repo.clone();

    let seen = with_transaction(repo.pool(), move |tx| {
        Box::pin(async move {
            let item = scoped.create_in(tx.as_mut(), new_item("A", "a", 1)).await?;
            let patch = ItemPatch {
                amount: Some(9),
                ..Default::default()
            };
            scoped.update_in(tx.as_mut(), &item.id, patch).await?;
            let page = scoped.list_in(tx.as_mut(), &ListQuery::new()).await?;
            Ok::<_, DataError>(page.data)
        })
    })
    .await
    .unwrap();

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].amount, 9);
    let stored = repo.find_by_id(&seen[0].id).await.unwrap().unwrap();
    assert_eq!(stored.amount, 9);
}

#[tokio::test]
async fn test_manual_tx_rollback_and_drop() {
    let repo = items().await;

    let mut tx = Tx::begin(repo.pool()).await.unwrap();
    repo.create_in(tx.as_mut(), new_item("A", "a", 1)).await.unwrap();
    assert!(repo.exists_in(tx.as_mut(), &1).await.unwrap());
    tx.rollback().await.unwrap();
    assert_eq!(repo.count(&ListQuery::new()).await.unwrap(), 0);

    let mut tx = Tx::begin(repo.pool()).await.unwrap();
    repo.create_in(tx.as_mut(), new_item("B", "b", 1)).await.unwrap();
    drop(tx);
    assert_eq!(repo.count(&ListQuery::new()).await.unwrap(), 0);

    let mut tx = Tx::begin(repo.pool()).await.unwrap();
    repo.create_many_in(tx.as_mut(), vec![new_item("C", "c", 1), new_item("D", "d", 2)])
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(repo.count(&ListQuery::new()).await.unwrap(), 2);
}

#[allow(dead_code)]
#[derive(Debug)]
enum ServiceError {
    Data(DataError),
    OutOfStock,
}

impl From<DataError> for ServiceError {
    fn from(err: DataError) -> Self {
        ServiceError::Data(err)
    }
}

#[tokio::test]
async fn test_caller_error_type() {
    let repo = items().await;
    let scoped = repo.clone();

    let result: Result<(), ServiceError> = repo
        .with_transaction(move |tx| {
            Box::pin(async move {
                let item = scoped.create_in(tx.as_mut(), new_item("A", "a", 0)).await?;
                if item.amount == 0 {
                    return Err(ServiceError::OutOfStock);
                }
                Ok(())
            })
        })
        .await;

    assert!(matches!(result, Err(ServiceError::OutOfStock)));
    assert_eq!(repo.count(&ListQuery::new()).await.unwrap(), 0);
}
