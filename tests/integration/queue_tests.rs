/*!
 * Queue selection, run statistics and progress reporting
 */

use chrono::{Duration, Utc};

use autotranslate::database::WorkItemStore;
use autotranslate::database::models::{NewWorkItem, Priority};
use autotranslate::errors::RunnerError;
use autotranslate::batch::QUEUE_LOCK_NAME;

use crate::common::{GERMAN, TestEnv, due_item, minutes_ago};

/// Only due, enabled, error-free items that were not completed since their schedule are picked
#[tokio::test]
async fn test_findPending_shouldOnlyReturnEligibleItems() {
    let env = TestEnv::new();
    let now = Utc::now();
    let due = env.enqueue(due_item(10, GERMAN)).await;
    let future = env.enqueue(NewWorkItem::new(11, GERMAN, now + Duration::hours(1))).await;
    let errored = env.enqueue(due_item(12, GERMAN)).await;
    let completed = env.enqueue(NewWorkItem::new(13, GERMAN, minutes_ago(30))).await;
    let rescheduled = env.enqueue(NewWorkItem::new(14, GERMAN, minutes_ago(30))).await;

    let mut item = env.repository.get_work_item(errored).await.unwrap().unwrap();
    item.last_error = "boom".to_string();
    env.repository.save(&item).await.unwrap();

    let mut item = env.repository.get_work_item(completed).await.unwrap().unwrap();
    item.completed_at = Some(minutes_ago(10));
    env.repository.save(&item).await.unwrap();

    let mut item = env.repository.get_work_item(rescheduled).await.unwrap().unwrap();
    item.completed_at = Some(minutes_ago(20));
    item.scheduled_at = minutes_ago(5);
    env.repository.save(&item).await.unwrap();

    let pending: Vec<i64> = env
        .repository
        .find_pending(10, now)
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();

    assert!(pending.contains(&due));
    assert!(pending.contains(&rescheduled));
    assert!(!pending.contains(&future));
    assert!(!pending.contains(&errored));
    assert!(!pending.contains(&completed));
    assert_eq!(env.repository.count_pending(now).await.unwrap(), 2);
}

/// Disabled items are never returned and never written
#[tokio::test]
async fn test_disabledItems_shouldNeverBeReturnedOrSaved() {
    let env = TestEnv::new();
    let id = env.enqueue(due_item(10, GERMAN)).await;
    let mut item = env.repository.get_work_item(id).await.unwrap().unwrap();
    env.repository.set_disabled(id, true).await.unwrap();

    assert!(env.repository.find_pending(10, Utc::now()).await.unwrap().is_empty());

    item.last_error = "written by a stale run".to_string();
    env.repository.save(&item).await.unwrap();
    let stored = env.repository.get_work_item(id).await.unwrap().unwrap();
    assert!(stored.disabled);
    assert!(stored.last_error.is_empty());
    assert_eq!(env.repository.count_total().await.unwrap(), 0);
}

/// Two HIGH items and one LOW item with limit two: the HIGH ones win
#[tokio::test]
async fn test_findPending_withMixedPriorities_shouldPreferHighOldestFirst() {
    let env = TestEnv::new();
    let high_new = env
        .enqueue(NewWorkItem::new(10, GERMAN, minutes_ago(5)).with_priority(Priority::High))
        .await;
    let low_old = env
        .enqueue(NewWorkItem::new(11, GERMAN, minutes_ago(60)).with_priority(Priority::Low))
        .await;
    let high_old = env
        .enqueue(NewWorkItem::new(12, GERMAN, minutes_ago(30)).with_priority(Priority::High))
        .await;

    let picked: Vec<i64> = env
        .repository
        .find_pending(2, Utc::now())
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();

    assert_eq!(picked, vec![high_old, high_new]);
    assert!(!picked.contains(&low_old));
}

/// An empty queue still records a zero snapshot and reports full progress
#[tokio::test]
async fn test_emptyQueue_shouldStoreZeroSnapshotAndFullProgress() {
    let env = TestEnv::new();
    let scheduler = env.scheduler(10);

    let stats = scheduler.execute().await.unwrap();

    assert_eq!((stats.processed, stats.succeeded, stats.failed, stats.remaining), (0, 0, 0, 0));
    assert_eq!(env.repository.last_run_statistics().await.unwrap(), Some(stats));
    assert_eq!(scheduler.progress_percent().await.unwrap(), 100.0);
    assert_eq!(env.translator.call_count(), 0);
}

#[tokio::test]
async fn test_runStatistics_shouldCountRemainingItems() {
    let env = TestEnv::new();
    env.add_page(1, 0, "Home").await;
    for _ in 0..3 {
        env.enqueue(due_item(1, GERMAN)).await;
    }

    let stats = env.scheduler(2).execute().await.unwrap();

    assert_eq!((stats.processed, stats.succeeded, stats.failed, stats.remaining), (2, 2, 0, 1));
    let progress = env.scheduler(2).progress_percent().await.unwrap();
    assert_eq!(progress, 66.67);
}

#[tokio::test]
async fn test_statusText_shouldDescribeQueueAndLastRun() {
    let env = TestEnv::new();
    let scheduler = env.scheduler(5);

    let before = scheduler.status_text().await.unwrap();
    assert!(before.contains("No run recorded yet"));

    scheduler.execute().await.unwrap();
    let after = scheduler.status_text().await.unwrap();
    assert!(after.contains("0 total"));
    assert!(after.contains("Last run 0 minute(s) ago"));
}

/// A second runner backs off while the queue lock is held
#[tokio::test]
async fn test_execute_withForeignLock_shouldReportAlreadyRunning() {
    let env = TestEnv::new();
    env.repository
        .try_acquire_lock(QUEUE_LOCK_NAME, "other-host", Duration::minutes(10))
        .await
        .unwrap();

    let result = env.scheduler(5).execute().await;

    assert!(matches!(result, Err(RunnerError::AlreadyRunning(_))));
    assert!(env.repository.last_run_statistics().await.unwrap().is_none());
}
