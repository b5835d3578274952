use super::*;
use shared::domain::RawFileInput;

fn raw(name: &str, size_bytes: u64, mime_type: &str) -> RawFileInput {
    RawFileInput {
        name: name.to_string(),
        size_bytes,
        mime_type: mime_type.to_string(),
    }
}

fn engine_with_fixed(millis: u64) -> Arc<LifecycleEngine> {
    LifecycleEngine::new(Arc::new(FixedDurations(Duration::from_millis(millis))))
}

async fn advance(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

fn drain_events(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn intake_assigns_unique_ids_and_uploading_status() {
    let engine = engine_with_fixed(250);
    let ids = engine
        .intake(vec![
            raw("a.pdf", 10, "application/pdf"),
            raw("b.pdf", 20, "application/pdf"),
            raw("c.pdf", 30, "application/pdf"),
        ])
        .await;

    assert_eq!(ids.len(), 3);
    for (left, right) in [(0, 1), (0, 2), (1, 2)] {
        assert_ne!(ids[left], ids[right]);
    }

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.len(), 3);
    for record in &snapshot {
        assert_eq!(record.status, FileStatus::Uploading);
        assert_eq!(record.progress, 0);
    }
    // snapshot keeps input order
    assert_eq!(
        snapshot.iter().map(|r| r.id).collect::<Vec<_>>(),
        ids,
    );

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn intake_of_nothing_is_a_no_op() {
    let engine = engine_with_fixed(250);
    let ids = engine.intake(Vec::new()).await;
    assert!(ids.is_empty());
    assert!(engine.snapshot().await.is_empty());
    assert!(!engine.is_intake_in_flight().await);
}

#[tokio::test(start_paused = true)]
async fn upload_phase_completes_with_full_progress() {
    let engine = engine_with_fixed(250);
    let mut events = engine.subscribe();
    let ids = engine.intake(vec![raw("report.pdf", 1024, "application/pdf")]).await;

    advance(300).await;

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot[0].status, FileStatus::Uploaded);
    assert_eq!(snapshot[0].progress, 100);
    assert!(drain_events(&mut events).contains(&EngineEvent::StatusChanged {
        id: ids[0],
        status: FileStatus::Uploaded,
    }));

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn progress_ticks_are_monotonic_and_clamped() {
    let engine = engine_with_fixed(2450);
    let mut events = engine.subscribe();
    let ids = engine.intake(vec![raw("big.bin", 1 << 20, "application/octet-stream")]).await;

    advance(2500).await;

    let ticks: Vec<u8> = drain_events(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::ProgressTicked { id, progress } if id == ids[0] => Some(progress),
            _ => None,
        })
        .collect();

    assert!(!ticks.is_empty());
    for pair in ticks.windows(2) {
        assert!(pair[1] >= pair[0]);
    }
    assert!(ticks.iter().all(|&p| p <= 100));

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn begin_processing_requires_uploaded_status() {
    let engine = engine_with_fixed(250);
    let ids = engine.intake(vec![raw("doc.txt", 5, "text/plain")]).await;
    let id = ids[0];

    // still uploading
    assert_eq!(
        engine.begin_processing(id).await,
        Err(EngineError::InvalidTransition {
            id,
            status: FileStatus::Uploading,
        })
    );
    // failed attempt leaves the record untouched
    assert_eq!(engine.snapshot().await[0].status, FileStatus::Uploading);

    let unknown = FileId::new();
    assert_eq!(
        engine.begin_processing(unknown).await,
        Err(EngineError::NotFound { id: unknown })
    );

    advance(300).await;
    assert_eq!(engine.begin_processing(id).await, Ok(()));
    {
        let snapshot = engine.snapshot().await;
        let record = &snapshot[0];
        assert_eq!(record.status, FileStatus::Processing);
        assert_eq!(record.progress, 0);
    }

    // already processing
    assert_eq!(
        engine.begin_processing(id).await,
        Err(EngineError::InvalidTransition {
            id,
            status: FileStatus::Processing,
        })
    );

    advance(300).await;
    assert_eq!(
        engine.begin_processing(id).await,
        Err(EngineError::InvalidTransition {
            id,
            status: FileStatus::Processed,
        })
    );

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn delete_rejects_records_mid_phase() {
    let engine = engine_with_fixed(250);
    let ids = engine.intake(vec![raw("doc.txt", 5, "text/plain")]).await;
    let id = ids[0];

    assert_eq!(
        engine.delete(id).await,
        Err(EngineError::RecordBusy {
            id,
            status: FileStatus::Uploading,
        })
    );

    advance(300).await;
    engine.begin_processing(id).await.unwrap();
    assert_eq!(
        engine.delete(id).await,
        Err(EngineError::RecordBusy {
            id,
            status: FileStatus::Processing,
        })
    );

    advance(300).await;
    assert_eq!(engine.delete(id).await, Ok(()));
    assert!(engine.snapshot().await.is_empty());
    assert_eq!(engine.delete(id).await, Err(EngineError::NotFound { id }));

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn ready_to_exit_flips_on_first_processed_record() {
    let engine = engine_with_fixed(250);
    let ids = engine
        .intake(vec![
            raw("a.pdf", 10, "application/pdf"),
            raw("b.pdf", 20, "application/pdf"),
        ])
        .await;

    assert!(!engine.is_ready_to_exit().await);
    advance(300).await;
    assert!(!engine.is_ready_to_exit().await);

    engine.begin_processing(ids[0]).await.unwrap();
    advance(300).await;
    assert!(engine.is_ready_to_exit().await);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn intake_gate_holds_for_the_settle_window() {
    let engine = engine_with_fixed(250);
    engine.intake(vec![raw("a.pdf", 10, "application/pdf")]).await;

    assert!(engine.is_intake_in_flight().await);
    advance(300).await;
    assert!(!engine.is_intake_in_flight().await);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn separate_intake_batches_do_not_interfere() {
    let engine = engine_with_fixed(250);
    let first = engine.intake(vec![raw("a.pdf", 10, "application/pdf")]).await;
    advance(100).await;
    let second = engine.intake(vec![raw("b.pdf", 20, "application/pdf")]).await;

    assert_ne!(first[0], second[0]);
    // first batch settled, second still open
    advance(200).await;
    assert!(engine.is_intake_in_flight().await);
    advance(100).await;
    assert!(!engine.is_intake_in_flight().await);

    let snapshot = engine.snapshot().await;
    assert!(snapshot.iter().all(|r| r.status == FileStatus::Uploaded));
    assert!(snapshot.iter().all(|r| r.progress == 100));

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_every_outstanding_timer() {
    let engine = engine_with_fixed(250);
    engine.intake(vec![raw("a.pdf", 10, "application/pdf")]).await;

    engine.shutdown().await;
    advance(1000).await;

    // no timer survived to mutate the collection
    let snapshot = engine.snapshot().await;
    let record = &snapshot[0];
    assert_eq!(record.status, FileStatus::Uploading);
    assert_eq!(record.progress, 0);
    assert!(!engine.is_intake_in_flight().await);
}

#[tokio::test(start_paused = true)]
async fn end_to_end_single_file_lifecycle() {
    let engine = LifecycleEngine::new(Arc::new(FixedDurations(Duration::from_millis(2450))));
    let ids = engine.intake(vec![raw("report.pdf", 4096, "application/pdf")]).await;
    let id = ids[0];

    // mid-upload: ramping in +10 steps every 200ms
    advance(1050).await;
    {
        let snapshot = engine.snapshot().await;
        let record = &snapshot[0];
        assert_eq!(record.status, FileStatus::Uploading);
        assert_eq!(record.progress, 50);
    }

    advance(1500).await;
    {
        let snapshot = engine.snapshot().await;
        let record = &snapshot[0];
        assert_eq!(record.status, FileStatus::Uploaded);
        assert_eq!(record.progress, 100);
    }

    engine.begin_processing(id).await.unwrap();
    advance(1050).await;
    {
        let snapshot = engine.snapshot().await;
        let record = &snapshot[0];
        assert_eq!(record.status, FileStatus::Processing);
        assert_eq!(record.progress, 50);
    }

    advance(1500).await;
    {
        let snapshot = engine.snapshot().await;
        let record = &snapshot[0];
        assert_eq!(record.status, FileStatus::Processed);
        assert_eq!(record.progress, 100);
    }
    assert!(engine.is_ready_to_exit().await);

    engine.shutdown().await;
}
