//! End-to-end compositions against the in-memory gateway.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use slicefold_compose::{
        CleanupDispatcher, ComposeError, Composer, SliceOrder, prepare_slices,
    };
    use slicefold_core::ComposeConfig;
    use slicefold_storage::{GatewayCall, InMemoryGateway, StorageGateway};
    use tokio_util::sync::CancellationToken;

    use crate::{folded_body, memory_gateway, object, seed_memory, slice_body};

    #[tokio::test(start_paused = true)]
    async fn test_should_fold_thousand_slices_into_one_object() {
        let gateway = memory_gateway();
        let slices = seed_memory(&gateway, "lake", "export/part-", 1_000);
        let destination = object("lake", "export/final");
        let composer = Composer::new(gateway.clone(), ComposeConfig::default())
            .unwrap_or_else(|e| panic!("composer: {e}"));

        let report = composer
            .run(&destination, &slices)
            .await
            .unwrap_or_else(|e| panic!("run: {e}"));

        assert_eq!(report.chunks_composed, 33);
        assert_eq!(gateway.compose_calls().len(), 33);
        assert_eq!(report.cleanup.deleted, 1_000);
        assert!(report.cleanup.is_clean());
        assert_eq!(gateway.read(&destination).ok(), Some(folded_body(1_000)));
        assert_eq!(gateway.len(), 1);
        assert_eq!(report.accumulator.component_count, Some(1_001));
        assert!(report.elapsed >= Duration::from_secs(33));
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_fold_listing_in_natural_order() {
        let gateway = memory_gateway();
        for i in (0..40).rev() {
            gateway.put_object(&object("lake", &format!("out/part-{i}")), slice_body(i));
        }
        let destination = object("lake", "out/final");
        let listed = gateway
            .list(&object("lake", "out/part-"))
            .await
            .unwrap_or_else(|e| panic!("list: {e}"));
        let slices = prepare_slices(listed, &destination, SliceOrder::Natural);

        let composer = Composer::new(gateway.clone(), ComposeConfig::default())
            .unwrap_or_else(|e| panic!("composer: {e}"));
        composer
            .run(&destination, &slices)
            .await
            .unwrap_or_else(|e| panic!("run: {e}"));

        assert_eq!(gateway.read(&destination).ok(), Some(folded_body(40)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_ignore_previous_result_when_rerun() {
        let gateway = memory_gateway();
        let destination = object("lake", "out/final");
        gateway.put_object(&destination, Bytes::from("previous run"));
        seed_memory(&gateway, "lake", "out/", 5);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let listed = gateway
            .list(&object("lake", "out/"))
            .await
            .unwrap_or_else(|e| panic!("list: {e}"));
        assert_eq!(listed.len(), 6);
        let slices = prepare_slices(listed, &destination, SliceOrder::Lexicographic);
        assert_eq!(slices.len(), 5);

        let composer = Composer::new(gateway.clone(), ComposeConfig::default())
            .unwrap_or_else(|e| panic!("composer: {e}"));
        composer
            .run(&destination, &slices)
            .await
            .unwrap_or_else(|e| panic!("run: {e}"));

        assert_eq!(gateway.read(&destination).ok(), Some(folded_body(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_finish_failed_run_with_resume() {
        let gateway = memory_gateway();
        let slices = seed_memory(&gateway, "lake", "s/", 150);
        let destination = object("lake", "final");
        let config = ComposeConfig::default();
        let composer =
            Composer::new(gateway.clone(), config.clone()).unwrap_or_else(|e| panic!("{e}"));
        let cleanup = CleanupDispatcher::from_config(gateway.clone(), &config);
        gateway.fail_compose_call(4);

        let err = composer
            .compose_all(&destination, &slices, Some(&cleanup))
            .await
            .err()
            .unwrap_or_else(|| panic!("fourth compose call should fail"));
        assert!(matches!(err, ComposeError::ComposeFailed { chunk_index: 3, .. }));
        let folded = err.slices_folded();
        assert_eq!(folded, 93);
        assert_eq!(gateway.read(&destination).ok(), Some(folded_body(93)));
        let accumulator = err
            .accumulator()
            .cloned()
            .unwrap_or_else(|| panic!("missing accumulator"));

        composer
            .resume(accumulator, &slices[folded..], Some(&cleanup))
            .await
            .unwrap_or_else(|e| panic!("resume: {e}"));
        let report = cleanup.join().await;

        assert_eq!(report.deleted, 150);
        assert_eq!(gateway.read(&destination).ok(), Some(folded_body(150)));
        assert_eq!(gateway.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_report_undeletable_slices_without_failing() {
        let gateway = memory_gateway();
        let slices = seed_memory(&gateway, "lake", "s/", 50);
        gateway.fail_deletes_of(&slices[7].path);
        gateway.fail_deletes_of(&slices[42].path);
        let destination = object("lake", "final");

        let composer = Composer::new(gateway.clone(), ComposeConfig::default())
            .unwrap_or_else(|e| panic!("composer: {e}"));
        let report = composer
            .run(&destination, &slices)
            .await
            .unwrap_or_else(|e| panic!("run: {e}"));

        assert_eq!(report.cleanup.deleted, 48);
        let failed: Vec<_> = report.cleanup.failures.iter().map(|f| f.path.clone()).collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.contains(&slices[7].path));
        assert!(failed.contains(&slices[42].path));
        assert_eq!(gateway.read(&destination).ok(), Some(folded_body(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_never_mutate_accumulator_faster_than_interval() {
        let gateway = memory_gateway();
        let slices = seed_memory(&gateway, "lake", "s/", 200);
        let destination = object("lake", "final");
        let composer = Composer::new(gateway.clone(), ComposeConfig::default())
            .unwrap_or_else(|e| panic!("composer: {e}"));

        composer
            .run(&destination, &slices)
            .await
            .unwrap_or_else(|e| panic!("run: {e}"));

        let writes: Vec<_> = gateway
            .calls()
            .into_iter()
            .filter(|call| match call {
                GatewayCall::CreateEmpty { path, .. } => *path == destination,
                GatewayCall::Compose { target, .. } => *target == destination,
                _ => false,
            })
            .map(|call| call.at())
            .collect();
        assert_eq!(writes.len(), 1 + 7);
        for pair in writes.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_stop_on_cancellation_and_keep_partial_result() {
        let gateway = memory_gateway();
        let slices = seed_memory(&gateway, "lake", "s/", 100);
        let destination = object("lake", "final");
        let token = CancellationToken::new();
        let composer = Composer::new(gateway.clone(), ComposeConfig::default())
            .unwrap_or_else(|e| panic!("composer: {e}"))
            .with_cancellation(token.clone());

        let (result, ()) = tokio::join!(composer.run(&destination, &slices), async {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            token.cancel();
        });

        let err = result.err().unwrap_or_else(|| panic!("run should be cancelled"));
        assert_eq!(err.slices_folded(), 62);
        assert_eq!(gateway.read(&destination).ok(), Some(folded_body(62)));
        assert!(slices[..62].iter().all(|s| !gateway.exists(&s.path)));
        assert!(slices[62..].iter().all(|s| gateway.exists(&s.path)));
    }

    #[tokio::test]
    async fn test_should_share_gateway_across_tasks() {
        crate::init_tracing();
        let gateway = Arc::new(InMemoryGateway::new());
        let config = ComposeConfig::builder().min_mutation_interval_ms(0).build();
        let mut handles = Vec::new();
        for run in 0..4 {
            let slices = seed_memory(&gateway, "lake", &format!("run-{run}/"), 40);
            let destination = object("lake", &format!("final-{run}"));
            let composer = Composer::new(gateway.clone(), config.clone())
                .unwrap_or_else(|e| panic!("composer: {e}"));
            handles.push(tokio::spawn(async move {
                composer.run(&destination, &slices).await
            }));
        }
        for handle in handles {
            let report = handle
                .await
                .unwrap_or_else(|e| panic!("join: {e}"))
                .unwrap_or_else(|e| panic!("run: {e}"));
            assert_eq!(report.slices_folded, 40);
        }
        assert_eq!(gateway.len(), 4);
    }
}
