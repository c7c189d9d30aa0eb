//! Gateway and composer tests against a Cloud Storage compatible emulator.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use slicefold_compose::{Composer, SliceOrder, prepare_slices};
    use slicefold_core::{ComposeConfig, ObjectRef};
    use slicefold_storage::{StorageError, StorageGateway};

    use crate::{
        create_test_bucket, download, folded_body, gcs_gateway, object, slice_body, upload,
    };

    async fn seed(bucket: &str, prefix: &str, count: usize) {
        for i in 0..count {
            upload(&object(bucket, &format!("{prefix}{i:05}")), slice_body(i)).await;
        }
    }

    #[tokio::test]
    #[ignore = "requires storage emulator"]
    async fn test_should_create_and_list_objects() {
        let gateway = gcs_gateway();
        let bucket = create_test_bucket("list").await;
        seed(&bucket, "slices/", 3).await;
        upload(&object(&bucket, "other/x"), Bytes::from("x")).await;

        let empty = gateway
            .create_empty(&object(&bucket, "slices/empty"))
            .await
            .unwrap_or_else(|e| panic!("create_empty: {e}"));
        assert_eq!(empty.size, 0);

        let listed = gateway
            .list(&object(&bucket, "slices/"))
            .await
            .unwrap_or_else(|e| panic!("list: {e}"));
        let names: Vec<&str> = listed.iter().map(ObjectRef::name).collect();
        assert_eq!(
            names,
            vec!["slices/00000", "slices/00001", "slices/00002", "slices/empty"]
        );
    }

    #[tokio::test]
    #[ignore = "requires storage emulator"]
    async fn test_should_compose_with_target_as_first_input() {
        let gateway = gcs_gateway();
        let bucket = create_test_bucket("compose").await;
        seed(&bucket, "s/", 2).await;
        let target = object(&bucket, "out");

        let accumulator = gateway
            .create_empty(&target)
            .await
            .unwrap_or_else(|e| panic!("create_empty: {e}"));
        let slices = gateway
            .list(&object(&bucket, "s/"))
            .await
            .unwrap_or_else(|e| panic!("list: {e}"));
        let mut inputs = vec![accumulator];
        inputs.extend(slices);

        let composed = gateway
            .compose(&target, &inputs)
            .await
            .unwrap_or_else(|e| panic!("compose: {e}"));
        assert_eq!(composed.size, folded_body(2).len() as u64);
        assert_eq!(download(&target).await, folded_body(2));
    }

    #[tokio::test]
    #[ignore = "requires storage emulator"]
    async fn test_should_report_missing_object_on_delete() {
        let gateway = gcs_gateway();
        let bucket = create_test_bucket("delete").await;
        let path = object(&bucket, "gone");
        upload(&path, Bytes::from("x")).await;
        let slice = ObjectRef::new(path);

        gateway
            .delete(&slice)
            .await
            .unwrap_or_else(|e| panic!("delete: {e}"));
        let second = gateway.delete(&slice).await;
        assert!(matches!(second, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    #[ignore = "requires storage emulator"]
    async fn test_should_fold_prefix_end_to_end() {
        let gateway = Arc::new(gcs_gateway());
        let bucket = create_test_bucket("fold").await;
        seed(&bucket, "part-", 70).await;
        let destination = object(&bucket, "final");

        let listed = gateway
            .list(&object(&bucket, "part-"))
            .await
            .unwrap_or_else(|e| panic!("list: {e}"));
        let slices = prepare_slices(listed, &destination, SliceOrder::Lexicographic);
        assert_eq!(slices.len(), 70);

        let composer = Composer::new(gateway.clone(), ComposeConfig::default())
            .unwrap_or_else(|e| panic!("composer: {e}"));
        let report = composer
            .run(&destination, &slices)
            .await
            .unwrap_or_else(|e| panic!("run: {e}"));

        assert_eq!(report.chunks_composed, 3);
        assert!(report.cleanup.is_clean());
        assert_eq!(download(&destination).await, folded_body(70));
        let remaining = gateway
            .list(&object(&bucket, "part-"))
            .await
            .unwrap_or_else(|e| panic!("list: {e}"));
        assert!(remaining.is_empty());
    }
}
