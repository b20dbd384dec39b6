// SPDX-License-Identifier: MPL-2.0

//! Shared doubles and helpers for flow integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use media_selector::backends::camera::VirtualCamera;
use media_selector::backends::permission::StaticPermissions;
use media_selector::media::{MediaMetadata, MediaReference};
use media_selector::storage::{FileStorage, StorageBackend};
use media_selector::{
    Collaborators, Config, FlowHandle, FlowUpdate, MediaError, MediaResult, launch,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

/// File storage that records deletes and can be told to fail them
#[derive(Default)]
pub struct TrackingStorage {
    inner: FileStorage,
    fail_deletes: bool,
    deleted: Mutex<Vec<MediaReference>>,
}

impl TrackingStorage {
    pub fn failing() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    pub fn deleted(&self) -> Vec<MediaReference> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageBackend for TrackingStorage {
    async fn delete(&self, reference: &MediaReference) -> MediaResult<()> {
        self.deleted.lock().unwrap().push(reference.clone());
        if self.fail_deletes {
            return Err(MediaError::StorageDeleteFailed("storage is read-only".into()));
        }
        self.inner.delete(reference).await
    }

    async fn query_metadata(&self, reference: &MediaReference) -> MediaResult<MediaMetadata> {
        self.inner.query_metadata(reference).await
    }
}

/// Collaborators and a temp media directory for one flow
pub struct Harness {
    pub camera: Arc<VirtualCamera>,
    pub permissions: Arc<StaticPermissions>,
    pub storage: Arc<TrackingStorage>,
    pub config: Config,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(permissions: StaticPermissions) -> Self {
        Self::with_parts(VirtualCamera::new(), permissions, TrackingStorage::default())
    }

    pub fn with_parts(
        camera: VirtualCamera,
        permissions: StaticPermissions,
        storage: TrackingStorage,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            long_press_ms: 30,
            progress_interval_ms: 10,
            capture_cutoff_ms: 5_000,
            media_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        Self {
            camera: Arc::new(camera),
            permissions: Arc::new(permissions),
            storage: Arc::new(storage),
            config,
            dir,
        }
    }

    pub fn launch(&self) -> FlowHandle {
        launch(
            &self.config,
            Collaborators {
                camera: self.camera.clone(),
                permissions: self.permissions.clone(),
                storage: self.storage.clone(),
            },
        )
        .unwrap()
    }
}

/// Wait for a matching update, failing the test on timeout or flow end
pub async fn expect<F>(handle: &mut FlowHandle, matches: F) -> FlowUpdate
where
    F: FnMut(&FlowUpdate) -> bool,
{
    tokio::time::timeout(WAIT, handle.wait_for(matches))
        .await
        .expect("timed out waiting for flow update")
        .expect("flow ended before the expected update")
}

pub async fn camera_ready(handle: &mut FlowHandle) {
    expect(handle, |u| matches!(u, FlowUpdate::CameraReady { .. })).await;
}

pub async fn review_ready(handle: &mut FlowHandle) -> MediaReference {
    match expect(handle, |u| {
        matches!(u, FlowUpdate::ReviewReady(_) | FlowUpdate::CaptureError(_))
    })
    .await
    {
        FlowUpdate::ReviewReady(reference) => reference,
        other => panic!("capture failed: {:?}", other),
    }
}

/// Poll until `check` yields a value, failing the test on timeout
pub async fn eventually<T, F>(mut check: F) -> T
where
    F: FnMut() -> Option<T>,
{
    tokio::time::timeout(WAIT, async {
        loop {
            if let Some(value) = check() {
                return value;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for condition")
}
