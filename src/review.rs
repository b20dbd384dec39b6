// SPDX-License-Identifier: GPL-3.0-only

//! Review of a captured photo or video
//!
//! A presented reference is settled exactly once: either confirmed (handed to
//! the caller) or discarded (deleted in the background). After that it can no
//! longer be reviewed.

use crate::errors::{MediaError, MediaResult};
use crate::flow::FlowResult;
use crate::media::{MediaMetadata, MediaReference};
use crate::storage::StorageBackend;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Confirm / discard for one captured reference at a time
pub struct ReviewController {
    storage: Arc<dyn StorageBackend>,
    presented: Option<MediaReference>,
}

impl std::fmt::Debug for ReviewController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewController")
            .field("presented", &self.presented)
            .finish()
    }
}

impl ReviewController {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            presented: None,
        }
    }

    /// Reference currently under review
    pub fn presented(&self) -> Option<&MediaReference> {
        self.presented.as_ref()
    }

    pub fn present(&mut self, reference: MediaReference) -> MediaResult<()> {
        if let Some(current) = &self.presented {
            return Err(MediaError::invalid(
                format!("reviewing {}", current),
                "present",
            ));
        }
        info!(reference = %reference, "Presenting capture for review");
        self.presented = Some(reference);
        Ok(())
    }

    /// Hand the reference to the caller
    pub fn confirm(&mut self) -> MediaResult<FlowResult> {
        let reference = self
            .presented
            .take()
            .ok_or_else(|| MediaError::invalid("nothing presented", "confirm"))?;
        info!(reference = %reference, "Capture confirmed");
        Ok(FlowResult::Confirmed(reference))
    }

    /// Give up the reference and delete it in the background
    ///
    /// The returned task resolves to the delete outcome; a failure is logged
    /// and reported, but the reference is gone from review either way.
    pub fn discard(&mut self) -> MediaResult<(MediaReference, JoinHandle<MediaResult<()>>)> {
        let reference = self
            .presented
            .take()
            .ok_or_else(|| MediaError::invalid("nothing presented", "discard"))?;
        info!(reference = %reference, "Capture discarded");

        let storage = Arc::clone(&self.storage);
        let target = reference.clone();
        let task = tokio::spawn(async move {
            let result = storage.delete(&target).await;
            if let Err(e) = &result {
                warn!(reference = %target, error = %e, "Failed to delete discarded capture");
            }
            result
        });
        Ok((reference, task))
    }

    /// Metadata query for the presented reference, to run off the event loop
    pub fn metadata(&self) -> MediaResult<BoxFuture<'static, MediaResult<MediaMetadata>>> {
        let reference = self
            .presented
            .clone()
            .ok_or_else(|| MediaError::invalid("nothing presented", "query metadata"))?;
        let storage = Arc::clone(&self.storage);
        Ok(Box::pin(async move {
            storage.query_metadata(&reference).await
        }))
    }
}
