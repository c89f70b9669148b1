// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cooperative progress reporting and cancellation.
//!
//! Long-running stages publish progress at percentage granularity through a
//! caller-supplied callback. The callback runs on the pipeline's thread; its
//! return value requests cancellation, which takes effect at the next
//! suspension point (end of a RANSAC round, after each LOD level, after each
//! chunk load). Partially produced outputs are discarded on cancellation.

use crate::error::{Error, Result};

/// What the pipeline should do after a progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Cancel,
}

/// One progress report.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent<'a> {
    /// Short phase name, e.g. `"ransac"` or `"lod"`.
    pub phase: &'a str,
    /// Completion in percent, 0..=100.
    pub percent: u32,
}

/// A borrowed progress sink. `Progress::none()` reports nowhere and never
/// cancels.
pub struct Progress<'a> {
    callback: Option<&'a mut dyn FnMut(ProgressEvent) -> Flow>,
}

impl<'a> Progress<'a> {
    pub fn new(callback: &'a mut dyn FnMut(ProgressEvent) -> Flow) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    pub fn none() -> Self {
        Self { callback: None }
    }

    /// Reports progress and converts a cancellation request into
    /// [`Error::Cancelled`] so the stage can bail with `?`.
    pub fn report(&mut self, phase: &str, percent: u32) -> Result<()> {
        if let Some(cb) = self.callback.as_mut() {
            let event = ProgressEvent {
                phase,
                percent: percent.min(100),
            };
            if cb(event) == Flow::Cancel {
                return Err(Error::Cancelled);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Progress<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("attached", &self.callback.is_some())
            .finish()
    }
}
