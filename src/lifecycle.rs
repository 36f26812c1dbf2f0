//! Backend-independent bookkeeping for a trail accumulator.
//!
//! [`TrailCore`] owns the parameters, the last known viewport and the
//! lifecycle state. The GPU and CPU accumulators wrap it and only add their
//! buffers.

use glam::UVec2;
use log::info;

use crate::error::{TrailError, TrailResult};
use crate::options::{StateChange, TrailOptions, TrailState, TrailUpdate};

/// Where an accumulator is in its life.
///
/// ```text
/// Uninitialized --initialize--> Initialized --step--> Active --dispose--> Disposed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, buffers not yet sized.
    Uninitialized,
    /// Buffers sized and cleared, no frame stepped yet.
    Initialized,
    /// At least one frame has been stepped.
    Active,
    /// Resources released. Terminal.
    Disposed,
}

impl Lifecycle {
    /// True in `Initialized` and `Active`.
    pub fn is_live(self) -> bool {
        matches!(self, Lifecycle::Initialized | Lifecycle::Active)
    }
}

/// Parameters, viewport and lifecycle shared by every accumulator backend.
#[derive(Debug, Clone)]
pub struct TrailCore {
    state: TrailState,
    viewport: Option<UVec2>,
    lifecycle: Lifecycle,
}

impl TrailCore {
    pub fn new(options: &TrailOptions) -> Self {
        Self {
            state: TrailState::from_options(options),
            viewport: None,
            lifecycle: Lifecycle::Uninitialized,
        }
    }

    pub fn state(&self) -> &TrailState {
        &self.state
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Last viewport passed to `initialize` or `set_size`.
    pub fn viewport(&self) -> Option<UVec2> {
        self.viewport
    }

    /// Size the buffers should have right now, if a viewport is known.
    pub fn target_extent(&self) -> Option<UVec2> {
        self.viewport.map(|viewport| self.state.extent_for(viewport))
    }

    /// Fails unless the accumulator is `Initialized` or `Active`.
    pub fn require_live(&self) -> TrailResult<()> {
        match self.lifecycle {
            Lifecycle::Initialized | Lifecycle::Active => Ok(()),
            Lifecycle::Uninitialized => Err(TrailError::NotInitialized),
            Lifecycle::Disposed => Err(TrailError::Disposed),
        }
    }

    /// Sizes buffers for `viewport` through `allocate`, then records it.
    ///
    /// Allowed from `Uninitialized`, `Initialized` and `Active`. Nothing is
    /// recorded if `allocate` fails.
    pub fn initialize(
        &mut self,
        viewport: UVec2,
        allocate: impl FnOnce(UVec2) -> TrailResult<()>,
    ) -> TrailResult<()> {
        if self.lifecycle == Lifecycle::Disposed {
            return Err(TrailError::Disposed);
        }
        allocate(self.state.extent_for(viewport))?;
        self.viewport = Some(viewport);
        if self.lifecycle == Lifecycle::Uninitialized {
            info!("trail effect initialized");
            self.lifecycle = Lifecycle::Initialized;
        }
        Ok(())
    }

    /// Resizes buffers for a new viewport, recording it once `allocate` succeeds.
    pub fn resize(
        &mut self,
        viewport: UVec2,
        allocate: impl FnOnce(UVec2) -> TrailResult<()>,
    ) -> TrailResult<()> {
        self.require_live()?;
        allocate(self.state.extent_for(viewport))?;
        self.viewport = Some(viewport);
        Ok(())
    }

    /// Applies a partial update.
    ///
    /// When the resolution scale changes on a live accumulator, `allocate`
    /// receives the new extent and the update is kept only if it succeeds.
    /// Before `initialize` the values are just stored.
    pub fn update(
        &mut self,
        update: &TrailUpdate,
        allocate: impl FnOnce(UVec2) -> TrailResult<()>,
    ) -> TrailResult<()> {
        if self.lifecycle == Lifecycle::Disposed {
            return Err(TrailError::Disposed);
        }
        let mut next = self.state;
        let StateChange {
            resolution_changed, ..
        } = next.apply(update);
        if resolution_changed
            && self.lifecycle.is_live()
            && let Some(viewport) = self.viewport
        {
            allocate(next.extent_for(viewport))?;
        }
        self.state = next;
        Ok(())
    }

    /// Validates a step and moves to `Active`.
    pub fn begin_step(&mut self) -> TrailResult<()> {
        self.require_live()?;
        self.lifecycle = Lifecycle::Active;
        Ok(())
    }

    /// Moves to `Disposed`. Returns false if already disposed.
    pub fn dispose(&mut self) -> bool {
        if self.lifecycle == Lifecycle::Disposed {
            return false;
        }
        info!("trail effect disposed");
        self.lifecycle = Lifecycle::Disposed;
        true
    }
}
