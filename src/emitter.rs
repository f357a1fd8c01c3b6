//! Downstream sink of merged frames.

use crate::error::EmitError;
use crate::item::Item;

/// Receives each closed interval exactly once, in interval order.
///
/// Any `FnMut(Item<P>, Vec<Item<A>>) -> Result<(), EmitError>` closure is an
/// emitter.
pub trait Emitter<P, A> {
    /// Hand over a primary item with the auxiliary items matched to it.
    ///
    /// Returning an error halts the engine.
    fn emit(&mut self, primary: Item<P>, matched: Vec<Item<A>>) -> Result<(), EmitError>;
}

impl<P, A, F> Emitter<P, A> for F
where
    F: FnMut(Item<P>, Vec<Item<A>>) -> Result<(), EmitError>,
{
    fn emit(&mut self, primary: Item<P>, matched: Vec<Item<A>>) -> Result<(), EmitError> {
        self(primary, matched)
    }
}

/// A primary item merged with its auxiliary items.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedFrame<P, A> {
    /// The primary item.
    pub primary: Item<P>,
    /// Matched auxiliary items, in match order.
    pub matched: Vec<Item<A>>,
}

/// Emitter that stores every frame in memory.
#[derive(Debug)]
pub struct FrameCollector<P, A> {
    frames: Vec<MergedFrame<P, A>>,
}

impl<P, A> FrameCollector<P, A> {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Frames received so far.
    pub fn frames(&self) -> &[MergedFrame<P, A>] {
        &self.frames
    }

    /// Take the received frames, leaving the collector empty.
    pub fn take_frames(&mut self) -> Vec<MergedFrame<P, A>> {
        std::mem::take(&mut self.frames)
    }

    /// Number of frames received.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame was received.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl<P, A> Default for FrameCollector<P, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, A> Emitter<P, A> for FrameCollector<P, A> {
    fn emit(&mut self, primary: Item<P>, matched: Vec<Item<A>>) -> Result<(), EmitError> {
        self.frames.push(MergedFrame { primary, matched });
        Ok(())
    }
}
