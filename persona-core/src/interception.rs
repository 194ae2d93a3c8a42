//! Interception table.
//!
//! Every replaced platform member is recorded as a (surface → original,
//! replacement) pair. Installing goes through the table, so a surface can
//! only ever be wrapped once per execution context and the original stays
//! reachable for passthrough.
//!
//! The table is generic over the handle type: the browser layer stores JS
//! function objects, tests store plain values.

use std::collections::HashMap;
use std::fmt;

use crate::descriptor::Channel;

/// One interceptable member, e.g. `HTMLCanvasElement.prototype` / `toDataURL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId {
    pub target: &'static str,
    pub member: &'static str,
}

impl SurfaceId {
    pub const fn new(target: &'static str, member: &'static str) -> Self {
        Self { target, member }
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.member)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Function replaced by a wrapper with the same identity-facing shape.
    Method,
    /// Accessor property whose getter is replaced.
    Getter,
    /// Global constructor replaced or removed.
    Constructor,
}

#[derive(Debug)]
pub struct Interception<F> {
    pub channel: Channel,
    pub kind: SurfaceKind,
    pub original: F,
    pub replacement: F,
}

#[derive(Debug)]
pub struct InterceptionTable<F> {
    entries: HashMap<SurfaceId, Interception<F>>,
    order: Vec<SurfaceId>,
}

impl<F> Default for InterceptionTable<F> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<F> InterceptionTable<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self, surface: &SurfaceId) -> bool {
        self.entries.contains_key(surface)
    }

    /// Install a surface once.
    ///
    /// `wrap` runs only if the surface is not in the table yet and returns
    /// the `(original, replacement)` pair it put in place. Returns `Ok(false)`
    /// when the surface was already installed; a failing `wrap` leaves the
    /// table untouched.
    pub fn install<E>(
        &mut self,
        surface: SurfaceId,
        channel: Channel,
        kind: SurfaceKind,
        wrap: impl FnOnce() -> Result<(F, F), E>,
    ) -> Result<bool, E> {
        if self.is_installed(&surface) {
            log::debug!("{} already intercepted", surface);
            return Ok(false);
        }
        let (original, replacement) = wrap()?;
        self.entries.insert(
            surface,
            Interception {
                channel,
                kind,
                original,
                replacement,
            },
        );
        self.order.push(surface);
        Ok(true)
    }

    pub fn get(&self, surface: &SurfaceId) -> Option<&Interception<F>> {
        self.entries.get(surface)
    }

    pub fn original(&self, surface: &SurfaceId) -> Option<&F> {
        self.entries.get(surface).map(|i| &i.original)
    }

    /// Surfaces in installation order.
    pub fn surfaces(&self) -> impl Iterator<Item = &SurfaceId> {
        self.order.iter()
    }

    pub fn surfaces_for(&self, channel: Channel) -> impl Iterator<Item = &SurfaceId> + '_ {
        self.order
            .iter()
            .filter(move |s| self.entries.get(s).map(|i| i.channel) == Some(channel))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
