use mapvc_common::{AssetId, CustomAsset, Element, ElementId, Link, LinkId, Tile, TilePos};
use mapvc_kernel::{DocumentError, LiveDocument, MapState};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, warn};

/// An immutable capture of a map document.
///
/// Ids are unique per category in every snapshot built through
/// [`Snapshot::capture`] or [`Snapshot::from_state`]. There are no mutating
/// accessors; a stored snapshot is never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    state: MapState,
}

impl Snapshot {
    /// Read the live document into a snapshot. The document is not touched.
    pub fn capture<D: LiveDocument + ?Sized>(doc: &D) -> Result<Self, DocumentError> {
        Self::from_state(doc.capture()?)
    }

    /// Wrap an already-captured state after checking id uniqueness.
    pub fn from_state(state: MapState) -> Result<Self, DocumentError> {
        state.validate()?;
        Ok(Self { state })
    }

    pub fn state(&self) -> &MapState {
        &self.state
    }

    pub fn into_state(self) -> MapState {
        self.state
    }

    /// SHA-256 over the JSON encoding. Used to tell whether two states
    /// differ; it is not an integrity check.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(&self.state)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Make the live document match this snapshot by removing everything it
    /// currently holds and recreating everything in the snapshot.
    ///
    /// Individual primitive failures are collected in the report; the rest
    /// of the plan still runs. Only a failure to read the current state
    /// aborts before anything is removed.
    pub fn apply<D: LiveDocument + ?Sized>(&self, doc: &mut D) -> Result<ApplyReport, DocumentError> {
        let current = doc.capture()?;
        let plan = SyncPlan::between(&current, &self.state);
        Ok(plan.execute(doc))
    }
}

/// A single live-document primitive call.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOp {
    RemoveElement(ElementId),
    RemoveTile(TilePos),
    RemoveLink(LinkId),
    RemoveCustomAsset(AssetId),
    CreateCustomAsset(CustomAsset),
    CreateElement(Element),
    CreateTile(Tile),
    CreateLink(Link),
}

impl SyncOp {
    fn run<D: LiveDocument + ?Sized>(&self, doc: &mut D) -> Result<(), DocumentError> {
        match self {
            Self::RemoveElement(id) => doc.remove_element(id),
            Self::RemoveTile(pos) => doc.remove_tile(*pos),
            Self::RemoveLink(id) => doc.remove_link(id),
            Self::RemoveCustomAsset(id) => doc.remove_custom_asset(id),
            Self::CreateCustomAsset(asset) => doc.create_custom_asset(asset),
            Self::CreateElement(element) => doc.create_element(element),
            Self::CreateTile(tile) => doc.create_tile(tile),
            Self::CreateLink(link) => doc.create_link(link),
        }
    }
}

impl fmt::Display for SyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoveElement(id) => write!(f, "remove element {id}"),
            Self::RemoveTile(pos) => write!(f, "remove tile {pos}"),
            Self::RemoveLink(id) => write!(f, "remove link {id}"),
            Self::RemoveCustomAsset(id) => write!(f, "remove custom asset {id}"),
            Self::CreateCustomAsset(asset) => write!(f, "create custom asset {}", asset.id),
            Self::CreateElement(element) => {
                write!(f, "create element {} ({})", element.id, element.type_id)
            }
            Self::CreateTile(tile) => write!(f, "create tile {}", tile.pos()),
            Self::CreateLink(link) => write!(
                f,
                "create link {} ({}:{} -> {}:{})",
                link.id,
                link.start.element,
                link.start.connection,
                link.end.element,
                link.end.connection
            ),
        }
    }
}

/// The full-replace plan for moving a document from one state to another.
///
/// Removals cover everything currently present: elements, then tiles, then
/// links, then custom assets. Creations cover everything in the target:
/// custom assets, then elements, then tiles, then links, so link endpoints
/// always exist by the time a link is created. Removals are unconditional,
/// even for items the target recreates unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    removals: Vec<SyncOp>,
    creations: Vec<SyncOp>,
}

impl SyncPlan {
    pub fn between(current: &MapState, target: &MapState) -> Self {
        let removals = current
            .elements
            .iter()
            .map(|e| SyncOp::RemoveElement(e.id.clone()))
            .chain(current.tiles.iter().map(|t| SyncOp::RemoveTile(t.pos())))
            .chain(current.links.iter().map(|l| SyncOp::RemoveLink(l.id.clone())))
            .chain(
                current
                    .custom_assets
                    .iter()
                    .map(|a| SyncOp::RemoveCustomAsset(a.id.clone())),
            )
            .collect();

        let creations = target
            .custom_assets
            .iter()
            .cloned()
            .map(SyncOp::CreateCustomAsset)
            .chain(target.elements.iter().cloned().map(SyncOp::CreateElement))
            .chain(target.tiles.iter().cloned().map(SyncOp::CreateTile))
            .chain(target.links.iter().cloned().map(SyncOp::CreateLink))
            .collect();

        Self { removals, creations }
    }

    pub fn removals(&self) -> &[SyncOp] {
        &self.removals
    }

    pub fn creations(&self) -> &[SyncOp] {
        &self.creations
    }

    /// Every operation, removals first.
    pub fn ops(&self) -> impl Iterator<Item = &SyncOp> {
        self.removals.iter().chain(self.creations.iter())
    }

    pub fn len(&self) -> usize {
        self.removals.len() + self.creations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the removal batch to completion, then the creation batch.
    pub fn execute<D: LiveDocument + ?Sized>(&self, doc: &mut D) -> ApplyReport {
        let mut report = ApplyReport::default();
        for op in &self.removals {
            match op.run(doc) {
                Ok(()) => report.removed += 1,
                Err(error) => report.fail(op, error),
            }
        }
        for op in &self.creations {
            match op.run(doc) {
                Ok(()) => report.created += 1,
                Err(error) => report.fail(op, error),
            }
        }
        debug!(
            removed = report.removed,
            created = report.created,
            failed = report.failures.len(),
            "sync plan executed"
        );
        report
    }
}

/// A primitive call that the host refused.
#[derive(Debug)]
pub struct ItemFailure {
    pub op: SyncOp,
    pub error: DocumentError,
}

/// Outcome of applying a snapshot. The codec does not check that the
/// document converged; it only reports which calls failed.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub removed: usize,
    pub created: usize,
    pub failures: Vec<ItemFailure>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, op: &SyncOp, error: DocumentError) {
        warn!(%op, %error, "live document primitive failed");
        self.failures.push(ItemFailure {
            op: op.clone(),
            error,
        });
    }
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "removed {}, created {}, failed {}",
            self.removed,
            self.created,
            self.failures.len()
        )?;
        if let Some(first) = self.failures.first() {
            write!(f, " (first: {}: {})", first.op, first.error)?;
        }
        Ok(())
    }
}
