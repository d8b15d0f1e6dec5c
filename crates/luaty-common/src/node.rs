use serde::{Deserialize, Serialize};

/// Opaque handle to a syntax node owned by the host.
///
/// The engine never inspects syntax; it only passes node handles back to the
/// declaration layer (ancestry, inference) and attaches them to problems.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}
