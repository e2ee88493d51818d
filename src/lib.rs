//! Weft - composable task invocation IR for distributed workflow execution
//!
//! Weft is the composition layer for a distributed task platform: a
//! serializable intermediate representation of single task invocations
//! ([`Descriptor`]) and their compositions: sequential [`Chain`]s,
//! parallel [`Group`]s, barrier-synchronized [`Chord`]s, element-wise
//! [`ElementwiseMap`]/[`StarMap`] fan-outs, and chunked
//! [`ChunkPartitioner`]s. It performs no dispatch, transport, or result
//! storage itself; invocations are handed to the collaborators behind a
//! [`Runtime`].

pub mod chain;
pub mod chord;
pub mod chunks;
pub mod descriptor;
pub mod error;
pub mod group;
pub mod map;
pub mod registry;
pub mod render;
pub mod runtime;
pub mod sequence;
pub mod signature;

pub use chain::{Chain, CHAIN_TASK};
pub use chord::{Chord, CHORD_TASK};
pub use chunks::{ChunkPartitioner, CHUNKS_TASK};
pub use descriptor::{Descriptor, COUNTDOWN_KEY, LINK_ERROR_KEY, LINK_KEY, TASK_ID_KEY};
pub use error::WeftError;
pub use group::{Group, GROUP_TASK};
pub use map::{ElementwiseMap, StarMap, MAP_TASK, STARMAP_TASK};
pub use registry::TypeRegistry;
pub use runtime::{
    ChordCoordinator, GroupCoordinator, PreparedGroup, ReadyHandle, ResultHandle, Runtime, Task,
    TaskRegistry,
};
pub use sequence::OnceSequence;
pub use signature::Signature;
