//! Reference atlases for brainrender-rs.
//!
//! An atlas bundles a region hierarchy, a voxel annotation and one mesh per
//! region:
//! - [`AtlasMetadata`] and [`Hierarchy`] describe it
//! - [`AtlasSource`] provides its files, [`LocalAtlas`] from the cache
//! - [`Atlas`] answers region, plane and coordinate queries
//!
//! [`write_toy_atlas`] writes a small synthetic atlas usable offline.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::neg_cmp_op_on_partial_ord)]

pub mod atlas;
pub mod hierarchy;
pub mod metadata;
pub mod source;
pub mod toy;

pub use atlas::{atlas_by_name, Atlas, Hemisphere, PlaneOptions, ROOT};
pub use hierarchy::{Hierarchy, StructureRecord};
pub use metadata::{AtlasMetadata, PlaneNormals};
pub use source::{Annotation, AtlasSource, LocalAtlas};
pub use toy::{toy_acronyms, write_toy_atlas, TOY_ATLAS};
