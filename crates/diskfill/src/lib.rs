//! The diskfill collaborators: size parsing and the free space query.

pub mod size;
pub mod space;
