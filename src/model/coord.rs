use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkCoord;

/// A chunk-aligned territory claim. One plot covers exactly one terrain chunk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct PlotCoord {
    pub x: i32,
    pub z: i32,
}

impl PlotCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The terrain chunk this plot sits on.
    pub fn chunk(self) -> ChunkCoord {
        ChunkCoord {
            x: self.x,
            z: self.z,
        }
    }
}

impl fmt::Display for PlotCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}
