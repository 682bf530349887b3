//! Client for a Lavalink v4 node.

mod node;
pub mod protocol;

pub use node::LavalinkNode;
