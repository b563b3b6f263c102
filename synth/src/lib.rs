pub mod app;
pub mod assembly;
pub mod audit;
pub mod catalog;
pub mod cidr;
pub mod diff;
pub mod environment;
pub mod error;
pub mod graph;
pub mod handle;
pub mod registry;
pub mod stack;
pub mod stacks;
pub mod template;

pub use app::{eks_app, App};
pub use assembly::{Assembly, SynthesizedStack};
pub use environment::Environment;
pub use error::{Error, Result};
pub use handle::{Handle, StackId};
pub use stack::Stack;
