//! Cluster definition: document types, parsing, variables, topology

pub mod config;
pub mod model;
pub mod parser;
pub mod vars;

pub use config::ClusterConfig;
pub use model::{ClusterModel, Description, HostBinding, OrderDirection, Service};
pub use parser::ClusterParser;
pub use vars::{instantiate, VarNamespace};
