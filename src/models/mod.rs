//! Data model shared by the executor, the runner and the workspace

pub mod types;

pub use types::{
    load_collection_file, load_variables_file, Collection, CollectionFile, EntityId,
    HeadersDict, Request, RequestBody,
};
