pub mod catalogue;
pub mod chunk;
pub mod download;
pub mod merge;
pub mod navigate;
pub mod selection;

#[cfg(test)]
pub(crate) mod fake_portal;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum InfoshareError {
    #[error("download directory must be an absolute path, got {0}")]
    RelativeDownloadDir(String),
    #[error("{0}")]
    NodeNotFound(String),
    #[error("cannot split the request on '{0}', no such variable")]
    MissingSplitVariable(String),
    #[error("a single '{split_on}' option spans {cells} cells, over the {budget} cell budget")]
    ChunkTooLarge {
        split_on: String,
        cells: u64,
        budget: u64,
    },
    #[error("need at least two partial CSVs to merge, got {0}")]
    TooFewChunks(usize),
    #[error("two chunk-CSVs were identical")]
    IdenticalChunks,
    #[error("header rows of {0} differ from the first partial CSV")]
    HeaderMismatch(String),
}
