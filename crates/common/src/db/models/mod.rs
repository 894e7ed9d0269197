//! SeaORM entity models
//!
//! Graph store entities: papers (nodes), paper_references (edges) and
//! exploration_roots (crawl provenance)

mod citation;
mod exploration_root;
mod paper;

pub use paper::{
    Entity as PaperEntity,
    Model as Paper,
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
};

pub use citation::{
    Entity as CitationEntity,
    Model as Citation,
    ActiveModel as CitationActiveModel,
    Column as CitationColumn,
};

pub use exploration_root::{
    Entity as ExplorationRootEntity,
    Model as ExplorationRoot,
    ActiveModel as ExplorationRootActiveModel,
    Column as ExplorationRootColumn,
};
