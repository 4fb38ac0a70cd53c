//! SeaORM entity models
//!
//! Database entities for PaperLens

mod paper_analysis;
mod project;

pub use project::{
    Entity as ProjectEntity,
    Model as Project,
    ActiveModel as ProjectActiveModel,
    Column as ProjectColumn,
};

pub use paper_analysis::{
    Entity as AnalysisEntity,
    Model as AnalysisRecord,
    ActiveModel as AnalysisActiveModel,
    Column as AnalysisColumn,
};
