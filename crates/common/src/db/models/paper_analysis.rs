//! Paper analysis entity
//!
//! One row per (paper_id, user_id); the pair carries a unique index.

use crate::analysis::Analysis;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "paper_analyses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    
    /// Id in the external paper index, not a local foreign key
    #[sea_orm(column_type = "Text")]
    pub paper_id: String,
    
    pub user_id: Uuid,
    
    /// None means unassigned (recents only)
    pub project_id: Option<Uuid>,
    
    /// Paper title at creation time
    #[sea_orm(column_type = "Text")]
    pub title: String,
    
    #[sea_orm(column_type = "JsonBinary")]
    pub analysis: Analysis,
    
    pub created_at: DateTimeWithTimeZone,
    
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id",
        on_delete = "SetNull"
    )]
    Project,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
