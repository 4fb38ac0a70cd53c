//! Project entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    
    #[sea_orm(column_type = "Text")]
    pub title: String,
    
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    
    /// Owner; every query filters on it
    pub user_id: Uuid,
    
    pub created_at: DateTimeWithTimeZone,
    
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::paper_analysis::Entity")]
    PaperAnalyses,
}

impl Related<super::paper_analysis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaperAnalyses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
