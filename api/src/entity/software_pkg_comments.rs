//! `SeaORM` Entity for software_pkg_comments

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "software_pkg_comments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub pkg_id: Uuid,
    pub author: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::software_pkgs::Entity",
        from = "Column::PkgId",
        to = "super::software_pkgs::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    SoftwarePkgs,
}

impl Related<super::software_pkgs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SoftwarePkgs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
