//! `SeaORM` Entity for pkg_watches

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "pkg_watches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub pkg_id: Uuid,
    pub status: String,
    pub pr_number: Option<i64>,
    pub pr_link: Option<String>,
    pub updated_at: DateTimeWithTimeZone,
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
