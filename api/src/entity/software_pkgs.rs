//! `SeaORM` Entity for software_pkgs

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "software_pkgs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub importer: String,
    pub phase: String,
    pub platform: String,
    pub review_result: Option<String>,
    pub applied_at: DateTimeWithTimeZone,
    pub approved_by: Json,
    pub rejected_by: Json,
    pub application: Json,
    pub repo_pr_link: Option<String>,
    pub ci_id: i64,
    pub ci_status: String,
    pub ci_start_time: DateTimeWithTimeZone,
    pub reviews: Json,
    pub logs: Json,
    pub version: i32,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::software_pkg_comments::Entity")]
    SoftwarePkgComments,
}

impl Related<super::software_pkg_comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SoftwarePkgComments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
