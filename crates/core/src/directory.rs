//! Users, sites and sub-sites offered by the owner and location pickers.

use serde::{Deserialize, Serialize};

use crate::asset::{AssetOwner, AssetRecord};
use crate::types::DbId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: DbId,
    pub name: String,
    pub position: String,
    pub cost_center: String,
    pub department: String,
    pub division: String,
    /// Home site of the user.
    pub site_id: Option<DbId>,
}

impl User {
    pub fn as_owner(&self) -> AssetOwner {
        AssetOwner {
            id: self.id,
            name: self.name.clone(),
            position: self.position.clone(),
            cost_center: self.cost_center.clone(),
            department: self.department.clone(),
            division: self.division.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: DbId,
    pub name: String,
    pub region_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSite {
    pub id: DbId,
    pub site_id: DbId,
    pub name: String,
}

/// Make `user` the owner of the pending record, carrying over their
/// organisational fields and home site.
pub fn assign_owner(record: &mut AssetRecord, user: &User) {
    record.owner = user.as_owner();
    record.site_id = user.site_id;
}

/// Move the pending record to `sub_site`, optionally changing the room.
pub fn relocate(record: &mut AssetRecord, sub_site: &SubSite, room: Option<&str>) {
    record.sub_site_id = Some(sub_site.id);
    record.location = sub_site.name.clone();
    if let Some(room) = room {
        record.room = room.trim().to_string();
    }
}
