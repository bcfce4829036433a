//! Catalog reference data: titles and the image assets that depict them.
//!
//! Both are loaded out of band and never mutated by the engine.

use serde::{Deserialize, Serialize};

/// Integer key of a [`Title`], as assigned by the catalog table.
pub type TitleId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
  pub id:   TitleId,
  pub name: String,
}

/// One image belonging to a title. A title with no assets is never dealt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageAsset {
  pub title_id:   TitleId,
  pub asset_name: String,
}
