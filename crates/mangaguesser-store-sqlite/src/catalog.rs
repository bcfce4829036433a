//! Catalog loading.
//!
//! The catalog is reference data the engine only reads. These helpers fill
//! it, either row by row or from a directory laid out as
//! `<root>/<title name>/<asset file>`.

use std::path::{Path, PathBuf};

use mangaguesser_core::catalog::{ImageAsset, Title, TitleId};

use crate::{Result, SqliteStore};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Summary of a directory import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogImport {
  pub titles: usize,
  pub assets: usize,
}

impl SqliteStore {
  /// Insert a title, or return the existing one with the same name.
  pub async fn insert_title(&self, name: impl Into<String>) -> Result<Title> {
    let name = name.into();
    let title = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO titles (name) VALUES (?1)
           ON CONFLICT (name) DO UPDATE SET name = excluded.name
           RETURNING title_id, name",
          rusqlite::params![name],
          |row| Ok(Title { id: row.get(0)?, name: row.get(1)? }),
        )?)
      })
      .await?;
    Ok(title)
  }

  /// Attach an image asset to a title. Re-adding an existing asset is a
  /// no-op.
  pub async fn insert_asset(
    &self,
    title_id: TitleId,
    asset_name: impl Into<String>,
  ) -> Result<ImageAsset> {
    let asset = ImageAsset { title_id, asset_name: asset_name.into() };
    let name  = asset.asset_name.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO images (title_id, asset_name) VALUES (?1, ?2)",
          rusqlite::params![title_id, name],
        )?;
        Ok(())
      })
      .await?;
    Ok(asset)
  }

  /// Import every `<root>/<title>/<image>` under `root` in one transaction.
  ///
  /// Sub-directories become titles; files with an image extension become
  /// their assets. Directories without images are skipped.
  pub async fn import_catalog_dir(&self, root: impl AsRef<Path>) -> Result<CatalogImport> {
    let entries = scan_catalog_dir(root.as_ref()).await?;

    let summary = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut summary = CatalogImport::default();
        {
          let mut title_stmt = tx.prepare(
            "INSERT INTO titles (name) VALUES (?1)
             ON CONFLICT (name) DO UPDATE SET name = excluded.name
             RETURNING title_id",
          )?;
          let mut asset_stmt =
            tx.prepare("INSERT OR IGNORE INTO images (title_id, asset_name) VALUES (?1, ?2)")?;

          for (title, assets) in &entries {
            let title_id: TitleId =
              title_stmt.query_row(rusqlite::params![title], |row| row.get(0))?;
            summary.titles += 1;
            for asset in assets {
              summary.assets += asset_stmt.execute(rusqlite::params![title_id, asset])?;
            }
          }
        }
        tx.commit()?;
        Ok(summary)
      })
      .await?;

    tracing::info!(titles = summary.titles, assets = summary.assets, "catalog imported");
    Ok(summary)
  }
}

/// Collect `(title name, asset names)` pairs, sorted for stable ids.
async fn scan_catalog_dir(root: &Path) -> Result<Vec<(String, Vec<String>)>> {
  let mut titles = Vec::new();
  let mut dirs = tokio::fs::read_dir(root).await?;

  while let Some(entry) = dirs.next_entry().await? {
    if !entry.file_type().await?.is_dir() {
      continue;
    }
    let Some(title) = entry.file_name().to_str().map(str::to_owned) else {
      tracing::warn!(path = ?entry.path(), "skipping non UTF-8 title directory");
      continue;
    };
    let assets = scan_title_dir(entry.path()).await?;
    if assets.is_empty() {
      tracing::debug!(%title, "skipping title without images");
      continue;
    }
    titles.push((title, assets));
  }

  titles.sort_by(|a, b| a.0.cmp(&b.0));
  Ok(titles)
}

async fn scan_title_dir(dir: PathBuf) -> Result<Vec<String>> {
  let mut assets = Vec::new();
  let mut files = tokio::fs::read_dir(&dir).await?;

  while let Some(entry) = files.next_entry().await? {
    if !entry.file_type().await?.is_file() {
      continue;
    }
    let path = entry.path();
    let is_image = path
      .extension()
      .and_then(|e| e.to_str())
      .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|known| e.eq_ignore_ascii_case(known)));
    if let (true, Some(name)) = (is_image, entry.file_name().to_str()) {
      assets.push(name.to_owned());
    }
  }

  assets.sort();
  Ok(assets)
}
