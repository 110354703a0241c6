//! OpenStreetMap map catalog
//!
//! Geography-backed maps are `.osm` extracts laid out as
//!
//! ```text
//! {OsmDirectory}/{Category}/{Category}_{Name}_{lat:.4}_{lon:.4}.osm
//! ```
//!
//! A resource is only committed to a scenario after [`OsmResource::probe`]
//! confirmed that it has usable bounds and renderable detail.

use rfscene_core::coordinates::{bounding_box, GeoBox, MapBounds};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum OsmError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}: no buildings or highways to render")]
    NoDetail(PathBuf),

    #[error("{0}: map bounds are degenerate")]
    InvalidBounds(PathBuf),
}

/// Make a place or category name safe for use in file names.
pub fn sanitize_name(name: &str) -> String {
    let mut replaced = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.trim().chars() {
        if c.is_whitespace() || matches!(c, '/' | '\\' | ':') {
            if !in_separator {
                replaced.push('_');
            }
            in_separator = true;
        } else {
            replaced.push(c);
            in_separator = false;
        }
    }

    let kept = replaced
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));

    let mut collapsed = String::with_capacity(replaced.len());
    for c in kept {
        if (c == '_' || c == '-') && collapsed.ends_with(c) {
            continue;
        }
        collapsed.push(c);
    }

    let trimmed = collapsed.trim_matches(|c| c == '_' || c == '-');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// File name of a map extract
pub fn resource_file_name(category: &str, name: &str, lat: f64, lon: f64) -> String {
    format!(
        "{}_{}_{:.4}_{:.4}.osm",
        sanitize_name(category),
        sanitize_name(name),
        lat,
        lon
    )
}

/// One map extract in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OsmResource {
    pub path: PathBuf,
    pub category: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Geographic bounds, known once probed
    pub geo_box: Option<GeoBox>,
}

impl OsmResource {
    /// Parse `{Category}_{Name}_{lat}_{lon}.osm`; names may contain `_`.
    pub fn from_path(path: &Path) -> Option<Self> {
        if path.extension().and_then(|e| e.to_str()) != Some("osm") {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let mut parts = stem.rsplitn(3, '_');
        let lon: f64 = parts.next()?.parse().ok()?;
        let lat: f64 = parts.next()?.parse().ok()?;
        let head = parts.next()?;
        // Categories may contain underscores, so the directory names them
        let parent = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("");
        let (category, name) = match head.strip_prefix(parent).and_then(|rest| rest.strip_prefix('_')) {
            Some(name) if !parent.is_empty() => (parent, name),
            _ => head.split_once('_')?,
        };
        if category.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            path: path.to_path_buf(),
            category: category.to_string(),
            name: name.to_string(),
            latitude: lat,
            longitude: lon,
            geo_box: None,
        })
    }

    /// Check the extract is usable and fill in its bounds.
    ///
    /// `<bounds>` from the file wins; otherwise a square box of
    /// `box_size_km` around the coordinates in the file name is used.
    pub fn probe(&self, box_size_km: f64) -> Result<(OsmResource, MapBounds), OsmError> {
        let text = fs::read_to_string(&self.path).map_err(|source| OsmError::Io {
            path: self.path.clone(),
            source,
        })?;

        if !has_renderable_detail(&text) {
            return Err(OsmError::NoDetail(self.path.clone()));
        }

        let geo_box = parse_bounds(&text)
            .unwrap_or_else(|| bounding_box(self.latitude, self.longitude, box_size_km));
        if !geo_box.is_valid() {
            return Err(OsmError::InvalidBounds(self.path.clone()));
        }

        let (width, height) = geo_box.extent_m();
        let bounds = MapBounds::centered(width, height);
        if !bounds.is_valid() {
            return Err(OsmError::InvalidBounds(self.path.clone()));
        }

        let mut probed = self.clone();
        probed.geo_box = Some(geo_box);
        Ok((probed, bounds))
    }
}

fn attribute(tag: &str, key: &str) -> Option<f64> {
    let needle = format!("{}=", key);
    let start = tag.find(&needle)? + needle.len();
    let rest = &tag[start..];
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let value = &rest[1..];
    let end = value.find(quote)?;
    value[..end].parse().ok()
}

/// `<bounds minlat=.. minlon=.. maxlat=.. maxlon=../>` of an OSM document
fn parse_bounds(text: &str) -> Option<GeoBox> {
    let start = text.find("<bounds")?;
    let end = start + text[start..].find('>')?;
    let tag = &text[start..end];
    Some(GeoBox {
        min_lat: attribute(tag, "minlat")?,
        min_lon: attribute(tag, "minlon")?,
        max_lat: attribute(tag, "maxlat")?,
        max_lon: attribute(tag, "maxlon")?,
    })
}

/// At least one way tagged as a building or a highway
fn has_renderable_detail(text: &str) -> bool {
    const TAGS: [&str; 4] = ["k=\"building\"", "k='building'", "k=\"highway\"", "k='highway'"];

    let mut rest = text;
    while let Some(start) = rest.find("<way") {
        let after = &rest[start + 4..];
        if !after.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/') {
            rest = after;
            continue;
        }
        let Some(open_end) = after.find('>') else {
            return false;
        };
        if after[..open_end].ends_with('/') {
            rest = &after[open_end + 1..];
            continue;
        }
        let body = &after[open_end + 1..];
        let close = body.find("</way>").unwrap_or(body.len());
        if TAGS.iter().any(|tag| body[..close].contains(tag)) {
            return true;
        }
        rest = &body[close..];
    }
    false
}

/// Directory of map extracts grouped by category
#[derive(Debug, Clone)]
pub struct OsmCatalog {
    root: PathBuf,
    resources: Vec<OsmResource>,
}

impl OsmCatalog {
    /// List every well-named `.osm` file under `root/{Category}/`.
    ///
    /// A missing root yields an empty catalog.
    pub fn scan(root: &Path) -> Self {
        let mut resources = Vec::new();
        let categories = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %root.display(), error = %e, "OSM catalog not readable");
                return Self {
                    root: root.to_path_buf(),
                    resources,
                };
            }
        };

        for category in categories.flatten() {
            let dir = category.path();
            if !dir.is_dir() {
                continue;
            }
            let files = match fs::read_dir(&dir) {
                Ok(files) => files,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable OSM category");
                    continue;
                }
            };
            for file in files.flatten() {
                if let Some(resource) = OsmResource::from_path(&file.path()) {
                    resources.push(resource);
                }
            }
        }

        resources.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(root = %root.display(), count = resources.len(), "scanned OSM catalog");
        Self {
            root: root.to_path_buf(),
            resources,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resources(&self) -> &[OsmResource] {
        &self.resources
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CITY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <bounds minlat="40.7490" minlon="-73.9974" maxlat="40.7670" maxlon="-73.9736"/>
  <way id="1"><tag k="building" v="yes"/></way>
</osm>"#;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  New York: Times Square "), "New_York_Times_Square");
        assert_eq!(sanitize_name("a//b\\\\c"), "a_b_c");
        assert_eq!(sanitize_name("Café (old)"), "Café_old");
        assert_eq!(sanitize_name("--x__y--"), "x_y");
        assert_eq!(sanitize_name("a---b"), "a-b");
        assert_eq!(sanitize_name("!!!"), "unnamed");
        assert_eq!(sanitize_name("v1.2"), "v1.2");
    }

    #[test]
    fn test_resource_file_name_round_trip() {
        let name = resource_file_name("City", "Times Square", 40.758, -73.9855);
        assert_eq!(name, "City_Times_Square_40.7580_-73.9855.osm");
        let r = OsmResource::from_path(Path::new(&name)).unwrap();
        assert_eq!(r.category, "City");
        assert_eq!(r.name, "Times_Square");
        assert_eq!(r.latitude, 40.758);
        assert_eq!(r.longitude, -73.9855);
        assert!(OsmResource::from_path(Path::new("notes.txt")).is_none());
        assert!(OsmResource::from_path(Path::new("bad.osm")).is_none());
    }

    #[test]
    fn test_scan_and_probe() {
        let dir = tempfile::tempdir().unwrap();
        let city = dir.path().join("City");
        fs::create_dir_all(&city).unwrap();
        fs::write(city.join("City_Midtown_40.7580_-73.9855.osm"), CITY).unwrap();
        fs::write(city.join("City_Empty_1.0000_2.0000.osm"), "<osm></osm>").unwrap();
        fs::write(city.join("README.md"), "ignored").unwrap();

        let catalog = OsmCatalog::scan(dir.path());
        assert_eq!(catalog.len(), 2);

        let empty = &catalog.resources()[0];
        assert_eq!(empty.name, "Empty");
        assert!(matches!(empty.probe(2.0), Err(OsmError::NoDetail(_))));

        let midtown = &catalog.resources()[1];
        let (probed, bounds) = midtown.probe(2.0).unwrap();
        let geo = probed.geo_box.unwrap();
        assert_eq!(geo.min_lat, 40.7490);
        assert!(bounds.is_valid());
        assert!((bounds.height() - 2001.5).abs() < 5.0, "height = {}", bounds.height());
    }

    #[test]
    fn test_probe_without_bounds_uses_box() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Town_Square_10.0000_20.0000.osm");
        fs::write(&path, "<osm><way id=\"2\"><tag k='highway' v='primary'/></way></osm>").unwrap();
        let resource = OsmResource::from_path(&path).unwrap();
        let (probed, bounds) = resource.probe(2.0).unwrap();
        assert_eq!(probed.geo_box, Some(bounding_box(10.0, 20.0, 2.0)));
        assert!((bounds.width() - 2000.0).abs() < 5.0);
    }

    #[test]
    fn test_category_with_underscores_comes_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let category = dir.path().join("Dense_Urban_High_Rise");
        fs::create_dir_all(&category).unwrap();
        fs::write(
            category.join("Dense_Urban_High_Rise_Times_Square_NYC_40.7580_-73.9855.osm"),
            CITY,
        )
        .unwrap();

        let catalog = OsmCatalog::scan(dir.path());
        assert_eq!(catalog.len(), 1);
        let r = &catalog.resources()[0];
        assert_eq!(r.category, "Dense_Urban_High_Rise");
        assert_eq!(r.name, "Times_Square_NYC");
        assert_eq!(r.latitude, 40.758);
        assert_eq!(r.longitude, -73.9855);
    }

    #[test]
    fn test_detail_tags_must_sit_on_ways() {
        let node_only = r#"<osm>
  <node id="1" lat="1" lon="2"><tag k="building" v="yes"/></node>
  <way id="2"><nd ref="1"/><tag k="natural" v="water"/></way>
</osm>"#;
        assert!(!has_renderable_detail(node_only));

        let empty_way_then_node = r#"<osm><way id="3"/><node id="4"><tag k="highway" v="stop"/></node></osm>"#;
        assert!(!has_renderable_detail(empty_way_then_node));

        let waypoint = r#"<osm><wayx><tag k="building" v="yes"/></wayx></osm>"#;
        assert!(!has_renderable_detail(waypoint));

        assert!(has_renderable_detail(CITY));
        assert!(has_renderable_detail("<osm><way id='5'>\n<tag k='highway' v='residential'/>\n</way></osm>"));
    }

    #[test]
    fn test_scan_missing_root() {
        let catalog = OsmCatalog::scan(Path::new("/nonexistent/rfscene/osm"));
        assert!(catalog.is_empty());
    }
}
