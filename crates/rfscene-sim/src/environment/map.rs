//! Map mode selection
//!
//! The map mode is drawn once per scenario. A geography-backed draw only
//! sticks if a catalog resource passes its probe; otherwise the scenario
//! falls back to the statistical map.

use super::config::{MapConfig, DEFAULT_BOUNDARIES};
use super::osm::{OsmCatalog, OsmResource};
use rand::Rng;
use rfscene_core::coordinates::MapBounds;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapMode {
    /// Synthetic rectangular area
    Statistical { bounds: MapBounds },
    /// Area backed by a probed OSM extract, in a local frame centred on it
    Geographic {
        resource: OsmResource,
        bounds: MapBounds,
    },
}

impl MapMode {
    pub fn bounds(&self) -> &MapBounds {
        match self {
            MapMode::Statistical { bounds } | MapMode::Geographic { bounds, .. } => bounds,
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, MapMode::Geographic { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            MapMode::Statistical { .. } => "Statistical",
            MapMode::Geographic { .. } => "Geographic",
        }
    }
}

/// Statistical map from the configured boundaries, or the default area
pub fn statistical(config: &MapConfig) -> MapMode {
    let bounds = match config.bounds() {
        Some(bounds) => bounds,
        None => {
            warn!(
                default = ?DEFAULT_BOUNDARIES,
                "no map boundaries configured, using default area"
            );
            let [x0, x1, y0, y1] = DEFAULT_BOUNDARIES;
            MapBounds::new(x0, x1, y0, y1)
        }
    };
    MapMode::Statistical { bounds }
}

/// Draw the map mode for a new scenario.
pub fn select_map_mode<R: Rng + ?Sized>(config: &MapConfig, rng: &mut R) -> MapMode {
    let roll: f64 = rng.gen();
    if roll >= config.geographic_ratio {
        return statistical(config);
    }

    let catalog = OsmCatalog::scan(&config.osm_directory);
    if catalog.is_empty() {
        warn!(
            dir = %config.osm_directory.display(),
            "geographic map requested but the OSM catalog is empty, falling back to statistical"
        );
        return statistical(config);
    }

    let candidate = &catalog.resources()[rng.gen_range(0..catalog.len())];
    match candidate.probe(config.box_size_km) {
        Ok((resource, bounds)) => {
            info!(
                map = %resource.name,
                category = %resource.category,
                width_m = bounds.width(),
                height_m = bounds.height(),
                "committed geographic map"
            );
            MapMode::Geographic { resource, bounds }
        }
        Err(e) => {
            warn!(error = %e, "map resource failed its probe, falling back to statistical");
            statistical(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;

    #[test]
    fn test_default_ratio_is_statistical() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = MapConfig::default();
        for _ in 0..20 {
            let mode = select_map_mode(&config, &mut rng);
            assert_eq!(
                mode,
                MapMode::Statistical {
                    bounds: MapBounds::new(-1000.0, 1000.0, -1000.0, 1000.0)
                }
            );
        }
    }

    #[test]
    fn test_configured_boundaries() {
        let config = MapConfig {
            boundaries: Some([0.0, 50.0, 0.0, 20.0]),
            ..Default::default()
        };
        assert_eq!(statistical(&config).bounds(), &MapBounds::new(0.0, 50.0, 0.0, 20.0));
    }

    #[test]
    fn test_missing_catalog_falls_back() {
        let mut rng = StdRng::seed_from_u64(1);
        let config = MapConfig {
            geographic_ratio: 1.0,
            osm_directory: "/nonexistent/rfscene/osm".into(),
            ..Default::default()
        };
        assert!(!select_map_mode(&config, &mut rng).is_geographic());
    }

    #[test]
    fn test_failed_probe_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let city = dir.path().join("City");
        fs::create_dir_all(&city).unwrap();
        fs::write(city.join("City_Bare_1.0000_2.0000.osm"), "<osm/>").unwrap();
        let config = MapConfig {
            geographic_ratio: 1.0,
            osm_directory: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(select_map_mode(&config, &mut rng).name(), "Statistical");
    }

    #[test]
    fn test_geographic_commit() {
        let dir = tempfile::tempdir().unwrap();
        let city = dir.path().join("City");
        fs::create_dir_all(&city).unwrap();
        fs::write(
            city.join("City_Grid_1.0000_2.0000.osm"),
            "<osm><way id=\"1\"><tag k=\"highway\" v=\"residential\"/></way></osm>",
        )
        .unwrap();
        let config = MapConfig {
            geographic_ratio: 1.0,
            osm_directory: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let mode = select_map_mode(&config, &mut rng);
        assert!(mode.is_geographic());
        let b = mode.bounds();
        assert!((b.width() - 2000.0).abs() < 5.0);
        assert!(b.contains(0.0, 0.0));
    }
}
