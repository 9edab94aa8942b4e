use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::predict::error::PredictError;
use crate::predict::types::{OrbitalElements, Satellite};

const EXTENSIONS: [&str; 2] = ["txt", "tle"];

/// Reads catalog groups (`<group>.txt` or `<group>.tle`) from a local TLE cache directory.
pub struct TleLoader {
    tle_dir: PathBuf,
}

impl TleLoader {
    pub fn new(tle_dir: PathBuf) -> Self {
        Self { tle_dir }
    }

    /// Load every requested group, deduplicated by NORAD id in file order.
    ///
    /// Satellites whose apogee exceeds `max_apogee_km` are skipped. Missing or
    /// unreadable groups are logged and skipped; ending up with no satellites
    /// at all is an error.
    pub fn load_groups(
        &self,
        groups: &[String],
        max_apogee_km: Option<f64>,
    ) -> Result<Vec<Satellite>, PredictError> {
        if !self.tle_dir.is_dir() {
            return Err(PredictError::DirectoryNotFound(
                self.tle_dir.display().to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut satellites = Vec::new();

        for group in groups {
            let Some(path) = self.group_path(group) else {
                log::warn!(
                    "No TLE file for group '{}' in {}",
                    group,
                    self.tle_dir.display()
                );
                continue;
            };

            let entries = match parse_tle_file(&path) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Failed to read TLE file {}: {}", path.display(), e);
                    continue;
                }
            };

            let before = satellites.len();
            for sat in entries {
                if let Some(limit) = max_apogee_km {
                    if sat.elements.apogee_km() > limit {
                        continue;
                    }
                }
                if seen.insert(sat.norad_id) {
                    satellites.push(sat);
                }
            }
            log::info!(
                "Group '{}': {} satellites from {}",
                group,
                satellites.len() - before,
                path.display()
            );
        }

        if satellites.is_empty() {
            return Err(PredictError::NoSatellites(groups.join(",")));
        }
        Ok(satellites)
    }

    fn group_path(&self, group: &str) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.tle_dir.join(format!("{}.{}", group, ext)))
            .find(|path| path.is_file())
    }
}

/// Parse a TLE file that may hold many satellites. Bad entries are skipped.
fn parse_tle_file(path: &Path) -> Result<Vec<Satellite>, PredictError> {
    let content = fs::read_to_string(path)?;
    let filename = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    let mut results = Vec::new();
    for (name, line1, line2) in parse_multi_tle(&content) {
        match OrbitalElements::from_tle(name.clone(), &line1, &line2) {
            Ok(elements) => {
                let norad_id = elements.norad_id();
                let sat_name = name.unwrap_or_else(|| format!("NORAD {}", norad_id));
                results.push(Satellite::new(norad_id, sat_name, elements));
            }
            Err(e) => {
                let err = PredictError::InvalidTle {
                    file: filename.clone(),
                    message: e.to_string(),
                };
                log::warn!("{}", err);
            }
        }
    }

    Ok(results)
}

/// Split multi-satellite TLE content into `(name, line1, line2)` triples.
pub fn parse_multi_tle(content: &str) -> Vec<(Option<String>, String, String)> {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("1 ") && i + 1 < lines.len() && lines[i + 1].starts_with("2 ") {
            result.push((None, lines[i].to_string(), lines[i + 1].to_string()));
            i += 2;
        } else if i + 2 < lines.len()
            && lines[i + 1].starts_with("1 ")
            && lines[i + 2].starts_with("2 ")
        {
            result.push((
                Some(lines[i].to_string()),
                lines[i + 1].to_string(),
                lines[i + 2].to_string(),
            ));
            i += 3;
        } else {
            i += 1;
        }
    }

    result
}
