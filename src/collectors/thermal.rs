//! Thermal sensor collector.
//!
//! Temperatures come from:
//! - `<sys_root>/class/thermal/thermal_zone*/temp`
//! - `<sys_root>/class/hwmon/hwmon*/temp*_input`
//!
//! Both report millidegrees Celsius.

use ahash::AHashMap as HashMap;
use std::fs;
use std::path::Path;

fn read_millidegrees(path: &Path) -> Option<f64> {
    let content = fs::read_to_string(path).ok()?;
    let millidegrees = content.trim().parse::<i64>().ok()?;
    Some(millidegrees as f64 / 1000.0)
}

/// Reads every thermal zone, keyed by the zone's `type` when present.
pub fn read_thermal_zones(sys_root: &Path) -> HashMap<String, f64> {
    let mut temperatures = HashMap::new();
    let Ok(entries) = fs::read_dir(sys_root.join("class").join("thermal")) else {
        return temperatures;
    };

    for entry in entries.flatten() {
        let zone_name = entry.file_name().to_string_lossy().to_string();
        if !zone_name.starts_with("thermal_zone") {
            continue;
        }

        let path = entry.path();
        let Some(celsius) = read_millidegrees(&path.join("temp")) else {
            continue;
        };

        let label = fs::read_to_string(path.join("type"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|t| format!("{}_{}", t, zone_name))
            .unwrap_or(zone_name);
        temperatures.insert(label, celsius);
    }

    temperatures
}

/// Reads every `temp*_input` of every hwmon device, keyed `<device name>_<file>`.
pub fn read_hwmon_temps(sys_root: &Path) -> HashMap<String, f64> {
    let mut temperatures = HashMap::new();
    let Ok(entries) = fs::read_dir(sys_root.join("class").join("hwmon")) else {
        return temperatures;
    };

    for entry in entries.flatten() {
        let hwmon_name = entry.file_name().to_string_lossy().to_string();
        if !hwmon_name.starts_with("hwmon") {
            continue;
        }

        let path = entry.path();
        let device_name = fs::read_to_string(path.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| hwmon_name.clone());

        let Ok(files) = fs::read_dir(&path) else {
            continue;
        };
        for file in files.flatten() {
            let file_name = file.file_name().to_string_lossy().to_string();
            if !file_name.starts_with("temp") || !file_name.ends_with("_input") {
                continue;
            }
            if let Some(celsius) = read_millidegrees(&file.path()) {
                temperatures.insert(format!("{}_{}", device_name, file_name), celsius);
            }
        }
    }

    temperatures
}

/// All temperature readings from thermal zones and hwmon combined.
pub fn collect_temperatures(sys_root: &Path) -> HashMap<String, f64> {
    let mut all = read_thermal_zones(sys_root);
    all.extend(read_hwmon_temps(sys_root));
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_collect_temperatures_from_fixture() {
        let dir = tempdir().expect("Failed to create temp dir");
        let zone = dir.path().join("class/thermal/thermal_zone0");
        fs::create_dir_all(&zone).unwrap();
        fs::write(zone.join("temp"), "45500\n").unwrap();
        fs::write(zone.join("type"), "x86_pkg_temp\n").unwrap();

        let hwmon = dir.path().join("class/hwmon/hwmon1");
        fs::create_dir_all(&hwmon).unwrap();
        fs::write(hwmon.join("name"), "coretemp\n").unwrap();
        fs::write(hwmon.join("temp1_input"), "52000\n").unwrap();
        fs::write(hwmon.join("temp1_label"), "Package id 0\n").unwrap();

        let temps = collect_temperatures(dir.path());
        assert_eq!(temps.len(), 2);
        assert_eq!(temps["x86_pkg_temp_thermal_zone0"], 45.5);
        assert_eq!(temps["coretemp_temp1_input"], 52.0);
    }

    #[test]
    fn test_collect_temperatures_without_sensors() {
        let dir = tempdir().expect("Failed to create temp dir");
        assert!(collect_temperatures(dir.path()).is_empty());
    }
}
