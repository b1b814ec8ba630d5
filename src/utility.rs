//! General utility functions.

use chrono::{NaiveDate, NaiveDateTime};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Name of the data folder holding settings and logs
pub const DATA_FOLDER_NAME: &str = ".window_dataset";

/// Resolve the data directory.
///
/// A `.window_dataset` folder in the current working directory takes
/// precedence; otherwise the folder is created under the home directory.
fn get_data_dir(temp_name: &str) -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    resolve_data_dir(&cwd, &home, temp_name)
}

fn resolve_data_dir(cwd: &Path, home: &Path, temp_name: &str) -> PathBuf {
    let temp_path = cwd.join(temp_name);
    if temp_path.exists() {
        return temp_path;
    }

    let temp_path = home.join(temp_name);
    if !temp_path.exists() {
        let _ = fs::create_dir_all(&temp_path);
    }

    temp_path
}

/// Data directory
pub static DATA_DIR: LazyLock<PathBuf> = LazyLock::new(|| get_data_dir(DATA_FOLDER_NAME));

/// Get path for a file inside the data directory
pub fn get_file_path(filename: &str) -> PathBuf {
    DATA_DIR.join(filename)
}

/// Get path for a folder inside the data directory, creating it if needed
pub fn get_folder_path(folder_name: &str) -> PathBuf {
    let folder_path = DATA_DIR.join(folder_name);
    if !folder_path.exists() {
        let _ = fs::create_dir_all(&folder_path);
    }
    folder_path
}

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a calendar date from a CSV cell.
///
/// Accepts `YYYY-MM-DD`, `YYYYMMDD`, `YYYY/MM/DD`, `MM/DD/YYYY`, `DD.MM.YYYY`
/// and timestamps whose date part is one of those (the time of day is
/// discarded).
pub fn parse_date(arg: &str) -> Option<NaiveDate> {
    let arg = arg.trim();
    if arg.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(arg, format) {
            return Some(date);
        }
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(arg) {
        return Some(dt.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(arg, format) {
            return Some(dt.date());
        }
    }

    None
}

/// Parse a finite floating point number from a CSV cell
pub fn parse_price(arg: &str) -> Option<f64> {
    arg.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 7);
        assert_eq!(parse_date("2024-03-07"), expected);
        assert_eq!(parse_date("20240307"), expected);
        assert_eq!(parse_date("2024/03/07"), expected);
        assert_eq!(parse_date("03/07/2024"), expected);
        assert_eq!(parse_date("07.03.2024"), expected);
        assert_eq!(parse_date(" 2024-03-07 "), expected);
    }

    #[test]
    fn test_parse_date_with_time() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 7);
        assert_eq!(parse_date("2024-03-07 15:30:00"), expected);
        assert_eq!(parse_date("2024-03-07T15:30:00"), expected);
        assert_eq!(parse_date("2024-03-07T15:30:00+02:00"), expected);
    }

    #[test]
    fn test_parse_date_invalid() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2024-13-40"), None);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("101.5"), Some(101.5));
        assert_eq!(parse_price(" 7 "), Some(7.0));
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("abc"), None);
        assert_eq!(parse_price("NaN"), None);
        assert_eq!(parse_price("inf"), None);
    }

    #[test]
    fn test_data_dir_prefers_working_directory() {
        let cwd = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        fs::create_dir(cwd.path().join(DATA_FOLDER_NAME)).unwrap();

        let dir = resolve_data_dir(cwd.path(), home.path(), DATA_FOLDER_NAME);
        assert_eq!(dir, cwd.path().join(DATA_FOLDER_NAME));
        assert!(!home.path().join(DATA_FOLDER_NAME).exists());
    }

    #[test]
    fn test_data_dir_falls_back_to_home() {
        let cwd = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();

        let dir = resolve_data_dir(cwd.path(), home.path(), DATA_FOLDER_NAME);
        assert_eq!(dir, home.path().join(DATA_FOLDER_NAME));
        assert!(dir.is_dir());
        assert!(!cwd.path().join(DATA_FOLDER_NAME).exists());
    }
}
