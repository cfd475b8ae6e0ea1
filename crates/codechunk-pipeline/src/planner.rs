//! Partitioning of a repository's files into prioritized work units

use crate::loader::FileRef;
use codechunk_config::PoolConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId {
    pub job: JobId,
    pub index: usize,
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/unit-{}", self.job, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Files assigned atomically to one worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub id: UnitId,
    /// Highest priority first
    pub files: Vec<FileRef>,
    /// Highest priority among `files`
    pub priority: Priority,
    pub estimated_ms: u64,
}

impl WorkUnit {
    /// `max(min_unit_timeout_ms, estimated_ms × timeout_multiplier)`
    pub fn timeout(&self, config: &PoolConfig) -> Duration {
        let scaled = (self.estimated_ms as f64 * f64::from(config.timeout_multiplier)).ceil() as u64;
        Duration::from_millis(scaled.max(config.min_unit_timeout_ms))
    }
}

const TEST_MARKERS: &[&str] = &["/test/", "/tests/", "/__tests__/", "/spec/", "/fixtures/"];
const TEST_AFFIXES: &[&str] = &[".test.", ".spec.", "_test.", "_spec."];
const HIGH_MARKERS: &[&str] = &[
    "plugin",
    "controller",
    "service",
    "route",
    "handler",
    "middleware",
];
const ENTRY_STEMS: &[&str] = &["main", "index", "app", "server", "lib", "mod", "__init__", "__main__"];

fn is_test(path: &str) -> bool {
    let wrapped = format!("/{}", path.to_ascii_lowercase());
    let name = file_name(&wrapped);
    TEST_MARKERS.iter().any(|m| wrapped.contains(m))
        || TEST_AFFIXES.iter().any(|a| name.contains(a))
        || name.starts_with("test_")
}

fn is_high_value(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    let name = file_name(&lower);
    let stem = name.split('.').next().unwrap_or(name);
    HIGH_MARKERS.iter().any(|m| lower.contains(m)) || ENTRY_STEMS.contains(&stem)
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Evaluated in order; the first match wins
const RULES: &[(Priority, fn(&str) -> bool)] = &[
    (Priority::Low, is_test),
    (Priority::High, is_high_value),
];

/// Static priority of a file by naming convention
pub fn file_priority(path: &str) -> Priority {
    RULES
        .iter()
        .find(|(_, matches)| matches(path))
        .map_or(Priority::Normal, |(priority, _)| *priority)
}

pub fn estimate_ms(files: &[FileRef], config: &PoolConfig) -> u64 {
    let bytes: u64 = files.iter().map(|f| f.size).sum();
    files.len() as u64 * config.per_file_estimate_ms + bytes.div_ceil(1024) * config.per_kib_estimate_ms
}

/// Split `files` into groups of `ceil(n / workers)`, order each group by file
/// priority and the units by their highest priority. Duplicate paths are dropped.
pub fn plan(files: Vec<FileRef>, job: JobId, workers: usize, config: &PoolConfig) -> Vec<WorkUnit> {
    let mut seen = HashSet::new();
    let files: Vec<FileRef> = files
        .into_iter()
        .filter(|f| seen.insert(f.path.clone()))
        .collect();
    if files.is_empty() {
        return Vec::new();
    }

    let group_size = files.len().div_ceil(workers.max(1));
    let mut groups: Vec<(Priority, Vec<FileRef>)> = files
        .chunks(group_size)
        .map(|group| {
            let mut group = group.to_vec();
            group.sort_by_key(|f| std::cmp::Reverse(file_priority(&f.path)));
            let priority = group
                .first()
                .map_or(Priority::Normal, |f| file_priority(&f.path));
            (priority, group)
        })
        .collect();
    groups.sort_by_key(|(priority, _)| std::cmp::Reverse(*priority));

    groups
        .into_iter()
        .enumerate()
        .map(|(index, (priority, files))| WorkUnit {
            id: UnitId { job, index },
            estimated_ms: estimate_ms(&files, config),
            priority,
            files,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> Vec<FileRef> {
        paths.iter().map(|p| FileRef::new(*p, 2048)).collect()
    }

    #[test]
    fn test_file_priority() {
        assert_eq!(file_priority("src/plugins/auth.js"), Priority::High);
        assert_eq!(file_priority("src/user_service.py"), Priority::High);
        assert_eq!(file_priority("src/index.ts"), Priority::High);
        assert_eq!(file_priority("src/utils/format.ts"), Priority::Normal);
        assert_eq!(file_priority("tests/service_test.rs"), Priority::Low);
        assert_eq!(file_priority("src/app.spec.ts"), Priority::Low);
        assert_eq!(file_priority("test_main.py"), Priority::Low);
    }

    #[test]
    fn test_units_ordered_by_priority() {
        let input = files(&[
            "src/helpers.js",
            "src/other.js",
            "tests/a_test.js",
            "src/util.js",
            "src/routes/users.js",
            "src/format.js",
        ]);
        let units = plan(input, JobId(1), 3, &PoolConfig::default());

        assert_eq!(units.len(), 3);
        assert_eq!(units[0].priority, Priority::High);
        assert_eq!(units[0].files[0].path, "src/routes/users.js");
        // the group holding the test file still leads with its normal file
        let last = units.last().unwrap();
        assert_eq!(last.files[0].path, "src/util.js");
        assert_eq!(last.files[1].path, "tests/a_test.js");
        for (i, unit) in units.iter().enumerate() {
            assert_eq!(unit.id, UnitId { job: JobId(1), index: i });
        }
    }

    #[test]
    fn test_estimate_and_timeout() {
        let config = PoolConfig {
            per_file_estimate_ms: 100,
            per_kib_estimate_ms: 10,
            min_unit_timeout_ms: 500,
            timeout_multiplier: 3.0,
            ..Default::default()
        };
        let units = plan(files(&["a.js", "b.js"]), JobId(0), 1, &config);
        assert_eq!(units[0].estimated_ms, 2 * 100 + 4 * 10);
        assert_eq!(units[0].timeout(&config), Duration::from_millis(720));

        let small = plan(vec![FileRef::new("c.js", 1)], JobId(0), 1, &config);
        assert_eq!(small[0].timeout(&config), Duration::from_millis(500));
    }

    #[test]
    fn test_duplicates_and_empty() {
        assert!(plan(Vec::new(), JobId(0), 4, &PoolConfig::default()).is_empty());
        let units = plan(files(&["a.js", "a.js", "b.js"]), JobId(0), 8, &PoolConfig::default());
        let total: usize = units.iter().map(|u| u.files.len()).sum();
        assert_eq!(total, 2);
    }
}
