use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use tempfile::tempdir;

use drive_sweep::analysis::{self, PathStatus};
use drive_sweep::platform::FixedOwnerResolver;
use drive_sweep::{ScanController, ScanEvent, ScanRequest, SilentReporter};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[test]
fn test_scan_then_report_unused() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("archive")).unwrap();
    fs::create_dir_all(root.join("current")).unwrap();

    let now = SystemTime::now();
    let stale = root.join("archive/2019.zip");
    let touched = root.join("archive/read_last_week.zip");
    let fresh = root.join("current/notes.md");
    fs::write(&stale, vec![0u8; 300]).unwrap();
    fs::write(&touched, vec![0u8; 200]).unwrap();
    fs::write(&fresh, b"todo").unwrap();

    let long_ago = FileTime::from_system_time(now - DAY * 1_000);
    let last_week = FileTime::from_system_time(now - DAY * 7);
    filetime::set_file_times(&stale, long_ago, long_ago).unwrap();
    filetime::set_file_times(&touched, last_week, long_ago).unwrap();

    let controller = ScanController::new()
        .with_resolver(Arc::new(FixedOwnerResolver("svc".to_string())));
    let handle = controller.start(ScanRequest::new(root)).unwrap();
    let paths: Vec<PathBuf> = handle
        .events()
        .iter()
        .filter_map(|event| match event {
            ScanEvent::FileDiscovered(record) => Some(record.path),
            _ => None,
        })
        .collect();
    handle.wait();
    assert_eq!(paths.len(), 3);

    let unused = analysis::find_unused(&paths, 180, now);
    assert_eq!(unused.len(), 1);
    assert_eq!(unused[0].path, stale);
    assert_eq!(unused[0].size, 300);
}

#[test]
fn test_remove_from_path_list() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    let a = root.join("a.tmp");
    let b = root.join("b.tmp");
    let dir = root.join("nested");
    fs::write(&a, b"a").unwrap();
    fs::write(&b, b"b").unwrap();
    fs::create_dir(&dir).unwrap();

    let list = format!(
        "{}\n\n   {}  \n{}\n{}\n",
        a.display(),
        b.display(),
        dir.display(),
        root.join("never-existed").display()
    );
    let paths = analysis::parse_path_list(&list);
    assert_eq!(paths.len(), 4);

    let statuses = analysis::validate_paths(&paths);
    assert_eq!(statuses[0].1, PathStatus::File);
    assert_eq!(statuses[2].1, PathStatus::Directory);
    assert_eq!(statuses[3].1, PathStatus::Missing);

    let report = analysis::remove_files(&paths, &AtomicBool::new(false), &SilentReporter);
    assert_eq!(report.deleted, 2);
    assert_eq!(report.failed, 0);
    assert!(!a.exists());
    assert!(!b.exists());
    assert!(dir.exists());
}
