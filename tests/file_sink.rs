// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use filesink::Error;
use filesink::ErrorKind;
use filesink::Level;
use filesink::Trap;
use filesink::append::FileSink;
use filesink::append::file::DEFAULT_MAX_FILE_SIZE;
use filesink::append::file::FileSinkBuilder;
use filesink::append::file::list_archives;
use filesink::layout::TextLayout;
use filesink::record::ErrorDetail;
use jiff::SignedDuration;
use jiff::Timestamp;
use jiff::civil::DateTime;
use jiff::tz::TimeZone;
use tempfile::TempDir;

#[derive(Debug, Default, Clone)]
struct CollectTrap(Arc<Mutex<Vec<String>>>);

impl Trap for CollectTrap {
    fn trap(&self, err: &Error) {
        self.0.lock().unwrap().push(err.to_string());
    }
}

fn builder(dir: &Path, trap: &CollectTrap) -> FileSinkBuilder {
    FileSink::builder(dir.join("app.log"))
        .layout(TextLayout::default().timezone(TimeZone::UTC))
        .timezone(TimeZone::UTC)
        .trap(trap.clone())
        .shutdown_timeout(Duration::from_secs(30))
}

fn info(sink: &FileSink, message: String) {
    sink.log(Level::Information, &message, None, |m, _| {
        Ok::<_, anyhow::Error>(m.clone())
    })
    .unwrap();
}

/// Contents of every archive, oldest first, followed by the active file.
fn files_in_order(dir: &Path) -> Vec<String> {
    let mut contents = list_archives(dir, "app.log")
        .unwrap()
        .iter()
        .map(|archive| fs::read_to_string(archive.path()).unwrap())
        .collect::<Vec<_>>();
    contents.push(fs::read_to_string(dir.join("app.log")).unwrap());
    contents
}

/// Split file contents into entries; continuation lines start with indentation.
fn entries(content: &str) -> Vec<String> {
    let mut entries: Vec<String> = vec![];
    for line in content.lines() {
        match entries.last_mut() {
            Some(entry) if line.starts_with("    ") => {
                entry.push('\n');
                entry.push_str(line);
            }
            _ => entries.push(line.to_string()),
        }
    }
    entries
}

/// The text after the `<timestamp> [<level>] ` header.
fn body(entry: &str) -> &str {
    let (stamp, rest) = entry.split_at(19);
    DateTime::strptime("%Y-%m-%d %H:%M:%S", stamp).unwrap();
    let rest = rest.strip_prefix(" [").unwrap();
    let (_, body) = rest.split_once("] ").unwrap();
    body
}

#[test]
fn test_rotation_happens_only_beyond_threshold() {
    let temp_dir = TempDir::new().unwrap();
    let trap = CollectTrap::default();
    let max_size = 1024;
    let sink = builder(temp_dir.path(), &trap)
        .max_file_size(max_size)
        .build()
        .unwrap();

    for i in 0..200 {
        info(&sink, format!("entry {i:04} {}", "r".repeat(40)));
    }
    sink.close();

    let archives = list_archives(temp_dir.path(), "app.log").unwrap();
    assert!(!archives.is_empty());
    assert_eq!(sink.rotations(), archives.len() as u64);
    for archive in archives {
        let content = fs::read_to_string(archive.path()).unwrap();
        // rotated because it had grown beyond the limit, but by one entry at most
        assert!(content.len() as u64 > max_size);
        let last = content.trim_end_matches('\n').rfind('\n').unwrap();
        assert!(last as u64 + 1 <= max_size);

        let name = archive.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("app.log."));
        assert!(name.ends_with(".bak"));
    }
    assert!(trap.0.lock().unwrap().is_empty());
}

#[test]
fn test_entries_keep_submission_order_across_rotations() {
    let temp_dir = TempDir::new().unwrap();
    let trap = CollectTrap::default();
    let sink = builder(temp_dir.path(), &trap)
        .max_file_size(2048)
        .build()
        .unwrap();

    for i in 0..500 {
        info(&sink, format!("ordered {i}"));
    }
    sink.close();

    let written = files_in_order(temp_dir.path())
        .iter()
        .flat_map(|content| entries(content))
        .map(|entry| body(&entry).to_string())
        .collect::<Vec<_>>();
    let expected = (0..500).map(|i| format!("ordered {i}")).collect::<Vec<_>>();
    assert_eq!(written, expected);
    assert!(sink.rotations() > 0);
}

#[test]
fn test_concurrent_entries_never_interleave() {
    const THREADS: usize = 8;
    const ENTRIES: usize = 200;

    let temp_dir = TempDir::new().unwrap();
    let trap = CollectTrap::default();
    let sink = Arc::new(
        builder(temp_dir.path(), &trap)
            .max_file_size(4096)
            .build()
            .unwrap(),
    );

    let handles = (0..THREADS)
        .map(|t| {
            let sink = sink.clone();
            thread::spawn(move || {
                let error = ErrorDetail::new("boom").with_stack_trace("at worker\nat main");
                for i in 0..ENTRIES {
                    sink.log(Level::Error, &(t, i), Some(&error), |(t, i), _| {
                        Ok::<_, anyhow::Error>(format!("thread {t} entry {i}\nsecond line {t}-{i}"))
                    })
                    .unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }
    sink.close();

    let mut next = [0usize; THREADS];
    let mut total = 0;
    for content in files_in_order(temp_dir.path()) {
        for entry in entries(&content) {
            let text = body(&entry);
            let (head, _) = text.split_once('\n').unwrap();
            let mut words = head.split(' ');
            assert_eq!(words.next(), Some("thread"));
            let t = words.next().unwrap().parse::<usize>().unwrap();
            assert_eq!(words.next(), Some("entry"));
            let i = words.next().unwrap().parse::<usize>().unwrap();

            assert_eq!(
                text,
                format!(
                    "thread {t} entry {i}\n    second line {t}-{i}\n    error: boom\n        at worker\n        at main"
                )
            );
            // each thread's entries stay in the order that thread submitted them
            assert_eq!(i, next[t]);
            next[t] += 1;
            total += 1;
        }
    }
    assert_eq!(total, THREADS * ENTRIES);
    assert!(sink.rotations() > 0);
    assert!(trap.0.lock().unwrap().is_empty());
}

#[test]
fn test_level_gate_drops_entries_before_rendering() {
    let temp_dir = TempDir::new().unwrap();
    let trap = CollectTrap::default();
    let sink = builder(temp_dir.path(), &trap)
        .min_level(Level::Warning)
        .max_file_size(16)
        .build()
        .unwrap();

    let rendered = AtomicUsize::new(0);
    for level in [Level::Trace, Level::Debug, Level::Information] {
        for _ in 0..100 {
            sink.log(level, "quiet", None, |s, _| {
                rendered.fetch_add(1, Ordering::Relaxed);
                Ok::<_, anyhow::Error>(s.to_string())
            })
            .unwrap();
        }
    }
    sink.close();

    assert_eq!(rendered.load(Ordering::Relaxed), 0);
    assert_eq!(fs::metadata(sink.path()).unwrap().len(), 0);
    assert_eq!(sink.rotations(), 0);
    assert!(list_archives(temp_dir.path(), "app.log").unwrap().is_empty());
}

#[test]
fn test_disabled_rotation_lets_file_grow() {
    let temp_dir = TempDir::new().unwrap();
    let trap = CollectTrap::default();
    let sink = builder(temp_dir.path(), &trap)
        .max_file_size(0)
        .build()
        .unwrap();

    let chunk = "z".repeat(64 * 1024);
    let mut written = 0u64;
    while written <= 10 * DEFAULT_MAX_FILE_SIZE {
        info(&sink, chunk.clone());
        written += chunk.len() as u64;
    }
    sink.close();

    assert!(fs::metadata(sink.path()).unwrap().len() > 10 * DEFAULT_MAX_FILE_SIZE);
    assert_eq!(sink.rotations(), 0);
    assert!(list_archives(temp_dir.path(), "app.log").unwrap().is_empty());
}

#[test]
fn test_close_drains_and_rejects_later_entries() {
    let temp_dir = TempDir::new().unwrap();
    let trap = CollectTrap::default();
    let sink = builder(temp_dir.path(), &trap).build().unwrap();

    for i in 0..1000 {
        info(&sink, format!("pending {i}"));
    }
    sink.close();
    sink.close();

    let content = fs::read_to_string(sink.path()).unwrap();
    assert_eq!(content.lines().count(), 1000);
    assert_eq!(sink.dropped(), 0);

    let err = sink
        .log(Level::Critical, "late", None, |s, _| {
            Ok::<_, anyhow::Error>(s.to_string())
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Closed);
    assert_eq!(fs::read_to_string(sink.path()).unwrap(), content);
}

#[test]
fn test_flush_makes_entries_visible() {
    let temp_dir = TempDir::new().unwrap();
    let trap = CollectTrap::default();
    let sink = builder(temp_dir.path(), &trap).build().unwrap();

    info(&sink, "visible".to_string());
    sink.flush().unwrap();

    let content = fs::read_to_string(sink.path()).unwrap();
    assert!(content.ends_with("[Information] visible\n"));
}

#[test]
fn test_build_prunes_expired_archives() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let stamp = |days: i64| {
        (Timestamp::now() - SignedDuration::from_hours(24 * days))
            .to_zoned(TimeZone::UTC)
            .strftime("%Y%m%d%H%M%S")
            .to_string()
    };

    let expired = dir.join(format!("app.log.{}.bak", stamp(40)));
    let expired_collision = dir.join(format!("app.log.{}.1.bak", stamp(40)));
    let recent = dir.join(format!("app.log.{}.bak", stamp(2)));
    let unrelated = dir.join("app.log.old");
    for path in [&expired, &expired_collision, &recent, &unrelated] {
        fs::write(path, "archived\n").unwrap();
    }

    let trap = CollectTrap::default();
    let sink = builder(dir, &trap).retention_days(30).build().unwrap();

    assert!(!expired.exists());
    assert!(!expired_collision.exists());
    assert!(recent.exists());
    assert!(unrelated.exists());
    assert!(sink.path().exists());
    sink.close();
}

#[test]
fn test_config_errors() {
    let temp_dir = TempDir::new().unwrap();

    let err = FileSink::builder("").build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let err = FileSink::builder(temp_dir.path()).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    // a regular file where a parent directory should be
    let blocker = temp_dir.path().join("blocker");
    fs::write(&blocker, "").unwrap();
    let err = FileSink::builder(blocker.join("app.log")).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[cfg(target_os = "linux")]
#[test]
fn test_append_failure_is_trapped_and_sink_stays_usable() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.log");
    std::os::unix::fs::symlink("/dev/full", &path).unwrap();

    let trap = CollectTrap::default();
    let sink = builder(temp_dir.path(), &trap).build().unwrap();

    info(&sink, "lost to a full device".to_string());
    sink.flush().unwrap();
    {
        let trapped = trap.0.lock().unwrap();
        assert_eq!(trapped.len(), 1);
        assert!(trapped[0].contains("failed to append log entry (Append)"));
    }

    // the sink keeps accepting entries and recreates the file once the device is gone
    fs::remove_file(&path).unwrap();
    info(&sink, "kept".to_string());
    sink.close();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.ends_with("[Information] kept\n"));
    assert_eq!(content.lines().count(), 1);
    assert_eq!(sink.dropped(), 0);
}
