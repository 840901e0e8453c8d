//! Common helpers for kiln-engine integration tests
//!
//! - In-memory blueprint fixtures
//! - Engine construction over a fixture catalog
//! - A filesystem that fails on a chosen write
//! - Directory snapshots for before/after comparisons

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use kiln_core::types::ConflictPolicy;
use kiln_core::EngineConfig;
use kiln_engine::{BlueprintSource, Catalog, Engine, Filesystem, LocalFilesystem, MemorySource};
use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ─── Blueprint Fixtures ──────────────────────────────────────────────────────

pub const SERVICE_ID: &str = "go-api";

/// Go service blueprint where three files declare the same pq version
pub const SERVICE_MANIFEST: &str = r#"
id: go-api
version: "0.3.0"
variables:
  - name: Name
    required: true
  - name: DatabaseDriver
    kind: enum
    choices: ["", "postgres", "mysql"]
    default: ""
  - name: Metrics
    kind: bool
    default: false
files:
  - source: main.go.tmpl
    destination: "cmd/{{.Name}}/main.go"
  - source: db.go.tmpl
    destination: internal/db/db.go
    condition: 'DatabaseDriver == "postgres"'
    dependencies:
      - module: github.com/lib/pq
        version: v1.10.9
  - source: migrate.go.tmpl
    destination: internal/db/migrate.go
    condition: 'DatabaseDriver == "postgres"'
    dependencies:
      - module: github.com/lib/pq
        version: v1.10.9
  - source: repo.go.tmpl
    destination: internal/repo/repo.go
    condition: 'DatabaseDriver != ""'
    dependencies:
      - module: github.com/lib/pq
        version: v1.10.9
        condition: 'DatabaseDriver == "postgres"'
  - source: metrics.go.tmpl
    destination: internal/metrics/metrics.go
    condition: Metrics
  - source: README.md.tmpl
    destination: README.md
manifest:
  path: go.mod
  format: go-mod
  header: "module example.com/{{ Name }}"
"#;

pub fn service_source() -> MemorySource {
    MemorySource::new("fixtures")
        .with_manifest(SERVICE_ID, SERVICE_MANIFEST)
        .with_template(SERVICE_ID, "main.go.tmpl", "package main\n\n// {{ Name }}\n")
        .with_template(
            SERVICE_ID,
            "db.go.tmpl",
            "package db\n\nconst Driver = \"{{ DatabaseDriver }}\"\n",
        )
        .with_template(SERVICE_ID, "migrate.go.tmpl", "package db\n")
        .with_template(SERVICE_ID, "repo.go.tmpl", "package repo\n")
        .with_template(SERVICE_ID, "metrics.go.tmpl", "package metrics\n")
        .with_template(
            SERVICE_ID,
            "README.md.tmpl",
            "# {{ Name | title_case }}\n{% if Metrics %}\nMetrics enabled.\n{% endif %}",
        )
}

/// Two entries rendering to the same destination
pub const COLLIDING_MANIFEST: &str = r#"
id: colliding
variables:
  - name: Name
    default: demo
files:
  - source: a.tmpl
    destination: /README.md
  - source: b.tmpl
    destination: README.md
"#;

pub fn colliding_source() -> MemorySource {
    MemorySource::new("collisions")
        .with_manifest("colliding", COLLIDING_MANIFEST)
        .with_template("colliding", "a.tmpl", "a")
        .with_template("colliding", "b.tmpl", "b")
}

/// Blueprint-level dependencies without a manifest section
pub const LIBRARY_MANIFEST: &str = r#"
id: library
variables:
  - name: Http
    kind: bool
    default: true
files:
  - source: lib.tmpl
    destination: lib.go
    dependencies:
      - module: github.com/stretchr/testify
        version: v1.8.4
dependencies:
  - module: github.com/stretchr/testify
    version: v1.9.0
  - module: github.com/go-chi/chi/v5
    version: v5.0.12
    condition: Http
"#;

pub fn library_source() -> MemorySource {
    MemorySource::new("library")
        .with_manifest("library", LIBRARY_MANIFEST)
        .with_template("library", "lib.tmpl", "package lib\n")
}

// ─── Engine Builders ─────────────────────────────────────────────────────────

pub fn test_config() -> EngineConfig {
    EngineConfig {
        render_workers: 4,
        include_embedded: false,
        ..EngineConfig::default()
    }
}

pub fn engine_with(sources: Vec<MemorySource>) -> Engine {
    engine_with_config(sources, test_config())
}

pub fn engine_with_config(sources: Vec<MemorySource>, config: EngineConfig) -> Engine {
    let boxed: Vec<Box<dyn BlueprintSource>> = sources
        .into_iter()
        .map(|s| Box::new(s) as Box<dyn BlueprintSource>)
        .collect();
    let catalog = Catalog::load(&boxed).unwrap();
    Engine::new(Arc::new(catalog), config)
}

pub fn fixture_engine() -> Engine {
    engine_with(vec![service_source(), colliding_source(), library_source()])
}

pub fn strict_engine() -> Engine {
    engine_with_config(
        vec![service_source(), library_source()],
        EngineConfig {
            conflict_policy: ConflictPolicy::Fail,
            ..test_config()
        },
    )
}

// ─── Filesystem Helpers ──────────────────────────────────────────────────────

pub fn temp_root() -> (TempDir, Utf8PathBuf) {
    let temp = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

/// Every file under `root` with its contents, keyed by relative path
pub fn snapshot(root: &Utf8Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(base: &Utf8Path, dir: &Utf8Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in dir.read_dir_utf8().unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            if path.is_dir() {
                walk(base, path, out);
            } else {
                let rel = path.strip_prefix(base).unwrap().to_string();
                out.insert(rel, std::fs::read(path).unwrap());
            }
        }
    }

    let mut out = BTreeMap::new();
    if root.exists() {
        walk(root, root, &mut out);
    }
    out
}

/// Local filesystem whose `fail_at`-th file write (1-based) fails
#[derive(Debug)]
pub struct FailingFilesystem {
    fail_at: usize,
    writes: AtomicUsize,
}

impl FailingFilesystem {
    pub fn new(fail_at: usize) -> Self {
        Self {
            fail_at,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Filesystem for FailingFilesystem {
    fn exists(&self, path: &Utf8Path) -> bool {
        LocalFilesystem.exists(path)
    }

    fn is_dir(&self, path: &Utf8Path) -> bool {
        LocalFilesystem.is_dir(path)
    }

    fn is_dir_empty(&self, path: &Utf8Path) -> io::Result<bool> {
        LocalFilesystem.is_dir_empty(path)
    }

    fn create_dir(&self, path: &Utf8Path) -> io::Result<()> {
        LocalFilesystem.create_dir(path)
    }

    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_at {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected failure writing {}", path),
            ));
        }
        LocalFilesystem.write_file(path, contents)
    }

    fn read_file(&self, path: &Utf8Path) -> io::Result<Vec<u8>> {
        LocalFilesystem.read_file(path)
    }

    fn remove_file(&self, path: &Utf8Path) -> io::Result<()> {
        LocalFilesystem.remove_file(path)
    }

    fn remove_dir(&self, path: &Utf8Path) -> io::Result<()> {
        LocalFilesystem.remove_dir(path)
    }
}
