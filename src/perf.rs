use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::json;

/// JSON-lines timing log for generation runs. One `perf.span` line per
/// stage; per-stage totals are appended when the last handle is dropped.
#[derive(Clone)]
pub struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    path: PathBuf,
    span_totals: BTreeMap<String, (f64, u64)>,
    count_totals: BTreeMap<String, u64>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                path,
                span_totals: BTreeMap::new(),
                count_totals: BTreeMap::new(),
            })),
        })
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.inner.lock().ok().map(|state| state.path.clone())
    }

    pub fn log_span_ms(&self, name: &str, run: u64, ms: f64) {
        let line = json!({
            "type": "perf.span",
            "name": name,
            "run": run,
            "unit": "ms",
            "ms": round3(ms),
        });
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.span_totals.entry(name.to_string()).or_insert((0.0, 0));
            entry.0 += ms;
            entry.1 = entry.1.saturating_add(1);
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn log_counts(&self, name: &str, run: u64, counts: &[(&str, u64)]) {
        let values: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(key, value)| (key.to_string(), json!(value)))
            .collect();
        let line = json!({
            "type": "perf.counts",
            "name": name,
            "run": run,
            "counts": values,
        });
        if let Ok(mut state) = self.inner.lock() {
            for (key, value) in counts {
                let entry = state.count_totals.entry(format!("{name}.{key}")).or_insert(0);
                *entry = entry.saturating_add(*value);
            }
            let _ = writeln!(state.writer, "{line}");
        }
    }

    /// Times `f` and records it as a span.
    pub fn time<R>(&self, name: &str, run: u64, f: impl FnOnce() -> R) -> R {
        let started = Instant::now();
        let out = f();
        self.log_span_ms(name, run, started.elapsed().as_secs_f64() * 1000.0);
        out
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

fn round3(ms: f64) -> f64 {
    (ms * 1000.0).round() / 1000.0
}

impl Drop for PerfState {
    fn drop(&mut self) {
        for (name, (ms, count)) in &self.span_totals {
            let avg = if *count == 0 { 0.0 } else { ms / *count as f64 };
            let line = json!({
                "type": "perf.total.span",
                "name": name,
                "unit": "ms",
                "ms": round3(*ms),
                "count": count,
                "avg_ms": round3(avg),
            });
            let _ = writeln!(self.writer, "{line}");
        }
        for (name, value) in &self.count_totals {
            let line = json!({
                "type": "perf.total.count",
                "name": name,
                "value": value,
            });
            let _ = writeln!(self.writer, "{line}");
        }
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .expect("read log")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    #[test]
    fn spans_and_totals_are_json_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("perf.jsonl");
        {
            let perf = PerfLogger::new(&path).expect("perf");
            perf.log_span_ms("capture", 1, 12.5);
            perf.log_span_ms("capture", 2, 7.5);
            let doubled = perf.time("compose", 2, || 21 * 2);
            assert_eq!(doubled, 42);
            perf.log_counts("pdf", 2, &[("bytes", 100)]);
            let clone = perf.clone();
            drop(perf);
            clone.flush();
        }
        let records = lines(&path);
        assert_eq!(records[0]["type"], "perf.span");
        assert_eq!(records[0]["name"], "capture");
        assert_eq!(records[3]["counts"]["bytes"], 100);
        let total = records
            .iter()
            .find(|r| r["type"] == "perf.total.span" && r["name"] == "capture")
            .expect("capture total");
        assert_eq!(total["count"], 2);
        assert_eq!(total["ms"], 20.0);
        assert_eq!(total["avg_ms"], 10.0);
        assert!(
            records
                .iter()
                .any(|r| r["type"] == "perf.total.count" && r["name"] == "pdf.bytes")
        );
    }
}
