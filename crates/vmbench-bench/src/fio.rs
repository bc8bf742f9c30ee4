//! Flexible I/O tester (fio) catalogue and output model
//!
//! All commands request JSON output and unlink their working files. The
//! parameters come from published disk-benchmark recipes, adjusted where
//! the originals assume more disk space than a cloned VM image has.

use crate::Benchmark;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// The fio workload catalogue
pub const BENCHMARKS: &[Benchmark] = &[
    Benchmark {
        // Ars Technica's "Single 4KiB random write process" test[1]
        //
        // [1]: https://arstechnica.com/gadgets/2020/02/how-fast-are-your-disks-find-out-the-open-source-way-with-fio/
        name: "Single 4KiB random write process",
        command: "fio --name=benchmark --ioengine=posixaio --rw=randwrite --bs=4k --size=4g --numjobs=1 --iodepth=1 --runtime=60 --time_based --end_fsync=1 --output-format json --unlink 1",
    },
    Benchmark {
        // Ars Technica's "16 parallel 64KiB random write processes"
        // test, with group reporting for easier analysis
        name: "16 parallel 64KiB random write processes",
        command: "fio --name=benchmark --ioengine=posixaio --rw=randwrite --bs=64k --size=256m --numjobs=16 --iodepth=16 --runtime=60 --time_based --end_fsync=1 --output-format json --unlink 1 --group_reporting",
    },
    Benchmark {
        // Ars Technica's single large-block test, reduced from 16 to
        // 10 GB to avoid "No space left on device"
        name: "Single 1MiB random write process",
        command: "fio --name=benchmark --ioengine=posixaio --rw=randwrite --bs=1m --size=10g --numjobs=1 --iodepth=1 --runtime=60 --time_based --end_fsync=1 --output-format json --unlink 1",
    },
    Benchmark {
        // Oracle's IOPS random read/write test[1], with file size reduced
        // from 500 GB to 2 GB and posixaio instead of libaio
        //
        // [1]: https://docs.oracle.com/en-us/iaas/Content/Block/References/samplefiocommandslinux.htm#FIO_Commands
        name: "Random reads/writes (4k)",
        command: "fio --name=benchmark --size=2GB --direct=1 --rw=randrw --bs=4k --ioengine=posixaio --iodepth=256 --runtime=120 --numjobs=4 --time_based --group_reporting --output-format json --unlink 1",
    },
    Benchmark {
        // Oracle's throughput random read/write test, same adjustments
        name: "Random reads/writes (64k)",
        command: "fio --name=benchmark --size=2GB --direct=1 --rw=randrw --bs=64k --ioengine=posixaio --iodepth=64 --runtime=120 --numjobs=4 --time_based --group_reporting --output-format json --unlink 1",
    },
    Benchmark {
        // Red Hat's etcd fsync latency check[1]
        //
        // [1]: https://access.redhat.com/solutions/5726511
        name: "sync test",
        command: "mkdir -p test-data && fio --name=benchmark --rw=write --ioengine=sync --fdatasync=1 --directory=test-data --size=22m --bs=2300 --output-format json --unlink 1",
    },
];

/// Top-level structure of fio's JSON output
#[derive(Debug, Deserialize)]
pub struct Report {
    /// Per-job results; with group reporting there is exactly one
    pub jobs: Vec<Job>,
}

/// One fio job
#[derive(Debug, Deserialize)]
pub struct Job {
    /// Job name
    #[serde(rename = "jobname")]
    pub name: String,
    /// Read statistics
    #[serde(default)]
    pub read: Stats,
    /// Write statistics
    #[serde(default)]
    pub write: Stats,
    /// Sync statistics
    #[serde(default)]
    pub sync: Stats,
}

/// Bandwidth, IOPS and latency for one direction
#[derive(Debug, Default, Deserialize)]
pub struct Stats {
    /// Bandwidth in KiB/s
    #[serde(default)]
    pub bw: f64,
    /// I/O operations per second
    #[serde(default)]
    pub iops: f64,
    /// Completion latency in nanoseconds
    #[serde(default, rename = "lat_ns")]
    pub latency_ns: Latency,
}

/// Latency distribution summary
#[derive(Debug, Default, Deserialize)]
pub struct Latency {
    /// Mean latency in nanoseconds
    #[serde(default)]
    pub mean: f64,
    /// Standard deviation in nanoseconds
    #[serde(default)]
    pub stddev: f64,
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mean = Duration::from_nanos(self.mean as u64);
        let stddev = Duration::from_nanos(self.stddev as u64);
        write!(f, "{mean:?} ± {stddev:?}")
    }
}

/// Parse fio's JSON output
///
/// # Errors
/// Returns the underlying deserialization error when the bytes are not
/// the expected JSON shape.
pub fn parse(stdout: &[u8]) -> Result<Report, serde_json::Error> {
    serde_json::from_slice(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "fio version": "fio-3.36",
        "jobs": [
            {
                "jobname": "benchmark",
                "read": {"bw": 0, "iops": 0.0, "lat_ns": {"mean": 0.0, "stddev": 0.0}},
                "write": {
                    "bw": 81920,
                    "iops": 20480.5,
                    "lat_ns": {"mean": 48000.0, "stddev": 1200.0}
                },
                "sync": {"bw": 0, "iops": 0.0, "lat_ns": {"mean": 0.0, "stddev": 0.0}}
            }
        ]
    }"#;

    #[test]
    fn parses_write_stats() {
        let report = parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(report.jobs.len(), 1);

        let job = &report.jobs[0];
        assert_eq!(job.name, "benchmark");
        assert_eq!(job.write.bw, 81920.0);
        assert_eq!(job.write.iops, 20480.5);
        assert_eq!(job.write.latency_ns.mean, 48000.0);
    }

    #[test]
    fn missing_directions_default_to_zero() {
        let report = parse(br#"{"jobs": [{"jobname": "j"}]}"#).unwrap();
        assert_eq!(report.jobs[0].write.bw, 0.0);
        assert_eq!(report.jobs[0].sync.iops, 0.0);
    }

    #[test]
    fn rejects_non_json_output() {
        assert!(parse(b"fio: command not found").is_err());
    }

    #[test]
    fn latency_display() {
        let latency = Latency {
            mean: 48000.0,
            stddev: 1200.0,
        };
        assert_eq!(latency.to_string(), "48µs ± 1.2µs");
    }

    #[test]
    fn catalogue_requests_json_everywhere() {
        for benchmark in BENCHMARKS {
            assert!(
                benchmark.command.contains("--output-format json"),
                "{} must produce parseable output",
                benchmark.name
            );
        }
    }
}
