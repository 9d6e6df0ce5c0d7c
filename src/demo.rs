//! The console walkthrough: one group, read first with `await_all`, then
//! again member by member.

use crate::{
    deferred::DeferredValue,
    group::DeferredGroup,
    timing::{Lap, Stopwatch},
};
use anyhow::Context as _;
use std::{io, io::Write, time::Duration};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settle {
    Immediately,
    After(Duration),
    Reject(&'static str),
}

#[derive(Clone, Copy, Debug)]
pub struct Member {
    pub label: &'static str,
    pub settle: Settle,
}

#[derive(Clone, Debug)]
pub struct Scenario {
    pub members: Vec<Member>,
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            members: vec![
                Member {
                    label: "Promise 1",
                    settle: Settle::After(Duration::from_secs(1)),
                },
                Member {
                    label: "Promise 2",
                    settle: Settle::Immediately,
                },
                Member {
                    label: "Promise 3",
                    settle: Settle::Immediately,
                },
            ],
        }
    }
}

impl Scenario {
    /// Builds the group. Every member starts here; the delayed ones report
    /// from inside their producer to show it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<W: Write>(&self, out: &mut W) -> io::Result<DeferredGroup<String>> {
        let mut members = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let label = member.label.to_string();
            let value = match member.settle {
                Settle::Immediately => DeferredValue::resolved(label),
                Settle::Reject(reason) => DeferredValue::rejected(reason),
                Settle::After(delay) => {
                    let mut written = Ok(());
                    let value = DeferredValue::new(|settler| {
                        written = writeln!(out, "{label}: producer body runs at construction");
                        settler.resolve_after(delay, label);
                    });
                    written?;
                    value
                }
            };
            members.push(value);
        }
        Ok(DeferredGroup::new(members))
    }
}

pub async fn run_concurrent<W: Write>(
    group: &DeferredGroup<String>,
    out: &mut W,
) -> anyhow::Result<Lap> {
    writeln!(out, "Concurrent (await all)")?;
    let watch = Stopwatch::start("concurrent");

    let mut written = Ok(());
    group
        .await_all(|_, label| {
            if written.is_ok() {
                written = writeln!(out, "{label} - done");
            }
        })
        .await
        .context("concurrent read failed")?;
    written?;

    let lap = watch.stop();
    writeln!(out, "{lap}")?;
    Ok(lap)
}

pub async fn run_sequential<W: Write>(
    group: &DeferredGroup<String>,
    out: &mut W,
) -> anyhow::Result<Lap> {
    writeln!(out, "Sequential (await in order)")?;
    let watch = Stopwatch::start("sequential");

    let mut written = Ok(());
    group
        .await_sequential(|_, label| {
            if written.is_ok() {
                written = writeln!(out, "{label} - done");
            }
        })
        .await
        .context("sequential read failed")?;
    written?;

    let lap = watch.stop();
    writeln!(out, "{lap}")?;
    Ok(lap)
}

/// Aggregate read first, then sequential, over the same group.
pub async fn run<W: Write>(scenario: &Scenario, out: &mut W) -> anyhow::Result<()> {
    let group = scenario.start(out)?;
    tracing::info!(members = group.len(), "group started");

    let concurrent = run_concurrent(&group, out).await?;
    let sequential = run_sequential(&group, out).await?;
    tracing::info!(
        concurrent = ?concurrent.elapsed,
        sequential = ?sequential.elapsed,
        "both strategies finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(out: Vec<u8>) -> Vec<String> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn default_scenario_output() {
        let mut out = Vec::new();
        run(&Scenario::default(), &mut out).await.unwrap();
        let lines = lines(out);

        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "Promise 1: producer body runs at construction");
        assert_eq!(lines[1], "Concurrent (await all)");

        let mut settled = lines[2..5].to_vec();
        assert_eq!(settled[2], "Promise 1 - done");
        settled.sort();
        assert_eq!(
            settled,
            vec!["Promise 1 - done", "Promise 2 - done", "Promise 3 - done"]
        );

        assert_eq!(lines[5], "concurrent: 1000.000ms");
        assert_eq!(
            lines[6..],
            [
                "Sequential (await in order)",
                "Promise 1 - done",
                "Promise 2 - done",
                "Promise 3 - done",
                "sequential: 0.000ms",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_alone_waits_only_for_the_remaining_delay() {
        let mut out = Vec::new();
        let group = Scenario::default().start(&mut out).unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        let lap = run_sequential(&group, &mut out).await.unwrap();
        assert_eq!(lap.elapsed, Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_member_stops_the_run() {
        let scenario = Scenario {
            members: vec![
                Member {
                    label: "A",
                    settle: Settle::After(Duration::from_secs(1)),
                },
                Member {
                    label: "B",
                    settle: Settle::Reject("boom"),
                },
                Member {
                    label: "C",
                    settle: Settle::Immediately,
                },
            ],
        };

        let mut out = Vec::new();
        let err = run(&scenario, &mut out).await.unwrap_err();

        assert_eq!(err.to_string(), "concurrent read failed");
        let chain: Vec<String> = err.chain().map(|e| e.to_string()).collect();
        assert!(chain.contains(&"settlement failed: boom".to_string()));

        let lines = lines(out);
        assert_eq!(lines[0], "A: producer body runs at construction");
        assert_eq!(lines[1], "Concurrent (await all)");
        assert!(!lines.iter().any(|l| l.starts_with("concurrent:")));
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_read_reports_the_failing_member() {
        let scenario = Scenario {
            members: vec![
                Member {
                    label: "A",
                    settle: Settle::After(Duration::from_millis(200)),
                },
                Member {
                    label: "B",
                    settle: Settle::Reject("boom"),
                },
                Member {
                    label: "C",
                    settle: Settle::Immediately,
                },
            ],
        };

        let mut out = Vec::new();
        let group = scenario.start(&mut out).unwrap();
        let err = run_sequential(&group, &mut out).await.unwrap_err();

        assert_eq!(err.to_string(), "sequential read failed");
        let chain: Vec<String> = err.chain().map(|e| e.to_string()).collect();
        assert!(chain.contains(&"member 1 of the group failed".to_string()));
        assert!(chain.contains(&"settlement failed: boom".to_string()));

        assert_eq!(
            lines(out),
            vec![
                "A: producer body runs at construction",
                "Sequential (await in order)",
                "A - done",
            ]
        );
    }
}
