//! Suite orchestration.
//!
//! Cases run on `config.jobs` worker threads, each inside its own workspace.
//! Reports are released to the [`Reporter`] strictly in discovery order, so
//! the console output is identical whatever the job count.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use log::info;
use termcolor::WriteColor;

use crate::config::SuiteConfig;
use crate::discovery::{filter_cases, CategoryCases, FixtureDiscoverer, TestCase};
use crate::error::{HarnessError, Result};
use crate::pipeline::run_case;
use crate::report::{CaseReport, Reporter, SuiteSummary};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop scheduling new cases after the first failure.
    pub fail_fast: bool,
    /// Only run cases whose name contains this substring.
    pub filter: Option<String>,
}

/// Checks the tools, discovers fixtures and runs everything.
///
/// Relative paths in `config` are taken relative to the process working
/// directory, never to the per-case workspace the tools run in.
pub fn run_all<W: WriteColor>(
    config: &SuiteConfig,
    options: &RunOptions,
    reporter: &mut Reporter<W>,
) -> Result<SuiteSummary> {
    let config = config.resolved()?;
    config.validate()?;
    config.check_tools()?;
    let groups = discover(&config, options)?;
    run_suite(&config, &groups, options, reporter)
}

/// Discovery plus the name filter.
pub fn discover(config: &SuiteConfig, options: &RunOptions) -> Result<Vec<CategoryCases>> {
    let mut groups = FixtureDiscoverer::discover(config)?;
    if let Some(filter) = &options.filter {
        filter_cases(&mut groups, filter);
    }
    Ok(groups)
}

/// Runs already discovered cases and returns the aggregate result.
pub fn run_suite<W: WriteColor>(
    config: &SuiteConfig,
    groups: &[CategoryCases],
    options: &RunOptions,
    reporter: &mut Reporter<W>,
) -> Result<SuiteSummary> {
    let started = Instant::now();
    let config = &config.resolved()?;
    let cases: Vec<&TestCase> = groups.iter().flat_map(|g| &g.cases).collect();
    info!(
        "running {} cases in {} categories with {} jobs",
        cases.len(),
        groups.len(),
        config.jobs
    );

    let mut sink = OrderedSink::new(groups, reporter);
    if config.jobs <= 1 || cases.len() <= 1 {
        for (index, case) in cases.iter().enumerate() {
            let report = run_case(config, case);
            let failed = !report.verdict.is_passed();
            sink.push(index, report)?;
            if failed && options.fail_fast {
                break;
            }
        }
    } else {
        run_parallel(config, &cases, options, &mut sink)?;
    }

    let mut summary = sink.finish(cases.len())?;
    summary.not_run = cases.len() - summary.total();
    summary.duration_ms = started.elapsed().as_millis();
    reporter.summary(&summary).map_err(HarnessError::Report)?;
    Ok(summary)
}

fn run_parallel<W: WriteColor>(
    config: &SuiteConfig,
    cases: &[&TestCase],
    options: &RunOptions,
    sink: &mut OrderedSink<'_, W>,
) -> Result<()> {
    let next = AtomicUsize::new(0);
    let stop = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel::<(usize, CaseReport)>();

    thread::scope(|scope| {
        for _ in 0..config.jobs.min(cases.len()) {
            let tx = tx.clone();
            let (next, stop) = (&next, &stop);
            scope.spawn(move || loop {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(case) = cases.get(index) else {
                    break;
                };
                let report = run_case(config, case);
                if options.fail_fast && !report.verdict.is_passed() {
                    stop.store(true, Ordering::SeqCst);
                }
                if tx.send((index, report)).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        for (index, report) in rx {
            if let Err(e) = sink.push(index, report) {
                stop.store(true, Ordering::SeqCst);
                return Err(e);
            }
        }
        Ok(())
    })
}

/// Buffers out-of-order reports and prints them in discovery order, with a
/// header before each category's first case.
struct OrderedSink<'a, W: WriteColor> {
    reporter: &'a mut Reporter<W>,
    summary: SuiteSummary,
    /// `(first case index, name, case count)` per category.
    starts: Vec<(usize, &'a str, usize)>,
    headers_printed: usize,
    next: usize,
    pending: BTreeMap<usize, CaseReport>,
}

impl<'a, W: WriteColor> OrderedSink<'a, W> {
    fn new(groups: &'a [CategoryCases], reporter: &'a mut Reporter<W>) -> Self {
        let mut summary = SuiteSummary::default();
        let mut starts = Vec::with_capacity(groups.len());
        let mut offset = 0;
        for group in groups {
            summary.begin_category(&group.category.name, group.cases.len());
            starts.push((offset, group.category.name.as_str(), group.cases.len()));
            offset += group.cases.len();
        }
        Self {
            reporter,
            summary,
            starts,
            headers_printed: 0,
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    fn push(&mut self, index: usize, report: CaseReport) -> Result<()> {
        self.pending.insert(index, report);
        while let Some(report) = self.pending.remove(&self.next) {
            self.headers_through(self.next)?;
            self.reporter.case(&report).map_err(HarnessError::Report)?;
            self.summary.record(&report);
            self.next += 1;
        }
        Ok(())
    }

    fn headers_through(&mut self, index: usize) -> Result<()> {
        while let Some(&(start, name, count)) = self.starts.get(self.headers_printed) {
            if start > index {
                break;
            }
            self.reporter
                .category(name, count)
                .map_err(HarnessError::Report)?;
            self.headers_printed += 1;
        }
        Ok(())
    }

    /// Prints headers of trailing empty categories once every case ran.
    fn finish(mut self, total: usize) -> Result<SuiteSummary> {
        if self.next == total {
            self.headers_through(total)?;
        }
        Ok(self.summary)
    }
}
