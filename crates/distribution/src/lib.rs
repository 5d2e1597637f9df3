//! The distribution of a byte budget across the write targets.
//!
//! The [`Scheduler`] walks the target list strictly in order, asks the
//! allocator for one chunk per target and keeps going no matter how many of
//! the allocations fail. A failed chunk is lost, it is never handed over to the
//! targets that follow.

use std::{
    convert::Infallible,
    path::{Path, PathBuf},
};

use diskfill_disk_space_allocation::Allocate;
use diskfill_targets::{Scope, Target};
use tokio_util::sync::CancellationToken;

mod decreasing;
pub mod progress;

pub use decreasing::Decreasing;
pub use diskfill_disk_space_allocation::ByteSize;

/// How the budget is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The whole budget goes to a single new file under the root.
    Single,
    /// Existing files are extended, each by half of what remains.
    SequentialDecreasing,
    /// A new file is created in every directory, each taking half of what
    /// remains.
    FragmentedDecreasing,
}

impl Mode {
    /// The targets this mode needs, if any.
    pub fn scope(&self) -> Option<Scope> {
        match self {
            Mode::Single => None,
            Mode::SequentialDecreasing => Some(Scope::Files),
            Mode::FragmentedDecreasing => Some(Scope::Directories),
        }
    }
}

/// What to do with the file at the planned path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Create a new file.
    Create,
    /// Extend an existing file.
    Extend,
}

/// A single planned allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    /// The position of the target in the run.
    pub index: usize,
    /// The file to allocate the chunk for.
    pub path: PathBuf,
    /// The size of the chunk.
    pub size: ByteSize,
    /// Whether the file is to be created or extended.
    pub disposition: Disposition,
}

/// The job to run.
#[derive(Debug, Clone)]
pub struct Job {
    /// The distribution mode.
    pub mode: Mode,
    /// The root path, the single file is created here.
    pub root: PathBuf,
    /// The targets snapshot, in processing order.
    pub targets: Vec<Target>,
    /// The total budget to distribute.
    pub budget: ByteSize,
}

impl Job {
    /// The amount of targets that will be processed.
    pub fn target_count(&self) -> usize {
        match self.mode {
            Mode::Single => 1,
            Mode::SequentialDecreasing | Mode::FragmentedDecreasing => self.targets.len(),
        }
    }

    /// The chunk plans, in processing order.
    ///
    /// New file names are random, so every call yields fresh paths for the
    /// files to create.
    pub fn plans(&self) -> Box<dyn Iterator<Item = ChunkPlan> + '_> {
        match self.mode {
            Mode::Single => Box::new(std::iter::once(ChunkPlan {
                index: 0,
                path: self.root.join(new_file_name()),
                size: self.budget,
                disposition: Disposition::Create,
            })),
            Mode::SequentialDecreasing => Box::new(self.decreasing(|target| {
                (target.path.clone(), Disposition::Extend)
            })),
            Mode::FragmentedDecreasing => Box::new(self.decreasing(|target| {
                (target.path.join(new_file_name()), Disposition::Create)
            })),
        }
    }

    /// Pair up the targets with the decreasing chunk sizes.
    fn decreasing<'a>(
        &'a self,
        resolve: impl Fn(&Target) -> (PathBuf, Disposition) + 'a,
    ) -> impl Iterator<Item = ChunkPlan> + 'a {
        let sizes = Decreasing::new(self.budget, self.targets.len());
        self.targets
            .iter()
            .zip(sizes)
            .enumerate()
            .map(move |(index, (target, size))| {
                let (path, disposition) = resolve(target);
                ChunkPlan {
                    index,
                    path,
                    size,
                    disposition,
                }
            })
    }
}

/// Generate a name for a new file.
fn new_file_name() -> String {
    format!("f{:016x}.dat", rand::random::<u64>())
}

/// The best-effort step applied to every successfully allocated file.
pub trait Conceal {
    /// An error that can occur while concealing.
    type Error: std::fmt::Display;

    /// Conceal the file at `path`, return where it is now.
    fn conceal(&self, path: &Path) -> Result<PathBuf, Self::Error>;
}

/// Leave the files as they are.
#[derive(Debug, Default)]
pub struct NoConceal;

impl Conceal for NoConceal {
    type Error = Infallible;

    fn conceal(&self, path: &Path) -> Result<PathBuf, Self::Error> {
        Ok(path.to_path_buf())
    }
}

/// The summary of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    /// The amount of targets in the run.
    pub targets: usize,
    /// The amount of successful allocations.
    pub succeeded: usize,
    /// The amount of failed allocations.
    pub failed: usize,
    /// The bytes successfully allocated.
    pub allocated: ByteSize,
    /// The bytes lost to the failed allocations.
    pub forfeited: ByteSize,
    /// The amount of files that could not be concealed.
    pub conceal_failures: usize,
    /// Whether the run was stopped before processing all the targets.
    pub interrupted: bool,
}

/// The scheduler.
pub struct Scheduler<A, C, R> {
    /// The allocator to allocate the chunks with.
    pub allocator: A,
    /// The step to apply to the allocated files, if any.
    pub concealer: Option<C>,
    /// The progress reporter.
    pub reporter: R,
    /// Cancellation token.
    /// When the cancellation is triggered, the [`Scheduler::run`] stops before the next
    /// target; the allocation in flight is always completed.
    pub cancel: CancellationToken,
}

impl<A, C, R> Scheduler<A, C, R>
where
    A: Allocate,
    C: Conceal,
    R: progress::Reporter,
{
    /// Run the given job to completion (or cancellation).
    pub fn run(&self, job: &Job) -> Report {
        let mut report = Report {
            targets: job.target_count(),
            ..Report::default()
        };

        if report.targets == 0 {
            tracing::info!(message = "0 targets, nothing to do", root = %job.root.display());
            return report;
        }

        self.reporter.start(report.targets);

        for plan in job.plans() {
            if self.cancel.is_cancelled() {
                tracing::info!(message = "interrupted", processed = plan.index, total = report.targets);
                report.interrupted = true;
                break;
            }

            let outcome = match plan.disposition {
                Disposition::Create => self.allocator.allocate(&plan.path, plan.size),
                Disposition::Extend => self.allocator.extend(&plan.path, plan.size),
            };
            self.reporter.report(&plan, &outcome);

            match outcome {
                Ok(_) => {
                    report.succeeded += 1;
                    report.allocated += plan.size;
                    self.conceal(&plan.path, &mut report);
                }
                Err(err) => {
                    tracing::warn!(
                        message = "allocation failed",
                        path = %plan.path.display(),
                        size = %plan.size,
                        error = %err
                    );
                    report.failed += 1;
                    report.forfeited += plan.size;
                }
            }
        }

        report
    }

    /// Apply the concealment step, if there is one.
    fn conceal(&self, path: &Path, report: &mut Report) {
        let Some(concealer) = &self.concealer else {
            return;
        };
        match concealer.conceal(path) {
            Ok(concealed) => {
                tracing::debug!(message = "concealed", path = %concealed.display());
            }
            Err(err) => {
                tracing::warn!(message = "unable to conceal", path = %path.display(), error = %err);
                report.conceal_failures += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diskfill_disk_space_allocation::{AllocationError, Allocator, Strategy};
    use diskfill_targets::Kind;
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, collections::HashSet, fs, io};

    /// Records the calls, fails the ones at the given positions.
    #[derive(Debug, Default)]
    struct FakeAllocator {
        fail_at: HashSet<usize>,
        calls: RefCell<Vec<(PathBuf, ByteSize, Disposition)>>,
    }

    impl FakeAllocator {
        fn failing_at(positions: impl IntoIterator<Item = usize>) -> Self {
            Self {
                fail_at: positions.into_iter().collect(),
                ..Self::default()
            }
        }

        fn record(
            &self,
            path: &Path,
            len: ByteSize,
            disposition: Disposition,
        ) -> Result<Strategy, AllocationError> {
            let mut calls = self.calls.borrow_mut();
            let position = calls.len();
            calls.push((path.to_path_buf(), len, disposition));
            if self.fail_at.contains(&position) {
                return Err(io::Error::from(io::ErrorKind::StorageFull).into());
            }
            Ok(Strategy::Preallocated)
        }

        fn sizes(&self) -> Vec<ByteSize> {
            self.calls.borrow().iter().map(|(_, size, _)| *size).collect()
        }
    }

    impl Allocate for FakeAllocator {
        fn allocate(&self, path: &Path, len: ByteSize) -> Result<Strategy, AllocationError> {
            self.record(path, len, Disposition::Create)
        }

        fn extend(&self, path: &Path, len: ByteSize) -> Result<Strategy, AllocationError> {
            self.record(path, len, Disposition::Extend)
        }
    }

    /// Always fails, counting the attempts.
    #[derive(Debug, Default)]
    struct FailingConceal {
        attempts: RefCell<usize>,
    }

    impl Conceal for FailingConceal {
        type Error = String;

        fn conceal(&self, _path: &Path) -> Result<PathBuf, Self::Error> {
            *self.attempts.borrow_mut() += 1;
            Err("nope".to_owned())
        }
    }

    fn scheduler<A: Allocate>(allocator: A) -> Scheduler<A, NoConceal, progress::NoopReporter> {
        Scheduler {
            allocator,
            concealer: None,
            reporter: progress::NoopReporter,
            cancel: CancellationToken::new(),
        }
    }

    fn targets(kind: Kind, count: usize) -> Vec<Target> {
        (0..count)
            .map(|index| Target {
                path: PathBuf::from(format!("/t/{index}")),
                kind,
            })
            .collect()
    }

    fn job(mode: Mode, targets: Vec<Target>, budget: ByteSize) -> Job {
        Job {
            mode,
            root: PathBuf::from("/root-dir"),
            targets,
            budget,
        }
    }

    #[test]
    fn single_mode_allocates_everything_once() {
        let scheduler = scheduler(FakeAllocator::default());

        let report = scheduler.run(&job(Mode::Single, Vec::new(), 1000));

        let calls = scheduler.allocator.calls.borrow();
        assert_eq!(calls.len(), 1);
        let (path, size, disposition) = &calls[0];
        assert_eq!(path.parent(), Some(Path::new("/root-dir")));
        assert_eq!(*size, 1000);
        assert_eq!(*disposition, Disposition::Create);
        assert_eq!(report.allocated, 1000);
        assert_eq!(report.targets, 1);
    }

    #[test]
    fn sequential_mode_extends_targets_in_order() {
        let scheduler = scheduler(FakeAllocator::default());
        let targets = targets(Kind::File, 3);

        let report = scheduler.run(&job(Mode::SequentialDecreasing, targets.clone(), 1000));

        let calls = scheduler.allocator.calls.borrow();
        let expected: Vec<(PathBuf, ByteSize, Disposition)> = targets
            .into_iter()
            .zip([500, 250, 250])
            .map(|(target, size)| (target.path, size, Disposition::Extend))
            .collect();
        assert_eq!(*calls, expected);
        assert_eq!(
            report,
            Report {
                targets: 3,
                succeeded: 3,
                failed: 0,
                allocated: 1000,
                forfeited: 0,
                conceal_failures: 0,
                interrupted: false,
            }
        );
    }

    #[test]
    fn fragmented_mode_creates_new_files_in_directories() {
        let scheduler = scheduler(FakeAllocator::default());
        let targets = targets(Kind::Directory, 2);

        scheduler.run(&job(Mode::FragmentedDecreasing, targets.clone(), 10));

        let calls = scheduler.allocator.calls.borrow();
        assert_eq!(calls.len(), 2);
        for ((path, _, disposition), target) in calls.iter().zip(&targets) {
            assert_eq!(path.parent(), Some(target.path.as_path()));
            assert_eq!(*disposition, Disposition::Create);
            let name = path.file_name().unwrap().to_str().unwrap();
            assert!(name.starts_with('f') && name.ends_with(".dat"), "{name}");
        }
        assert_eq!(scheduler.allocator.sizes(), [5, 5]);
    }

    #[test]
    fn failed_target_forfeits_its_chunk() {
        let scheduler = scheduler(FakeAllocator::failing_at([0]));

        let report = scheduler.run(&job(Mode::SequentialDecreasing, targets(Kind::File, 3), 1000));

        assert_eq!(scheduler.allocator.sizes(), [500, 250, 250]);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.allocated, 500);
        assert_eq!(report.forfeited, 500);
    }

    #[test]
    fn failures_never_stop_the_run() {
        let total = 1 << 20;
        let count = 8;
        let expected: Vec<ByteSize> = Decreasing::new(total, count).collect();

        for failing in 0..count {
            let scheduler = scheduler(FakeAllocator::failing_at([failing]));

            let report = scheduler.run(&job(
                Mode::FragmentedDecreasing,
                targets(Kind::Directory, count),
                total,
            ));

            assert_eq!(scheduler.allocator.sizes(), expected);
            let allocated: ByteSize = expected
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != failing)
                .map(|(_, size)| size)
                .sum();
            assert_eq!(report.allocated, allocated);
            assert_eq!(report.forfeited, expected[failing]);
            assert_eq!(report.succeeded, count - 1);
        }
    }

    #[test]
    fn zero_targets_is_a_noop() {
        let scheduler = scheduler(FakeAllocator::default());

        let report = scheduler.run(&job(Mode::FragmentedDecreasing, Vec::new(), 1000));

        assert!(scheduler.allocator.calls.borrow().is_empty());
        assert_eq!(report, Report::default());
    }

    #[test]
    fn cancelled_run_allocates_nothing() {
        let scheduler = scheduler(FakeAllocator::default());
        scheduler.cancel.cancel();

        let report = scheduler.run(&job(Mode::SequentialDecreasing, targets(Kind::File, 3), 1000));

        assert!(scheduler.allocator.calls.borrow().is_empty());
        assert!(report.interrupted);
        assert_eq!(report.succeeded, 0);
    }

    #[test]
    fn conceal_failures_do_not_affect_the_budget() {
        let scheduler = Scheduler {
            allocator: FakeAllocator::failing_at([1]),
            concealer: Some(FailingConceal::default()),
            reporter: progress::NoopReporter,
            cancel: CancellationToken::new(),
        };

        let report = scheduler.run(&job(Mode::SequentialDecreasing, targets(Kind::File, 3), 1000));

        assert_eq!(scheduler.allocator.sizes(), [500, 250, 250]);
        // Only the successful allocations get concealed.
        assert_eq!(*scheduler.concealer.as_ref().unwrap().attempts.borrow(), 2);
        assert_eq!(report.conceal_failures, 2);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.allocated, 750);
    }

    #[test]
    fn fragmented_mode_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let directories: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::create_dir(&path).unwrap();
                Target {
                    path,
                    kind: Kind::Directory,
                }
            })
            .collect();
        let scheduler = scheduler(Allocator::new());

        let report = scheduler.run(&Job {
            mode: Mode::FragmentedDecreasing,
            root: dir.path().to_path_buf(),
            targets: directories.clone(),
            budget: 1000,
        });

        assert_eq!(report.allocated, 1000);
        let sizes: Vec<u64> = directories
            .iter()
            .map(|target| {
                let entries: Vec<_> = fs::read_dir(&target.path)
                    .unwrap()
                    .map(|entry| entry.unwrap())
                    .collect();
                assert_eq!(entries.len(), 1);
                entries[0].metadata().unwrap().len()
            })
            .collect();
        assert_eq!(sizes, [500, 250, 250]);
    }

    #[test]
    fn sequential_mode_reports_vanished_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.txt");
        fs::write(&present, b"data").unwrap();
        let files = vec![
            Target {
                path: dir.path().join("vanished.txt"),
                kind: Kind::File,
            },
            Target {
                path: present.clone(),
                kind: Kind::File,
            },
        ];
        let scheduler = scheduler(Allocator::new());

        let report = scheduler.run(&Job {
            mode: Mode::SequentialDecreasing,
            root: dir.path().to_path_buf(),
            targets: files,
            budget: 100,
        });

        assert_eq!(report.failed, 1);
        assert_eq!(report.forfeited, 50);
        assert!(!dir.path().join("vanished.txt").exists());
        assert_eq!(fs::metadata(&present).unwrap().len(), 4 + 50);
    }
}
