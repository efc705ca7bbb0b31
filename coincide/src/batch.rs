//! Conforming many candidate rasters to one reference.

use crate::{align, ErrorKind, MatchError, Reproject, Resampler, Resampling};
use georaster::{outname, BilIo, Grid, RasterBuffer, RasterIo, SampleType, WriteOutcome};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};
use tempfile::TempDir;

/// Prefix of per-candidate scratch directories.
const SCRATCH_PREFIX: &str = ".coincide-";

/// Cooperative cancellation flag shared between a caller and a batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What a batch does after a candidate fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FailurePolicy {
    /// Record the failure and carry on.
    #[default]
    Continue,
    /// Record the failure and cancel every candidate not yet done.
    FailFast,
}

/// Batch configuration.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// Output directory. `None` writes next to each candidate.
    out_dir: Option<PathBuf>,

    /// Appended to each candidate's stem to name its output.
    suffix: String,

    /// NoData of aligned outputs. `None` keeps each candidate's.
    nodata: Option<f32>,

    sample_type: SampleType,

    /// How to resample candidates whose cell size differs from the
    /// reference. `None` rejects them.
    resampling: Option<Resampling>,

    failure_policy: FailurePolicy,

    /// Per-candidate time limit, checked between steps.
    timeout: Option<Duration>,

    cancel: CancelToken,

    /// Number of candidates processed concurrently.
    workers: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            out_dir: None,
            suffix: "matched".to_owned(),
            nodata: None,
            sample_type: SampleType::Float32,
            resampling: None,
            failure_policy: FailurePolicy::Continue,
            timeout: None,
            cancel: CancelToken::new(),
            workers: 1,
        }
    }
}

impl MatchOptions {
    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn nodata(mut self, nodata: f32) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = sample_type;
        self
    }

    pub fn resampling(mut self, method: Resampling) -> Self {
        self.resampling = Some(method);
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// A candidate that was aligned and written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedRaster {
    pub input: PathBuf,
    pub output: PathBuf,
    pub width: usize,
    pub height: usize,
    /// Metadata that could not be written alongside the output.
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub struct CandidateReport {
    pub input: PathBuf,
    pub result: Result<MatchedRaster, MatchError>,
}

/// Per-candidate results of [BatchMatcher::match_all], in input
/// order.
#[derive(Debug)]
pub struct BatchReport {
    pub entries: Vec<CandidateReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &MatchedRaster> {
        self.entries.iter().filter_map(|e| e.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Path, &MatchError)> {
        self.entries
            .iter()
            .filter_map(|e| e.result.as_ref().err().map(|err| (e.input.as_path(), err)))
    }

    /// Returns every output, or the first failure.
    pub fn into_result(self) -> Result<Vec<MatchedRaster>, MatchError> {
        self.entries.into_iter().map(|e| e.result).collect()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            matched: self.succeeded().cloned().collect(),
            failed: self
                .failed()
                .map(|(input, err)| FailedCandidate {
                    input: input.to_owned(),
                    kind: err.kind(),
                    message: err.to_string(),
                })
                .collect(),
        }
    }
}

/// Serializable view of a [BatchReport].
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub matched: Vec<MatchedRaster>,
    pub failed: Vec<FailedCandidate>,
}

#[derive(Debug, Serialize)]
pub struct FailedCandidate {
    pub input: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

/// Conforms candidate rasters to a reference grid.
///
/// Calls into `io`, and into `reproject` unless it opts out through
/// [Reproject::serialized], are serialized: they stand in for
/// geoprocessing toolkits that are rarely safe to drive from several
/// threads. Alignment runs on up to [MatchOptions::workers] threads.
pub struct BatchMatcher<I = BilIo, R = Resampler> {
    io: I,
    reproject: R,
    options: MatchOptions,
    toolkit: Mutex<()>,
}

impl BatchMatcher {
    /// Returns a matcher for band-interleaved files that can resample
    /// but not reproject.
    pub fn bil(options: MatchOptions) -> Self {
        Self::new(BilIo::default(), Resampler, options)
    }
}

impl<I, R> BatchMatcher<I, R>
where
    I: RasterIo,
    R: Reproject,
{
    pub fn new(io: I, reproject: R, options: MatchOptions) -> Self {
        Self {
            io,
            reproject,
            options,
            toolkit: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Reads the grid of the raster at `path` for use as a reference.
    pub fn reference_grid(&self, path: &Path) -> Result<Grid, MatchError> {
        Ok(self.read(path)?.grid().clone())
    }

    /// Aligns every candidate to `reference` and writes the results.
    ///
    /// Only a failure to set up the output directory or worker pool
    /// fails the whole batch.
    pub fn match_all(
        &self,
        reference: &Grid,
        candidates: &[PathBuf],
    ) -> Result<BatchReport, MatchError> {
        self.match_all_with(reference, candidates, |_| {})
    }

    /// Like [BatchMatcher::match_all], with the reference grid read
    /// from the raster at `reference`.
    pub fn match_all_to_file(
        &self,
        reference: &Path,
        candidates: &[PathBuf],
    ) -> Result<BatchReport, MatchError> {
        let reference = self.reference_grid(reference)?;
        self.match_all(&reference, candidates)
    }

    /// Like [BatchMatcher::match_all], calling `on_done` as each
    /// candidate finishes.
    pub fn match_all_with<F>(
        &self,
        reference: &Grid,
        candidates: &[PathBuf],
        on_done: F,
    ) -> Result<BatchReport, MatchError>
    where
        F: Fn(&CandidateReport) + Sync,
    {
        if let Some(dir) = &self.options.out_dir {
            fs::create_dir_all(dir)?;
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .build()?;
        let abort = CancelToken::new();

        info!(
            "matching {} rasters to {}x{} reference",
            candidates.len(),
            reference.width,
            reference.height
        );
        let entries: Vec<CandidateReport> = pool.install(|| {
            candidates
                .par_iter()
                .map(|candidate| {
                    let result = self.run(reference, candidate, &abort);
                    match &result {
                        Ok(matched) => info!("wrote {:?}", matched.output),
                        Err(err) => {
                            warn!("{candidate:?}: {err}");
                            if self.options.failure_policy == FailurePolicy::FailFast {
                                abort.cancel();
                            }
                        }
                    }
                    let report = CandidateReport {
                        input: candidate.clone(),
                        result,
                    };
                    on_done(&report);
                    report
                })
                .collect()
        });

        let report = BatchReport { entries };
        info!(
            "matched {} of {} rasters",
            report.succeeded().count(),
            report.entries.len()
        );
        Ok(report)
    }

    /// Conforms one candidate to `reference` without writing it.
    pub fn match_one(&self, reference: &Grid, candidate: &Path) -> Result<RasterBuffer, MatchError> {
        let scratch = scratch_dir(&std::env::temp_dir())?;
        let deadline = Deadline::start(&self.options, None);
        self.conform(reference, candidate, scratch.path(), &deadline)
    }

    fn run(
        &self,
        reference: &Grid,
        candidate: &Path,
        abort: &CancelToken,
    ) -> Result<MatchedRaster, MatchError> {
        let deadline = Deadline::start(&self.options, Some(abort));
        deadline.check()?;
        let output = outname(
            self.options.out_dir.as_deref(),
            candidate,
            &self.options.suffix,
            None,
        );
        // Next to the output so the final rename stays on one file
        // system.
        let scratch = scratch_dir(parent_dir(&output))?;

        let aligned = self.conform(reference, candidate, scratch.path(), &deadline)?;
        deadline.check()?;
        let warnings = self.persist(&aligned, scratch.path(), &output)?;

        Ok(MatchedRaster {
            input: candidate.to_owned(),
            output,
            width: aligned.width(),
            height: aligned.height(),
            warnings,
        })
    }

    /// Reads `candidate` and brings it onto `reference`'s grid,
    /// reprojecting and resampling through `scratch` as needed.
    fn conform(
        &self,
        reference: &Grid,
        candidate: &Path,
        scratch: &Path,
        deadline: &Deadline<'_>,
    ) -> Result<RasterBuffer, MatchError> {
        let mut raster = self.read(candidate)?;

        if raster.projection() != &reference.projection {
            deadline.check()?;
            debug!(
                "reprojecting {candidate:?} from {} to {}",
                raster.projection(),
                reference.projection
            );
            let reprojected = {
                let _toolkit = self.reproject.serialized().then(|| self.locked());
                self.reproject.reproject(
                    &raster,
                    &reference.projection,
                    self.options.resampling,
                    reference.cell,
                )?
            };
            raster = self.stage(&reprojected, scratch, candidate, "reprojected")?;
        }

        if !raster.cell().matches(&reference.cell) {
            let method = self
                .options
                .resampling
                .ok_or(MatchError::ResolutionMismatch {
                    reference: reference.cell,
                    candidate: raster.cell(),
                })?;
            deadline.check()?;
            debug!(
                "resampling {candidate:?} from {} to {} ({method})",
                raster.cell(),
                reference.cell
            );
            let resampled = {
                let _toolkit = self.reproject.serialized().then(|| self.locked());
                self.reproject.reproject(
                    &raster,
                    &reference.projection,
                    Some(method),
                    reference.cell,
                )?
            };
            raster = self.stage(&resampled, scratch, candidate, "resampled")?;
        }

        deadline.check()?;
        align(reference, &raster, self.options.nodata)
    }

    fn read(&self, path: &Path) -> Result<RasterBuffer, MatchError> {
        let _toolkit = self.locked();
        Ok(self.io.read(path)?)
    }

    /// Round-trips an intermediate through `scratch`.
    fn stage(
        &self,
        raster: &RasterBuffer,
        scratch: &Path,
        candidate: &Path,
        name: &str,
    ) -> Result<RasterBuffer, MatchError> {
        let ext = candidate.extension().unwrap_or(OsStr::new("bil"));
        let path = scratch.join(name).with_extension(ext);
        let _toolkit = self.locked();
        if let WriteOutcome::Degraded(warnings) =
            self.io.write(raster, &path, SampleType::Float32)?
        {
            for warning in warnings {
                debug!("intermediate {warning}");
            }
        }
        Ok(self.io.read(&path)?)
    }

    /// Writes `raster` into `scratch`, then renames every file it
    /// produced into place at `output`, data file first.
    ///
    /// A failed rename can leave new samples beside old sidecars; the
    /// data file itself is always either the old or the new one.
    fn persist(
        &self,
        raster: &RasterBuffer,
        scratch: &Path,
        output: &Path,
    ) -> Result<Vec<String>, MatchError> {
        let file_name = output
            .file_name()
            .ok_or_else(|| MatchError::NotARaster(output.to_owned()))?;
        let staged = scratch.join(file_name);

        let _toolkit = self.locked();
        let outcome = self.io.write(raster, &staged, self.options.sample_type)?;
        let warnings = outcome
            .warnings()
            .iter()
            .map(|warning| {
                warn!("{output:?}: {warning}");
                warning.to_string()
            })
            .collect();

        for (from, to) in self.io.files(&staged).into_iter().zip(self.io.files(output)) {
            if from.exists() {
                fs::rename(&from, &to)?;
            } else if to.is_file() {
                // Stale sidecar from an earlier run.
                fs::remove_file(&to)?;
            }
        }
        Ok(warnings)
    }

    fn locked(&self) -> MutexGuard<'_, ()> {
        self.toolkit.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cancellation and timeout state of one candidate.
struct Deadline<'a> {
    started: Instant,
    timeout: Option<Duration>,
    cancel: &'a CancelToken,
    abort: Option<&'a CancelToken>,
}

impl<'a> Deadline<'a> {
    fn start(options: &'a MatchOptions, abort: Option<&'a CancelToken>) -> Self {
        Self {
            started: Instant::now(),
            timeout: options.timeout,
            cancel: &options.cancel,
            abort,
        }
    }

    fn check(&self) -> Result<(), MatchError> {
        if self.cancel.is_cancelled() || self.abort.map_or(false, CancelToken::is_cancelled) {
            return Err(MatchError::Cancelled);
        }
        match self.timeout {
            Some(timeout) if self.started.elapsed() >= timeout => Err(MatchError::Timeout(timeout)),
            _ => Ok(()),
        }
    }
}

fn scratch_dir(parent: &Path) -> Result<TempDir, MatchError> {
    Ok(tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir_in(parent)?)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchMatcher, CancelToken, FailurePolicy, MatchOptions, SCRATCH_PREFIX};
    use crate::{
        align::tests::{grid, raster},
        ErrorKind, MatchError, Resampling,
    };
    use georaster::{BilIo, Grid, Projection, RasterBuffer, RasterIo, SampleType};
    use std::{
        fs,
        path::{Path, PathBuf},
        time::Duration,
    };
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, grid: Grid, samples: Vec<f32>) -> PathBuf {
        let path = dir.join(name);
        let raster = raster(grid, -9999.0, samples);
        let outcome = BilIo::default()
            .write(&raster, &path, SampleType::Float32)
            .unwrap();
        assert!(outcome.is_complete());
        path
    }

    /// A 4x4 reference grid and a 2x2 candidate of fives inside it.
    fn fixture() -> (TempDir, Grid, PathBuf) {
        let dir = TempDir::new().unwrap();
        let candidate = write(dir.path(), "cand.bil", grid(2, 2, (1.0, 1.0), 1.0), vec![5.0; 4]);
        (dir, grid(4, 4, (0.0, 0.0), 1.0), candidate)
    }

    fn leftovers(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with(SCRATCH_PREFIX))
            })
            .collect()
    }

    #[test]
    fn test_match_all_writes_aligned_outputs() {
        let (dir, reference, candidate) = fixture();
        let out_dir = dir.path().join("out");
        let matcher = BatchMatcher::bil(MatchOptions::default().out_dir(&out_dir));
        let report = matcher.match_all(&reference, &[candidate.clone()]).unwrap();

        let matched = report.into_result().unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].input, candidate);
        assert_eq!(matched[0].output, out_dir.join("cand_matched.bil"));
        assert_eq!((matched[0].width, matched[0].height), (4, 4));
        assert!(matched[0].warnings.is_empty());

        let written = BilIo::default().read(&matched[0].output).unwrap();
        assert_eq!(written.grid(), &grid(4, 4, (0.0, 0.0), 1.0));
        assert_eq!(written.get_xy((1, 1)), 5.0);
        assert_eq!(written.get_xy((2, 2)), 5.0);
        assert!(!written.has_data((0, 0)));
        assert!(!written.has_data((3, 3)));
        assert!(out_dir.join("cand_matched.hdr").is_file());
        assert!(out_dir.join("cand_matched.prj").is_file());
        assert!(leftovers(&out_dir).is_empty());
    }

    #[test]
    fn test_outputs_default_next_to_candidate() {
        let (dir, reference, candidate) = fixture();
        let options = MatchOptions::default().suffix("snapped").nodata(0.0);
        let report = BatchMatcher::bil(options)
            .match_all(&reference, &[candidate])
            .unwrap();
        let output = dir.path().join("cand_snapped.bil");
        assert_eq!(report.succeeded().next().map(|m| &m.output), Some(&output));
        let written = BilIo::default().read(&output).unwrap();
        assert_eq!(written.nodata(), 0.0);
        assert_eq!(written.valid().count(), 4);
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_resolution_mismatch_without_policy() {
        let (dir, reference, _) = fixture();
        let fine = write(dir.path(), "fine.bil", grid(4, 4, (0.0, 0.0), 0.5), vec![1.0; 16]);
        let out_dir = dir.path().join("out");
        let matcher = BatchMatcher::bil(MatchOptions::default().out_dir(&out_dir));
        let report = matcher.match_all(&reference, &[fine]).unwrap();

        let (_, err) = report.failed().next().unwrap();
        assert!(matches!(err, MatchError::ResolutionMismatch { .. }));
        assert!(!out_dir.join("fine_matched.bil").exists());
        assert!(leftovers(&out_dir).is_empty());
    }

    #[test]
    fn test_resampling_policy() {
        let (dir, reference, _) = fixture();
        let fine = write(dir.path(), "fine.bil", grid(4, 4, (0.0, 0.0), 0.5), vec![1.0; 16]);
        let options = MatchOptions::default()
            .out_dir(dir.path().join("out"))
            .resampling(Resampling::Nearest);
        let matched = BatchMatcher::bil(options)
            .match_all(&reference, &[fine])
            .unwrap()
            .into_result()
            .unwrap();
        let written = BilIo::default().read(&matched[0].output).unwrap();
        assert_eq!(written.grid(), &grid(4, 4, (0.0, 0.0), 1.0));
        // The 2x2 unit footprint of the fine raster is the bottom-left corner.
        assert_eq!(written.valid().count(), 4);
        assert_eq!(written.get_xy((0, 3)), 1.0);
        assert!(!written.has_data((2, 0)));
    }

    #[test]
    fn test_projection_mismatch() {
        let (dir, reference, _) = fixture();
        let mut other = grid(2, 2, (0.0, 0.0), 1.0);
        other.projection = Projection::new("EPSG:4326");
        let other = write(dir.path(), "geo.bil", other, vec![1.0; 4]);
        let report = BatchMatcher::bil(MatchOptions::default())
            .match_all(&reference, &[other])
            .unwrap();
        assert_eq!(
            report.failed().map(|(_, e)| e.kind()).collect::<Vec<_>>(),
            vec![ErrorKind::ProjectionMismatch]
        );
    }

    #[test]
    fn test_bad_candidate_does_not_stop_batch() {
        let (dir, reference, candidate) = fixture();
        let missing = dir.path().join("missing.bil");
        let report = BatchMatcher::bil(MatchOptions::default().out_dir(dir.path().join("out")))
            .match_all(&reference, &[missing.clone(), candidate])
            .unwrap();

        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].input, missing);
        assert!(matches!(
            report.entries[0].result,
            Err(MatchError::NotARaster(_))
        ));
        assert!(report.entries[1].result.is_ok());

        let summary = report.summary();
        assert_eq!(summary.matched.len(), 1);
        assert_eq!(summary.failed[0].kind, ErrorKind::NotARaster);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["failed"][0]["kind"], "NotARaster");

        assert!(matches!(
            report.into_result(),
            Err(MatchError::NotARaster(_))
        ));
    }

    #[test]
    fn test_fail_fast_cancels_the_rest() {
        let (dir, reference, candidate) = fixture();
        let missing = dir.path().join("missing.bil");
        let options = MatchOptions::default()
            .out_dir(dir.path().join("out"))
            .failure_policy(FailurePolicy::FailFast);
        let report = BatchMatcher::bil(options)
            .match_all(&reference, &[missing, candidate.clone(), candidate])
            .unwrap();
        let kinds: Vec<_> = report.failed().map(|(_, e)| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![ErrorKind::NotARaster, ErrorKind::Cancelled, ErrorKind::Cancelled]
        );
    }

    #[test]
    fn test_cancel_and_timeout() {
        let (dir, reference, candidate) = fixture();
        let token = CancelToken::new();
        token.cancel();
        let options = MatchOptions::default()
            .out_dir(dir.path().join("out"))
            .cancel_token(token);
        let report = BatchMatcher::bil(options)
            .match_all(&reference, &[candidate.clone()])
            .unwrap();
        assert!(matches!(
            report.entries[0].result,
            Err(MatchError::Cancelled)
        ));

        let options = MatchOptions::default()
            .out_dir(dir.path().join("out"))
            .timeout(Duration::ZERO);
        let report = BatchMatcher::bil(options)
            .match_all(&reference, &[candidate])
            .unwrap();
        assert!(matches!(
            report.entries[0].result,
            Err(MatchError::Timeout(_))
        ));
        assert!(!dir.path().join("out/cand_matched.bil").exists());
    }

    #[test]
    fn test_reference_from_file() {
        let (dir, reference, candidate) = fixture();
        let path = write(dir.path(), "ref.bil", reference.clone(), vec![0.0; 16]);
        let matcher = BatchMatcher::bil(MatchOptions::default().out_dir(dir.path().join("out")));
        assert_eq!(matcher.reference_grid(&path).unwrap(), reference);
        let report = matcher.match_all_to_file(&path, &[candidate]).unwrap();
        assert_eq!(report.succeeded().count(), 1);
    }

    #[test]
    fn test_missing_reference_fails_batch() {
        let (dir, _, candidate) = fixture();
        let result = BatchMatcher::bil(MatchOptions::default())
            .match_all_to_file(&dir.path().join("nope.bil"), &[candidate]);
        assert!(matches!(result, Err(MatchError::NotARaster(_))));
    }

    #[test]
    fn test_concurrent_resampling() {
        let (dir, reference, _) = fixture();
        let candidates: Vec<PathBuf> = (0..16)
            .map(|i| {
                write(
                    dir.path(),
                    &format!("fine{i}.bil"),
                    grid(8, 8, (0.0, 0.0), 0.5),
                    vec![i as f32; 64],
                )
            })
            .collect();
        let options = MatchOptions::default()
            .out_dir(dir.path().join("out"))
            .resampling(Resampling::Bilinear)
            .workers(4);
        let matched = BatchMatcher::bil(options)
            .match_all(&reference, &candidates)
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(matched.len(), 16);
        let written = BilIo::default().read(&matched[5].output).unwrap();
        assert_eq!(written.valid().count(), 16);
        assert!(written.valid().all(|v| (v - 5.0).abs() < 1e-5));
    }

    #[test]
    fn test_parallel_workers_keep_input_order() {
        let (dir, reference, _) = fixture();
        let candidates: Vec<PathBuf> = (0..6)
            .map(|i| {
                let origin = (f64::from(i % 3), 0.0);
                write(
                    dir.path(),
                    &format!("c{i}.bil"),
                    grid(1, 1, origin, 1.0),
                    vec![i as f32],
                )
            })
            .collect();
        let options = MatchOptions::default()
            .out_dir(dir.path().join("out"))
            .workers(3);
        let matched = BatchMatcher::bil(options)
            .match_all(&reference, &candidates)
            .unwrap()
            .into_result()
            .unwrap();
        let inputs: Vec<_> = matched.iter().map(|m| m.input.clone()).collect();
        assert_eq!(inputs, candidates);
    }

    #[test]
    fn test_match_one_returns_buffer() {
        let (_dir, reference, candidate) = fixture();
        let matcher = BatchMatcher::bil(MatchOptions::default());
        let aligned: RasterBuffer = matcher.match_one(&reference, &candidate).unwrap();
        assert_eq!(aligned.grid(), &reference);
        assert_eq!(aligned.valid().count(), 4);
    }
}
