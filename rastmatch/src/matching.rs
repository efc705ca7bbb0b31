use crate::{options::Match, progress};
use anyhow::{bail, Result};
use coincide::{BatchMatcher, FailurePolicy, MatchOptions, Resampler};
use georaster::{raster_list, BilIo, LoadMode};
use std::time::Duration;

impl Match {
    pub fn run(&self) -> Result<()> {
        let candidates = raster_list(&self.input)?;
        if candidates.is_empty() {
            bail!("no rasters in {:?}", self.input);
        }

        let mut options = MatchOptions::default()
            .suffix(&self.suffix)
            .sample_type(self.sample_type)
            .workers(self.workers);
        if let Some(dir) = &self.out_dir {
            options = options.out_dir(dir);
        }
        if let Some(nodata) = self.nodata {
            options = options.nodata(nodata);
        }
        if let Some(method) = self.resampling {
            options = options.resampling(method);
        }
        if let Some(secs) = self.timeout {
            options = options.timeout(Duration::from_secs(secs));
        }
        if self.fail_fast {
            options = options.failure_policy(FailurePolicy::FailFast);
        }

        let mode = if self.mmap {
            LoadMode::MemMap
        } else {
            LoadMode::InMem
        };
        let matcher = BatchMatcher::new(BilIo::new(mode), Resampler, options);
        let reference = matcher.reference_grid(&self.reference)?;
        let pb = progress::bar(
            format!("Match to {}", self.reference.display()),
            candidates.len() as u64,
        );
        let report = matcher.match_all_with(&reference, &candidates, |_| pb.inc(1))?;
        pb.finish_and_clear();

        let summary = report.summary();
        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            for matched in &summary.matched {
                println!("{} -> {}", matched.input.display(), matched.output.display());
            }
            for failed in &summary.failed {
                eprintln!("{}: {}", failed.input.display(), failed.message);
            }
        }

        if !summary.failed.is_empty() {
            bail!(
                "{} of {} rasters failed",
                summary.failed.len(),
                candidates.len()
            );
        }
        Ok(())
    }
}
