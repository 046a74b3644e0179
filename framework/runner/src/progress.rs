use std::cmp::min;
use std::fmt::Write;
use std::time::{Duration, Instant};

use cloudstorm_core::prelude::{CancelHandle, CancelListener};
use indicatif::{ProgressBar, ProgressState, ProgressStyle};

/// Shows the user how far along a run is.
///
/// Fixed-count runs count finished iterations. Duration and periodic runs show elapsed time
/// against the planned runtime. The bar is cleared when this is dropped.
pub(crate) enum Progress {
    Hidden,
    Count(ProgressBar),
    Timed(CancelHandle),
}

impl Progress {
    pub(crate) fn hidden() -> Self {
        Self::Hidden
    }

    pub(crate) fn count(total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        match ProgressStyle::with_template(
            "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} iterations [{elapsed_precise}]",
        ) {
            Ok(style) => pb.set_style(style.progress_chars("#>-")),
            Err(e) => log::debug!("Using the default progress style: {e}"),
        }
        Self::Count(pb)
    }

    pub(crate) fn timed(planned_runtime: Duration) -> Self {
        let stop = CancelHandle::new();
        match start_progress(planned_runtime, stop.new_listener()) {
            Ok(()) => Self::Timed(stop),
            Err(e) => {
                log::warn!("Could not start the progress display: {e}");
                Self::Hidden
            }
        }
    }

    pub(crate) fn iteration_done(&self) {
        if let Self::Count(pb) = self {
            pb.inc(1);
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        match self {
            Self::Hidden => {}
            Self::Count(pb) => pb.finish_and_clear(),
            Self::Timed(stop) => stop.cancel(),
        }
    }
}

fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Displays a progress bar on its own thread until `stop_listener` fires.
fn start_progress(
    planned_runtime: Duration,
    stop_listener: CancelListener,
) -> std::io::Result<()> {
    let planned = format_hms(planned_runtime);
    std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let pb = ProgressBar::new(planned_runtime.as_secs());
            match ProgressStyle::with_template(
                "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}]",
            ) {
                Ok(style) => pb.set_style(
                    style
                        .with_key(
                            "planned_runtime",
                            move |_state: &ProgressState, w: &mut dyn Write| {
                                let _ = w.write_str(&planned);
                            },
                        )
                        .progress_chars("#>-"),
                ),
                Err(e) => log::debug!("Using the default progress style: {e}"),
            }

            loop {
                if stop_listener.is_cancelled() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                let new = min(start_time.elapsed().as_secs(), planned_runtime.as_secs());
                pb.set_position(new);
                std::thread::sleep(Duration::from_millis(250));
            }
        })
        .map(|_| ())
}
