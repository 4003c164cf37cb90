mod commands;
mod config;
mod jobfile;

use std::path::PathBuf;

use clap::Parser;
use commands::Control;
use kinedl::{
    decrypt::Mp4Decrypt, event, merge::FfmpegMuxer, pipeline::TrackPipeline, HttpClient,
    JobQueue, JobState, KinedlResult, QueueEvent, QueueWorker, RunOutcome, WorkerHandle,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[clap(name = "kinedl", version, author)]
/// Download queued videos, one job file at a time.
///
/// Commands are read from stdin: add, remove, resolution, list, start, cancel. The
/// program exits once stdin is closed and no run is in progress.
struct Cli {
    /// Configuration file
    #[clap(short, long, env = "KINEDL_CONFIG", default_value = "kinedl.toml")]
    config: PathBuf,

    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,

    /// Job files to download, in order
    jobs: Vec<PathBuf>,
}

fn print_event(queue: &JobQueue, event: QueueEvent) {
    let title = |position: usize| {
        queue
            .get(position)
            .map(|job| job.title)
            .unwrap_or_default()
    };
    match event {
        QueueEvent::RunStarted => println!("Run started"),
        QueueEvent::Progress {
            position, percent, ..
        } => println!("[{position}] {} {percent}%", title(position)),
        QueueEvent::Status {
            position, stage, ..
        } => println!("[{position}] {} {stage}", title(position)),
        QueueEvent::Failed {
            position, error, ..
        } => println!("[{position}] {} failed: {error}", title(position)),
        QueueEvent::RunFinished { completed: true } => println!("All jobs processed"),
        QueueEvent::RunFinished { completed: false } => println!("Run stopped"),
    }
}

/// Never resolves while there is no run.
async fn finished(run: &mut Option<WorkerHandle>) -> KinedlResult<RunOutcome> {
    match run {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn has_waiting_jobs(queue: &JobQueue) -> bool {
    queue
        .snapshot()
        .iter()
        .any(|job| job.state == JobState::Pending)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing_subscriber::filter::LevelFilter::DEBUG.into()
                } else {
                    tracing_subscriber::filter::LevelFilter::INFO.into()
                })
                .try_from_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::load(&args.config)?;
    let requests = jobfile::load_all(&args.jobs)?;

    let client = HttpClient::from_options(&config.http)?;
    let muxer = FfmpegMuxer::locate(&config.tools.ffmpeg)?;
    // only encrypted videos need it; a missing binary fails the run when one shows up
    let decrypter = Mp4Decrypt::locate(&config.tools.mp4decrypt).unwrap_or_else(|e| {
        tracing::warn!("{e}");
        Mp4Decrypt::new(&config.tools.mp4decrypt)
    });
    let pipeline = TrackPipeline::new(&config, client.clone(), client, decrypter, muxer);

    let queue = JobQueue::new();
    queue.append(requests);
    let (sender, mut events) = event::channel();
    let worker = QueueWorker::new(queue.clone(), pipeline, sender);

    let mut run = None;
    let mut aborted = None;
    if !queue.pending_positions().is_empty() {
        run = Some(worker.next_run().spawn());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        if run.is_none() && !stdin_open {
            break;
        }

        tokio::select! {
            biased;

            Some(event) = events.recv() => print_event(&queue, event),
            outcome = finished(&mut run) => {
                run = None;
                match outcome? {
                    // jobs added after the last claim are still waiting
                    RunOutcome::Completed if has_waiting_jobs(&queue) => {
                        run = Some(worker.next_run().spawn());
                    }
                    RunOutcome::Completed => {}
                    RunOutcome::Cancelled => {
                        let left = queue.pending_positions().len();
                        println!("Cancelled, {left} job(s) left unfinished");
                    }
                    RunOutcome::Aborted(e) => {
                        eprintln!("{e}");
                        aborted = Some(e);
                    }
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match commands::parse(&line) {
                    Ok(Some(command)) => match commands::execute(&queue, command) {
                        // a run that is still going picks up appended jobs by itself
                        Ok(Control::Start) if run.is_none() => {
                            if queue.pending_positions().is_empty() {
                                println!("Nothing to download");
                            } else {
                                aborted = None;
                                run = Some(worker.next_run().spawn());
                            }
                        }
                        Ok(Control::Start) => {}
                        Ok(Control::Cancel) => match &run {
                            Some(handle) => handle.cancel(),
                            None => println!("Nothing is running"),
                        },
                        Ok(Control::Continue) => {}
                        Err(e) => eprintln!("{e:#}"),
                    },
                    Ok(None) => {}
                    Err(e) => eprintln!("{e}"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {e}");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => match &run {
                Some(handle) => {
                    tracing::info!("Interrupted, stopping after the current segment");
                    handle.cancel();
                }
                None => break,
            },
        }
    }

    while let Ok(event) = events.try_recv() {
        print_event(&queue, event);
    }
    if let Some(e) = aborted {
        anyhow::bail!(e);
    }
    Ok(())
}
