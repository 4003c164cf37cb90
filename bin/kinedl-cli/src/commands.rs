//! Queue commands read from stdin, during a run or between runs.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kinedl::{JobQueue, Resolution};

use crate::jobfile;

#[derive(Parser, Debug)]
#[clap(no_binary_name = true)]
pub struct CommandLine {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Append job files to the end of the queue
    Add {
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },

    /// Remove jobs by position
    #[clap(alias = "rm")]
    Remove {
        #[clap(required = true)]
        positions: Vec<usize>,
    },

    /// Change the resolution of a job that has not started
    Resolution {
        position: usize,
        resolution: Resolution,
    },

    /// Print the queue
    #[clap(alias = "ls")]
    List,

    /// Start a run over every unfinished job
    Start,

    /// Stop the run after the current segment
    Cancel,
}

/// What the caller has to do with the worker after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// Start a run unless one is in progress.
    Start,
    Cancel,
}

pub fn parse(line: &str) -> anyhow::Result<Option<Command>> {
    let args = shlex::split(line).context("Unbalanced quotes")?;
    if args.is_empty() {
        return Ok(None);
    }
    Ok(Some(CommandLine::try_parse_from(args)?.command))
}

pub fn execute(queue: &JobQueue, command: Command) -> anyhow::Result<Control> {
    match command {
        Command::Add { files } => {
            let requests = jobfile::load_all(&files)?;
            let ids = queue.append(requests);
            println!("Added {} job(s)", ids.len());
            return Ok(Control::Start);
        }
        Command::Remove { positions } => {
            let outcome = queue.remove(&positions);
            for error in &outcome.rejected {
                println!("{error}");
            }
            println!("Removed {} job(s)", outcome.removed.len());
        }
        Command::Resolution {
            position,
            resolution,
        } => {
            queue.set_resolution(position, resolution)?;
            println!("Job {position} will download {resolution}");
        }
        Command::List => {
            for (position, job) in queue.snapshot().iter().enumerate() {
                let resolution = job
                    .resolution
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "auto".to_string());
                println!(
                    "{position:>3} {:<11} {:>3}% {:<10} {}",
                    job.state, job.progress, resolution, job.title
                );
            }
        }
        Command::Start => return Ok(Control::Start),
        Command::Cancel => return Ok(Control::Cancel),
    }
    Ok(Control::Continue)
}
