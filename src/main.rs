use clap::Parser;
use futures::StreamExt;
use miette::{IntoDiagnostic, miette};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidsplit_config::Config;
use vidsplit_library::organize::OrganizeEvent;
use vidsplit_library::{Event, Pipeline, Summary, check_source};

mod remote;

const DEFAULT_FILTER: &str =
    "vidsplit=info,vidsplit_library=info,vidsplit_storage=info,vidsplit_compress=info,vidsplit_config=info";

/// Split a folder of videos into size-bounded batches, zip each batch and
/// optionally upload the archives.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Folder to organize. Prompted for when omitted.
    source: Option<PathBuf>,
    /// Upload the archives to the configured remote.
    #[arg(long)]
    upload: bool,
}

#[tokio::main]
async fn main() -> miette::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let (source, upload) = match args.source {
        Some(source) => (source, args.upload),
        None => {
            let source = prompt("Enter the path to the folder containing your videos: ").into_diagnostic()?;
            let upload = args.upload
                || prompt("Upload the archives when done? [y/N]: ")
                    .into_diagnostic()?
                    .eq_ignore_ascii_case("y");
            (PathBuf::from(strip_quotes(&source)), upload)
        },
    };

    let config = Config::load().map_err(|e| miette!("{e:?}"))?;
    let root = check_source(&source).await.map_err(|e| miette!("{e:?}"))?;
    let mut pipeline = Pipeline::new(&config).map_err(|e| miette!("{e:?}"))?;
    if upload {
        let remote = config
            .remote
            .as_ref()
            .ok_or_else(|| miette!("--upload needs a [remote] section in the configuration"))?;
        pipeline = pipeline.with_uploader(remote::uploader(remote)?);
    }

    tracing::info!(root = %root.display(), capacity = config.capacity.get(), upload, "Starting");
    let mut summary = None;
    let mut events = std::pin::pin!(pipeline.run(&root));
    while let Some(event) = events.next().await {
        match event {
            Ok(Event::Complete(done)) => summary = Some(done),
            Ok(event) => print_event(&event),
            Err(e) => {
                eprintln!();
                if e.is_retryable() {
                    tracing::error!(error = ?e, "Step failed; running again may succeed");
                } else {
                    tracing::error!(error = ?e, "Step failed");
                }
            },
        }
    }

    let Some(summary) = summary else {
        return Ok(ExitCode::from(1));
    };
    print_summary(&summary);
    Ok(if summary.has_failures() { ExitCode::from(2) } else { ExitCode::SUCCESS })
}

fn prompt(message: &str) -> std::io::Result<String> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{message}")?;
    stdout.flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Paths dragged into a terminal are often wrapped in quotes.
fn strip_quotes(input: &str) -> &str {
    let input = input.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = input.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    input
}

fn print_event(event: &Event) {
    match event {
        Event::NothingToDo => println!("No eligible video files found."),
        Event::Organize(OrganizeEvent::Planned { partitions, skipped }) => {
            println!("Planned {partitions} folder(s); {skipped} file(s) larger than the capacity will be skipped.");
        },
        Event::Organize(OrganizeEvent::Skipped(entry)) => {
            println!("Skipping {} ({} bytes)", entry.path.display(), entry.size);
        },
        Event::Organize(OrganizeEvent::Closed(partition)) => {
            println!("Created {} with {} file(s)", partition.name, partition.count());
        },
        Event::Organize(_) => {},
        Event::ReportWritten(path) => println!("Report written to {}", path.display()),
        Event::ArchiveStarted { partition, .. } => print!("Zipping {partition}..."),
        Event::ArchiveProgress { partition, processed, total } => {
            let percent = if *total == 0 { 100 } else { processed.saturating_mul(100) / total };
            print!("\rZipping {partition}... {percent:>3}%");
            let _ = std::io::stdout().flush();
        },
        Event::Archived { archive, .. } => println!("\rCreated {}", archive.display()),
        Event::Authenticated { backend } => println!("Signed in to {backend}"),
        Event::ContainerCreated(container) => println!("Uploading into {container}"),
        Event::Uploaded { archive, .. } => println!("Uploaded {}", archive.display()),
        Event::Complete(_) => {},
    }
}

fn print_summary(summary: &Summary) {
    println!();
    print!("{}", summary.report);
    if summary.failed_partitions > 0 {
        println!("Folders that could not be created: {}", summary.failed_partitions);
    }
    if summary.failed_archives > 0 {
        println!("Archives that could not be created: {}", summary.failed_archives);
    }
    if !summary.uploads.is_empty() || summary.failed_uploads > 0 {
        println!("Uploaded: {}, not uploaded: {}", summary.uploads.len(), summary.failed_uploads);
    }
    tracing::info!(
        files = summary.report.total(),
        partitions = summary.report.partitions.len(),
        skipped = summary.report.skipped,
        failed = summary.has_failures(),
        "Done"
    );
}
