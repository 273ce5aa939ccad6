use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowmeter_reports::config::Config;
use flowmeter_reports::geocode::Geocoder;
use flowmeter_reports::models::{mime_from_extension, InstallationRecord, Photo};
use flowmeter_reports::pdf_import::parse_pdf_report;
use flowmeter_reports::services::{
    DeleteRecordCommand, ListRecordsQuery, RecordsService, SaveRecordCommand, UpdateRecordCommand,
    UploadRecordCommand, UploadService,
};
use flowmeter_reports::storage::{LocalFileStore, SortKey};

fn cli() -> Command {
    let filename = || {
        Arg::new("filename")
            .required(true)
            .value_name("FILENAME")
            .help("Stored report filename, e.g. Brisbane_MH123_20241103_091500.json")
    };
    let geocode = || {
        Arg::new("geocode")
            .long("geocode")
            .help("Fill an empty site address from the GPS coordinates")
            .action(ArgAction::SetTrue)
    };
    let record_json = || {
        Arg::new("record")
            .required(true)
            .value_name("RECORD_JSON")
            .help("Path to a record JSON file")
            .value_parser(clap::value_parser!(PathBuf))
    };

    Command::new("flowmeter-reports")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Flow-meter installation reports: local store and repository upload")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("save")
                .about("Store a new report from a JSON file")
                .arg(record_json())
                .arg(geocode()),
        )
        .subcommand(
            Command::new("show")
                .about("Print a stored report as JSON")
                .arg(filename()),
        )
        .subcommand(
            Command::new("list")
                .about("List stored reports")
                .arg(
                    Arg::new("search")
                        .short('s')
                        .long("search")
                        .value_name("TERM")
                        .help("Match project, site, client or site ID"),
                )
                .arg(
                    Arg::new("sort")
                        .long("sort")
                        .value_name("ORDER")
                        .default_value("newest")
                        .value_parser(["newest", "oldest", "project", "site"]),
                ),
        )
        .subcommand(
            Command::new("update")
                .about("Overwrite a stored report, merging new photos by caption")
                .arg(filename())
                .arg(record_json())
                .arg(geocode())
                .arg(
                    Arg::new("photo")
                        .long("photo")
                        .value_name("CAPTION=PATH")
                        .help("Add or replace the photo with this caption")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("diagram")
                        .long("diagram")
                        .value_name("PATH")
                        .help("Replace the site diagram")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a stored report")
                .arg(filename()),
        )
        .subcommand(Command::new("export").about("Print every stored report as a JSON array"))
        .subcommand(
            Command::new("import")
                .about("Read prefill values from a previously generated PDF report")
                .arg(
                    Arg::new("pdf")
                        .required(true)
                        .value_name("REPORT_PDF")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("save")
                        .long("save")
                        .help("Store the imported values as a new report")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("upload")
                .about("Push a stored report and its PDF to the report repository")
                .arg(filename())
                .arg(
                    Arg::new("pdf")
                        .long("pdf")
                        .required(true)
                        .value_name("PATH")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(Arg::new("repo").long("repo").value_name("OWNER/NAME"))
                .arg(Arg::new("branch").long("branch").value_name("BRANCH"))
                .arg(Arg::new("folder").long("folder").value_name("FOLDER")),
        )
}

fn read_record(path: &Path) -> anyhow::Result<InstallationRecord> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid record JSON in {}", path.display()))
}

fn read_photo(caption: &str, path: &Path) -> anyhow::Result<Photo> {
    let data = fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    let mime = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(mime_from_extension);
    Ok(Photo::from_bytes(caption, mime, &data))
}

fn parse_photo_arg(arg: &str) -> anyhow::Result<Photo> {
    match arg.split_once('=') {
        Some((caption, path)) if !caption.trim().is_empty() => read_photo(caption, Path::new(path)),
        _ => bail!("--photo expects CAPTION=PATH, got '{}'", arg),
    }
}

async fn geocode_if_requested(
    args: &ArgMatches,
    config: &Config,
    record: &mut InstallationRecord,
) -> anyhow::Result<()> {
    if args.get_flag("geocode") {
        let geocoder = Geocoder::new(&config.geocoder_url, Duration::from_secs(10))?;
        if !geocoder.fill_site_address(record).await {
            tracing::debug!("Site address left as entered");
        }
    }
    Ok(())
}

fn string_arg(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.get_one::<String>(id).cloned()
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowmeter_reports=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let matches = cli().get_matches();
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::debug!("Using report directory: {}", config.reports_dir.display());

    let records = RecordsService::new(LocalFileStore::new(&config.reports_dir));

    match matches.subcommand() {
        Some(("save", args)) => {
            let path = args.get_one::<PathBuf>("record").context("record path")?;
            let mut record = read_record(path)?;
            geocode_if_requested(args, &config, &mut record).await?;
            let filename = records.save(SaveRecordCommand { record })?;
            println!("{}", filename);
        }
        Some(("show", args)) => {
            let filename = args.get_one::<String>("filename").context("filename")?;
            print_json(&records.show(filename)?)?;
        }
        Some(("list", args)) => {
            let sort = args
                .get_one::<String>("sort")
                .map(|s| s.parse::<SortKey>())
                .transpose()?
                .unwrap_or_default();
            let listing = records.list(&ListRecordsQuery {
                search: string_arg(args, "search"),
                sort,
            })?;

            for summary in &listing.items {
                println!("{}\t{}", summary.filename, summary.display_line());
            }
            for warning in &listing.warnings {
                eprintln!("warning: {}", warning);
            }
        }
        Some(("update", args)) => {
            let filename = string_arg(args, "filename").context("filename")?;
            let path = args.get_one::<PathBuf>("record").context("record path")?;
            let mut record = read_record(path)?;
            geocode_if_requested(args, &config, &mut record).await?;
            let new_photos = args
                .get_many::<String>("photo")
                .unwrap_or_default()
                .map(|arg| parse_photo_arg(arg))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let new_diagram = args
                .get_one::<PathBuf>("diagram")
                .map(|path| read_photo("Site diagram", path))
                .transpose()?;

            let written = records.update(UpdateRecordCommand {
                filename: filename.clone(),
                record,
                new_photos,
                new_diagram,
            })?;
            println!("{} ({} photos)", filename, written.photos.len());
        }
        Some(("delete", args)) => {
            let filename = string_arg(args, "filename").context("filename")?;
            records.delete(DeleteRecordCommand { filename })?;
        }
        Some(("export", _)) => {
            let listing = records.export()?;
            print_json(&listing.items)?;
            for warning in &listing.warnings {
                eprintln!("warning: {}", warning);
            }
        }
        Some(("import", args)) => {
            let path = args.get_one::<PathBuf>("pdf").context("pdf path")?;
            let pdf = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let fields = parse_pdf_report(&pdf)?;

            if args.get_flag("save") {
                let mut record = InstallationRecord::default();
                fields.apply_to(&mut record);
                let filename = records.save(SaveRecordCommand { record })?;
                println!("{}", filename);
            } else {
                print_json(&fields)?;
            }
        }
        Some(("upload", args)) => {
            let pdf_path = args.get_one::<PathBuf>("pdf").context("pdf path")?;
            let pdf = fs::read(pdf_path)
                .with_context(|| format!("Failed to read {}", pdf_path.display()))?;

            let store = Arc::new(LocalFileStore::new(&config.reports_dir));
            let uploads = UploadService::new(store, config.upload_settings())?;
            let receipt = uploads
                .upload(UploadRecordCommand {
                    filename: string_arg(args, "filename").context("filename")?,
                    pdf,
                    repo: string_arg(args, "repo"),
                    branch: string_arg(args, "branch"),
                    folder: string_arg(args, "folder"),
                })
                .await?;
            print_json(&receipt)?;
        }
        _ => unreachable!("subcommand_required is set"),
    }

    Ok(())
}
