use std::fs;
use std::io::Write;

use anyhow::{bail, Context};
use colored::Colorize;
use hashfile_files::{Application, ContextId, FileApplication, FilesConfig};
use hashfile_references::{Commit, Peer};
use hashfile_types::{Hash, Kind};
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let mut app = FileApplication::new(config).context("invalid configuration")?;
    let format = cli.format;
    match cli.command {
        Command::New(args) => cmd_new(&mut app, args, format),
        Command::Delete(args) => cmd_delete(&mut app, args, format),
        Command::Exists(args) => cmd_exists(&app, args, format),
        Command::Put(args) => cmd_put(&mut app, args, format),
        Command::Get(args) => cmd_get(&mut app, args),
        Command::Rm(args) => cmd_rm(&mut app, args, format),
        Command::Keys(args) => cmd_keys(&mut app, args, format),
        Command::Log(args) => cmd_log(&mut app, args, format),
        Command::Verify(args) => cmd_verify(&mut app, args, format),
        Command::Peers(args) => cmd_peers(&mut app, args, format),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<FilesConfig> {
    let mut config = match &cli.config {
        Some(path) => FilesConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => FilesConfig::default(),
    };
    if let Some(dir) = &cli.dir {
        config.dir_path = dir.clone();
    }
    Ok(config)
}

/// Open `name`, run `f` and close the context whatever `f` returned.
fn with_database<T>(
    app: &mut FileApplication,
    name: &str,
    f: impl FnOnce(&mut FileApplication, ContextId) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let ctx = app
        .open(name)
        .with_context(|| format!("opening database {name}"))?;
    let result = f(app, ctx);
    let closed = app.close(ctx);
    let value = result?;
    closed?;
    Ok(value)
}

fn parse_hash(text: &str) -> anyhow::Result<Hash> {
    text.parse()
        .with_context(|| format!("invalid hash {text:?}"))
}

fn print_json(value: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn cmd_new(app: &mut FileApplication, args: NameArgs, format: OutputFormat) -> anyhow::Result<()> {
    app.create(&args.name)?;
    match format {
        OutputFormat::Json => print_json(json!({ "created": args.name })),
        OutputFormat::Text => {
            let path = app.database_path(&args.name)?;
            println!("{} Created database {} at {}", "✓".green().bold(), args.name.bold(), path.display());
            Ok(())
        }
    }
}

fn cmd_delete(app: &mut FileApplication, args: NameArgs, format: OutputFormat) -> anyhow::Result<()> {
    app.delete(&args.name)?;
    match format {
        OutputFormat::Json => print_json(json!({ "deleted": args.name })),
        OutputFormat::Text => {
            println!("{} Deleted database {}", "✓".green().bold(), args.name.bold());
            Ok(())
        }
    }
}

fn cmd_exists(app: &FileApplication, args: NameArgs, format: OutputFormat) -> anyhow::Result<()> {
    let exists = app.exists(&args.name)?;
    match format {
        OutputFormat::Json => print_json(json!({ "name": args.name, "exists": exists })),
        OutputFormat::Text => {
            if exists {
                println!("{} {} exists", "✓".green(), args.name.bold());
            } else {
                println!("{} {} does not exist", "✗".red(), args.name.bold());
            }
            Ok(())
        }
    }
}

fn cmd_put(app: &mut FileApplication, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let data = fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let length = data.len();
    let hash = Hash::from_bytes(&data);
    let commit = with_database(app, &args.name, |app, ctx| {
        app.write(ctx, args.kind, hash, data)?;
        Ok(app.commit(ctx)?)
    })?;

    match format {
        OutputFormat::Json => print_json(json!({
            "hash": hash.to_hex(),
            "kind": args.kind,
            "length": length,
            "commit": commit.map(|c| c.to_hex()),
        })),
        OutputFormat::Text => {
            println!("{} Stored {} ({} bytes, kind {})", "✓".green().bold(), hash.to_hex().yellow(), length, args.kind);
            if let Some(commit) = commit {
                println!("  Commit: {}", commit.short_hex().cyan());
            }
            Ok(())
        }
    }
}

fn cmd_get(app: &mut FileApplication, args: GetArgs) -> anyhow::Result<()> {
    let hash = parse_hash(&args.hash)?;
    let data = with_database(app, &args.name, |app, ctx| {
        Ok(app.read_by_hash(ctx, args.kind, &hash)?)
    })?;
    match &args.output {
        Some(path) => fs::write(path, &data)
            .with_context(|| format!("writing {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn cmd_rm(app: &mut FileApplication, args: RmArgs, format: OutputFormat) -> anyhow::Result<()> {
    let hashes = args
        .hashes
        .iter()
        .map(|text| parse_hash(text))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let commit = with_database(app, &args.name, |app, ctx| {
        app.erase_all_by_hashes(ctx, args.kind, &hashes)?;
        Ok(app.commit(ctx)?)
    })?;

    match format {
        OutputFormat::Json => print_json(json!({
            "erased": hashes.iter().map(Hash::to_hex).collect::<Vec<_>>(),
            "kind": args.kind,
            "commit": commit.map(|c| c.to_hex()),
        })),
        OutputFormat::Text => {
            println!("{} Erased {} key(s) of kind {}", "✓".green().bold(), hashes.len(), args.kind);
            if let Some(commit) = commit {
                println!("  Commit: {}", commit.short_hex().cyan());
            }
            Ok(())
        }
    }
}

fn cmd_keys(app: &mut FileApplication, args: KeysArgs, format: OutputFormat) -> anyhow::Result<()> {
    let kind: Kind = args.kind;
    let keys = with_database(app, &args.name, |app, ctx| {
        match app.content_keys_by_kind(ctx, kind) {
            Ok(keys) => Ok(keys.list().to_vec()),
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    })?;

    match format {
        OutputFormat::Json => print_json(json!(keys
            .iter()
            .map(|key| json!({
                "kind": key.kind(),
                "hash": key.hash().to_hex(),
                "from": key.pointer().from(),
                "length": key.pointer().length(),
            }))
            .collect::<Vec<_>>())),
        OutputFormat::Text => {
            if keys.is_empty() {
                println!("No content keys of kind {kind}.");
            }
            for key in &keys {
                println!(
                    "{}  {:>10} bytes @ {}",
                    key.hash().to_hex().yellow(),
                    key.pointer().length(),
                    key.pointer().from()
                );
            }
            Ok(())
        }
    }
}

fn commit_json(commit: &Commit) -> serde_json::Value {
    json!({
        "hash": commit.hash().to_hex(),
        "parent": commit.parent().map(|p| p.to_hex()),
        "inserts": commit.action().inserts().iter().map(|k| k.hash().to_hex()).collect::<Vec<_>>(),
        "deletes": commit.action().deletes().iter().map(|k| k.hash().to_hex()).collect::<Vec<_>>(),
    })
}

fn cmd_log(app: &mut FileApplication, args: LogArgs, format: OutputFormat) -> anyhow::Result<()> {
    let commits = with_database(app, &args.name, |app, ctx| Ok(app.commits(ctx)?))?;
    let recent: Vec<&Commit> = commits.list().iter().rev().take(args.limit).collect();

    match format {
        OutputFormat::Json => print_json(json!(recent.iter().map(|c| commit_json(c)).collect::<Vec<_>>())),
        OutputFormat::Text => {
            if recent.is_empty() {
                println!("No commits.");
            }
            for (offset, commit) in recent.iter().enumerate() {
                let seq = commits.len() - offset;
                let parent = commit
                    .parent()
                    .map(|p| p.short_hex())
                    .unwrap_or_else(|| "genesis".into());
                println!(
                    "{}  {}  parent {}",
                    format!("c#{seq}").yellow().bold(),
                    commit.hash().short_hex().cyan(),
                    parent.dimmed()
                );
                println!(
                    "  {} {}",
                    format!("+{}", commit.action().inserts().len()).green(),
                    format!("-{}", commit.action().deletes().len()).red()
                );
            }
            Ok(())
        }
    }
}

fn cmd_verify(app: &mut FileApplication, args: NameArgs, format: OutputFormat) -> anyhow::Result<()> {
    let report = with_database(app, &args.name, |app, ctx| Ok(app.verify(ctx)?))?;

    match format {
        OutputFormat::Json => print_json(json!({
            "ok": report.is_ok(),
            "commits": report.commits,
            "content_keys": report.content_keys,
            "file_len": report.file_len,
            "issues": report.issues,
        }))?,
        OutputFormat::Text => {
            if report.is_ok() {
                println!("{} Database {} verified", "✓".green().bold(), args.name.bold());
            } else {
                println!("{} Database {} has problems", "✗".red().bold(), args.name.bold());
            }
            println!("  Commits: {}", report.commits);
            println!("  Content keys: {}", report.content_keys);
            println!("  File length: {} bytes", report.file_len);
            for issue in &report.issues {
                println!("  {} {issue}", "✗".red());
            }
        }
    }
    if !report.is_ok() {
        bail!("verification found {} issue(s)", report.issues.len());
    }
    Ok(())
}

fn cmd_peers(app: &mut FileApplication, args: PeersArgs, format: OutputFormat) -> anyhow::Result<()> {
    let replacement = match (&args.set, args.clear) {
        (Some(addresses), _) => Some(
            addresses
                .iter()
                .map(|address| Peer::new(address.trim()))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        (None, true) => Some(Vec::new()),
        (None, false) => None,
    };
    let peers = with_database(app, &args.name, |app, ctx| {
        if let Some(peers) = replacement {
            app.set_peers(ctx, peers)?;
            app.commit(ctx)?;
        }
        Ok(app.peers(ctx)?)
    })?;

    match format {
        OutputFormat::Json => print_json(json!(peers.iter().map(Peer::as_str).collect::<Vec<_>>())),
        OutputFormat::Text => {
            if peers.is_empty() {
                println!("No peers configured.");
            }
            for peer in &peers {
                println!("  {}", peer.as_str().blue());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run(dir: &std::path::Path, args: &[&str]) -> anyhow::Result<()> {
        let mut argv = vec!["hashfile", "--dir", dir.to_str().unwrap(), "--format", "json"];
        argv.extend_from_slice(args);
        run_command(Cli::parse_from(argv))
    }

    #[test]
    fn put_get_rm_flow() {
        let dir = tempfile::tempdir().unwrap();
        let db_dir = dir.path().join("data");
        let input = dir.path().join("input.txt");
        let output = dir.path().join("output.txt");
        fs::write(&input, b"payload").unwrap();
        let hash = Hash::from_bytes(b"payload").to_hex();

        run(&db_dir, &["new", "db"]).unwrap();
        run(&db_dir, &["put", "db", input.to_str().unwrap(), "--kind", "4"]).unwrap();
        run(&db_dir, &["get", "db", &hash, "--kind", "4", "-o", output.to_str().unwrap()]).unwrap();
        assert_eq!(fs::read(&output).unwrap(), b"payload");

        run(&db_dir, &["keys", "db", "--kind", "4"]).unwrap();
        run(&db_dir, &["log", "db"]).unwrap();
        run(&db_dir, &["verify", "db"]).unwrap();
        run(&db_dir, &["rm", "db", &hash, "--kind", "4"]).unwrap();
        assert!(run(&db_dir, &["get", "db", &hash, "--kind", "4"]).is_err());
        run(&db_dir, &["delete", "db"]).unwrap();
    }

    #[test]
    fn peers_can_be_set_and_cleared() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["new", "db"]).unwrap();
        run(dir.path(), &["peers", "db", "--set", "tcp://a:1,tcp://b:2"]).unwrap();
        assert!(run(dir.path(), &["peers", "db", "--set", "not a url"]).is_err());
        run(dir.path(), &["peers", "db", "--clear"]).unwrap();
    }

    #[test]
    fn bad_hash_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["new", "db"]).unwrap();
        let err = run(dir.path(), &["get", "db", "xyz"]).unwrap_err();
        assert!(err.to_string().contains("invalid hash"));
    }
}
