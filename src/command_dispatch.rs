//! Purpose: Hold top-level CLI command dispatch for `leafsync`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate execution.
//! Invariants: Command behavior, output envelopes, and exit codes stay stable.
//! Invariants: Every store mutation goes through the `Dashboard` facade.

use super::*;

use leafsync::api::{FetchOptions, MetadataStore, MirrorStore, fetch_all, now_rfc3339, text_of_html};

pub(super) fn dispatch_command(
    command: Command,
    endpoints: Endpoints,
    json_flag: bool,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "leafsync", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            if use_json(json_flag) {
                emit_json(json!({ "version": env!("CARGO_PKG_VERSION") }));
            } else {
                println!("leafsync {}", env!("CARGO_PKG_VERSION"));
            }
            Ok(RunOutcome::ok())
        }
        Command::List { page, query } => list_records(&endpoints, &query, page, json_flag),
        Command::Search { query, page } => list_records(&endpoints, &query, page, json_flag),
        Command::Show { id } => {
            let mirror = mirror_client(&endpoints)?;
            let record = mirror.fetch_by_id(&id)?.ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message("record not found")
                    .with_id(id.clone())
            })?;
            if use_json(json_flag) {
                emit_json(json!({ "record": record }));
            } else {
                emit_record_human(&record);
            }
            Ok(RunOutcome::ok())
        }
        Command::Add {
            title,
            domain_name,
            url,
            content,
            language,
            tags,
        } => {
            let mut dashboard = build_dashboard(&endpoints)?;
            let draft = Draft {
                title,
                domain_name,
                url: url.unwrap_or_default(),
                content: content.unwrap_or_default(),
                language: language.unwrap_or_default(),
                tags,
                ..Draft::default()
            };
            let record = dashboard.submit_create(draft)?;
            if use_json(json_flag) {
                emit_json(json!({ "record": record }));
            } else {
                println!("record created: {}", record.id);
            }
            Ok(RunOutcome::ok())
        }
        Command::Edit {
            id,
            title,
            domain_name,
            url,
            content,
            language,
            tags,
        } => {
            let mut dashboard = build_dashboard(&endpoints)?;
            dashboard.refresh()?;
            let current = dashboard.store().get(&id).ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message("no record with this id")
                    .with_id(id.clone())
            })?;
            let mut draft = current.to_draft();
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(domain_name) = domain_name {
                draft.domain_name = domain_name;
            }
            if let Some(url) = url {
                draft.url = url;
            }
            if let Some(content) = content {
                draft.content = content;
            }
            if let Some(language) = language {
                draft.language = language;
            }
            if !tags.is_empty() {
                draft.tags = tags;
            }
            let record = dashboard.submit_update(&id, draft)?;
            if use_json(json_flag) {
                emit_json(json!({ "record": record }));
            } else {
                println!("record updated: {}", record.id);
            }
            Ok(RunOutcome::ok())
        }
        Command::Rm { id, yes } => {
            let mut dashboard = build_dashboard(&endpoints)?;
            dashboard.request_delete(&id);
            if !yes {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("delete is staged but not confirmed")
                    .with_id(id)
                    .with_hint("Re-run with --yes to confirm."));
            }
            let deleted = dashboard.confirm_delete()?;
            if use_json(json_flag) {
                emit_json(json!({ "ok": true, "id": deleted }));
            } else {
                println!("record deleted: {deleted}");
            }
            Ok(RunOutcome::ok())
        }
        Command::Sync { page_size } => {
            let mut metadata = metadata_client(&endpoints)?;
            if let Some(page_size) = page_size {
                metadata = metadata.with_page_size(page_size);
            }
            let mirror = mirror_client(&endpoints)?;
            let outcome = sync_mirror(&metadata, &mirror)?;
            if use_json(json_flag) {
                emit_json(json!({ "sync": {
                    "fetched": outcome.fetched,
                    "inserted": outcome.inserted,
                    "updated": outcome.updated,
                }}));
            } else {
                println!(
                    "synced {} records ({} inserted, {} updated)",
                    outcome.fetched, outcome.inserted, outcome.updated
                );
            }
            Ok(RunOutcome::ok())
        }
        Command::Serve {
            bind,
            data_file,
            allow_non_loopback,
            max_body_bytes,
            cors_origins,
        } => {
            let config = serve::ServeConfig {
                bind: parse_bind(&bind)?,
                data_file: data_file.unwrap_or_else(config::default_data_file),
                token: endpoints.token.clone(),
                allow_non_loopback,
                max_body_bytes,
                cors_origins,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start async runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
    }
}

fn list_records(
    endpoints: &Endpoints,
    query: &str,
    page: usize,
    json_flag: bool,
) -> Result<RunOutcome, Error> {
    let mut dashboard = build_dashboard(endpoints)?;
    dashboard.refresh()?;
    dashboard.search(query);
    dashboard.go_to_page(page);
    let view = dashboard.page();
    if use_json(json_flag) {
        emit_json(page_json(&view));
    } else {
        emit_page_human(&view);
    }
    Ok(RunOutcome::ok())
}

struct SyncOutcome {
    fetched: usize,
    inserted: usize,
    updated: usize,
}

/// Pull every metadata page and rewrite the mirror, reducing `content` to
/// plain text for the document-store body.
fn sync_mirror(
    metadata: &impl MetadataStore,
    mirror: &impl MirrorStore,
) -> Result<SyncOutcome, Error> {
    let records = fetch_all(metadata, FetchOptions::default())?;
    let mut outcome = SyncOutcome {
        fetched: records.len(),
        inserted: 0,
        updated: 0,
    };
    let stamp = now_rfc3339();
    for mut record in records {
        record.content = text_of_html(&record.content);
        record.last_sourced = stamp.clone();
        match mirror.insert(&record) {
            Ok(()) => outcome.inserted += 1,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                mirror.update(&record.id, &record)?;
                outcome.updated += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(outcome)
}
