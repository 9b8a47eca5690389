use std::io::Write;
use std::time::Duration;

use chrono::Utc;
use clap::{error::ErrorKind, Parser};
use tokio::time::sleep;

use crate::api::{ApiClient, ApiOptions, BiometricReading};
use crate::auth;
use crate::cli::args::{
    ChangePasswordOpts, CliArgs, Command, EntryAction, EntryFilters, ListOpts, MachineAction,
    MachineForm, SettingsAction, StudentAction, StudentForm, TeacherAction, TeacherForm,
};
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::controller::ListController;
use crate::form::{Draftable, FormDraft, FormState};
use crate::model::{
    Entry, Keyed, ListRecord, Machine, MachineStatus, RecordId, Role, ServiceType, Student,
    Teacher,
};
use crate::notify::{ConsoleNotify, Notify};
use crate::query;
use crate::render::{self, badge_style, TablePrinter};
use crate::settings::Settings;

const CAPTURE_POLLS: u32 = 10;
const CAPTURE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
struct RunConfig {
    api: ApiOptions,
    limit: u32,
    no_color: bool,
    assume_yes: bool,
    current_username: Option<String>,
    command: Command,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);
    let limit = args
        .limit
        .or(cfg.limit)
        .unwrap_or(query::DEFAULT_PAGE_LIMIT);

    let api = ApiOptions {
        base_url: args
            .base_url
            .or(cfg.base_url)
            .unwrap_or_else(|| crate::api::DEFAULT_BASE_URL.to_string()),
        timeout: Duration::from_secs(
            args.timeout
                .or(cfg.timeout)
                .unwrap_or(crate::api::DEFAULT_TIMEOUT_SECONDS),
        ),
        retries: args
            .retries
            .or(cfg.retries)
            .unwrap_or(crate::api::DEFAULT_LIST_RETRIES),
        backoff: Duration::from_millis(cfg.backoff_ms.unwrap_or(crate::api::DEFAULT_BACKOFF_MS)),
        proxy: args.proxy.or(cfg.proxy),
    };

    Ok(RunConfig {
        api,
        limit,
        no_color,
        assume_yes: args.assume_yes,
        current_username: cfg.current_username,
        command: args.command,
    })
}

fn confirm(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}

type Controller<R> = ListController<R, ApiClient, TablePrinter, ConsoleNotify>;

fn new_controller<R: ListRecord>(client: &ApiClient, limit: u32) -> Controller<R> {
    ListController::new(client.clone(), TablePrinter, ConsoleNotify, limit)
}

/// Stages page and query onto the controller so the paint happens in
/// one fetch. `set_query` resets to page 1, so the page lands last.
async fn show_list<R: ListRecord>(ctl: &mut Controller<R>, opts: &ListOpts) {
    if let Some(q) = opts.query.as_deref() {
        ctl.query_mut().set_query(q);
    }
    if let Some(page) = opts.page {
        ctl.set_page(page);
    }
    ctl.refresh().await;
}

async fn delete_flow<R: Keyed>(
    ctl: &mut Controller<R>,
    id: i64,
    list: &ListOpts,
    assume_yes: bool,
) -> Result<(), String> {
    show_list(ctl, list).await;
    let id = RecordId(id);
    let label = match ctl.find(id) {
        Some(record) => record.label().to_string(),
        None => {
            return Err(format!(
                "{} {id} is not on the current page; adjust --page/--query",
                R::KIND.singular()
            ))
        }
    };
    if !assume_yes && !confirm(&format!("delete {} {label}?", R::KIND.singular())) {
        return Err("aborted".to_string());
    }
    if ctl.delete_one(id).await {
        Ok(())
    } else {
        Err("delete failed".to_string())
    }
}

async fn bulk_delete_flow<R: Keyed>(
    ctl: &mut Controller<R>,
    ids: &[i64],
    list: &ListOpts,
    assume_yes: bool,
) -> Result<(), String> {
    show_list(ctl, list).await;
    let mut accepted = 0usize;
    for raw in ids {
        let id = RecordId(*raw);
        if ctl.selection_mut().toggle(id) {
            accepted += 1;
        } else {
            ctl.notify_mut().error(&format!(
                "{} {id} is not on the current page and was skipped",
                R::KIND.singular()
            ));
        }
    }
    if accepted == 0 {
        return Err("none of the requested ids are on the current page".to_string());
    }
    let count = ctl.selection_mut().count();
    if !assume_yes && !confirm(&format!("delete {count} selected {}?", R::KIND.plural())) {
        return Err("aborted".to_string());
    }
    if ctl.bulk_delete().await {
        Ok(())
    } else {
        Err("bulk delete failed".to_string())
    }
}

/// Polls the enrollment device once a second until both the RFID tag
/// and the fingerprint id have arrived, or the window closes.
async fn capture_biometric(client: &ApiClient) -> Result<BiometricReading, String> {
    let pb = render::spinner("waiting for rfid + fingerprint capture");
    let mut reading = BiometricReading::default();
    for attempt in 0..CAPTURE_POLLS {
        if let Ok(poll) = client.fetch_biometric().await {
            if poll.rfid.is_some() {
                reading.rfid = poll.rfid;
            }
            if poll.fingerprint_id.is_some() {
                reading.fingerprint_id = poll.fingerprint_id;
            }
        }
        if reading.complete() {
            pb.finish_and_clear();
            return Ok(reading);
        }
        if attempt + 1 < CAPTURE_POLLS {
            sleep(CAPTURE_INTERVAL).await;
        }
    }
    pb.finish_and_clear();
    Err(format!(
        "biometric capture incomplete after {CAPTURE_POLLS}s; pass --rfid/--fingerprint-id instead"
    ))
}

async fn submit_flow<R: Draftable>(
    ctl: &mut Controller<R>,
    form: &mut FormState<R::Draft>,
    ctx: &<R::Draft as FormDraft>::Context,
) -> Result<(), String> {
    if ctl.submit(form, ctx).await {
        Ok(())
    } else {
        Err("submit failed".to_string())
    }
}

fn apply_student_form(draft: &mut crate::form::StudentDraft, form: &StudentForm) {
    if let Some(v) = form.name.clone() {
        draft.name = v;
    }
    if let Some(v) = form.email.clone() {
        draft.email = v;
    }
    if let Some(v) = form.grade.clone() {
        draft.grade_level = v;
    }
    if let Some(v) = form.section.clone() {
        draft.section = v;
    }
    if form.rfid.is_some() {
        draft.rfid = form.rfid.clone();
    }
    if form.fingerprint_id.is_some() {
        draft.fingerprint_id = form.fingerprint_id.clone();
    }
}

fn apply_teacher_form(draft: &mut crate::form::TeacherDraft, form: &TeacherForm) {
    if let Some(v) = form.name.clone() {
        draft.name = v;
    }
    if let Some(v) = form.email.clone() {
        draft.email = v;
    }
    if let Some(role) = form.role.as_deref().and_then(Role::parse) {
        draft.role = Some(role);
    }
    if form.rfid.is_some() {
        draft.rfid = form.rfid.clone();
    }
    if form.fingerprint_id.is_some() {
        draft.fingerprint_id = form.fingerprint_id.clone();
    }
}

fn apply_machine_form(draft: &mut crate::form::MachineDraft, form: &MachineForm) {
    if form.machine_id.is_some() {
        draft.machine_id = form.machine_id;
    }
    if let Some(v) = form.name.clone() {
        draft.name = v;
    }
    if let Some(v) = form.location.clone() {
        draft.location = v;
    }
    if let Some(status) = form.status.as_deref().and_then(MachineStatus::parse) {
        draft.status = Some(status);
    }
    if let Some(service) = form.service_type.as_deref().and_then(ServiceType::parse) {
        draft.service_type = Some(service);
    }
}

/// Captured values fill only the holes the flags left, so an explicit
/// --rfid wins over the device.
fn merge_capture(
    rfid: &mut Option<String>,
    fingerprint_id: &mut Option<String>,
    reading: BiometricReading,
) {
    if rfid.is_none() {
        *rfid = reading.rfid;
    }
    if fingerprint_id.is_none() {
        *fingerprint_id = reading.fingerprint_id;
    }
}

fn entry_filter_pairs(filters: &EntryFilters) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Some(v) = filters.date.as_deref() {
        pairs.push(("date".to_string(), v.to_string()));
    }
    if let Some(v) = filters.start_time.as_deref() {
        pairs.push(("start_time".to_string(), v.to_string()));
    }
    if let Some(v) = filters.end_time.as_deref() {
        pairs.push(("end_time".to_string(), v.to_string()));
    }
    if let Some(v) = filters.status.as_deref() {
        pairs.push(("status".to_string(), v.to_string()));
    }
    pairs
}

async fn run_students(
    client: &ApiClient,
    run: &RunConfig,
    action: StudentAction,
) -> Result<(), String> {
    let mut ctl = new_controller::<Student>(client, run.limit);
    match action {
        StudentAction::List(opts) => {
            show_list(&mut ctl, &opts).await;
            Ok(())
        }
        StudentAction::Register(flags) => {
            let ctx = client.grade_sections().await.map_err(|e| e.to_string())?;
            let mut form: FormState<crate::form::StudentDraft> = FormState::default();
            apply_student_form(form.draft_mut(), &flags);
            if flags.capture {
                let reading = capture_biometric(client).await?;
                let draft = form.draft_mut();
                merge_capture(&mut draft.rfid, &mut draft.fingerprint_id, reading);
            }
            submit_flow(&mut ctl, &mut form, &ctx).await
        }
        StudentAction::Update {
            id,
            list,
            form: flags,
        } => {
            let ctx = client.grade_sections().await.map_err(|e| e.to_string())?;
            show_list(&mut ctl, &list).await;
            let mut form: FormState<crate::form::StudentDraft> = FormState::default();
            ctl.begin_edit(&mut form, RecordId(id))
                .map_err(|e| e.to_string())?;
            apply_student_form(form.draft_mut(), &flags);
            if flags.capture {
                let reading = capture_biometric(client).await?;
                let draft = form.draft_mut();
                merge_capture(&mut draft.rfid, &mut draft.fingerprint_id, reading);
            }
            submit_flow(&mut ctl, &mut form, &ctx).await
        }
        StudentAction::Delete { id, list } => {
            delete_flow(&mut ctl, id, &list, run.assume_yes).await
        }
        StudentAction::BulkDelete { ids, list } => {
            bulk_delete_flow(&mut ctl, &ids, &list, run.assume_yes).await
        }
    }
}

async fn run_teachers(
    client: &ApiClient,
    run: &RunConfig,
    action: TeacherAction,
) -> Result<(), String> {
    let mut ctl = new_controller::<Teacher>(client, run.limit);
    match action {
        TeacherAction::List(opts) => {
            show_list(&mut ctl, &opts).await;
            Ok(())
        }
        TeacherAction::Register(flags) => {
            let mut form: FormState<crate::form::TeacherDraft> = FormState::default();
            apply_teacher_form(form.draft_mut(), &flags);
            if flags.capture {
                let reading = capture_biometric(client).await?;
                let draft = form.draft_mut();
                merge_capture(&mut draft.rfid, &mut draft.fingerprint_id, reading);
            }
            submit_flow(&mut ctl, &mut form, &()).await
        }
        TeacherAction::Update {
            id,
            list,
            form: flags,
        } => {
            show_list(&mut ctl, &list).await;
            let mut form: FormState<crate::form::TeacherDraft> = FormState::default();
            ctl.begin_edit(&mut form, RecordId(id))
                .map_err(|e| e.to_string())?;
            apply_teacher_form(form.draft_mut(), &flags);
            if flags.capture {
                let reading = capture_biometric(client).await?;
                let draft = form.draft_mut();
                merge_capture(&mut draft.rfid, &mut draft.fingerprint_id, reading);
            }
            submit_flow(&mut ctl, &mut form, &()).await
        }
        TeacherAction::Delete { id, list } => {
            delete_flow(&mut ctl, id, &list, run.assume_yes).await
        }
        TeacherAction::BulkDelete { ids, list } => {
            bulk_delete_flow(&mut ctl, &ids, &list, run.assume_yes).await
        }
    }
}

async fn run_machines(
    client: &ApiClient,
    run: &RunConfig,
    action: MachineAction,
) -> Result<(), String> {
    let mut ctl = new_controller::<Machine>(client, run.limit);
    match action {
        MachineAction::List(opts) => {
            show_list(&mut ctl, &opts).await;
            Ok(())
        }
        MachineAction::Register(flags) => {
            let mut form: FormState<crate::form::MachineDraft> = FormState::default();
            apply_machine_form(form.draft_mut(), &flags);
            submit_flow(&mut ctl, &mut form, &()).await
        }
        MachineAction::Update {
            id,
            list,
            form: flags,
        } => {
            show_list(&mut ctl, &list).await;
            let mut form: FormState<crate::form::MachineDraft> = FormState::default();
            ctl.begin_edit(&mut form, RecordId(id))
                .map_err(|e| e.to_string())?;
            apply_machine_form(form.draft_mut(), &flags);
            submit_flow(&mut ctl, &mut form, &()).await
        }
        MachineAction::Delete { id, list } => {
            delete_flow(&mut ctl, id, &list, run.assume_yes).await
        }
        MachineAction::BulkDelete { ids, list } => {
            bulk_delete_flow(&mut ctl, &ids, &list, run.assume_yes).await
        }
    }
}

async fn run_entries(
    client: &ApiClient,
    run: &RunConfig,
    action: EntryAction,
) -> Result<(), String> {
    match action {
        EntryAction::List { list, filters } => {
            let mut ctl = new_controller::<Entry>(client, run.limit);
            for (key, value) in entry_filter_pairs(&filters) {
                ctl.query_mut().set_field(&key, &value);
            }
            show_list(&mut ctl, &list).await;
            Ok(())
        }
        EntryAction::Summary { filters } => {
            let breakdown = client
                .entry_status(&entry_filter_pairs(&filters))
                .await
                .map_err(|e| e.to_string())?;
            let total: u64 = breakdown.data.iter().sum();
            for (label, count) in breakdown.labels.iter().zip(breakdown.data.iter()) {
                println!("{:<10} {}", badge_style(label), count);
            }
            println!("{:<10} {}", "Total", total);
            Ok(())
        }
    }
}

async fn run_settings(client: &ApiClient, action: SettingsAction) -> Result<(), String> {
    let mut notify = ConsoleNotify;
    match action {
        SettingsAction::Get => {
            let settings = client.get_settings().await.map_err(|e| e.to_string())?;
            println!("Late threshold: {}", settings.late_threshold);
            Ok(())
        }
        SettingsAction::Set { late_threshold } => {
            let settings = Settings::new(&late_threshold)
                .ok_or_else(|| format!("invalid late threshold '{late_threshold}'"))?;
            client
                .update_settings(&settings)
                .await
                .map_err(|e| e.to_string())?;
            notify.success(&format!(
                "late threshold set to {}",
                settings.late_threshold
            ));
            Ok(())
        }
    }
}

async fn run_change_password(
    client: &ApiClient,
    run: &RunConfig,
    opts: ChangePasswordOpts,
) -> Result<(), String> {
    let mut notify = ConsoleNotify;
    let current_username = opts
        .current_username
        .or_else(|| run.current_username.clone())
        .ok_or_else(|| {
            "current username is required; pass --current-username or set current_username in the config"
                .to_string()
        })?;
    client
        .change_password(
            &current_username,
            &opts.username,
            &opts.current_password,
            &opts.new_password,
        )
        .await
        .map_err(|e| e.to_string())?;
    notify.success("password changed successfully");

    // the old session does not survive a credential change
    if let Some(token_path) = config::default_token_path() {
        if auth::token_valid(&token_path, Utc::now()) {
            let _ = std::fs::remove_file(&token_path);
            notify.success("stored session cleared; sign in again on next use");
        }
    }
    Ok(())
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }

    let client = ApiClient::new(run.api.clone()).map_err(|e| e.to_string())?;
    match run.command.clone() {
        Command::Students { action } => run_students(&client, &run, action).await,
        Command::Teachers { action } => run_teachers(&client, &run, action).await,
        Command::Machines { action } => run_machines(&client, &run, action).await,
        Command::Entries { action } => run_entries(&client, &run, action).await,
        Command::Settings { action } => run_settings(&client, action).await,
        Command::ChangePassword(opts) => run_change_password(&client, &run, opts).await,
    }
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let cfg = match args.config.as_deref() {
        Some(path) => {
            let path = config::expand_tilde(path);
            config::load_config(&path, false)?
        }
        None => match config::default_config_path() {
            Some(path) => {
                config::ensure_default_config_file(&path)?;
                config::load_config(&path, true)?
            }
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
